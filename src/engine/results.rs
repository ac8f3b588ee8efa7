// 9.0.2: errors for registry and evaluation entry points.

use crate::config::ConfigError;
use crate::data_set::DataSetError;
use crate::rule::RuleError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("Data set {0} already exists")]
    DuplicateDataSet(String),

    #[error("Rule set {0} already exists")]
    DuplicateRuleSet(String),

    #[error("Data set {0} not found")]
    DataSetNotFound(String),

    #[error("Rule set {0} not found")]
    RuleSetNotFound(String),

    #[error("Data set error: {0}")]
    DataSet(#[from] DataSetError),

    #[error("Rule error: {0}")]
    Rule(#[from] RuleError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}
