// 7.0 config.rs: engine settings in one place. audit retention, what gets
// recorded, and how walks prepare their data set.

use crate::rule_set::DEFAULT_MAX_RULE_DEPTH;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    // Maximum number of audit events kept in memory
    pub max_events: usize,
    // Record every evaluator result, not just fires and failures
    pub record_evaluations: bool,
    // Settle stale lookups and compounds in dependency order before a walk
    pub refresh_before_walk: bool,
    // Deepest rule nesting a rule set accepts
    pub max_rule_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_events: 100_000,
            record_evaluations: false,
            refresh_before_walk: false,
            max_rule_depth: DEFAULT_MAX_RULE_DEPTH,
        }
    }
}

impl EngineConfig {
    /// Records everything. Meant for tests and the simulator.
    pub fn development() -> Self {
        Self {
            max_events: 10_000,
            record_evaluations: true,
            ..Self::default()
        }
    }

    /// Fires and failures only, refreshed data before each walk.
    pub fn production() -> Self {
        Self {
            max_events: 1_000_000,
            record_evaluations: false,
            refresh_before_walk: true,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_events == 0 {
            return Err(ConfigError::InvalidRetention {
                reason: "max_events must be positive".to_string(),
            });
        }

        if self.max_rule_depth == 0 {
            return Err(ConfigError::InvalidRuleDepth {
                reason: "max_rule_depth must be at least 1".to_string(),
            });
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid retention: {reason}")]
    InvalidRetention { reason: String },

    #[error("Invalid rule depth: {reason}")]
    InvalidRuleDepth { reason: String },
}
