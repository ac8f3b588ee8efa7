// 5.0: rules. a rule pairs one evaluator with one action and owns an ordered
// list of child rules. roots are evaluated against the data set directly;
// children only when their parent's evaluator just returned true.

use crate::data_set::{DataSet, DataSetError};
use crate::source::SourceError;
use std::fmt;
use std::sync::Arc;

/// Side-effect-free predicate over a data set.
pub trait RuleEvaluator: Send + Sync {
    fn evaluate(&self, data_set: &DataSet) -> Result<bool, RuleError>;

    /// Names of the data points this evaluator reads. Used to pick candidate
    /// rules when a point changes.
    fn dependencies(&self) -> Vec<String>;
}

/// The outbound call into action-specific logic.
pub trait RuleAction: Send + Sync {
    fn execute(&self, data_set: &DataSet) -> Result<(), ActionError>;
}

pub struct Rule {
    name: String,
    evaluator: Arc<dyn RuleEvaluator>,
    action: Arc<dyn RuleAction>,
    children: Vec<Rule>,
}

impl Rule {
    pub fn new(name: impl Into<String>, evaluator: Arc<dyn RuleEvaluator>, action: Arc<dyn RuleAction>) -> Self {
        Self {
            name: name.into(),
            evaluator,
            action,
            children: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn evaluator(&self) -> &Arc<dyn RuleEvaluator> {
        &self.evaluator
    }

    pub fn action(&self) -> &Arc<dyn RuleAction> {
        &self.action
    }

    pub fn children(&self) -> &[Rule] {
        &self.children
    }

    pub fn child(&self, name: &str) -> Option<&Rule> {
        self.children.iter().find(|r| r.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Rule> {
        self.children.iter_mut().find(|r| r.name == name)
    }

    /// Attach a dependent rule. Sibling names must be unique.
    pub fn add_rule(&mut self, rule: Rule) -> Result<&mut Rule, RuleError> {
        if self.child(&rule.name).is_some() {
            return Err(RuleError::DuplicateName {
                parent: self.name.clone(),
                name: rule.name,
            });
        }
        self.children.push(rule);
        let last = self.children.len() - 1;
        Ok(&mut self.children[last])
    }

    /// Levels in this subtree, counting this rule.
    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(Rule::depth).max().unwrap_or(0)
    }

    /// This rule and all descendants, depth-first in declaration order, with
    /// their slash-separated paths.
    pub fn walk_paths<'a>(&'a self, prefix: &str, out: &mut Vec<(String, &'a Rule)>) {
        let path = if prefix.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", prefix, self.name)
        };
        out.push((path.clone(), self));
        for child in &self.children {
            child.walk_paths(&path, out);
        }
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("dependencies", &self.evaluator.dependencies())
            .field("children", &self.children)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    #[error("Rule {name} already exists under {parent}")]
    DuplicateName { parent: String, name: String },

    #[error("Rule nesting under {parent} exceeds {max} levels")]
    TooDeep { parent: String, max: usize },

    #[error("Data point {data_point} is {found}, expected {expected}")]
    TypeMismatch {
        data_point: String,
        expected: String,
        found: String,
    },

    #[error("Data set error: {0}")]
    DataSet(#[from] DataSetError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Evaluation failed: {0}")]
    Evaluation(String),
}

/// Raised by an action. The walk records it and moves on to siblings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("action failed: {reason}")]
pub struct ActionError {
    pub reason: String,
}

impl ActionError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}
