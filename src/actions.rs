// 5.2: built-in actions.

use crate::data_set::DataSet;
use crate::rule::{ActionError, RuleAction};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

/// Does nothing. For rules that only gate their children.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAction;

impl RuleAction for NoAction {
    fn execute(&self, _data_set: &DataSet) -> Result<(), ActionError> {
        Ok(())
    }
}

/// Shared, append-only record of what actions did. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct ActionLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl ActionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.entries.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

/// Appends "<data set>: <message>" to a log.
#[derive(Debug, Clone)]
pub struct RecordAction {
    message: String,
    log: ActionLog,
}

impl RecordAction {
    pub fn new(message: impl Into<String>, log: ActionLog) -> Self {
        Self {
            message: message.into(),
            log,
        }
    }
}

impl RuleAction for RecordAction {
    fn execute(&self, data_set: &DataSet) -> Result<(), ActionError> {
        info!(data_set = %data_set.name(), message = %self.message, "action");
        self.log.push(format!("{}: {}", data_set.name(), self.message));
        Ok(())
    }
}

type ActionFn = dyn Fn(&DataSet) -> Result<(), ActionError> + Send + Sync;

pub struct FnAction(Box<ActionFn>);

impl FnAction {
    pub fn new<F>(action: F) -> Self
    where
        F: Fn(&DataSet) -> Result<(), ActionError> + Send + Sync + 'static,
    {
        Self(Box::new(action))
    }
}

impl RuleAction for FnAction {
    fn execute(&self, data_set: &DataSet) -> Result<(), ActionError> {
        (self.0)(data_set)
    }
}

/// Runs actions in order, stopping at the first failure.
pub struct Sequence(pub Vec<Arc<dyn RuleAction>>);

impl RuleAction for Sequence {
    fn execute(&self, data_set: &DataSet) -> Result<(), ActionError> {
        for action in &self.0 {
            action.execute(data_set)?;
        }
        Ok(())
    }
}
