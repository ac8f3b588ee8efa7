// 8.0: audit trail. the engine records registry changes, rule decisions and
// failures so a host can show why an order was (or was not) routed.

use crate::types::Timestamp;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self { id, timestamp, payload }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventPayload {
    // Registry events
    DataSetCreated { data_set: String },
    RuleSetCreated { rule_set: String },

    // Rule events
    RuleEvaluated(RuleEvent),
    RuleFired(RuleEvent),
    RuleFailed(RuleFailedEvent),
    ActionFailed(RuleFailedEvent),

    // Walk events
    WalkCompleted(WalkCompletedEvent),
    RefreshFailed { data_set: String, data_point: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleEvent {
    pub rule_set: String,
    pub data_set: String,
    pub rule: String,
    pub held: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleFailedEvent {
    pub rule_set: String,
    pub data_set: String,
    pub rule: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkCompletedEvent {
    pub rule_set: String,
    pub data_set: String,
    pub evaluated: usize,
    pub fired: usize,
    pub failures: usize,
}

impl EventPayload {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            EventPayload::RuleFailed(_) | EventPayload::ActionFailed(_) | EventPayload::RefreshFailed { .. }
        )
    }
}
