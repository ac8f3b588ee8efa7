// 9.0 engine/core.rs: registry state. data sets, rule sets, audit events.

use super::results::EngineError;
use crate::config::EngineConfig;
use crate::data_set::DataSet;
use crate::events::{Event, EventId, EventPayload};
use crate::rule_set::RuleSet;
use crate::types::Timestamp;
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::{debug, info};

/** 9.1: main engine struct. creation order is kept for enumeration */
#[derive(Debug)]
pub struct Engine {
    pub(super) config: EngineConfig,
    pub(super) data_sets: IndexMap<String, Arc<DataSet>>,
    pub(super) rule_sets: IndexMap<String, RuleSet>,
    pub(super) events: Vec<Event>,
    pub(super) next_event_id: u64,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            data_sets: IndexMap::new(),
            rule_sets: IndexMap::new(),
            events: Vec::new(),
            next_event_id: 1,
        }
    }

    /// Like `new`, rejecting an inconsistent config.
    pub fn try_new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn create_data_set(&mut self, name: impl Into<String>) -> Result<Arc<DataSet>, EngineError> {
        let name = name.into();
        if self.data_sets.contains_key(&name) {
            return Err(EngineError::DuplicateDataSet(name));
        }

        let data_set = Arc::new(DataSet::new(name.clone()));
        self.data_sets.insert(name.clone(), Arc::clone(&data_set));
        info!(data_set = %name, "data set created");
        self.emit_event(EventPayload::DataSetCreated { data_set: name });
        Ok(data_set)
    }

    pub fn data_set(&self, name: &str) -> Result<Arc<DataSet>, EngineError> {
        self.data_sets
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::DataSetNotFound(name.to_string()))
    }

    /// All data sets in creation order.
    pub fn data_sets(&self) -> impl Iterator<Item = &Arc<DataSet>> {
        self.data_sets.values()
    }

    pub fn create_rule_set(&mut self, name: impl Into<String>) -> Result<&mut RuleSet, EngineError> {
        let name = name.into();
        if self.rule_sets.contains_key(&name) {
            return Err(EngineError::DuplicateRuleSet(name));
        }

        info!(rule_set = %name, "rule set created");
        self.emit_event(EventPayload::RuleSetCreated { rule_set: name.clone() });

        let rule_set = RuleSet::new(name.clone()).with_max_depth(self.config.max_rule_depth);
        let entry = self.rule_sets.entry(name).or_insert(rule_set);
        Ok(entry)
    }

    pub fn rule_set(&self, name: &str) -> Result<&RuleSet, EngineError> {
        self.rule_sets
            .get(name)
            .ok_or_else(|| EngineError::RuleSetNotFound(name.to_string()))
    }

    pub fn rule_set_mut(&mut self, name: &str) -> Result<&mut RuleSet, EngineError> {
        self.rule_sets
            .get_mut(name)
            .ok_or_else(|| EngineError::RuleSetNotFound(name.to_string()))
    }

    pub fn rule_sets(&self) -> impl Iterator<Item = &RuleSet> {
        self.rule_sets.values()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn recent_events(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }

    pub fn failures(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().filter(|e| e.payload.is_failure())
    }

    pub(super) fn emit_event(&mut self, payload: EventPayload) {
        let event = Event::new(EventId(self.next_event_id), Timestamp::now(), payload);
        self.next_event_id += 1;

        debug!(event = event.id.0, payload = ?event.payload, "event");

        self.events.push(event);

        if self.events.len() > self.config.max_events {
            let drain_count = self.events.len() - self.config.max_events;
            self.events.drain(0..drain_count);
        }
    }
}
