// 6.1: change tracking for incremental re-evaluation.
// collects which points changed per data set (expanded through dependents)
// so a host only walks rule sets that read something that moved. the walk
// itself stays a full walk, so decisions match a full walk at read time.
// rules that failed on the last walk stay candidates until a walk clears them,
// so a transient fetch failure is retried without a fresh notification.

use crate::data_set::{DataSet, DataSetError};
use crate::rule_set::{EvaluationReport, RuleSet};
use indexmap::{IndexMap, IndexSet};

#[derive(Debug, Default, Clone)]
pub struct ChangeTracker {
    changed: IndexMap<String, IndexSet<String>>,
    // (rule set, data set) -> rule paths that failed on the last walk
    failed: IndexMap<(String, String), IndexSet<String>>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a change to `point` and to everything that depends on it.
    pub fn record(&mut self, data_set: &DataSet, point: &str) -> Result<(), DataSetError> {
        let dependents = data_set.dependents_of(point)?;
        let entry = self.changed.entry(data_set.name().to_string()).or_default();
        entry.insert(point.to_string());
        entry.extend(dependents);
        Ok(())
    }

    pub fn changed(&self, data_set: &str) -> Vec<String> {
        self.changed
            .get(data_set)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Data sets with pending changes or failed rules, in first-seen order.
    pub fn data_sets(&self) -> Vec<String> {
        let mut out: IndexSet<String> = self.changed.keys().cloned().collect();
        out.extend(self.failed.keys().map(|(_, data_set)| data_set.clone()));
        out.into_iter().collect()
    }

    /// Rule paths in `rule_set` that read a changed point of `data_set`, plus
    /// those that failed the last time `rule_set` walked `data_set`.
    pub fn candidates(&self, rule_set: &RuleSet, data_set: &str) -> Vec<String> {
        let mut out: IndexSet<String> = match self.changed.get(data_set) {
            Some(names) => {
                let names: Vec<&str> = names.iter().map(String::as_str).collect();
                rule_set.rules_depending_on(&names).into_iter().collect()
            }
            None => IndexSet::new(),
        };
        out.extend(self.failed(rule_set.name(), data_set));
        out.into_iter().collect()
    }

    /// Remember which rules of a walk failed, replacing what the previous
    /// walk of the same rule set and data set left behind.
    pub fn record_failures(&mut self, report: &EvaluationReport) {
        let key = (report.rule_set.clone(), report.data_set.clone());
        if report.failures.is_empty() {
            self.failed.shift_remove(&key);
        } else {
            self.failed
                .insert(key, report.failures.iter().map(|f| f.rule.clone()).collect());
        }
    }

    pub fn failed(&self, rule_set: &str, data_set: &str) -> Vec<String> {
        self.failed
            .get(&(rule_set.to_string(), data_set.to_string()))
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Drop and return the pending changes of one data set.
    pub fn take(&mut self, data_set: &str) -> Vec<String> {
        self.changed
            .shift_remove(data_set)
            .map(|s| s.into_iter().collect())
            .unwrap_or_default()
    }

    pub fn clear(&mut self) {
        self.changed.clear();
        self.failed.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.changed.values().all(IndexSet::is_empty) && self.failed.is_empty()
    }
}
