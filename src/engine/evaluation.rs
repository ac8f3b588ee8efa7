// 9.2: walk entry points. runs a rule set against one or all data sets and
// turns each report into audit events.

use super::core::Engine;
use super::results::EngineError;
use crate::data_set::DataSet;
use crate::events::{EventPayload, RuleEvent, RuleFailedEvent, WalkCompletedEvent};
use crate::rule_set::{EvaluationReport, FailureKind, RuleOutcome};
use crate::scheduler::ChangeTracker;
use std::sync::Arc;
use tracing::{debug, info};

impl Engine {
    /// Walk `rule_set` against `data_set`. Rule failures land in the report
    /// and the audit trail; only unknown names are errors here.
    pub fn execute(&mut self, rule_set: &str, data_set: &str) -> Result<EvaluationReport, EngineError> {
        let data_set = self.data_set(data_set)?;
        self.walk(rule_set, &data_set)
    }

    /// Walk `rule_set` against every data set, in creation order.
    pub fn execute_all(&mut self, rule_set: &str) -> Result<Vec<EvaluationReport>, EngineError> {
        self.rule_set(rule_set)?.validate()?;
        let data_sets: Vec<Arc<DataSet>> = self.data_sets.values().cloned().collect();
        let mut reports = Vec::with_capacity(data_sets.len());
        for data_set in &data_sets {
            reports.push(self.walk(rule_set, data_set)?);
        }
        Ok(reports)
    }

    /// Walk only if some rule of `rule_set` reads a point the tracker saw
    /// change in `data_set`, or failed on the previous walk. Consumes the
    /// tracked changes for that set when a walk happens and remembers the
    /// rules that failed.
    pub fn execute_if_affected(
        &mut self,
        rule_set: &str,
        data_set: &str,
        tracker: &mut ChangeTracker,
    ) -> Result<Option<EvaluationReport>, EngineError> {
        let candidates = tracker.candidates(self.rule_set(rule_set)?, data_set);
        if candidates.is_empty() {
            debug!(rule_set = %rule_set, data_set = %data_set, "no affected rules");
            return Ok(None);
        }

        let report = self.execute(rule_set, data_set)?;
        tracker.take(data_set);
        tracker.record_failures(&report);
        Ok(Some(report))
    }

    /// Rule paths in `rule_set` that read `point` or anything derived from it.
    pub fn affected_rules(&self, rule_set: &str, data_set: &str, point: &str) -> Result<Vec<String>, EngineError> {
        let data_set = self.data_set(data_set)?;
        let mut names = data_set.dependents_of(point)?;
        names.insert(0, point.to_string());
        Ok(self.rule_set(rule_set)?.rules_depending_on(&names))
    }

    fn walk(&mut self, rule_set: &str, data_set: &DataSet) -> Result<EvaluationReport, EngineError> {
        // resolve before any fetch or event
        self.rule_set(rule_set)?.validate()?;

        if self.config.refresh_before_walk {
            let refresh = data_set.refresh();
            for (data_point, error) in refresh.failures {
                self.emit_event(EventPayload::RefreshFailed {
                    data_set: data_set.name().to_string(),
                    data_point,
                    reason: error.to_string(),
                });
            }
        }

        let report = self.rule_set(rule_set)?.execute(data_set);

        self.record(&report);
        info!(
            rule_set = %report.rule_set,
            data_set = %report.data_set,
            fired = report.fired().len(),
            failures = report.failures.len(),
            "walk completed"
        );
        Ok(report)
    }

    fn record(&mut self, report: &EvaluationReport) {
        let rule_event = |rule: &str, held: bool| RuleEvent {
            rule_set: report.rule_set.clone(),
            data_set: report.data_set.clone(),
            rule: rule.to_string(),
            held,
        };

        for (rule, outcome) in &report.outcomes {
            if self.config.record_evaluations {
                self.emit_event(EventPayload::RuleEvaluated(rule_event(rule, outcome.held())));
            }
            if *outcome == RuleOutcome::Fired {
                self.emit_event(EventPayload::RuleFired(rule_event(rule, true)));
            }
        }

        for failure in &report.failures {
            let (reason, action) = match &failure.kind {
                FailureKind::Evaluation(e) => (e.to_string(), false),
                FailureKind::Action(e) => (e.to_string(), true),
            };
            let event = RuleFailedEvent {
                rule_set: report.rule_set.clone(),
                data_set: report.data_set.clone(),
                rule: failure.rule.clone(),
                reason,
            };
            self.emit_event(if action {
                EventPayload::ActionFailed(event)
            } else {
                EventPayload::RuleFailed(event)
            });
        }

        self.emit_event(EventPayload::WalkCompleted(WalkCompletedEvent {
            rule_set: report.rule_set.clone(),
            data_set: report.data_set.clone(),
            evaluated: report.outcomes.len(),
            fired: report.fired().len(),
            failures: report.failures.len(),
        }));
    }
}
