// 6.0: rule sets and the tree walk.
// roots in declaration order; a true evaluator runs the action then descends
// into children (depth-first, declaration order); false or failed skips the
// whole subtree. failures are recorded, never swallowed, and never abort
// the rest of the set.

use crate::data_set::DataSet;
use crate::rule::{ActionError, Rule, RuleError};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, trace, warn};

pub const DEFAULT_MAX_RULE_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RuleOutcome {
    /// Evaluator held and the action ran.
    Fired,
    /// Evaluator held, the action reported failure. Children were still walked.
    ActionFailed,
    /// Evaluator returned false. Subtree skipped.
    NotHeld,
    /// Evaluator errored. Treated as not held, subtree skipped.
    Failed,
}

impl RuleOutcome {
    pub fn held(&self) -> bool {
        matches!(self, RuleOutcome::Fired | RuleOutcome::ActionFailed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    Evaluation(RuleError),
    Action(ActionError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleFailure {
    /// Slash-separated path from the root rule.
    pub rule: String,
    pub kind: FailureKind,
}

/// Everything one walk did, in visit order.
#[derive(Debug, Clone, Default)]
pub struct EvaluationReport {
    pub rule_set: String,
    pub data_set: String,
    pub outcomes: Vec<(String, RuleOutcome)>,
    pub failures: Vec<RuleFailure>,
}

impl EvaluationReport {
    fn new(rule_set: &str, data_set: &str) -> Self {
        Self {
            rule_set: rule_set.to_string(),
            data_set: data_set.to_string(),
            ..Self::default()
        }
    }

    pub fn outcome(&self, path: &str) -> Option<RuleOutcome> {
        self.outcomes.iter().find(|(p, _)| p == path).map(|(_, o)| *o)
    }

    pub fn was_evaluated(&self, path: &str) -> bool {
        self.outcome(path).is_some()
    }

    /// Paths whose actions ran successfully, in execution order.
    pub fn fired(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, o)| *o == RuleOutcome::Fired)
            .map(|(p, _)| p.as_str())
            .collect()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug)]
pub struct RuleSet {
    name: String,
    rules: Vec<Rule>,
    max_depth: usize,
}

impl RuleSet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
            max_depth: DEFAULT_MAX_RULE_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.name() == name)
    }

    pub fn rule_mut(&mut self, name: &str) -> Option<&mut Rule> {
        self.rules.iter_mut().find(|r| r.name() == name)
    }

    /// Add a root rule. Root names are unique within the set.
    pub fn add_rule(&mut self, rule: Rule) -> Result<&mut Rule, RuleError> {
        if self.rule(rule.name()).is_some() {
            return Err(RuleError::DuplicateName {
                parent: self.name.clone(),
                name: rule.name().to_string(),
            });
        }
        if rule.depth() > self.max_depth {
            return Err(RuleError::TooDeep {
                parent: self.name.clone(),
                max: self.max_depth,
            });
        }
        self.rules.push(rule);
        let last = self.rules.len() - 1;
        Ok(&mut self.rules[last])
    }

    /// Re-check nesting after children were attached through `rule_mut`.
    pub fn validate(&self) -> Result<(), RuleError> {
        match self.rules.iter().find(|r| r.depth() > self.max_depth) {
            Some(rule) => Err(RuleError::TooDeep {
                parent: rule.name().to_string(),
                max: self.max_depth,
            }),
            None => Ok(()),
        }
    }

    /// Every rule with its path, depth-first in declaration order.
    pub fn rule_paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        for rule in &self.rules {
            rule.walk_paths("", &mut out);
        }
        out.into_iter().map(|(path, _)| path).collect()
    }

    /// Paths of rules whose evaluator reads any of `names`.
    pub fn rules_depending_on<S: AsRef<str>>(&self, names: &[S]) -> Vec<String> {
        let wanted: HashSet<&str> = names.iter().map(AsRef::as_ref).collect();
        let mut all = Vec::new();
        for rule in &self.rules {
            rule.walk_paths("", &mut all);
        }
        all.into_iter()
            .filter(|(_, rule)| {
                rule.evaluator()
                    .dependencies()
                    .iter()
                    .any(|d| wanted.contains(d.as_str()))
            })
            .map(|(path, _)| path)
            .collect()
    }

    /// Walk the whole tree against one data set.
    pub fn execute(&self, data_set: &DataSet) -> EvaluationReport {
        let mut report = EvaluationReport::new(&self.name, data_set.name());
        walk(&self.rules, "", data_set, &mut report);
        debug!(
            rule_set = %self.name,
            data_set = %data_set.name(),
            evaluated = report.outcomes.len(),
            failures = report.failures.len(),
            "rule set executed"
        );
        report
    }
}

fn walk(rules: &[Rule], prefix: &str, data_set: &DataSet, report: &mut EvaluationReport) {
    for rule in rules {
        let path = if prefix.is_empty() {
            rule.name().to_string()
        } else {
            format!("{}/{}", prefix, rule.name())
        };

        let outcome = match rule.evaluator().evaluate(data_set) {
            Ok(true) => match rule.action().execute(data_set) {
                Ok(()) => {
                    debug!(data_set = %data_set.name(), rule = %path, "rule fired");
                    RuleOutcome::Fired
                }
                Err(e) => {
                    warn!(data_set = %data_set.name(), rule = %path, error = %e, "action failed");
                    report.failures.push(RuleFailure {
                        rule: path.clone(),
                        kind: FailureKind::Action(e),
                    });
                    RuleOutcome::ActionFailed
                }
            },
            Ok(false) => {
                trace!(data_set = %data_set.name(), rule = %path, "rule not held");
                RuleOutcome::NotHeld
            }
            Err(e) => {
                warn!(data_set = %data_set.name(), rule = %path, error = %e, "evaluator failed");
                report.failures.push(RuleFailure {
                    rule: path.clone(),
                    kind: FailureKind::Evaluation(e),
                });
                RuleOutcome::Failed
            }
        };

        report.outcomes.push((path.clone(), outcome));
        if outcome.held() {
            walk(rule.children(), &path, data_set, report);
        }
    }
}
