// 5.1: built-in evaluators. conditions on one data point, and combinators.

use crate::data_set::{DataSet, DataSetError};
use crate::rule::{RuleError, RuleEvaluator};
use crate::source::SourceError;
use crate::types::{CompareOp, Value};
use std::sync::Arc;

/// `data_point <op> literal`. Numbers compare numerically, text lexically.
/// Equality across kinds is false; ordering across kinds is a TypeMismatch.
#[derive(Debug, Clone)]
pub struct Condition {
    data_point: String,
    op: CompareOp,
    expected: Value,
}

impl Condition {
    pub fn new(data_point: impl Into<String>, op: CompareOp, expected: impl Into<Value>) -> Self {
        Self {
            data_point: data_point.into(),
            op,
            expected: expected.into(),
        }
    }

    pub fn equals(data_point: impl Into<String>, expected: impl Into<Value>) -> Self {
        Self::new(data_point, CompareOp::Eq, expected)
    }

    pub fn above(data_point: impl Into<String>, threshold: impl Into<Value>) -> Self {
        Self::new(data_point, CompareOp::Gt, threshold)
    }

    pub fn below(data_point: impl Into<String>, threshold: impl Into<Value>) -> Self {
        Self::new(data_point, CompareOp::Lt, threshold)
    }

    fn compare(&self, actual: &Value) -> Result<bool, RuleError> {
        match actual.partial_order(&self.expected) {
            Some(ordering) => Ok(self.op.holds(ordering)),
            None if !self.op.is_ordering() => Ok(self.op == CompareOp::Ne),
            None => Err(RuleError::TypeMismatch {
                data_point: self.data_point.clone(),
                expected: self.expected.type_name().to_string(),
                found: actual.type_name().to_string(),
            }),
        }
    }
}

impl RuleEvaluator for Condition {
    fn evaluate(&self, data_set: &DataSet) -> Result<bool, RuleError> {
        let actual = data_set.value(&self.data_point)?;
        self.compare(&actual)
    }

    fn dependencies(&self) -> Vec<String> {
        vec![self.data_point.clone()]
    }
}

/// True when the point exists and yields a value. An absent point, a point
/// without a source, or a stream with no value yet is false; a read that
/// breaks (failed fetch, failed compute) is an error.
#[derive(Debug, Clone)]
pub struct Exists {
    data_point: String,
}

impl Exists {
    pub fn new(data_point: impl Into<String>) -> Self {
        Self {
            data_point: data_point.into(),
        }
    }
}

impl RuleEvaluator for Exists {
    fn evaluate(&self, data_set: &DataSet) -> Result<bool, RuleError> {
        match data_set.value(&self.data_point) {
            Ok(_) => Ok(true),
            Err(DataSetError::NotFound { .. })
            | Err(DataSetError::Source(SourceError::MissingSource(_)))
            | Err(DataSetError::Source(SourceError::NoValue(_))) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn dependencies(&self) -> Vec<String> {
        vec![self.data_point.clone()]
    }
}

fn union_dependencies(evaluators: &[Arc<dyn RuleEvaluator>]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for name in evaluators.iter().flat_map(|e| e.dependencies()) {
        if !out.contains(&name) {
            out.push(name);
        }
    }
    out
}

/// Every evaluator holds. Short-circuits on the first false or error.
pub struct AllOf(pub Vec<Arc<dyn RuleEvaluator>>);

impl RuleEvaluator for AllOf {
    fn evaluate(&self, data_set: &DataSet) -> Result<bool, RuleError> {
        for evaluator in &self.0 {
            if !evaluator.evaluate(data_set)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn dependencies(&self) -> Vec<String> {
        union_dependencies(&self.0)
    }
}

/// At least one evaluator holds. Short-circuits on the first true or error.
pub struct AnyOf(pub Vec<Arc<dyn RuleEvaluator>>);

impl RuleEvaluator for AnyOf {
    fn evaluate(&self, data_set: &DataSet) -> Result<bool, RuleError> {
        for evaluator in &self.0 {
            if evaluator.evaluate(data_set)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn dependencies(&self) -> Vec<String> {
        union_dependencies(&self.0)
    }
}

pub struct Not(pub Arc<dyn RuleEvaluator>);

impl RuleEvaluator for Not {
    fn evaluate(&self, data_set: &DataSet) -> Result<bool, RuleError> {
        Ok(!self.0.evaluate(data_set)?)
    }

    fn dependencies(&self) -> Vec<String> {
        self.0.dependencies()
    }
}

type PredicateFn = dyn Fn(&DataSet) -> Result<bool, RuleError> + Send + Sync;

/// Closure predicate with declared dependencies.
pub struct FnEvaluator {
    dependencies: Vec<String>,
    predicate: Box<PredicateFn>,
}

impl FnEvaluator {
    pub fn new<I, S, F>(dependencies: I, predicate: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&DataSet) -> Result<bool, RuleError> + Send + Sync + 'static,
    {
        Self {
            dependencies: dependencies.into_iter().map(Into::into).collect(),
            predicate: Box::new(predicate),
        }
    }
}

impl RuleEvaluator for FnEvaluator {
    fn evaluate(&self, data_set: &DataSet) -> Result<bool, RuleError> {
        (self.predicate)(data_set)
    }

    fn dependencies(&self) -> Vec<String> {
        self.dependencies.clone()
    }
}
