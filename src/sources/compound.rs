// 2.1.5: compound source. derived from the owning data point's declared
// dependencies. STALE until first read; a stale read pulls every dependency
// through its own data point (so stale lookups and compounds refresh first),
// recomputes, and settles CURRENT. it does not subscribe to anything itself:
// the data set pushes STALE into it when a dependency changes.

use crate::source::{DataPointSource, SourceContext, SourceError, SourceKind};
use crate::types::{DataPointState, Value};
use indexmap::IndexMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::fmt;
use tracing::debug;

type ComputeFn = dyn Fn(&CompoundInputs) -> Result<Value, SourceError> + Send + Sync;

/// Dependency values handed to a compute function, keyed by data point name
/// in declaration order.
#[derive(Debug, Clone, Default)]
pub struct CompoundInputs {
    owner: String,
    values: IndexMap<String, Value>,
}

impl CompoundInputs {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            values: IndexMap::new(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Result<&Value, SourceError> {
        self.values.get(name).ok_or_else(|| SourceError::Compute {
            data_point: self.owner.clone(),
            reason: format!("{} is not a declared dependency", name),
        })
    }

    pub fn number(&self, name: &str) -> Result<Decimal, SourceError> {
        let value = self.get(name)?;
        value.as_number().ok_or_else(|| SourceError::Compute {
            data_point: self.owner.clone(),
            reason: format!("{} is {} not number", name, value.type_name()),
        })
    }

    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug)]
struct CompoundInner {
    value: Option<Value>,
    state: DataPointState,
    recomputes: u64,
}

pub struct CompoundSource {
    compute: Box<ComputeFn>,
    inner: Mutex<CompoundInner>,
}

impl CompoundSource {
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn(&CompoundInputs) -> Result<Value, SourceError> + Send + Sync + 'static,
    {
        Self {
            compute: Box::new(compute),
            inner: Mutex::new(CompoundInner {
                value: None,
                state: DataPointState::Stale,
                recomputes: 0,
            }),
        }
    }

    /// Sum of all numeric dependencies.
    pub fn sum() -> Self {
        Self::new(|inputs| {
            let mut total = Decimal::ZERO;
            for (name, _) in inputs.values() {
                total += inputs.number(name)?;
            }
            Ok(Value::Number(total))
        })
    }

    pub fn recomputes(&self) -> u64 {
        self.inner.lock().recomputes
    }
}

impl fmt::Debug for CompoundSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompoundSource").field("inner", &self.inner).finish()
    }
}

impl DataPointSource for CompoundSource {
    fn value(&self, ctx: SourceContext<'_>) -> Result<Value, SourceError> {
        // held across the recompute. dependency locks nest in dependency
        // order, which the acyclic graph keeps consistent.
        let mut inner = self.inner.lock();

        if let (DataPointState::Current, Some(value)) = (inner.state, &inner.value) {
            return Ok(value.clone());
        }

        let owner = ctx.data_point().name();
        let mut inputs = CompoundInputs::new(owner);
        for dependency in ctx.dependencies() {
            let value = dependency.value(ctx.data_set())?;
            inputs.insert(dependency.name(), value);
        }

        let value = (self.compute)(&inputs)?;
        debug!(data_point = %owner, value = %value, inputs = inputs.len(), "compound recomputed");

        inner.value = Some(value.clone());
        inner.state = DataPointState::Current;
        inner.recomputes += 1;
        Ok(value)
    }

    fn state(&self) -> DataPointState {
        self.inner.lock().state
    }

    fn set_state(&self, state: DataPointState) {
        self.inner.lock().state = state;
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Compound
    }
}
