// 2.1.4: constant source. CURRENT from construction, never transitions.

use crate::source::{DataPointSource, SourceContext, SourceError, SourceKind};
use crate::types::{DataPointState, Value};

#[derive(Debug, Clone)]
pub struct ConstantSource {
    value: Value,
}

impl ConstantSource {
    pub fn new(value: impl Into<Value>) -> Self {
        Self { value: value.into() }
    }
}

impl DataPointSource for ConstantSource {
    fn value(&self, _ctx: SourceContext<'_>) -> Result<Value, SourceError> {
        Ok(self.value.clone())
    }

    fn state(&self) -> DataPointState {
        DataPointState::Current
    }

    // ignored
    fn set_state(&self, _state: DataPointState) {}

    fn kind(&self) -> SourceKind {
        SourceKind::Constant
    }
}
