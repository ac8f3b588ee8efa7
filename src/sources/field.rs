// 2.1.1: field-bound source. wraps one field of an external record (an order,
// a route). every notification for the field flips it STALE; reads never do.

use crate::feed::Notification;
use crate::source::{DataPointSource, SourceContext, SourceError, SourceKind};
use crate::types::{DataPointState, Value};
use parking_lot::Mutex;
use tracing::trace;

#[derive(Debug)]
struct FieldInner {
    value: Value,
    state: DataPointState,
}

#[derive(Debug)]
pub struct FieldSource {
    field: String,
    inner: Mutex<FieldInner>,
}

impl FieldSource {
    /// Starts STALE: nothing has read the field yet.
    pub fn new(field: impl Into<String>, initial: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            inner: Mutex::new(FieldInner {
                value: initial.into(),
                state: DataPointState::Stale,
            }),
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }
}

impl DataPointSource for FieldSource {
    fn value(&self, _ctx: SourceContext<'_>) -> Result<Value, SourceError> {
        Ok(self.inner.lock().value.clone())
    }

    fn state(&self) -> DataPointState {
        self.inner.lock().state
    }

    fn set_state(&self, state: DataPointState) {
        self.inner.lock().state = state;
    }

    fn kind(&self) -> SourceKind {
        SourceKind::FieldBound
    }

    fn process_notification(&self, notification: &Notification) -> bool {
        let mut inner = self.inner.lock();
        let mut applied = false;
        for change in notification.changes_for(&self.field) {
            trace!(
                field = %self.field,
                old = %change.old_value,
                new = %change.new_value,
                "field change"
            );
            inner.value = change.new_value.clone();
            applied = true;
        }
        if applied {
            inner.state = DataPointState::Stale;
        }
        applied
    }
}
