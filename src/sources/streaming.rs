// 2.1.3: streaming-subscription source. the feed keeps the value timely; each
// push still flips it STALE so compounds built on it recompute.

use crate::feed::Notification;
use crate::source::{DataPointSource, SourceContext, SourceError, SourceKind};
use crate::types::{DataPointState, Value};
use parking_lot::Mutex;
use tracing::trace;

#[derive(Debug)]
struct StreamingInner {
    value: Option<Value>,
    state: DataPointState,
    ticks: u64,
}

#[derive(Debug)]
pub struct StreamingSource {
    field: String,
    topic: String,
    inner: Mutex<StreamingInner>,
}

impl StreamingSource {
    /// `field` is the streamed field (e.g. LAST_PRICE), `topic` the
    /// subscription key (e.g. the security).
    pub fn new(field: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            topic: topic.into(),
            inner: Mutex::new(StreamingInner {
                value: None,
                state: DataPointState::Stale,
                ticks: 0,
            }),
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Number of values pushed so far.
    pub fn ticks(&self) -> u64 {
        self.inner.lock().ticks
    }

    /// Direct push from a subscription callback.
    pub fn push(&self, value: impl Into<Value>) {
        let mut inner = self.inner.lock();
        inner.value = Some(value.into());
        inner.state = DataPointState::Stale;
        inner.ticks += 1;
    }
}

impl DataPointSource for StreamingSource {
    fn value(&self, ctx: SourceContext<'_>) -> Result<Value, SourceError> {
        self.inner
            .lock()
            .value
            .clone()
            .ok_or_else(|| SourceError::NoValue(ctx.data_point().name().to_string()))
    }

    fn state(&self) -> DataPointState {
        self.inner.lock().state
    }

    fn set_state(&self, state: DataPointState) {
        self.inner.lock().state = state;
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Streaming
    }

    fn process_notification(&self, notification: &Notification) -> bool {
        let Some(change) = notification.changes_for(&self.field).last() else {
            return false;
        };
        trace!(topic = %self.topic, field = %self.field, value = %change.new_value, "tick");
        self.push(change.new_value.clone());
        true
    }
}
