// 2.1.2: reference-lookup source. STALE until first read, then one fetch and
// the value is cached until somebody resets it to STALE.
// a failed fetch leaves the source STALE so the next read retries.

use crate::source::{DataPointSource, FetchError, SourceContext, SourceError, SourceKind};
use crate::types::{DataPointState, Value};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Fetch-by-key collaborator (a reference data service, a static table).
/// Implementations that go over the network apply their own timeout and
/// report it as a FetchError.
pub trait ReferenceFetcher: Send + Sync {
    fn fetch(&self, field: &str, key: &str) -> Result<Value, FetchError>;
}

impl<F> ReferenceFetcher for F
where
    F: Fn(&str, &str) -> Result<Value, FetchError> + Send + Sync,
{
    fn fetch(&self, field: &str, key: &str) -> Result<Value, FetchError> {
        self(field, key)
    }
}

#[derive(Debug)]
struct ReferenceInner {
    value: Option<Value>,
    state: DataPointState,
}

pub struct ReferenceSource {
    field: String,
    key: String,
    fetcher: Arc<dyn ReferenceFetcher>,
    inner: Mutex<ReferenceInner>,
}

impl ReferenceSource {
    pub fn new(field: impl Into<String>, key: impl Into<String>, fetcher: Arc<dyn ReferenceFetcher>) -> Self {
        Self {
            field: field.into(),
            key: key.into(),
            fetcher,
            inner: Mutex::new(ReferenceInner {
                value: None,
                state: DataPointState::Stale,
            }),
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Debug for ReferenceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceSource")
            .field("field", &self.field)
            .field("key", &self.key)
            .field("inner", &self.inner)
            .finish()
    }
}

impl DataPointSource for ReferenceSource {
    fn value(&self, _ctx: SourceContext<'_>) -> Result<Value, SourceError> {
        // held across the fetch: concurrent readers wait instead of fetching twice
        let mut inner = self.inner.lock();

        if let (DataPointState::Current, Some(value)) = (inner.state, &inner.value) {
            return Ok(value.clone());
        }

        match self.fetcher.fetch(&self.field, &self.key) {
            Ok(value) => {
                debug!(field = %self.field, key = %self.key, value = %value, "reference fetched");
                inner.value = Some(value.clone());
                inner.state = DataPointState::Current;
                Ok(value)
            }
            Err(e) => {
                warn!(field = %self.field, key = %self.key, error = %e, "reference fetch failed");
                inner.state = DataPointState::Stale;
                Err(SourceError::Fetch(e))
            }
        }
    }

    fn state(&self) -> DataPointState {
        self.inner.lock().state
    }

    fn set_state(&self, state: DataPointState) {
        self.inner.lock().state = state;
    }

    fn kind(&self) -> SourceKind {
        SourceKind::ReferenceLookup
    }
}
