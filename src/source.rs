// 2.0: the pluggable origin behind a data point.
// push-fed sources (field, streaming) read STALE as "has unseen updates".
// pull-fed sources (reference, compound) read STALE as "recompute before use".

use crate::data_point::DataPoint;
use crate::data_set::DataSet;
use crate::feed::Notification;
use crate::types::{DataPointState, Value};
use std::fmt;
use std::sync::Arc;

/// Which variant a source is. Used for logging and reports only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    FieldBound,
    ReferenceLookup,
    Streaming,
    Constant,
    Compound,
    Custom,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceKind::FieldBound => "field",
            SourceKind::ReferenceLookup => "reference",
            SourceKind::Streaming => "streaming",
            SourceKind::Constant => "constant",
            SourceKind::Compound => "compound",
            SourceKind::Custom => "custom",
        };
        write!(f, "{}", name)
    }
}

/// What a source sees when it is read: the data set it lives in and the
/// data point that owns it.
#[derive(Clone, Copy)]
pub struct SourceContext<'a> {
    data_set: &'a DataSet,
    data_point: &'a DataPoint,
}

impl<'a> SourceContext<'a> {
    pub fn new(data_set: &'a DataSet, data_point: &'a DataPoint) -> Self {
        Self { data_set, data_point }
    }

    pub fn data_set(&self) -> &'a DataSet {
        self.data_set
    }

    pub fn data_point(&self) -> &'a DataPoint {
        self.data_point
    }

    /// Declared dependencies of the owning data point, in declaration order.
    pub fn dependencies(&self) -> Vec<Arc<DataPoint>> {
        self.data_point
            .dependencies()
            .into_iter()
            .filter_map(|id| self.data_set.data_point_by_id(id))
            .collect()
    }
}

/// A value origin with a freshness flag.
///
/// Implementations keep their own interior lock: a reader must never see a
/// value and a state from two different updates, and a lazy recompute runs at
/// most once at a time per source.
pub trait DataPointSource: Send + Sync + fmt::Debug {
    fn value(&self, ctx: SourceContext<'_>) -> Result<Value, SourceError>;

    fn state(&self) -> DataPointState;

    fn set_state(&self, state: DataPointState);

    fn kind(&self) -> SourceKind {
        SourceKind::Custom
    }

    /// Apply a change notification. Returns true when the notification touched
    /// this source (which is then STALE).
    fn process_notification(&self, _notification: &Notification) -> bool {
        false
    }
}

/// A one-shot lookup failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("fetch of {field} for {key} failed: {reason}")]
pub struct FetchError {
    pub field: String,
    pub key: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("Data point {0} has no source assigned")]
    MissingSource(String),

    #[error("Data point {0} has not received a value yet")]
    NoValue(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Compute failed for {data_point}: {reason}")]
    Compute { data_point: String, reason: String },

    #[error("Data point {data_point} belongs to {owner}, not {data_set}")]
    ForeignDataSet {
        data_point: String,
        owner: String,
        data_set: String,
    },
}
