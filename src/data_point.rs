// 3.0: a named slot holding exactly one source plus its declared dependencies.
// the exposed state is always the source's state.

use crate::data_set::{propagate_stale, Arena, DataSet};
use crate::source::{DataPointSource, SourceContext, SourceError, SourceKind};
use crate::types::{DataPointId, DataPointState, Value};
use parking_lot::RwLock;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::trace;

pub struct DataPoint {
    id: DataPointId,
    name: String,
    // owning data set: name for messages, arena for membership and invalidation
    data_set: String,
    arena: Weak<RwLock<Arena>>,
    source: RwLock<Option<Arc<dyn DataPointSource>>>,
    dependencies: RwLock<Vec<DataPointId>>,
}

impl DataPoint {
    pub(crate) fn new(
        id: DataPointId,
        name: impl Into<String>,
        data_set: impl Into<String>,
        arena: Weak<RwLock<Arena>>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            data_set: data_set.into(),
            arena,
            source: RwLock::new(None),
            dependencies: RwLock::new(Vec::new()),
        }
    }

    pub fn id(&self) -> DataPointId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_set_name(&self) -> &str {
        &self.data_set
    }

    /// Swap in a new source. Readers see either the old or the new one; the
    /// old source and its staleness are dropped, and every transitive
    /// dependent goes STALE.
    pub fn set_source(&self, source: Arc<dyn DataPointSource>) {
        let kind = source.kind();
        *self.source.write() = Some(source);

        let flipped = match self.arena.upgrade() {
            Some(arena) => propagate_stale(&arena, self.id),
            None => 0,
        };
        trace!(data_set = %self.data_set, data_point = %self.name, kind = %kind, dependents = flipped, "source assigned");
    }

    pub fn source(&self) -> Result<Arc<dyn DataPointSource>, SourceError> {
        self.source
            .read()
            .clone()
            .ok_or_else(|| SourceError::MissingSource(self.name.clone()))
    }

    pub fn has_source(&self) -> bool {
        self.source.read().is_some()
    }

    pub fn source_kind(&self) -> Option<SourceKind> {
        self.source.read().as_ref().map(|s| s.kind())
    }

    /// Read through the source, letting pull sources refresh themselves.
    /// `data_set` must be the set this point belongs to.
    pub fn value(&self, data_set: &DataSet) -> Result<Value, SourceError> {
        if !data_set.owns_arena(&self.arena) {
            return Err(SourceError::ForeignDataSet {
                data_point: self.name.clone(),
                owner: self.data_set.clone(),
                data_set: data_set.name().to_string(),
            });
        }
        let source = self.source()?;
        source.value(SourceContext::new(data_set, self))
    }

    pub fn state(&self) -> Result<DataPointState, SourceError> {
        Ok(self.source()?.state())
    }

    pub fn set_state(&self, state: DataPointState) -> Result<(), SourceError> {
        self.source()?.set_state(state);
        Ok(())
    }

    pub fn dependencies(&self) -> Vec<DataPointId> {
        self.dependencies.read().clone()
    }

    pub fn depends_on(&self, id: DataPointId) -> bool {
        self.dependencies.read().contains(&id)
    }

    // caller holds the data set's arena lock and has checked for cycles
    pub(crate) fn push_dependency(&self, id: DataPointId) -> bool {
        let mut deps = self.dependencies.write();
        if deps.contains(&id) {
            return false;
        }
        deps.push(id);
        true
    }
}

impl fmt::Debug for DataPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataPoint")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("data_set", &self.data_set)
            .field("source", &self.source_kind())
            .field("dependencies", &*self.dependencies.read())
            .finish()
    }
}
