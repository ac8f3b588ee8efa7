// 3.1: named collection of data points, the context rules evaluate against.
// the set owns the dependency graph: points live in an insertion-ordered arena
// and edges are arena ids. staleness pushed into a point flows to every
// transitive dependent; recomputation is deferred until somebody reads.

use crate::data_point::DataPoint;
use crate::feed::Notification;
use crate::source::SourceError;
use crate::types::{DataPointId, DataPointState, Value};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Weak};
use tracing::{debug, trace, warn};

#[derive(Debug, Default)]
pub(crate) struct Arena {
    points: IndexMap<String, Arc<DataPoint>>,
    // reverse edges: dependents[i] = points that declared i as a dependency
    dependents: Vec<Vec<DataPointId>>,
}

impl Arena {
    fn get(&self, id: DataPointId) -> Option<&Arc<DataPoint>> {
        self.points.get_index(id.0).map(|(_, p)| p)
    }

    // true when `to` is reachable from `from` along dependency edges
    fn reaches(&self, from: DataPointId, to: DataPointId) -> bool {
        let mut seen = HashSet::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            if id == to {
                return true;
            }
            if !seen.insert(id) {
                continue;
            }
            if let Some(point) = self.get(id) {
                stack.extend(point.dependencies());
            }
        }
        false
    }

    // breadth-first transitive dependents, excluding the start point
    pub(crate) fn dependents_closure(&self, start: DataPointId) -> Vec<DataPointId> {
        let mut seen = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        let mut out = Vec::new();
        while let Some(id) = queue.pop_front() {
            for &dependent in self.dependents.get(id.0).map(Vec::as_slice).unwrap_or(&[]) {
                if seen.insert(dependent) {
                    out.push(dependent);
                    queue.push_back(dependent);
                }
            }
        }
        out
    }
}

// marks every transitive dependent of `id` STALE. the arena lock is released
// before any source lock is taken.
pub(crate) fn propagate_stale(arena: &RwLock<Arena>, id: DataPointId) -> usize {
    let dependents: Vec<Arc<DataPoint>> = {
        let arena = arena.read();
        arena
            .dependents_closure(id)
            .into_iter()
            .filter_map(|d| arena.get(d).cloned())
            .collect()
    };
    for dependent in &dependents {
        // a dependent without a source has nothing to invalidate
        let _ = dependent.set_state(DataPointState::Stale);
    }
    dependents.len()
}

/// Outcome of a dependency-ordered refresh.
#[derive(Debug, Default)]
pub struct RefreshReport {
    pub refreshed: usize,
    pub failures: Vec<(String, SourceError)>,
}

impl RefreshReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug)]
pub struct DataSet {
    name: String,
    arena: Arc<RwLock<Arena>>,
}

impl DataSet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arena: Arc::new(RwLock::new(Arena::default())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register an empty point. Sources are assigned afterwards, once the
    /// siblings they need exist.
    pub fn add_data_point(&self, name: impl Into<String>) -> Result<Arc<DataPoint>, DataSetError> {
        let name = name.into();
        let mut arena = self.arena.write();
        if arena.points.contains_key(&name) {
            return Err(DataSetError::DuplicateName {
                data_set: self.name.clone(),
                name,
            });
        }

        let id = DataPointId(arena.points.len());
        let point = Arc::new(DataPoint::new(id, name.clone(), self.name.clone(), Arc::downgrade(&self.arena)));
        arena.points.insert(name, Arc::clone(&point));
        arena.dependents.push(Vec::new());

        trace!(data_set = %self.name, data_point = %point.name(), "data point added");
        Ok(point)
    }

    pub fn data_point(&self, name: &str) -> Result<Arc<DataPoint>, DataSetError> {
        self.arena
            .read()
            .points
            .get(name)
            .cloned()
            .ok_or_else(|| self.not_found(name))
    }

    pub fn data_point_by_id(&self, id: DataPointId) -> Option<Arc<DataPoint>> {
        self.arena.read().get(id).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.arena.read().points.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.arena.read().points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All points in insertion order.
    pub fn data_points(&self) -> Vec<Arc<DataPoint>> {
        self.arena.read().points.values().cloned().collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.arena.read().points.keys().cloned().collect()
    }

    /// Declare that `dependent` reads `dependency`. Adding an existing edge is
    /// a no-op and returns false. Both points must belong to this set and the
    /// edge must not close a loop.
    pub fn add_dependency(&self, dependent: &DataPoint, dependency: &DataPoint) -> Result<bool, DataSetError> {
        let mut arena = self.arena.write();
        self.check_member(&arena, dependent)?;
        self.check_member(&arena, dependency)?;

        if dependent.depends_on(dependency.id()) {
            return Ok(false);
        }

        if dependent.id() == dependency.id() || arena.reaches(dependency.id(), dependent.id()) {
            warn!(
                data_set = %self.name,
                dependent = %dependent.name(),
                dependency = %dependency.name(),
                "dependency rejected: cycle"
            );
            return Err(DataSetError::Cycle {
                data_set: self.name.clone(),
                dependent: dependent.name().to_string(),
                dependency: dependency.name().to_string(),
            });
        }

        dependent.push_dependency(dependency.id());
        arena.dependents[dependency.id().0].push(dependent.id());
        Ok(true)
    }

    /// Name-based form of [`DataSet::add_dependency`].
    pub fn add_dependency_by_name(&self, dependent: &str, dependency: &str) -> Result<bool, DataSetError> {
        let dependent = self.data_point(dependent)?;
        let dependency = self.data_point(dependency)?;
        self.add_dependency(&dependent, &dependency)
    }

    pub fn value(&self, name: &str) -> Result<Value, DataSetError> {
        let point = self.data_point(name)?;
        Ok(point.value(self)?)
    }

    pub fn state(&self, name: &str) -> Result<DataPointState, DataSetError> {
        Ok(self.data_point(name)?.state()?)
    }

    /// Hand a notification to one point's source. When the source applies it,
    /// every transitive dependent goes STALE.
    pub fn deliver(&self, id: DataPointId, notification: &Notification) -> Result<bool, DataSetError> {
        let point = self
            .data_point_by_id(id)
            .ok_or_else(|| self.not_found(&format!("#{}", id.0)))?;
        let source = point.source()?;

        if !source.process_notification(notification) {
            return Ok(false);
        }

        let flipped = self.mark_dependents_stale(id);
        debug!(
            data_set = %self.name,
            data_point = %point.name(),
            topic = %notification.topic,
            dependents = flipped,
            "notification applied"
        );
        Ok(true)
    }

    /// Force a point STALE and push that to its dependents. Returns how many
    /// dependents were touched.
    pub fn invalidate(&self, name: &str) -> Result<usize, DataSetError> {
        let point = self.data_point(name)?;
        point.set_state(DataPointState::Stale)?;
        Ok(self.mark_dependents_stale(point.id()))
    }

    /// Transitive dependents of `name`, nearest first.
    pub fn dependents_of(&self, name: &str) -> Result<Vec<String>, DataSetError> {
        let arena = self.arena.read();
        let (index, _, _) = arena
            .points
            .get_full(name)
            .ok_or_else(|| self.not_found(name))?;
        Ok(arena
            .dependents_closure(DataPointId(index))
            .into_iter()
            .filter_map(|id| arena.get(id).map(|p| p.name().to_string()))
            .collect())
    }

    /// Names of points whose source is currently STALE.
    pub fn stale_data_points(&self) -> Vec<String> {
        self.data_points()
            .into_iter()
            .filter(|p| matches!(p.state(), Ok(DataPointState::Stale)))
            .map(|p| p.name().to_string())
            .collect()
    }

    /// Dependencies before dependents; insertion order breaks ties.
    pub fn evaluation_order(&self) -> Vec<String> {
        let arena = self.arena.read();
        let count = arena.points.len();
        let mut pending: Vec<usize> = arena.points.values().map(|p| p.dependencies().len()).collect();
        let mut done = vec![false; count];
        let mut order = Vec::with_capacity(count);

        while order.len() < count {
            let Some(next) = (0..count).find(|&i| !done[i] && pending[i] == 0) else {
                // unreachable while add_dependency rejects cycles
                break;
            };
            done[next] = true;
            for dependent in &arena.dependents[next] {
                pending[dependent.0] -= 1;
            }
            if let Some((name, _)) = arena.points.get_index(next) {
                order.push(name.clone());
            }
        }
        order
    }

    /// Read every point in dependency order so lookups and compounds settle.
    /// Failures are collected, not fatal.
    pub fn refresh(&self) -> RefreshReport {
        let mut report = RefreshReport::default();
        for name in self.evaluation_order() {
            let Ok(point) = self.data_point(&name) else {
                continue;
            };
            match point.value(self) {
                Ok(_) => report.refreshed += 1,
                Err(e) => {
                    warn!(data_set = %self.name, data_point = %name, error = %e, "refresh failed");
                    report.failures.push((name, e));
                }
            }
        }
        report
    }

    fn mark_dependents_stale(&self, id: DataPointId) -> usize {
        propagate_stale(&self.arena, id)
    }

    // true when `arena` is this set's own arena
    pub(crate) fn owns_arena(&self, arena: &Weak<RwLock<Arena>>) -> bool {
        std::ptr::eq(arena.as_ptr(), Arc::as_ptr(&self.arena))
    }

    fn check_member(&self, arena: &Arena, point: &DataPoint) -> Result<(), DataSetError> {
        match arena.get(point.id()) {
            Some(p) if std::ptr::eq(Arc::as_ptr(p), point) => Ok(()),
            _ => Err(DataSetError::ForeignDataPoint {
                data_set: self.name.clone(),
                name: point.name().to_string(),
            }),
        }
    }

    fn not_found(&self, name: &str) -> DataSetError {
        DataSetError::NotFound {
            data_set: self.name.clone(),
            name: name.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DataSetError {
    #[error("Data point {name} already exists in {data_set}")]
    DuplicateName { data_set: String, name: String },

    #[error("Data point {name} not found in {data_set}")]
    NotFound { data_set: String, name: String },

    #[error("Dependency {dependent} -> {dependency} in {data_set} would form a cycle")]
    Cycle {
        data_set: String,
        dependent: String,
        dependency: String,
    },

    #[error("Data point {name} does not belong to {data_set}")]
    ForeignDataPoint { data_set: String, name: String },

    #[error("Source error: {0}")]
    Source(#[from] SourceError),
}
