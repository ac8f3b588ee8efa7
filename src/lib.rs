// rulemsx-core: reactive rule engine.
// named data points fed by push, lookup, stream, constant and compound
// sources; staleness flows along declared dependencies and rule trees
// evaluate over the result. synchronous, no I/O of its own.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: Value, DataPointState, DataPointId, CompareOp, Timestamp
//   2.x  source.rs: DataPointSource trait, SourceContext, SourceError
//   2.1x sources/: field, reference, streaming, constant, compound
//   3.x  data_point.rs: a single source slot plus dependencies
//   3.1  data_set.rs: point arena, dependency graph, staleness propagation
//   4.x  feed.rs: notifications and the FeedHub router
//   5.x  rule.rs: RuleEvaluator / RuleAction traits, Rule tree node
//   5.1  evaluators.rs: conditions and combinators
//   5.2  actions.rs: record, closure, sequence actions
//   6.x  rule_set.rs: RuleSet and the tree walk
//   6.1  scheduler.rs: change tracking for incremental re-evaluation
//   7.x  config.rs: engine settings and presets
//   8.x  events.rs: audit trail
//   9.x  engine/: registry, walk entry points, errors

// data model
pub mod data_point;
pub mod data_set;
pub mod source;
pub mod sources;
pub mod types;

// inbound plumbing
pub mod feed;

// rules
pub mod actions;
pub mod evaluators;
pub mod rule;
pub mod rule_set;
pub mod scheduler;

// registry
pub mod config;
pub mod engine;
pub mod events;

// re exports for convenience
pub use actions::*;
pub use config::{ConfigError, EngineConfig};
pub use data_point::DataPoint;
pub use data_set::{DataSet, DataSetError, RefreshReport};
pub use engine::*;
pub use evaluators::*;
pub use events::*;
pub use feed::{FeedHub, FieldChange, Notification};
pub use rule::*;
pub use rule_set::*;
pub use scheduler::ChangeTracker;
pub use source::*;
pub use sources::*;
pub use types::*;
