// 9.0: the registry. owns every data set and rule set, runs walks, and keeps
// the audit trail. created by the host and passed around explicitly.

mod core;
mod evaluation;
mod results;

pub use core::Engine;
pub use results::EngineError;
