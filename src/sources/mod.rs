// 2.1: the five source variants. each implements DataPointSource on its own.

mod compound;
mod constant;
mod field;
mod reference;
mod streaming;

pub use compound::{CompoundInputs, CompoundSource};
pub use constant::ConstantSource;
pub use field::FieldSource;
pub use reference::{ReferenceFetcher, ReferenceSource};
pub use streaming::StreamingSource;
