pub mod defs;

pub use defs::{Item, KeyKind, MessageField, MessageSpec, NaturalKey, RunSummary, SeenTable};
