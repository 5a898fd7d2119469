//! Handle-based streaming reads over JSONL files.

pub mod registry;

pub use registry::{FileHandleEntry, HandleInfo, HandleKind, HandleRegistry};
