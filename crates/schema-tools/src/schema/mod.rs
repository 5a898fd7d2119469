//! Schema document model, validation and persistence.

pub mod model;
pub mod persist;
pub mod validate;

pub use model::{FieldSchema, IdentificationRule, IdentificationRules, LogType, ParsedFieldMetadata, SchemaDocument};
pub use persist::persist_schema;
pub use validate::{check_document, parse_and_validate};
