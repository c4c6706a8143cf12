//! Data contracts — field vocabulary, provider mappings, conventions,
//! table schemas, and batch validation.

pub mod conventions;
pub mod fields;
pub mod mappings;
pub mod schema;
pub mod validate;

pub use conventions::{Board, DateParseError, Exchange};
pub use mappings::{FieldMapping, MappingError};
pub use schema::{ColumnSpec, SchemaError, SqlType, TableSchema};
pub use validate::ValidateError;
