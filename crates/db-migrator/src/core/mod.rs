//! Core abstractions for database-agnostic migration.
//!
//! - [`schema`]: table descriptors
//! - [`value`]: SQL value representation and row batches
//! - [`traits`]: readers, writers and dialects
//!
//! Driver modules (`drivers/mssql`, `drivers/postgres`, `drivers/mysql`)
//! implement the traits; everything above them is engine-agnostic.

pub mod schema;
pub mod traits;
pub mod value;

pub use schema::TableDescriptor;
pub use traits::{Dialect, PageRequest, SourceReader, TargetWriter};
pub use value::{Batch, Row, SqlValue};
