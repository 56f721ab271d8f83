//! Microsoft SQL Server driver.
//!
//! - [`MssqlDialect`]: SQL syntax strategy for MSSQL
//! - [`MssqlReader`]: Source reader for MSSQL databases
//! - [`MssqlWriter`]: Target writer for MSSQL databases
//!
//! Connection strings are ADO style
//! (`server=tcp:host,1433;database=db;user=sa;password=...;TrustServerCertificate=true`)
//! or JDBC style (`jdbc:sqlserver://host:1433;databaseName=db;...`).

mod dialect;
mod pool;
mod reader;
mod writer;

pub use dialect::{MssqlDialect, MSSQL_MAX_INSERT_ROWS};
pub use pool::TiberiusConnectionManager;
pub use reader::MssqlReader;
pub use writer::MssqlWriter;
