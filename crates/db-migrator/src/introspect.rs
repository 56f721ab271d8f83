//! Rebuild the table list from the live source catalog.

use tracing::{debug, info, warn};

use crate::core::{SourceReader, TableDescriptor};
use crate::error::Result;

/// Describe every base table in `schema`: columns in ordinal order and the
/// tables its foreign keys reference.
///
/// Tables without readable columns are left out. Self references are kept;
/// the scheduler ignores them.
pub async fn recreate_tables(
    reader: &dyn SourceReader,
    schema: &str,
) -> Result<Vec<TableDescriptor>> {
    let names = reader.list_tables(schema).await?;
    info!("Found {} tables in schema {}", names.len(), schema);

    let mut tables = Vec::with_capacity(names.len());
    for name in names {
        let columns = reader.list_columns(schema, &name).await?;
        if columns.is_empty() {
            warn!("{}: no columns visible, skipping", name);
            continue;
        }
        let mut dependencies = reader.list_dependencies(schema, &name).await?;
        dependencies.dedup();
        debug!(
            "{}: {} columns, depends on [{}]",
            name,
            columns.len(),
            dependencies.join(", ")
        );
        tables.push(TableDescriptor::new(name, columns, dependencies));
    }

    Ok(tables)
}
