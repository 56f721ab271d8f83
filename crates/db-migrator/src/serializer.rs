//! Row serialization into multi-row `INSERT ... VALUES` statements.
//!
//! Values are rendered as SQL literals in the target's dialect: `NULL` for
//! nulls, UTC-normalised timestamp strings for temporal values, and quoted
//! strings for everything else.

use crate::core::{Dialect, Row, SqlValue};

/// Render one value as a SQL literal for the given dialect.
pub fn literal<D: Dialect + ?Sized>(dialect: &D, value: &SqlValue<'_>) -> String {
    match value {
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Bool(v) => dialect.bool_literal(*v).to_string(),
        SqlValue::U8(v) => dialect.quote_literal(&v.to_string()),
        SqlValue::I16(v) => dialect.quote_literal(&v.to_string()),
        SqlValue::I32(v) => dialect.quote_literal(&v.to_string()),
        SqlValue::I64(v) => dialect.quote_literal(&v.to_string()),
        SqlValue::U64(v) => dialect.quote_literal(&v.to_string()),
        SqlValue::F32(v) => dialect.quote_literal(&v.to_string()),
        SqlValue::F64(v) => dialect.quote_literal(&v.to_string()),
        SqlValue::Text(v) => dialect.quote_literal(v),
        SqlValue::Bytes(v) => dialect.bytes_literal(v),
        SqlValue::Uuid(v) => dialect.quote_literal(&v.to_string()),
        SqlValue::Decimal(v) => dialect.quote_literal(&v.to_string()),
        SqlValue::DateTime(_) | SqlValue::DateTimeOffset(_) => {
            let ts = value.as_utc_timestamp().unwrap_or_default();
            // Centiseconds, truncated.
            let centis = ts.timestamp_subsec_millis() / 10;
            format!("'{}.{:02} +00:00'", ts.format("%Y-%m-%d %H:%M:%S"), centis)
        }
        SqlValue::Date(v) => format!("'{}'", v.format("%Y-%m-%d")),
        SqlValue::Time(v) => format!("'{}'", v.format("%H:%M:%S%.6f")),
    }
}

/// Render a row as a parenthesised tuple of literals.
pub fn row_tuple<D: Dialect + ?Sized>(dialect: &D, row: &[SqlValue<'_>]) -> String {
    let mut out = String::with_capacity(row.len() * 8 + 2);
    out.push('(');
    for (i, value) in row.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&literal(dialect, value));
    }
    out.push(')');
    out
}

/// Build the bulk insert statements for a batch of rows.
///
/// Produces one statement per chunk of at most
/// [`Dialect::max_rows_per_insert`] rows; an empty batch produces none.
pub fn build_insert_statements<D: Dialect + ?Sized>(
    dialect: &D,
    schema: &str,
    table: &str,
    columns: &[String],
    rows: &[Row],
) -> Vec<String> {
    if rows.is_empty() {
        return Vec::new();
    }
    let chunk_size = dialect.max_rows_per_insert().unwrap_or(rows.len()).max(1);
    let prefix = dialect.build_insert_prefix(schema, table, columns);

    rows.chunks(chunk_size)
        .map(|chunk| {
            let tuples = chunk
                .iter()
                .map(|row| row_tuple(dialect, row))
                .collect::<Vec<_>>()
                .join(", ");
            format!("{prefix}{tuples}")
        })
        .collect()
}
