//! SQL value types for database-agnostic data transfer.

use std::borrow::Cow;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

/// A single column value read from the source.
///
/// Uses `Cow` for string and byte data so readers can borrow from row
/// buffers; values stored in a [`Batch`] are always owned.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue<'a> {
    /// SQL NULL.
    Null,

    /// Boolean value.
    Bool(bool),

    /// 8-bit unsigned integer (tinyint).
    U8(u8),

    /// 16-bit signed integer (smallint).
    I16(i16),

    /// 32-bit signed integer (int).
    I32(i32),

    /// 64-bit signed integer (bigint).
    I64(i64),

    /// 64-bit unsigned integer (MySQL `bigint unsigned`).
    U64(u64),

    /// 32-bit floating point (real/float4).
    F32(f32),

    /// 64-bit floating point (double precision/float8).
    F64(f64),

    /// Text/string data.
    Text(Cow<'a, str>),

    /// Binary data.
    Bytes(Cow<'a, [u8]>),

    /// UUID/GUID value.
    Uuid(Uuid),

    /// Decimal value with arbitrary precision.
    Decimal(Decimal),

    /// Timestamp without timezone.
    DateTime(NaiveDateTime),

    /// Timestamp with timezone offset.
    DateTimeOffset(DateTime<FixedOffset>),

    /// Date without time component.
    Date(NaiveDate),

    /// Time without date component.
    Time(NaiveTime),
}

impl<'a> SqlValue<'a> {
    /// Convert to a fully owned value with `'static` lifetime.
    #[must_use]
    pub fn into_owned(self) -> SqlValue<'static> {
        match self {
            SqlValue::Null => SqlValue::Null,
            SqlValue::Bool(v) => SqlValue::Bool(v),
            SqlValue::U8(v) => SqlValue::U8(v),
            SqlValue::I16(v) => SqlValue::I16(v),
            SqlValue::I32(v) => SqlValue::I32(v),
            SqlValue::I64(v) => SqlValue::I64(v),
            SqlValue::U64(v) => SqlValue::U64(v),
            SqlValue::F32(v) => SqlValue::F32(v),
            SqlValue::F64(v) => SqlValue::F64(v),
            SqlValue::Text(v) => SqlValue::Text(Cow::Owned(v.into_owned())),
            SqlValue::Bytes(v) => SqlValue::Bytes(Cow::Owned(v.into_owned())),
            SqlValue::Uuid(v) => SqlValue::Uuid(v),
            SqlValue::Decimal(v) => SqlValue::Decimal(v),
            SqlValue::DateTime(v) => SqlValue::DateTime(v),
            SqlValue::DateTimeOffset(v) => SqlValue::DateTimeOffset(v),
            SqlValue::Date(v) => SqlValue::Date(v),
            SqlValue::Time(v) => SqlValue::Time(v),
        }
    }

    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Timestamp normalised to UTC, if this is a timestamp value.
    ///
    /// Timestamps without an offset are taken to already be UTC.
    #[must_use]
    pub fn as_utc_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            SqlValue::DateTime(v) => Some(v.and_utc()),
            SqlValue::DateTimeOffset(v) => Some(v.with_timezone(&Utc)),
            _ => None,
        }
    }
}

impl<'a> SqlValue<'a> {
    /// Create a text value from an owned String.
    #[must_use]
    pub fn text_owned(s: String) -> SqlValue<'static> {
        SqlValue::Text(Cow::Owned(s))
    }

    /// Create a bytes value from an owned Vec<u8>.
    #[must_use]
    pub fn bytes_owned(b: Vec<u8>) -> SqlValue<'static> {
        SqlValue::Bytes(Cow::Owned(b))
    }
}

impl<T> From<Option<T>> for SqlValue<'static>
where
    T: Into<SqlValue<'static>>,
{
    fn from(v: Option<T>) -> Self {
        v.map_or(SqlValue::Null, Into::into)
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for SqlValue<'static> {
                fn from(v: $ty) -> Self {
                    SqlValue::$variant(v)
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool,
    u8 => U8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    Uuid => Uuid,
    Decimal => Decimal,
    NaiveDateTime => DateTime,
    DateTime<FixedOffset> => DateTimeOffset,
    NaiveDate => Date,
    NaiveTime => Time,
}

impl From<String> for SqlValue<'static> {
    fn from(v: String) -> Self {
        SqlValue::Text(Cow::Owned(v))
    }
}

impl<'a> From<&'a str> for SqlValue<'a> {
    fn from(v: &'a str) -> Self {
        SqlValue::Text(Cow::Borrowed(v))
    }
}

impl From<Vec<u8>> for SqlValue<'static> {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Bytes(Cow::Owned(v))
    }
}

impl From<DateTime<Utc>> for SqlValue<'static> {
    fn from(v: DateTime<Utc>) -> Self {
        SqlValue::DateTimeOffset(v.fixed_offset())
    }
}

/// One row: column values in descriptor column order.
pub type Row = Vec<SqlValue<'static>>;

/// One page of rows read from the source.
#[derive(Debug, Default)]
pub struct Batch {
    /// Rows in this batch.
    pub rows: Vec<Row>,

    /// Row offset of the first row in the source.
    pub offset: u64,
}

impl Batch {
    /// Create a new batch with the given rows.
    pub fn new(rows: Vec<Row>, offset: u64) -> Self {
        Self { rows, offset }
    }

    /// Get the number of rows in this batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether this is the final page for a request of `limit` rows.
    #[must_use]
    pub fn is_last(&self, limit: usize) -> bool {
        self.rows.len() < limit
    }
}
