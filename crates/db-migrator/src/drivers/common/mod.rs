//! Common utilities shared across database drivers.
//!
//! - [`tls`]: TLS configuration for PostgreSQL connections

pub mod tls;

pub use tls::{SslMode, TlsBuilder};

/// Lower-case hex encoding used by the binary literal forms of each dialect.
pub(crate) fn hex(bytes: &[u8]) -> String {
    use std::fmt::Write;

    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}
