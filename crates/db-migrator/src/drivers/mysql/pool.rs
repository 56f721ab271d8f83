//! mysql_async pool construction shared by reader and writer.

use mysql_async::prelude::*;
use mysql_async::{Conn, Opts, OptsBuilder, Pool, PoolConstraints, PoolOpts, SslOpts};
use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::drivers::common::SslMode;
use crate::error::{MigrateError, Result};

/// Parse the URL and apply pool size and TLS settings.
pub(crate) fn build_opts(config: &DatabaseConfig) -> Result<Opts> {
    let url_opts = Opts::from_url(&config.dsn)
        .map_err(|e| MigrateError::Config(format!("invalid MySQL dsn: {}", e)))?;

    let max = config.get_max_connections().max(1);
    let constraints = PoolConstraints::new(1, max).ok_or_else(|| {
        MigrateError::Config(format!("invalid MySQL pool size {}", max))
    })?;

    let mut builder = OptsBuilder::from_opts(url_opts)
        // Use utf8mb4 for full Unicode support
        .init(vec!["SET NAMES utf8mb4"])
        .pool_opts(PoolOpts::new().with_constraints(constraints));

    match SslMode::parse(&config.ssl_mode)? {
        SslMode::Disable => {}
        SslMode::Require => {
            builder = builder.ssl_opts(SslOpts::default().with_danger_accept_invalid_certs(true));
        }
        SslMode::VerifyFull => {
            builder = builder.ssl_opts(SslOpts::default());
        }
    }

    Ok(builder.into())
}

/// Build a pool and prove it with one round trip.
pub(crate) async fn connect(config: &DatabaseConfig, role: &str) -> Result<Pool> {
    let opts = build_opts(config)?;
    let host = opts.ip_or_hostname().to_string();
    if opts.ssl_opts().is_none() {
        warn!("MySQL {} TLS is disabled. Credentials will be transmitted in plaintext.", role);
    }
    let pool = Pool::new(opts);

    let mut conn = get_conn(&pool, role).await?;
    conn.query_drop("SELECT 1")
        .await
        .map_err(|e| MigrateError::pool(e, format!("testing MySQL {} connection", role)))?;
    drop(conn);

    info!("Connected to MySQL {}: {}", role, host);
    Ok(pool)
}

/// Get a pooled connection.
pub(crate) async fn get_conn(pool: &Pool, context: &str) -> Result<Conn> {
    pool.get_conn()
        .await
        .map_err(|e| MigrateError::pool(e, format!("getting MySQL connection for {}", context)))
}
