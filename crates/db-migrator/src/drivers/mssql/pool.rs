//! bb8 connection pool over Tiberius clients.

use std::time::Duration;

use async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use tiberius::{Client, Config};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::error::{MigrateError, Result};

/// Connection acquisition timeout from pool (30 seconds).
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Idle connection timeout (5 minutes).
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// TCP keepalive interval (30 seconds).
const TCP_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Maximum TDS packet size.
const TDS_MAX_PACKET_SIZE: u32 = 32767;

pub(crate) type MssqlClient = Client<Compat<TcpStream>>;
pub(crate) type MssqlPool = Pool<TiberiusConnectionManager>;

/// Connection manager for bb8 pool with Tiberius.
#[derive(Clone)]
pub struct TiberiusConnectionManager {
    config: Config,
}

impl TiberiusConnectionManager {
    /// Parse an ADO or JDBC connection string.
    pub fn from_dsn(dsn: &str) -> Result<Self> {
        let parsed = if dsn.trim_start().to_lowercase().starts_with("jdbc:") {
            Config::from_jdbc_string(dsn)
        } else {
            Config::from_ado_string(dsn)
        };
        let mut config = parsed
            .map_err(|e| MigrateError::Config(format!("invalid SQL Server dsn: {}", e)))?;
        config.packet_size(TDS_MAX_PACKET_SIZE);
        Ok(Self { config })
    }

    fn io_error(e: std::io::Error) -> tiberius::error::Error {
        tiberius::error::Error::Io {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

#[async_trait]
impl bb8::ManageConnection for TiberiusConnectionManager {
    type Connection = MssqlClient;
    type Error = tiberius::error::Error;

    async fn connect(&self) -> std::result::Result<Self::Connection, Self::Error> {
        let tcp = TcpStream::connect(self.config.get_addr())
            .await
            .map_err(Self::io_error)?;
        tcp.set_nodelay(true).ok();

        let socket = socket2::SockRef::from(&tcp);
        let keepalive = socket2::TcpKeepalive::new()
            .with_time(TCP_KEEPALIVE_INTERVAL)
            .with_interval(TCP_KEEPALIVE_INTERVAL);
        if let Err(e) = socket.set_tcp_keepalive(&keepalive) {
            warn!("Failed to set TCP keepalive on MSSQL connection: {}", e);
        }

        Client::connect(self.config.clone(), tcp.compat_write()).await
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> std::result::Result<(), Self::Error> {
        conn.simple_query("SELECT 1").await?.into_row().await?;
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

/// Build a pool and prove it with one round trip.
pub(crate) async fn connect(config: &DatabaseConfig, role: &str) -> Result<MssqlPool> {
    let manager = TiberiusConnectionManager::from_dsn(&config.dsn)?;
    let addr = manager.config.get_addr();
    let max_size = config.get_max_connections() as u32;

    let pool = Pool::builder()
        .max_size(max_size)
        .connection_timeout(POOL_CONNECTION_TIMEOUT)
        .idle_timeout(Some(POOL_IDLE_TIMEOUT))
        .test_on_check_out(false)
        .build(manager)
        .await
        .map_err(|e| MigrateError::pool(e, format!("creating MSSQL {} pool", role)))?;

    {
        let mut conn = get_conn(&pool, role).await?;
        conn.simple_query("SELECT 1").await?.into_row().await?;
    }

    info!("Connected to MSSQL {}: {} (pool_size={})", role, addr, max_size);
    Ok(pool)
}

/// Get a pooled connection.
pub(crate) async fn get_conn<'a>(
    pool: &'a MssqlPool,
    context: &str,
) -> Result<PooledConnection<'a, TiberiusConnectionManager>> {
    pool.get()
        .await
        .map_err(|e| MigrateError::pool(e, format!("getting MSSQL connection for {}", context)))
}
