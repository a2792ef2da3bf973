//! Async connection pool.
//!
//! A semaphore bounds the number of checked-out connections and a deque keeps
//! idle ones for reuse. Waiting for a free connection is bounded by the
//! connect timeout, so a caller holding the last connection (an open batch
//! session) gets a [`RedbatchError::Timeout`] instead of a hang. The idle queue uses `parking_lot::Mutex` (held very
//! briefly) so connections can be returned from `Drop` without async.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex as SyncMutex;
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::{debug, warn};

use crate::config::ConnectionConfig;
use crate::connection::tcp::Connection;
use crate::error::{RedbatchError, Result};

pub struct ConnectionPool {
    idle: SyncMutex<VecDeque<Connection>>,
    semaphore: Semaphore,
    config: ConnectionConfig,
    max_size: usize,
    idle_timeout: Duration,
    checkout_timeout: Duration,
}

impl ConnectionPool {
    pub fn new(config: ConnectionConfig) -> Self {
        let max_size = config.pool_size.max(1);
        let idle_timeout = Duration::from_millis(config.idle_timeout_ms);
        let checkout_timeout = Duration::from_millis(config.connect_timeout_ms);
        Self {
            idle: SyncMutex::new(VecDeque::with_capacity(max_size)),
            semaphore: Semaphore::new(max_size),
            config,
            max_size,
            idle_timeout,
            checkout_timeout,
        }
    }

    /// Check a connection out of the pool, creating one when none is idle.
    ///
    /// The returned [`PoolGuard`] gives the connection back on drop unless
    /// [`PoolGuard::discard`] was called. Fails with
    /// [`RedbatchError::Timeout`] when every connection stays checked out
    /// for longer than the connect timeout.
    pub async fn get(&self) -> Result<PoolGuard<'_>> {
        let permit = match tokio::time::timeout(self.checkout_timeout, self.semaphore.acquire()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => {
                return Err(RedbatchError::Connection(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "pool semaphore closed",
                )))
            }
            Err(_) => {
                warn!(
                    pool_size = self.max_size,
                    waited_ms = self.checkout_timeout.as_millis() as u64,
                    "connection pool exhausted"
                );
                return Err(RedbatchError::Timeout(format!(
                    "connection pool exhausted: all {} connections checked out for {}ms",
                    self.max_size,
                    self.checkout_timeout.as_millis()
                )));
            }
        };

        let conn = {
            let mut idle = self.idle.lock();
            self.take_healthy_connection(&mut idle)
        };

        let conn = match conn {
            Some(c) => c,
            None => self.create_connection().await?,
        };

        Ok(PoolGuard {
            conn: Some(conn),
            pool: self,
            _permit: permit,
        })
    }

    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Number of connections that can be checked out right now without waiting.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    async fn create_connection(&self) -> Result<Connection> {
        if self.config.tls {
            return Err(RedbatchError::Protocol(
                "TLS connections (rediss://) are not supported, use redis://".into(),
            ));
        }

        let addr = self.config.primary_addr();
        let timeout = Duration::from_millis(self.config.connect_timeout_ms);
        let mut conn =
            Connection::connect_timeout_with_max_buf(&addr, timeout, self.config.max_buffer_size)
                .await?;
        conn.set_read_timeout(self.config.read_timeout_ms);

        let password = self.config.auth_password();
        conn.init(
            self.config.username.as_deref(),
            password.as_deref(),
            self.config.db,
        )
        .await?;
        debug!(%addr, db = self.config.db, "pool connection ready");
        Ok(conn)
    }

    /// Pop the most recently used connection that has not gone stale.
    fn take_healthy_connection(&self, idle: &mut VecDeque<Connection>) -> Option<Connection> {
        while let Some(conn) = idle.pop_back() {
            if conn.last_used.elapsed() <= self.idle_timeout {
                return Some(conn);
            }
        }
        None
    }

    fn return_connection(&self, conn: Connection) {
        if conn.last_used.elapsed() > self.idle_timeout {
            return;
        }
        let mut idle = self.idle.lock();
        if idle.len() < self.max_size {
            idle.push_back(conn);
        }
    }
}

/// RAII guard that returns the connection to the pool on drop.
pub struct PoolGuard<'a> {
    conn: Option<Connection>,
    pool: &'a ConnectionPool,
    _permit: SemaphorePermit<'a>,
}

impl PoolGuard<'_> {
    /// Access the underlying connection.
    pub fn conn(&mut self) -> Result<&mut Connection> {
        self.conn.as_mut().ok_or_else(|| {
            RedbatchError::Connection(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "connection already discarded",
            ))
        })
    }

    /// Close the connection instead of returning it to the pool.
    ///
    /// Used after an I/O failure or when server-side batch state (an open
    /// `WATCH`, a half-read reply) may still be attached to the socket.
    pub fn discard(mut self, reason: &str) {
        if self.conn.take().is_some() {
            warn!(reason, "discarding pooled connection");
        }
    }
}

impl Drop for PoolGuard<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.return_connection(conn);
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────
