//! Synchronous Redis client.
//!
//! Every call blocks on the global runtime ([`runtime::block_on`]) while the
//! round trip runs on a pooled connection. Batching goes through
//! [`BatchSession`], which borrows the client for its lifetime.

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::batch::{BatchMode, BatchSession};
use crate::commands::{Commands, Dispatch, ToArg};
use crate::conditional::{ScoreComparison, ScoreUpdate};
use crate::config::ConnectionConfig;
use crate::connection::{ConnectionPool, PoolGuard};
use crate::error::{RedbatchError, Result};
use crate::reply::FromReply;
use crate::resp::types::RespValue;
use crate::runtime;
use crate::script::{self, Script};

/// A synchronous client backed by a connection pool.
pub struct Client {
    pool: ConnectionPool,
    addr: String,
}

impl Client {
    pub fn new(config: ConnectionConfig) -> Result<Self> {
        if config.pool_size == 0 {
            return Err(RedbatchError::Config("pool_size must be > 0".into()));
        }
        let addr = config.primary_addr();
        debug!(%addr, db = config.db, pool_size = config.pool_size, "client created");
        Ok(Self {
            pool: ConnectionPool::new(config),
            addr,
        })
    }

    /// `redis://[user:pass@]host[:port][/db]`.
    pub fn from_url(url: &str) -> Result<Self> {
        Self::new(ConnectionConfig::from_url(url)?)
    }

    /// Build from the URL in `REDBATCH_URL`.
    pub fn from_env() -> Result<Self> {
        Self::new(ConnectionConfig::from_env()?)
    }

    /// Build from a `host`/`port`/`db`/`password`/`algo` field map.
    pub fn from_fields<K, V>(fields: &HashMap<K, V>) -> Result<Self>
    where
        K: std::borrow::Borrow<str> + std::hash::Hash + Eq,
        V: AsRef<str>,
    {
        Self::new(ConnectionConfig::from_fields(fields)?)
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn config(&self) -> &ConnectionConfig {
        self.pool.config()
    }

    fn execute<S: AsRef<[u8]>>(&self, args: &[S]) -> Result<RespValue> {
        runtime::block_on(async {
            let mut guard = self.pool.get().await?;
            let result = match guard.conn() {
                Ok(conn) => conn.execute(args).await,
                Err(e) => Err(e),
            };
            settle(guard, result)
        })
    }

    /// Run an arbitrary command. Error replies become `Err`.
    pub fn execute_command<S: AsRef<[u8]>>(&self, args: &[S]) -> Result<RespValue> {
        RespValue::from_reply(self.execute(args)?)
    }

    /// Open a pipeline session on a dedicated connection.
    pub fn pipeline(&self) -> Result<BatchSession<'_>> {
        BatchSession::open(&self.pool, BatchMode::Pipeline)
    }

    /// Open a transaction session on a dedicated connection.
    pub fn multi(&self) -> Result<BatchSession<'_>> {
        BatchSession::open(&self.pool, BatchMode::Transaction)
    }

    /// Set `member`'s score to `score` when it is absent, or when `score`
    /// beats the stored one in the direction of `comparison`. Atomic on the
    /// server. Returns `true` when the stored score changed.
    pub fn conditional_score_update(
        &self,
        key: &str,
        comparison: ScoreComparison,
        score: f64,
        member: &str,
    ) -> Result<bool> {
        let update = ScoreUpdate::new(key, comparison, score, member)?;
        runtime::block_on(async {
            let mut guard = self.pool.get().await?;
            let result = match guard.conn() {
                Ok(conn) => update.apply(conn).await,
                Err(e) => Err(e),
            };
            settle(guard, result)
        })
    }

    /// [`conditional_score_update`](Self::conditional_score_update) with the
    /// mode given as text (`"lt"`, `">"`, `"greater"`, …). An unknown mode
    /// fails before anything is sent.
    pub fn zadd_mod(&self, key: &str, mode: &str, score: f64, member: &str) -> Result<bool> {
        let comparison: ScoreComparison = mode.parse()?;
        self.conditional_score_update(key, comparison, score, member)
    }

    /// Store `value` under `key` with a TTL unless the key exists.
    ///
    /// Runs `SETNX` and `EXPIRE` in one transaction and returns the `SETNX`
    /// outcome.
    pub fn add<V: ToArg>(&self, key: &str, value: V, ttl: u64) -> Result<bool> {
        let mut session = self.multi()?;
        session.add(key, value, ttl)?;
        let results = session.exec()?;
        match results.into_iter().next() {
            Some(first) => bool::from_reply(first),
            None => Ok(false),
        }
    }

    /// Run a registered script, loading it first if this connection has not
    /// confirmed it yet.
    pub fn invoke_script<K, A>(&self, script: &Script, keys: &[K], args: &[A]) -> Result<RespValue>
    where
        K: AsRef<[u8]>,
        A: AsRef<[u8]>,
    {
        runtime::block_on(async {
            let mut guard = self.pool.get().await?;
            let result = match guard.conn() {
                Ok(conn) => script::invoke(conn, script, keys, args).await,
                Err(e) => Err(e),
            };
            settle(guard, result)
        })
    }

    /// Load every registered script through one pooled connection.
    pub fn preload_scripts(&self) -> Result<()> {
        runtime::block_on(async {
            let mut guard = self.pool.get().await?;
            let result = match guard.conn() {
                Ok(conn) => script::preload(conn).await,
                Err(e) => Err(e),
            };
            settle(guard, result)
        })
    }

    pub fn ping(&self) -> Result<bool> {
        Ok(matches!(
            self.execute_command(&["PING"])?,
            RespValue::SimpleString(ref s) if s == "PONG"
        ))
    }

    /// `INFO` parsed into its `key:value` pairs.
    pub fn info_map(&mut self) -> Result<HashMap<String, String>> {
        let info = self.info()?;
        Ok(crate::commands::parse_info(&info))
    }

    pub fn pool_idle_count(&self) -> usize {
        self.pool.idle_count()
    }

    pub fn pool_available(&self) -> usize {
        self.pool.available()
    }
}

/// Return the connection to the pool unless the error left it unusable.
fn settle<T>(guard: PoolGuard<'_>, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        if e.is_transport() {
            guard.discard("command failed");
        }
    }
    result
}

impl Dispatch for Client {
    fn dispatch<R: FromReply>(&mut self, args: Vec<String>) -> Result<R> {
        R::from_reply(self.execute(&args)?)
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("addr", &self.addr)
            .field("pool_size", &self.pool.max_size())
            .finish()
    }
}

// ── Tests ──────────────────────────────────────────────────────────
