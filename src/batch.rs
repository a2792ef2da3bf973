//! Nested pipeline and transaction sessions.
//!
//! A session is opened in one [`BatchMode`] with level 1. Opening it again in
//! the same mode only raises the level; asking for the other mode fails and
//! leaves the session untouched. Every [`exec`](BatchSession::exec) lowers
//! the level, and only the call that reaches 0 talks to the server. Code
//! that batches internally can therefore be called from inside a caller's
//! batch without flushing it early.
//!
//! While open, every command is queued and answers with the placeholder of
//! its declared result type (see [`FromReply::placeholder`]).
//!
//! A pipeline flush writes all commands at once. If the connection fails
//! halfway, some commands may already have run on the server; the error is
//! returned and the connection is closed rather than reused.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::commands::{Commands, Dispatch, ToArg};
use crate::conditional::ScoreComparison;
use crate::connection::{ConnectionPool, PoolGuard};
use crate::error::{RedbatchError, Result};
use crate::reply::FromReply;
use crate::resp::types::RespValue;
use crate::runtime;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchMode {
    /// Commands are sent together; each runs independently.
    Pipeline,
    /// Commands run atomically inside `MULTI`/`EXEC`.
    Transaction,
}

impl fmt::Display for BatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pipeline => f.write_str("pipeline"),
            Self::Transaction => f.write_str("transaction"),
        }
    }
}

/// What a close did to the nesting level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Close {
    /// Still nested; nothing to send.
    Nested,
    /// Outermost close; the queue must be flushed.
    Flush,
}

/// Mode and nesting level of one session, without any I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchState {
    session: u64,
    mode: BatchMode,
    level: i64,
}

impl BatchState {
    pub fn new(session: u64, mode: BatchMode) -> Self {
        Self {
            session,
            mode,
            level: 1,
        }
    }

    pub fn mode(&self) -> BatchMode {
        self.mode
    }

    pub fn level(&self) -> i64 {
        self.level
    }

    pub fn is_open(&self) -> bool {
        self.level > 0
    }

    /// Nested open. Same mode raises the level; the other mode is a
    /// [`RedbatchError::ModeConflict`] and changes nothing.
    pub fn enter(&mut self, requested: BatchMode) -> Result<()> {
        if requested != self.mode {
            return Err(RedbatchError::ModeConflict {
                session: self.session,
                active: self.mode,
                requested,
            });
        }
        if !self.is_open() {
            return Err(RedbatchError::Unsupported(format!(
                "session #{} is closed",
                self.session
            )));
        }
        self.level += 1;
        Ok(())
    }

    /// Close one level. Closing an already closed session is a
    /// [`RedbatchError::LevelIntegrity`] error.
    pub fn leave(&mut self) -> Result<Close> {
        if self.level <= 0 {
            return Err(RedbatchError::LevelIntegrity {
                session: self.session,
                level: self.level - 1,
            });
        }
        self.level -= 1;
        Ok(if self.level == 0 {
            Close::Flush
        } else {
            Close::Nested
        })
    }
}

/// A batch bound to one pooled connection.
///
/// Obtained from [`Client::pipeline`](crate::Client::pipeline) or
/// [`Client::multi`](crate::Client::multi). The connection is held until the
/// outermost `exec`, then returned to the pool. It is closed instead when the
/// flush fails, or when the session is dropped while a `WATCH` is active.
pub struct BatchSession<'a> {
    state: BatchState,
    guard: Option<PoolGuard<'a>>,
    queued: Vec<Vec<String>>,
    watching: bool,
}

impl<'a> BatchSession<'a> {
    pub(crate) fn open(pool: &'a ConnectionPool, mode: BatchMode) -> Result<Self> {
        let guard = runtime::block_on(pool.get())?;
        let id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
        debug!(session = id, %mode, "batch session opened");
        Ok(Self {
            state: BatchState::new(id, mode),
            guard: Some(guard),
            queued: Vec::new(),
            watching: false,
        })
    }

    pub fn id(&self) -> u64 {
        self.state.session
    }

    pub fn mode(&self) -> BatchMode {
        self.state.mode()
    }

    pub fn level(&self) -> i64 {
        self.state.level()
    }

    pub fn is_closed(&self) -> bool {
        !self.state.is_open()
    }

    pub fn is_watching(&self) -> bool {
        self.watching
    }

    /// Number of queued commands.
    pub fn len(&self) -> usize {
        self.queued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }

    /// Open a nested pipeline on this session.
    pub fn pipeline(&mut self) -> Result<&mut Self> {
        self.state.enter(BatchMode::Pipeline)?;
        Ok(self)
    }

    /// Open a nested transaction on this session.
    pub fn multi(&mut self) -> Result<&mut Self> {
        self.state.enter(BatchMode::Transaction)?;
        Ok(self)
    }

    /// Close one level.
    ///
    /// Returns an empty vec while still nested. The outermost close sends
    /// the queue and returns one reply per command, in order; per-command
    /// failures are [`RespValue::Error`] entries. A transaction discarded
    /// because a watched key changed also returns an empty vec.
    pub fn exec(&mut self) -> Result<Vec<RespValue>> {
        match self.state.leave()? {
            Close::Nested => Ok(Vec::new()),
            Close::Flush => self.flush(),
        }
    }

    fn flush(&mut self) -> Result<Vec<RespValue>> {
        let queued = std::mem::take(&mut self.queued);
        self.watching = false;
        let mut guard = self.guard.take().ok_or_else(|| {
            RedbatchError::Unsupported(format!("session #{} has no connection", self.id()))
        })?;

        let (session, mode) = (self.id(), self.mode());
        let outcome = match guard.conn() {
            Ok(conn) => runtime::block_on(async {
                match mode {
                    BatchMode::Pipeline => conn.pipeline(&queued).await,
                    BatchMode::Transaction => conn.transaction(&queued).await.map(|results| {
                        results.unwrap_or_else(|| {
                            debug!(session, "transaction aborted by WATCH");
                            Vec::new()
                        })
                    }),
                }
            }),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(results) => {
                debug!(session, %mode, commands = queued.len(), "batch flushed");
                Ok(results)
            }
            Err(e) => {
                guard.discard("batch flush failed");
                Err(e)
            }
        }
    }

    /// `WATCH key` on the bound connection, sent immediately.
    ///
    /// If `key` changes before the outermost `exec`, the transaction is
    /// discarded and `exec` returns an empty vec.
    pub fn watch(&mut self, key: &str) -> Result<()> {
        self.require_transaction("watch")?;
        let guard = self.guard_mut()?;
        runtime::block_on(guard.conn()?.watch(&[key]))?;
        self.watching = true;
        Ok(())
    }

    /// `UNWATCH` on the bound connection, sent immediately.
    pub fn unwatch(&mut self) -> Result<()> {
        self.require_transaction("unwatch")?;
        let guard = self.guard_mut()?;
        runtime::block_on(guard.conn()?.unwatch())?;
        self.watching = false;
        Ok(())
    }

    /// Queue `SETNX key value` and `EXPIRE key ttl` in a nested transaction.
    ///
    /// Fails with [`RedbatchError::ModeConflict`] on a pipeline session.
    pub fn add<V: ToArg>(&mut self, key: &str, value: V, ttl: u64) -> Result<bool> {
        self.multi()?;
        let queued = self.set_nx(key, value)?;
        self.expire(key, ttl)?;
        self.exec()?;
        Ok(queued)
    }

    /// Not available while batching: the script path needs its own round trips.
    pub fn conditional_score_update(
        &mut self,
        _key: &str,
        comparison: ScoreComparison,
        _score: f64,
        _member: &str,
    ) -> Result<bool> {
        Err(RedbatchError::Unsupported(format!(
            "{comparison} score update inside {} session #{}",
            self.mode(),
            self.id()
        )))
    }

    /// Not available while batching.
    pub fn zadd_mod(&mut self, key: &str, mode: &str, score: f64, member: &str) -> Result<bool> {
        let comparison: ScoreComparison = mode.parse()?;
        self.conditional_score_update(key, comparison, score, member)
    }

    fn require_transaction(&self, op: &str) -> Result<()> {
        if self.mode() != BatchMode::Transaction {
            return Err(RedbatchError::Unsupported(format!(
                "{op} inside {} session #{}",
                self.mode(),
                self.id()
            )));
        }
        self.require_open()
    }

    fn require_open(&self) -> Result<()> {
        if self.state.is_open() {
            Ok(())
        } else {
            Err(RedbatchError::Unsupported(format!(
                "session #{} is closed",
                self.id()
            )))
        }
    }

    fn guard_mut(&mut self) -> Result<&mut PoolGuard<'a>> {
        let id = self.id();
        self.guard.as_mut().ok_or_else(|| {
            RedbatchError::Unsupported(format!("session #{id} has no connection"))
        })
    }
}

impl Dispatch for BatchSession<'_> {
    fn dispatch<R: FromReply>(&mut self, args: Vec<String>) -> Result<R> {
        self.require_open()?;
        self.queued.push(args);
        Ok(R::placeholder())
    }
}

impl Drop for BatchSession<'_> {
    fn drop(&mut self) {
        if let Some(guard) = self.guard.take() {
            if !self.queued.is_empty() {
                debug!(
                    session = self.state.session,
                    dropped = self.queued.len(),
                    "session dropped before flush"
                );
            }
            if self.watching {
                guard.discard("session dropped with an active WATCH");
            }
        }
    }
}

impl fmt::Debug for BatchSession<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchSession")
            .field("id", &self.id())
            .field("mode", &self.mode())
            .field("level", &self.level())
            .field("queued", &self.queued.len())
            .field("watching", &self.watching)
            .finish()
    }
}

// ── Tests ──────────────────────────────────────────────────────────
