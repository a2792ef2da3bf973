//! Async TCP connection to a Redis server.
//!
//! Wraps a `tokio::net::TcpStream` with an integrated read buffer and the
//! RESP parser. Besides single commands it knows how to flush a pipeline
//! (one write, N reads) and a `MULTI`/`EXEC` block, and it carries the set
//! of script fingerprints confirmed loaded on this socket's server.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::{RedbatchError, Result};
use crate::resp::parser::parse;
use crate::resp::types::RespValue;
use crate::resp::writer::{encode_command, encode_pipeline, encode_transaction};

/// Default initial read buffer capacity (64 KB).
const DEFAULT_BUF_CAPACITY: usize = 64 * 1024;

/// Default maximum read buffer size (512 MB).
pub const DEFAULT_MAX_BUF_SIZE: usize = 512 * 1024 * 1024;

/// A single async connection to a Redis server.
pub struct Connection {
    stream: TcpStream,
    /// Data read from the socket but not yet consumed by the parser.
    buf: BytesMut,
    max_buf_size: usize,
    read_timeout: Option<Duration>,
    /// Fingerprints known to be loaded on the server behind this socket.
    scripts: HashSet<String>,
    /// Timestamp of last successful I/O (for idle checks).
    pub last_used: Instant,
}

impl Connection {
    /// Connect to `addr` (e.g. "127.0.0.1:6379").
    pub async fn connect(addr: &str) -> Result<Self> {
        Self::connect_with_max_buf(addr, DEFAULT_MAX_BUF_SIZE).await
    }

    /// Connect with a configurable max buffer size.
    pub async fn connect_with_max_buf(addr: &str, max_buf_size: usize) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true).ok();
        debug!(%addr, "connected");
        Ok(Self {
            stream,
            buf: BytesMut::with_capacity(DEFAULT_BUF_CAPACITY),
            max_buf_size,
            read_timeout: None,
            scripts: HashSet::new(),
            last_used: Instant::now(),
        })
    }

    /// Connect with a timeout and configurable max buffer size.
    pub async fn connect_timeout_with_max_buf(
        addr: &str,
        timeout: Duration,
        max_buf_size: usize,
    ) -> Result<Self> {
        match tokio::time::timeout(timeout, Self::connect_with_max_buf(addr, max_buf_size)).await {
            Ok(result) => result,
            Err(_) => Err(RedbatchError::Timeout(format!(
                "connection to {addr} timed out after {timeout:?}"
            ))),
        }
    }

    /// Bound every reply read. `0` disables the limit.
    pub fn set_read_timeout(&mut self, millis: u64) {
        self.read_timeout = (millis > 0).then(|| Duration::from_millis(millis));
    }

    /// Send raw bytes to the server.
    pub async fn send_raw(&mut self, data: &[u8]) -> Result<()> {
        self.stream.write_all(data).await?;
        self.last_used = Instant::now();
        Ok(())
    }

    /// Read and parse one complete RESP value, honouring the read timeout.
    pub async fn read_response(&mut self) -> Result<RespValue> {
        match self.read_timeout {
            Some(limit) => match tokio::time::timeout(limit, self.read_frame()).await {
                Ok(result) => result,
                Err(_) => Err(RedbatchError::Timeout(format!(
                    "no reply within {limit:?}"
                ))),
            },
            None => self.read_frame().await,
        }
    }

    async fn read_frame(&mut self) -> Result<RespValue> {
        loop {
            if !self.buf.is_empty() {
                // Freeze a snapshot so bulk strings can be sliced without copying,
                // then put back whatever the parser did not consume.
                let snapshot = self.buf.split().freeze();
                match parse(&snapshot) {
                    Ok((value, consumed)) => {
                        if consumed < snapshot.len() {
                            self.buf.extend_from_slice(&snapshot[consumed..]);
                        }
                        self.last_used = Instant::now();
                        return Ok(value);
                    }
                    Err(RedbatchError::Incomplete) => {
                        self.buf.extend_from_slice(&snapshot);
                    }
                    Err(e) => {
                        self.buf.extend_from_slice(&snapshot);
                        return Err(e);
                    }
                }
            }

            if self.buf.capacity() - self.buf.len() < 4096 {
                let new_cap = (self.buf.capacity() * 2).max(DEFAULT_BUF_CAPACITY);
                if new_cap > self.max_buf_size {
                    if self.buf.capacity() >= self.max_buf_size {
                        return Err(RedbatchError::Protocol(format!(
                            "RESP message too large: buffer would exceed {} bytes",
                            self.max_buf_size
                        )));
                    }
                    self.buf.reserve(self.max_buf_size - self.buf.capacity());
                } else {
                    self.buf.reserve(new_cap - self.buf.capacity());
                }
            }
            let n = self.stream.read_buf(&mut self.buf).await?;
            if n == 0 {
                return Err(RedbatchError::Connection(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed by server",
                )));
            }
        }
    }

    /// Send a command and read the raw reply. Error replies are returned as
    /// [`RespValue::Error`], not raised.
    pub async fn execute<S: AsRef<[u8]>>(&mut self, args: &[S]) -> Result<RespValue> {
        let cmd = encode_command(args);
        self.send_raw(&cmd).await?;
        self.read_response().await
    }

    /// Like [`execute`](Self::execute) but turns an error reply into `Err`.
    pub async fn execute_checked<S: AsRef<[u8]>>(&mut self, args: &[S]) -> Result<RespValue> {
        match self.execute(args).await? {
            RespValue::Error(msg) => Err(RedbatchError::redis(msg)),
            other => Ok(other),
        }
    }

    /// Write all commands in one buffer, then read one reply per command.
    ///
    /// Replies come back in submission order; per-command error replies
    /// stay in position as [`RespValue::Error`].
    pub async fn pipeline<S: AsRef<[u8]>>(&mut self, commands: &[Vec<S>]) -> Result<Vec<RespValue>> {
        if commands.is_empty() {
            return Ok(Vec::new());
        }
        let wire = encode_pipeline(commands);
        self.send_raw(&wire).await?;
        let mut replies = Vec::with_capacity(commands.len());
        for _ in 0..commands.len() {
            replies.push(self.read_response().await?);
        }
        Ok(replies)
    }

    /// Send `MULTI`, the commands and `EXEC` in one write.
    ///
    /// Returns `Ok(None)` when `EXEC` answers nil, meaning a watched key
    /// changed and the server discarded the block. A command rejected at
    /// queue time makes the server abort `EXEC`, which is returned as the
    /// `EXECABORT` Redis error.
    pub async fn transaction<S: AsRef<[u8]>>(
        &mut self,
        commands: &[Vec<S>],
    ) -> Result<Option<Vec<RespValue>>> {
        let wire = encode_transaction(commands);
        self.send_raw(&wire).await?;

        // Every reply must be drained even after a failure so the socket
        // stays in sync.
        let mut failure: Option<RedbatchError> = None;
        match self.read_response().await? {
            RespValue::Error(msg) => failure = Some(RedbatchError::redis(msg)),
            reply if reply.is_ok() => {}
            other => {
                failure = Some(RedbatchError::Protocol(format!(
                    "unexpected MULTI response: {}",
                    other.type_name()
                )))
            }
        }
        for _ in 0..commands.len() {
            if let RespValue::Error(msg) = self.read_response().await? {
                debug!(error = %msg, "command rejected while queueing");
            }
        }
        let exec_reply = self.read_response().await?;
        if let Some(err) = failure {
            return Err(err);
        }

        match exec_reply {
            RespValue::Array(results) => Ok(Some(results)),
            RespValue::Null => Ok(None),
            RespValue::Error(msg) => Err(RedbatchError::redis(msg)),
            other => Err(RedbatchError::Protocol(format!(
                "unexpected EXEC response: {}",
                other.type_name()
            ))),
        }
    }

    /// `WATCH key [key …]`.
    pub async fn watch<S: AsRef<[u8]>>(&mut self, keys: &[S]) -> Result<()> {
        let mut args: Vec<&[u8]> = Vec::with_capacity(keys.len() + 1);
        args.push(b"WATCH");
        args.extend(keys.iter().map(|k| k.as_ref()));
        let reply = self.execute_checked(&args).await?;
        expect_ok(reply, "WATCH")
    }

    /// `UNWATCH`.
    pub async fn unwatch(&mut self) -> Result<()> {
        let reply = self.execute_checked(&["UNWATCH"]).await?;
        expect_ok(reply, "UNWATCH")
    }

    // ── Script subsystem ───────────────────────────────────────────

    /// `SCRIPT EXISTS <sha>` for a single fingerprint.
    pub async fn script_exists(&mut self, sha: &str) -> Result<bool> {
        match self.execute_checked(&["SCRIPT", "EXISTS", sha]).await? {
            RespValue::Array(flags) => Ok(flags.first().and_then(RespValue::as_int) == Some(1)),
            other => Err(RedbatchError::Protocol(format!(
                "unexpected SCRIPT EXISTS response: {}",
                other.type_name()
            ))),
        }
    }

    /// `SCRIPT LOAD <body>`, returning the fingerprint the server computed.
    pub async fn script_load(&mut self, body: &str) -> Result<String> {
        let reply = self.execute_checked(&["SCRIPT", "LOAD", body]).await?;
        reply.as_str().map(str::to_string).ok_or_else(|| {
            RedbatchError::Protocol(format!(
                "unexpected SCRIPT LOAD response: {}",
                reply.type_name()
            ))
        })
    }

    /// `EVALSHA <sha> <numkeys> keys… args…`. Error replies become `Err`.
    pub async fn evalsha<K, A>(&mut self, sha: &str, keys: &[K], args: &[A]) -> Result<RespValue>
    where
        K: AsRef<[u8]>,
        A: AsRef<[u8]>,
    {
        let numkeys = itoa::Buffer::new().format(keys.len()).to_string();
        let mut cmd: Vec<&[u8]> = Vec::with_capacity(3 + keys.len() + args.len());
        cmd.push(b"EVALSHA");
        cmd.push(sha.as_bytes());
        cmd.push(numkeys.as_bytes());
        cmd.extend(keys.iter().map(|k| k.as_ref()));
        cmd.extend(args.iter().map(|a| a.as_ref()));
        self.execute_checked(&cmd).await
    }

    /// Whether `sha` was confirmed loaded through this connection.
    pub fn has_script(&self, sha: &str) -> bool {
        self.scripts.contains(sha)
    }

    pub fn mark_script_loaded(&mut self, sha: &str) {
        self.scripts.insert(sha.to_string());
    }

    pub fn forget_script(&mut self, sha: &str) {
        self.scripts.remove(sha);
    }

    // ── Handshake ──────────────────────────────────────────────────

    /// Perform AUTH handshake.
    pub async fn auth(&mut self, username: Option<&str>, password: &str) -> Result<()> {
        let response = match username {
            Some(user) => self.execute(&["AUTH", user, password]).await?,
            None => self.execute(&["AUTH", password]).await?,
        };
        match response {
            RespValue::Error(msg) => Err(RedbatchError::redis(msg)),
            other => expect_ok(other, "AUTH"),
        }
    }

    /// Select a database index.
    pub async fn select_db(&mut self, db: u16) -> Result<()> {
        if db == 0 {
            return Ok(());
        }
        let db_str = itoa::Buffer::new().format(db).to_string();
        match self.execute(&["SELECT", db_str.as_str()]).await? {
            RespValue::Error(msg) => Err(RedbatchError::redis(msg)),
            other => expect_ok(other, "SELECT"),
        }
    }

    /// Send PING and verify response.
    pub async fn ping(&mut self) -> Result<bool> {
        let response = self.execute(&["PING"]).await?;
        Ok(matches!(response, RespValue::SimpleString(ref s) if s == "PONG"))
    }

    /// Initialize the connection: AUTH when a password is given, then SELECT.
    pub async fn init(&mut self, username: Option<&str>, password: Option<&str>, db: u16) -> Result<()> {
        if let Some(pass) = password {
            self.auth(username, pass).await?;
        }
        self.select_db(db).await?;
        Ok(())
    }
}

fn expect_ok(reply: RespValue, command: &str) -> Result<()> {
    if reply.is_ok() {
        Ok(())
    } else {
        Err(RedbatchError::Protocol(format!(
            "unexpected {command} response: {}",
            reply.type_name()
        )))
    }
}

// ── Tests ──────────────────────────────────────────────────────────
