use std::fmt;
use std::io;

use crate::batch::BatchMode;

/// Structured Redis error kinds for programmatic matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedisErrorKind {
    /// Generic ERR
    Err,
    /// WRONGTYPE Operation against a key holding the wrong kind of value
    WrongType,
    /// NOSCRIPT No matching script
    NoScript,
    /// BUSY Redis is busy running a script
    Busy,
    /// READONLY You can't write against a read only replica
    ReadOnly,
    /// LOADING Redis is loading the dataset in memory
    Loading,
    /// EXECABORT Transaction discarded because of previous errors
    ExecAbort,
    /// Any other Redis error prefix
    Other(String),
}

impl RedisErrorKind {
    /// Parse from a Redis error message string (e.g. "NOSCRIPT No matching script").
    pub fn from_error_msg(msg: &str) -> (Self, String) {
        let kind = if msg.starts_with("WRONGTYPE") {
            Self::WrongType
        } else if msg.starts_with("NOSCRIPT") {
            Self::NoScript
        } else if msg.starts_with("BUSY") {
            Self::Busy
        } else if msg.starts_with("READONLY") {
            Self::ReadOnly
        } else if msg.starts_with("LOADING") {
            Self::Loading
        } else if msg.starts_with("EXECABORT") {
            Self::ExecAbort
        } else if msg.starts_with("ERR") {
            Self::Err
        } else {
            let prefix = msg.split_whitespace().next().unwrap_or("UNKNOWN");
            Self::Other(prefix.to_string())
        };
        (kind, msg.to_string())
    }
}

/// All error variants for redbatch.
#[derive(Debug)]
pub enum RedbatchError {
    /// TCP / IO level errors
    Connection(io::Error),
    /// RESP protocol parse errors
    Protocol(String),
    /// RESP parser needs more data. Not a real error, used as control flow.
    Incomplete,
    /// Redis returned an error string with structured kind
    Redis {
        kind: RedisErrorKind,
        message: String,
    },
    /// Reply had a shape the caller did not ask for
    Type(String),
    /// Operation timed out
    Timeout(String),
    /// Missing or malformed configuration
    Config(String),
    /// A session was asked to nest the opposite batch mode.
    ModeConflict {
        session: u64,
        active: BatchMode,
        requested: BatchMode,
    },
    /// `exec()` was called more times than the session was opened.
    LevelIntegrity { session: u64, level: i64 },
    /// Operation is not meaningful in the current context.
    Unsupported(String),
    /// Script fingerprint still unknown to the server after a reload.
    Script { name: &'static str, message: String },
    /// Comparison mode or score rejected before reaching the server.
    InvalidComparison(String),
}

impl RedbatchError {
    /// Create a Redis error from a raw error message, auto-parsing the kind.
    pub fn redis(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        let (kind, message) = RedisErrorKind::from_error_msg(&msg);
        Self::Redis { kind, message }
    }

    /// Check if this is a NOSCRIPT reply.
    pub fn is_noscript(&self) -> bool {
        matches!(
            self,
            Self::Redis {
                kind: RedisErrorKind::NoScript,
                ..
            }
        )
    }

    /// Failures that leave the socket in an unknown state.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::Protocol(_) | Self::Incomplete | Self::Timeout(_)
        )
    }

    /// Errors caused by caller logic rather than the server or the network.
    ///
    /// These are never retried inside the crate.
    pub fn is_programmer_error(&self) -> bool {
        matches!(
            self,
            Self::ModeConflict { .. }
                | Self::LevelIntegrity { .. }
                | Self::Unsupported(_)
                | Self::InvalidComparison(_)
        )
    }
}

impl fmt::Display for RedbatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection(e) => write!(f, "connection error: {e}"),
            Self::Protocol(msg) => write!(f, "protocol error: {msg}"),
            Self::Incomplete => write!(f, "incomplete RESP message"),
            Self::Redis { message, .. } => write!(f, "redis error: {message}"),
            Self::Type(msg) => write!(f, "type error: {msg}"),
            Self::Timeout(msg) => write!(f, "timeout: {msg}"),
            Self::Config(msg) => write!(f, "config error: {msg}"),
            Self::ModeConflict {
                session,
                active,
                requested,
            } => write!(
                f,
                "mixed mode: cannot open {requested} inside {active} session #{session}"
            ),
            Self::LevelIntegrity { session, level } => {
                write!(f, "level integrity violated in session #{session}: level {level}")
            }
            Self::Unsupported(msg) => write!(f, "unsupported operation: {msg}"),
            Self::Script { name, message } => write!(f, "script '{name}' failed: {message}"),
            Self::InvalidComparison(msg) => write!(f, "invalid comparison: {msg}"),
        }
    }
}

impl std::error::Error for RedbatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Connection(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for RedbatchError {
    fn from(e: io::Error) -> Self {
        Self::Connection(e)
    }
}

pub type Result<T> = std::result::Result<T, RedbatchError>;

// ── Tests ──────────────────────────────────────────────────────────
