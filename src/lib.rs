//! Synchronous Redis client with nested pipeline/transaction sessions and
//! server-side conditional sorted-set score updates.
//!
//! ```no_run
//! use redbatch::{Client, Commands, ScoreComparison};
//!
//! # fn main() -> redbatch::Result<()> {
//! let mut client = Client::from_url("redis://127.0.0.1:6379/0")?;
//! client.set("greeting", "hello", 60)?;
//!
//! let mut batch = client.pipeline()?;
//! batch.incr("hits")?;
//! batch.zadd("board", 10.0, "alice")?;
//! let results = batch.exec()?;
//! assert_eq!(results.len(), 2);
//! drop(batch);
//!
//! let changed = client.conditional_score_update("board", ScoreComparison::LessThan, 5.0, "alice")?;
//! # let _ = changed;
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod client;
pub mod commands;
pub mod conditional;
pub mod config;
pub mod connection;
pub mod error;
pub mod reply;
pub mod resp;
pub mod runtime;
pub mod script;

pub use batch::{BatchMode, BatchSession};
pub use client::Client;
pub use commands::{Commands, Dispatch};
pub use conditional::ScoreComparison;
pub use config::ConnectionConfig;
pub use error::{RedbatchError, Result};
pub use reply::{FromReply, ScoredMembers};
pub use resp::RespValue;
pub use script::Script;
