//! Atomic "update the score only if it improves" for sorted-set members.
//!
//! The read, the comparison and the write run inside one Lua script, so
//! concurrent writers cannot interleave between them.

use std::fmt;
use std::str::FromStr;

use crate::commands::ToArg;
use crate::connection::Connection;
use crate::error::{RedbatchError, Result};
use crate::resp::types::RespValue;
use crate::script::{self, Script};

/// `KEYS[1]` = sorted set, `ARGV` = mode (`LT`/`GT`), candidate score, member.
/// Returns 1 when the member was inserted or updated, 0 otherwise.
pub static CONDITIONAL_SCORE_UPDATE: Script = Script::new(
    "conditional-score-update",
    r#"local current = redis.call('ZSCORE', KEYS[1], ARGV[3])
local score = tonumber(ARGV[2])
if current then
  current = tonumber(current)
  if ARGV[1] == 'LT' then
    if current <= score then return 0 end
  elseif ARGV[1] == 'GT' then
    if current >= score then return 0 end
  else
    return redis.error_reply('ERR unknown comparison mode ' .. ARGV[1])
  end
end
redis.call('ZADD', KEYS[1], ARGV[2], ARGV[3])
return 1
"#,
);

/// Which direction counts as an improvement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreComparison {
    /// Replace only with a strictly lower score.
    LessThan,
    /// Replace only with a strictly higher score.
    GreaterThan,
}

impl ScoreComparison {
    /// Token the script expects in `ARGV[1]`.
    pub fn as_arg(self) -> &'static str {
        match self {
            Self::LessThan => "LT",
            Self::GreaterThan => "GT",
        }
    }

    /// Whether `candidate` should replace `current`.
    pub fn improves(self, current: f64, candidate: f64) -> bool {
        match self {
            Self::LessThan => candidate < current,
            Self::GreaterThan => candidate > current,
        }
    }
}

impl FromStr for ScoreComparison {
    type Err = RedbatchError;

    /// Accepts `lt`, `<`, `less`, `lessthan` and `gt`, `>`, `greater`,
    /// `greaterthan`, ignoring case and surrounding whitespace.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lt" | "<" | "less" | "lessthan" => Ok(Self::LessThan),
            "gt" | ">" | "greater" | "greaterthan" => Ok(Self::GreaterThan),
            _ => Err(RedbatchError::InvalidComparison(format!(
                "unknown comparison mode '{s}'"
            ))),
        }
    }
}

impl fmt::Display for ScoreComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LessThan => f.write_str("less-than"),
            Self::GreaterThan => f.write_str("greater-than"),
        }
    }
}

/// A validated conditional update.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreUpdate {
    pub key: String,
    pub comparison: ScoreComparison,
    pub score: f64,
    pub member: String,
}

impl ScoreUpdate {
    /// Rejects non-finite scores before anything is sent.
    pub fn new(
        key: impl Into<String>,
        comparison: ScoreComparison,
        score: f64,
        member: impl Into<String>,
    ) -> Result<Self> {
        if !score.is_finite() {
            return Err(RedbatchError::InvalidComparison(format!(
                "score must be finite, got {score}"
            )));
        }
        Ok(Self {
            key: key.into(),
            comparison,
            score,
            member: member.into(),
        })
    }

    fn args(&self) -> [String; 3] {
        [
            self.comparison.as_arg().to_string(),
            self.score.to_arg(),
            self.member.clone(),
        ]
    }

    /// Run the update on `conn`. Returns `true` when the stored score changed.
    pub async fn apply(&self, conn: &mut Connection) -> Result<bool> {
        let reply = script::invoke(
            conn,
            &CONDITIONAL_SCORE_UPDATE,
            &[self.key.as_str()],
            &self.args(),
        )
        .await?;
        interpret(reply)
    }
}

fn interpret(reply: RespValue) -> Result<bool> {
    match reply {
        RespValue::Integer(1) => Ok(true),
        RespValue::Integer(0) => Ok(false),
        other => Err(RedbatchError::Type(format!(
            "conditional score update returned {}",
            other.type_name()
        ))),
    }
}

// ── Tests ──────────────────────────────────────────────────────────
