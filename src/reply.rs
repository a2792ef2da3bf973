//! Typed conversion of replies.
//!
//! Every command wrapper declares its result type through [`FromReply`]. The
//! same trait supplies the placeholder a batch session hands back while the
//! command is only queued, so the declared type decides both.

use std::collections::HashMap;
use std::hash::Hash;

use bytes::Bytes;

use crate::error::{RedbatchError, Result};
use crate::resp::types::RespValue;

pub trait FromReply: Sized {
    /// Convert a real server reply. Error replies become `Err`.
    fn from_reply(reply: RespValue) -> Result<Self>;

    /// Value returned for a command that was queued instead of executed.
    fn placeholder() -> Self;
}

fn type_error(expected: &str, got: &RespValue) -> RedbatchError {
    RedbatchError::Type(format!("expected {expected}, got {}", got.type_name()))
}

fn reject_error(reply: RespValue) -> Result<RespValue> {
    match reply {
        RespValue::Error(msg) => Err(RedbatchError::redis(msg)),
        other => Ok(other),
    }
}

impl FromReply for RespValue {
    fn from_reply(reply: RespValue) -> Result<Self> {
        reject_error(reply)
    }

    fn placeholder() -> Self {
        RespValue::Null
    }
}

impl FromReply for () {
    fn from_reply(reply: RespValue) -> Result<Self> {
        reject_error(reply).map(|_| ())
    }

    fn placeholder() -> Self {}
}

/// `OK`, a non-zero integer or a non-empty string is `true`; nil and `0` are `false`.
impl FromReply for bool {
    fn from_reply(reply: RespValue) -> Result<Self> {
        match reject_error(reply)? {
            RespValue::SimpleString(s) => Ok(!s.is_empty()),
            RespValue::Integer(i) => Ok(i != 0),
            RespValue::BulkString(b) => Ok(!b.is_empty() && b.as_ref() != b"0"),
            RespValue::Null => Ok(false),
            other => Err(type_error("boolean", &other)),
        }
    }

    fn placeholder() -> Self {
        true
    }
}

impl FromReply for i64 {
    fn from_reply(reply: RespValue) -> Result<Self> {
        let reply = reject_error(reply)?;
        reply.as_int().ok_or_else(|| type_error("integer", &reply))
    }

    fn placeholder() -> Self {
        0
    }
}

impl FromReply for f64 {
    fn from_reply(reply: RespValue) -> Result<Self> {
        let reply = reject_error(reply)?;
        reply.as_f64().ok_or_else(|| type_error("float", &reply))
    }

    fn placeholder() -> Self {
        0.0
    }
}

impl FromReply for Bytes {
    fn from_reply(reply: RespValue) -> Result<Self> {
        match reject_error(reply)? {
            RespValue::BulkString(b) => Ok(b),
            RespValue::SimpleString(s) => Ok(Bytes::from(s)),
            RespValue::Integer(i) => Ok(Bytes::from(i.to_string())),
            other => Err(type_error("bulk string", &other)),
        }
    }

    fn placeholder() -> Self {
        Bytes::new()
    }
}

impl FromReply for String {
    fn from_reply(reply: RespValue) -> Result<Self> {
        match reject_error(reply)? {
            RespValue::SimpleString(s) => Ok(s),
            RespValue::BulkString(b) => String::from_utf8(b.to_vec())
                .map_err(|e| RedbatchError::Type(format!("reply is not UTF-8: {e}"))),
            RespValue::Integer(i) => Ok(i.to_string()),
            other => Err(type_error("string", &other)),
        }
    }

    fn placeholder() -> Self {
        String::new()
    }
}

impl<T: FromReply> FromReply for Option<T> {
    fn from_reply(reply: RespValue) -> Result<Self> {
        match reply {
            RespValue::Null => Ok(None),
            other => T::from_reply(other).map(Some),
        }
    }

    fn placeholder() -> Self {
        None
    }
}

impl<T: FromReply> FromReply for Vec<T> {
    fn from_reply(reply: RespValue) -> Result<Self> {
        match reject_error(reply)? {
            RespValue::Array(items) => items.into_iter().map(T::from_reply).collect(),
            RespValue::Null => Ok(Vec::new()),
            other => Err(type_error("array", &other)),
        }
    }

    fn placeholder() -> Self {
        Vec::new()
    }
}

/// Built from a flat `[field, value, field, value, …]` array (`HGETALL`).
impl<K, V> FromReply for HashMap<K, V>
where
    K: FromReply + Eq + Hash,
    V: FromReply,
{
    fn from_reply(reply: RespValue) -> Result<Self> {
        let items = match reject_error(reply)? {
            RespValue::Array(items) => items,
            RespValue::Null => return Ok(HashMap::new()),
            other => return Err(type_error("array", &other)),
        };
        if items.len() % 2 != 0 {
            return Err(RedbatchError::Type(format!(
                "expected an even number of elements, got {}",
                items.len()
            )));
        }
        let mut map = HashMap::with_capacity(items.len() / 2);
        let mut iter = items.into_iter();
        while let (Some(k), Some(v)) = (iter.next(), iter.next()) {
            map.insert(K::from_reply(k)?, V::from_reply(v)?);
        }
        Ok(map)
    }

    fn placeholder() -> Self {
        HashMap::new()
    }
}

/// Members paired with their scores, in server order (`… WITHSCORES`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoredMembers(pub Vec<(Bytes, f64)>);

impl ScoredMembers {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Bytes, f64)> {
        self.0.iter()
    }
}

impl FromReply for ScoredMembers {
    fn from_reply(reply: RespValue) -> Result<Self> {
        let pairs: Vec<RespValue> = Vec::from_reply(reply)?;
        if pairs.len() % 2 != 0 {
            return Err(RedbatchError::Type(format!(
                "expected member/score pairs, got {} elements",
                pairs.len()
            )));
        }
        let mut out = Vec::with_capacity(pairs.len() / 2);
        let mut iter = pairs.into_iter();
        while let (Some(member), Some(score)) = (iter.next(), iter.next()) {
            out.push((Bytes::from_reply(member)?, f64::from_reply(score)?));
        }
        Ok(ScoredMembers(out))
    }

    fn placeholder() -> Self {
        ScoredMembers::default()
    }
}

// ── Tests ──────────────────────────────────────────────────────────
