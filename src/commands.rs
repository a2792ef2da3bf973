//! Command surface shared by [`Client`](crate::Client) and
//! [`BatchSession`](crate::BatchSession).
//!
//! Each wrapper builds the argument vector and hands it to
//! [`Dispatch::dispatch`] together with its declared result type. The
//! implementor decides whether the command runs now (client) or is queued
//! and answered with the type's placeholder (batch session).

use crate::error::Result;
use crate::reply::{FromReply, ScoredMembers};
use std::collections::HashMap;

/// A value that can be sent as one command argument.
pub trait ToArg {
    fn to_arg(&self) -> String;
}

impl ToArg for str {
    fn to_arg(&self) -> String {
        self.to_string()
    }
}

impl ToArg for String {
    fn to_arg(&self) -> String {
        self.clone()
    }
}

impl<T: ToArg + ?Sized> ToArg for &T {
    fn to_arg(&self) -> String {
        (**self).to_arg()
    }
}

macro_rules! int_to_arg {
    ($($t:ty),*) => {
        $(impl ToArg for $t {
            fn to_arg(&self) -> String {
                itoa::Buffer::new().format(*self).to_string()
            }
        })*
    };
}

int_to_arg!(i32, i64, u16, u32, u64, usize);

/// Scores: `10.0` is sent as `10`, infinities as `inf` / `-inf`.
impl ToArg for f64 {
    fn to_arg(&self) -> String {
        self.to_string()
    }
}

/// Build a command argument vector.
macro_rules! cmd {
    ($($arg:expr),+ $(,)?) => {
        vec![$($crate::commands::ToArg::to_arg(&$arg)),+]
    };
}

/// Single dispatch point for every command.
pub trait Dispatch {
    fn dispatch<R: FromReply>(&mut self, args: Vec<String>) -> Result<R>;
}

/// One-line command wrappers, available on anything that can dispatch.
pub trait Commands: Dispatch {
    // ── Strings ────────────────────────────────────────────────────

    /// `SET key value [EX ttl]`. A `ttl` of 0 stores without expiry.
    fn set<V: ToArg>(&mut self, key: &str, value: V, ttl: u64) -> Result<bool> {
        if ttl == 0 {
            self.dispatch(cmd!("SET", key, value))
        } else {
            self.dispatch(cmd!("SET", key, value, "EX", ttl))
        }
    }

    fn set_ex<V: ToArg>(&mut self, key: &str, value: V, ttl: u64) -> Result<bool> {
        self.dispatch(cmd!("SETEX", key, ttl, value))
    }

    fn set_nx<V: ToArg>(&mut self, key: &str, value: V) -> Result<bool> {
        self.dispatch(cmd!("SETNX", key, value))
    }

    /// Store without expiry.
    fn pset<V: ToArg>(&mut self, key: &str, value: V) -> Result<bool> {
        self.dispatch(cmd!("SET", key, value))
    }

    fn get(&mut self, key: &str) -> Result<Option<String>> {
        self.dispatch(cmd!("GET", key))
    }

    /// Returns the length of the string after the append.
    fn append<V: ToArg>(&mut self, key: &str, value: V) -> Result<i64> {
        self.dispatch(cmd!("APPEND", key, value))
    }

    fn incr(&mut self, key: &str) -> Result<i64> {
        self.dispatch(cmd!("INCR", key))
    }

    fn incr_by(&mut self, key: &str, by: i64) -> Result<i64> {
        self.dispatch(cmd!("INCRBY", key, by))
    }

    fn decr(&mut self, key: &str) -> Result<i64> {
        self.dispatch(cmd!("DECR", key))
    }

    fn decr_by(&mut self, key: &str, by: i64) -> Result<i64> {
        self.dispatch(cmd!("DECRBY", key, by))
    }

    fn get_range(&mut self, key: &str, start: i64, end: i64) -> Result<String> {
        self.dispatch(cmd!("GETRANGE", key, start, end))
    }

    fn mget(&mut self, keys: &[&str]) -> Result<Vec<Option<String>>> {
        let mut args = cmd!("MGET");
        args.extend(keys.iter().map(|k| k.to_arg()));
        self.dispatch(args)
    }

    fn mset<V: ToArg>(&mut self, pairs: &[(&str, V)]) -> Result<bool> {
        let mut args = cmd!("MSET");
        for (k, v) in pairs {
            args.push(k.to_arg());
            args.push(v.to_arg());
        }
        self.dispatch(args)
    }

    // ── Keys ───────────────────────────────────────────────────────

    fn del(&mut self, key: &str) -> Result<bool> {
        self.dispatch(cmd!("DEL", key))
    }

    fn exists(&mut self, key: &str) -> Result<bool> {
        self.dispatch(cmd!("EXISTS", key))
    }

    fn expire(&mut self, key: &str, ttl: u64) -> Result<bool> {
        self.dispatch(cmd!("EXPIRE", key, ttl))
    }

    /// Expire at a Unix timestamp in seconds.
    fn expire_at(&mut self, key: &str, timestamp: u64) -> Result<bool> {
        self.dispatch(cmd!("EXPIREAT", key, timestamp))
    }

    /// Remaining time to live in seconds; `-1` without expiry, `-2` when missing.
    fn ttl(&mut self, key: &str) -> Result<i64> {
        self.dispatch(cmd!("TTL", key))
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<bool> {
        self.dispatch(cmd!("RENAME", from, to))
    }

    // ── Sorted sets ────────────────────────────────────────────────

    /// `true` when the member was newly added.
    fn zadd<M: ToArg>(&mut self, key: &str, score: f64, member: M) -> Result<bool> {
        self.dispatch(cmd!("ZADD", key, score, member))
    }

    fn zrem<M: ToArg>(&mut self, key: &str, member: M) -> Result<bool> {
        self.dispatch(cmd!("ZREM", key, member))
    }

    fn zscore<M: ToArg>(&mut self, key: &str, member: M) -> Result<Option<f64>> {
        self.dispatch(cmd!("ZSCORE", key, member))
    }

    fn zcard(&mut self, key: &str) -> Result<i64> {
        self.dispatch(cmd!("ZCARD", key))
    }

    fn zrank<M: ToArg>(&mut self, key: &str, member: M) -> Result<Option<i64>> {
        self.dispatch(cmd!("ZRANK", key, member))
    }

    fn zrevrank<M: ToArg>(&mut self, key: &str, member: M) -> Result<Option<i64>> {
        self.dispatch(cmd!("ZREVRANK", key, member))
    }

    /// Bounds accept Redis range syntax (`-inf`, `(5`).
    fn zcount<A: ToArg, B: ToArg>(&mut self, key: &str, min: A, max: B) -> Result<i64> {
        self.dispatch(cmd!("ZCOUNT", key, min, max))
    }

    fn zincr_by<M: ToArg>(&mut self, key: &str, increment: f64, member: M) -> Result<f64> {
        self.dispatch(cmd!("ZINCRBY", key, increment, member))
    }

    fn zrange(&mut self, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
        self.dispatch(cmd!("ZRANGE", key, start, stop))
    }

    fn zrevrange(&mut self, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
        self.dispatch(cmd!("ZREVRANGE", key, start, stop))
    }

    fn zrevrange_with_scores(&mut self, key: &str, start: i64, stop: i64) -> Result<ScoredMembers> {
        self.dispatch(cmd!("ZREVRANGE", key, start, stop, "WITHSCORES"))
    }

    /// `limit` is `(offset, count)`.
    fn zrange_by_score<A: ToArg, B: ToArg>(
        &mut self,
        key: &str,
        min: A,
        max: B,
        limit: Option<(i64, i64)>,
    ) -> Result<Vec<String>> {
        let mut args = cmd!("ZRANGEBYSCORE", key, min, max);
        push_limit(&mut args, limit);
        self.dispatch(args)
    }

    /// Note the argument order: `max` comes first, as on the server.
    fn zrevrange_by_score<A: ToArg, B: ToArg>(
        &mut self,
        key: &str,
        max: A,
        min: B,
        limit: Option<(i64, i64)>,
    ) -> Result<Vec<String>> {
        let mut args = cmd!("ZREVRANGEBYSCORE", key, max, min);
        push_limit(&mut args, limit);
        self.dispatch(args)
    }

    fn zrem_range_by_score<A: ToArg, B: ToArg>(&mut self, key: &str, min: A, max: B) -> Result<i64> {
        self.dispatch(cmd!("ZREMRANGEBYSCORE", key, min, max))
    }

    fn zrem_range_by_rank(&mut self, key: &str, start: i64, stop: i64) -> Result<i64> {
        self.dispatch(cmd!("ZREMRANGEBYRANK", key, start, stop))
    }

    // ── Sets ───────────────────────────────────────────────────────

    fn sadd<M: ToArg>(&mut self, key: &str, member: M) -> Result<bool> {
        self.dispatch(cmd!("SADD", key, member))
    }

    fn srem<M: ToArg>(&mut self, key: &str, member: M) -> Result<bool> {
        self.dispatch(cmd!("SREM", key, member))
    }

    fn scard(&mut self, key: &str) -> Result<i64> {
        self.dispatch(cmd!("SCARD", key))
    }

    fn sismember<M: ToArg>(&mut self, key: &str, member: M) -> Result<bool> {
        self.dispatch(cmd!("SISMEMBER", key, member))
    }

    fn smembers(&mut self, key: &str) -> Result<Vec<String>> {
        self.dispatch(cmd!("SMEMBERS", key))
    }

    fn sdiff(&mut self, first: &str, second: &str) -> Result<Vec<String>> {
        self.dispatch(cmd!("SDIFF", first, second))
    }

    fn sinter(&mut self, first: &str, second: &str) -> Result<Vec<String>> {
        self.dispatch(cmd!("SINTER", first, second))
    }

    // ── Hashes ─────────────────────────────────────────────────────

    /// `true` when the field is new.
    fn hset<V: ToArg>(&mut self, key: &str, field: &str, value: V) -> Result<bool> {
        self.dispatch(cmd!("HSET", key, field, value))
    }

    fn hsetnx<V: ToArg>(&mut self, key: &str, field: &str, value: V) -> Result<bool> {
        self.dispatch(cmd!("HSETNX", key, field, value))
    }

    fn hget(&mut self, key: &str, field: &str) -> Result<Option<String>> {
        self.dispatch(cmd!("HGET", key, field))
    }

    fn hgetall(&mut self, key: &str) -> Result<HashMap<String, String>> {
        self.dispatch(cmd!("HGETALL", key))
    }

    fn hdel(&mut self, key: &str, field: &str) -> Result<bool> {
        self.dispatch(cmd!("HDEL", key, field))
    }

    fn hexists(&mut self, key: &str, field: &str) -> Result<bool> {
        self.dispatch(cmd!("HEXISTS", key, field))
    }

    fn hincr_by(&mut self, key: &str, field: &str, by: i64) -> Result<i64> {
        self.dispatch(cmd!("HINCRBY", key, field, by))
    }

    fn hincr_by_float(&mut self, key: &str, field: &str, by: f64) -> Result<f64> {
        self.dispatch(cmd!("HINCRBYFLOAT", key, field, by))
    }

    fn hvals(&mut self, key: &str) -> Result<Vec<String>> {
        self.dispatch(cmd!("HVALS", key))
    }

    /// Set several fields at once.
    fn hmset<V: ToArg>(&mut self, key: &str, pairs: &[(&str, V)]) -> Result<bool> {
        let mut args = cmd!("HMSET", key);
        for (f, v) in pairs {
            args.push(f.to_arg());
            args.push(v.to_arg());
        }
        self.dispatch(args)
    }

    // ── Lists ──────────────────────────────────────────────────────
    // Push commands return the list length after the push.

    fn lpush<V: ToArg>(&mut self, key: &str, value: V) -> Result<i64> {
        self.dispatch(cmd!("LPUSH", key, value))
    }

    fn rpush<V: ToArg>(&mut self, key: &str, value: V) -> Result<i64> {
        self.dispatch(cmd!("RPUSH", key, value))
    }

    /// Push only when the list already exists.
    fn lpushx<V: ToArg>(&mut self, key: &str, value: V) -> Result<i64> {
        self.dispatch(cmd!("LPUSHX", key, value))
    }

    fn rpushx<V: ToArg>(&mut self, key: &str, value: V) -> Result<i64> {
        self.dispatch(cmd!("RPUSHX", key, value))
    }

    fn lpop(&mut self, key: &str) -> Result<Option<String>> {
        self.dispatch(cmd!("LPOP", key))
    }

    fn rpop(&mut self, key: &str) -> Result<Option<String>> {
        self.dispatch(cmd!("RPOP", key))
    }

    fn llen(&mut self, key: &str) -> Result<i64> {
        self.dispatch(cmd!("LLEN", key))
    }

    fn lindex(&mut self, key: &str, index: i64) -> Result<Option<String>> {
        self.dispatch(cmd!("LINDEX", key, index))
    }

    fn lrange(&mut self, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
        self.dispatch(cmd!("LRANGE", key, start, stop))
    }

    /// Remove up to `count` occurrences of `value`; returns how many were removed.
    fn lrem<V: ToArg>(&mut self, key: &str, count: i64, value: V) -> Result<i64> {
        self.dispatch(cmd!("LREM", key, count, value))
    }

    fn lset<V: ToArg>(&mut self, key: &str, index: i64, value: V) -> Result<bool> {
        self.dispatch(cmd!("LSET", key, index, value))
    }

    fn ltrim(&mut self, key: &str, start: i64, stop: i64) -> Result<bool> {
        self.dispatch(cmd!("LTRIM", key, start, stop))
    }

    /// Insert before (or after) `pivot`. Returns the new length, or `-1`
    /// when the pivot was not found.
    fn linsert<P: ToArg, V: ToArg>(&mut self, key: &str, before: bool, pivot: P, value: V) -> Result<i64> {
        let position = if before { "BEFORE" } else { "AFTER" };
        self.dispatch(cmd!("LINSERT", key, position, pivot, value))
    }

    // ── Server ─────────────────────────────────────────────────────

    fn flushdb(&mut self) -> Result<bool> {
        self.dispatch(cmd!("FLUSHDB"))
    }

    fn info(&mut self) -> Result<String> {
        self.dispatch(cmd!("INFO"))
    }
}

impl<T: Dispatch + ?Sized> Commands for T {}

fn push_limit(args: &mut Vec<String>, limit: Option<(i64, i64)>) {
    if let Some((offset, count)) = limit {
        args.push("LIMIT".to_string());
        args.push(offset.to_arg());
        args.push(count.to_arg());
    }
}

/// Parse the `key:value` lines of an `INFO` reply, skipping `#` section headers.
pub fn parse_info(info: &str) -> HashMap<String, String> {
    info.lines()
        .filter(|line| !line.starts_with('#'))
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.to_string(), v.trim_end().to_string()))
        .collect()
}

// ── Tests ──────────────────────────────────────────────────────────
