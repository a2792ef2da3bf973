//! Shared helpers for integration tests.
//!
//! Starts an in-process fake Redis server on the crate's global runtime, so
//! the synchronous client can be exercised without an external server. The
//! fake speaks RESP2 and implements the commands the tests use, including
//! `MULTI`/`EXEC` with `WATCH`, the script cache (`SCRIPT EXISTS/LOAD/FLUSH`)
//! and `EVALSHA` for the conditional score update script.

#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::{Buf, BytesMut};
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use redbatch::conditional::CONDITIONAL_SCORE_UPDATE;
use redbatch::resp::{parse, RespValue};
use redbatch::script::fingerprint;
use redbatch::{runtime, Client, ConnectionConfig, RedbatchError, ScoreComparison};

/// Global counter for generating unique key prefixes per test.
static TEST_ID: AtomicUsize = AtomicUsize::new(0);

/// Return a unique prefix for test keys.
pub fn test_prefix() -> String {
    let id = TEST_ID.fetch_add(1, Ordering::Relaxed);
    format!("redbatch_test_{}_{}", std::process::id(), id)
}

// ── Server handle ──────────────────────────────────────────────────

#[derive(Default)]
struct Stats {
    connections: AtomicUsize,
    commands: AtomicUsize,
    script_exists: AtomicUsize,
    script_loads: AtomicUsize,
    evalsha: AtomicUsize,
}

#[derive(Default)]
struct Shared {
    store: Mutex<Store>,
    stats: Stats,
}

pub struct FakeRedis {
    addr: String,
    shared: Arc<Shared>,
}

impl FakeRedis {
    pub fn start() -> Self {
        let listener = runtime::block_on(async {
            TcpListener::bind("127.0.0.1:0").await.map_err(RedbatchError::from)
        })
        .expect("bind fake redis");
        let addr = listener.local_addr().expect("local addr").to_string();
        let shared = Arc::new(Shared::default());

        let accept_shared = shared.clone();
        runtime::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                accept_shared.stats.connections.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(serve(socket, accept_shared.clone()));
            }
        });

        Self { addr, shared }
    }

    /// Require `AUTH <password>` before any other command.
    pub fn with_password(self, password: &str) -> Self {
        self.shared.store.lock().password = Some(password.to_string());
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn config(&self) -> ConnectionConfig {
        let (host, port) = self.addr.rsplit_once(':').expect("host:port");
        ConnectionConfig {
            host: host.to_string(),
            port: port.parse().expect("port"),
            pool_size: 4,
            connect_timeout_ms: 1000,
            read_timeout_ms: 5000,
            ..ConnectionConfig::default()
        }
    }

    pub fn client(&self) -> Client {
        Client::new(self.config()).expect("client")
    }

    pub fn client_with_pool(&self, pool_size: usize) -> Client {
        Client::new(ConnectionConfig {
            pool_size,
            ..self.config()
        })
        .expect("client")
    }

    pub fn connections(&self) -> usize {
        self.shared.stats.connections.load(Ordering::SeqCst)
    }

    /// Commands received so far, `AUTH`/`SELECT` included.
    pub fn commands(&self) -> usize {
        self.shared.stats.commands.load(Ordering::SeqCst)
    }

    pub fn script_exists_calls(&self) -> usize {
        self.shared.stats.script_exists.load(Ordering::SeqCst)
    }

    pub fn script_loads(&self) -> usize {
        self.shared.stats.script_loads.load(Ordering::SeqCst)
    }

    pub fn evalsha_calls(&self) -> usize {
        self.shared.stats.evalsha.load(Ordering::SeqCst)
    }

    /// Forget every loaded script, like `SCRIPT FLUSH` or a server restart.
    pub fn flush_scripts(&self) {
        self.shared.store.lock().scripts.clear();
    }

    pub fn zscore(&self, key: &str, member: &str) -> Option<f64> {
        match self.shared.store.lock().data.get(key) {
            Some(Value::ZSet(z)) => z.get(member).copied(),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        match self.shared.store.lock().data.get(key) {
            Some(Value::Str(s)) => Some(s.clone()),
            _ => None,
        }
    }
}

// ── Connection loop ────────────────────────────────────────────────

#[derive(Default)]
struct ConnState {
    authed: bool,
    db: u16,
    queue: Option<Vec<Vec<String>>>,
    queue_failed: bool,
    watched: HashMap<String, u64>,
}

async fn serve(mut socket: TcpStream, shared: Arc<Shared>) {
    let mut buf = BytesMut::with_capacity(4096);
    let mut conn = ConnState::default();
    loop {
        while !buf.is_empty() {
            let frame = buf.clone().freeze();
            match parse(&frame) {
                Ok((value, consumed)) => {
                    buf.advance(consumed);
                    let reply = shared.handle(&mut conn, to_args(value));
                    let mut out = Vec::new();
                    encode(&reply, &mut out);
                    if socket.write_all(&out).await.is_err() {
                        return;
                    }
                }
                Err(RedbatchError::Incomplete) => break,
                Err(_) => return,
            }
        }
        match socket.read_buf(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
    }
}

fn to_args(value: RespValue) -> Vec<String> {
    match value {
        RespValue::Array(items) => items
            .iter()
            .map(|v| match v {
                RespValue::BulkString(b) => String::from_utf8_lossy(b).into_owned(),
                other => other.as_str().unwrap_or_default().to_string(),
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn encode(value: &RespValue, out: &mut Vec<u8>) {
    match value {
        RespValue::SimpleString(s) => out.extend_from_slice(format!("+{s}\r\n").as_bytes()),
        RespValue::Error(s) => out.extend_from_slice(format!("-{s}\r\n").as_bytes()),
        RespValue::Integer(n) => out.extend_from_slice(format!(":{n}\r\n").as_bytes()),
        RespValue::BulkString(b) => {
            out.extend_from_slice(format!("${}\r\n", b.len()).as_bytes());
            out.extend_from_slice(b);
            out.extend_from_slice(b"\r\n");
        }
        RespValue::Array(items) => {
            out.extend_from_slice(format!("*{}\r\n", items.len()).as_bytes());
            for item in items {
                encode(item, out);
            }
        }
        RespValue::Null => out.extend_from_slice(b"*-1\r\n"),
    }
}

// ── Replies ────────────────────────────────────────────────────────

fn ok() -> RespValue {
    RespValue::SimpleString("OK".into())
}

fn int(n: i64) -> RespValue {
    RespValue::Integer(n)
}

fn bulk(s: impl Into<String>) -> RespValue {
    RespValue::bulk(s.into())
}

fn err(msg: &str) -> RespValue {
    RespValue::Error(msg.to_string())
}

fn wrongtype() -> RespValue {
    err("WRONGTYPE Operation against a key holding the wrong kind of value")
}

fn strings(items: impl IntoIterator<Item = String>) -> RespValue {
    RespValue::Array(items.into_iter().map(bulk).collect())
}

fn score_text(score: f64) -> String {
    score.to_string()
}

type Reply = std::result::Result<RespValue, RespValue>;

fn arg(args: &[String], i: usize) -> std::result::Result<&str, RespValue> {
    args.get(i).map(String::as_str).ok_or_else(|| {
        err(&format!(
            "ERR wrong number of arguments for '{}' command",
            args.first().map(|s| s.to_ascii_lowercase()).unwrap_or_default()
        ))
    })
}

fn parse_int(s: &str) -> std::result::Result<i64, RespValue> {
    s.parse().map_err(|_| err("ERR value is not an integer or out of range"))
}

fn parse_float(s: &str) -> std::result::Result<f64, RespValue> {
    s.parse().map_err(|_| err("ERR value is not a valid float"))
}

/// Redis inclusive index range over `len` elements.
fn range(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if start > stop || start >= len || stop < 0 {
        return None;
    }
    Some((start as usize, stop as usize))
}

// ── Store ──────────────────────────────────────────────────────────

enum Value {
    Str(String),
    ZSet(HashMap<String, f64>),
    Set(BTreeSet<String>),
    Hash(HashMap<String, String>),
    List(VecDeque<String>),
}

#[derive(Default)]
struct Store {
    data: HashMap<String, Value>,
    expiry: HashMap<String, i64>,
    versions: HashMap<String, u64>,
    scripts: HashSet<String>,
    password: Option<String>,
}

macro_rules! typed_access {
    ($get:ident, $get_mut:ident, $variant:ident, $ty:ty) => {
        fn $get(&self, key: &str) -> std::result::Result<Option<&$ty>, RespValue> {
            match self.data.get(key) {
                None => Ok(None),
                Some(Value::$variant(v)) => Ok(Some(v)),
                Some(_) => Err(wrongtype()),
            }
        }

        fn $get_mut(&mut self, key: &str) -> std::result::Result<&mut $ty, RespValue> {
            match self
                .data
                .entry(key.to_string())
                .or_insert_with(|| Value::$variant(Default::default()))
            {
                Value::$variant(v) => Ok(v),
                _ => Err(wrongtype()),
            }
        }
    };
}

impl Store {
    typed_access!(zset, zset_mut, ZSet, HashMap<String, f64>);
    typed_access!(set, set_mut, Set, BTreeSet<String>);
    typed_access!(hash, hash_mut, Hash, HashMap<String, String>);
    typed_access!(list, list_mut, List, VecDeque<String>);

    fn string(&self, key: &str) -> std::result::Result<Option<&String>, RespValue> {
        match self.data.get(key) {
            None => Ok(None),
            Some(Value::Str(s)) => Ok(Some(s)),
            Some(_) => Err(wrongtype()),
        }
    }

    fn version(&self, key: &str) -> u64 {
        self.versions.get(key).copied().unwrap_or(0)
    }

    fn touch(&mut self, key: &str) {
        *self.versions.entry(key.to_string()).or_insert(0) += 1;
    }

    fn put(&mut self, key: &str, value: String) {
        self.data.insert(key.to_string(), Value::Str(value));
        self.expiry.remove(key);
        self.touch(key);
    }

    fn remove(&mut self, key: &str) -> bool {
        self.expiry.remove(key);
        let existed = self.data.remove(key).is_some();
        if existed {
            self.touch(key);
        }
        existed
    }

    fn incr_by(&mut self, key: &str, by: i64) -> Reply {
        let current = match self.string(key)? {
            Some(s) => parse_int(s)?,
            None => 0,
        };
        let next = current + by;
        self.data.insert(key.to_string(), Value::Str(next.to_string()));
        self.touch(key);
        Ok(int(next))
    }

    fn sorted(&self, key: &str) -> std::result::Result<Vec<(String, f64)>, RespValue> {
        let mut members: Vec<(String, f64)> = self
            .zset(key)?
            .map(|z| z.iter().map(|(m, s)| (m.clone(), *s)).collect())
            .unwrap_or_default();
        members.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        Ok(members)
    }
}

/// Commands accepted while queueing inside `MULTI`.
const KNOWN: &[&str] = &[
    "PING", "SET", "SETEX", "SETNX", "GET", "DEL", "EXISTS", "EXPIRE", "EXPIREAT", "TTL", "INCR",
    "INCRBY", "DECR", "DECRBY", "APPEND", "MGET", "MSET", "RENAME", "ZADD", "ZSCORE", "ZCARD",
    "ZREM", "ZRANGE", "ZREVRANGE", "ZINCRBY", "SADD", "SREM", "SISMEMBER", "SMEMBERS", "SCARD",
    "HSET", "HGET", "HGETALL", "HDEL", "HMSET", "HINCRBY", "LPUSH", "RPUSH", "LPOP", "RPOP",
    "LLEN", "LRANGE", "FLUSHDB", "INFO", "SCRIPT", "EVALSHA",
];

impl Shared {
    fn handle(&self, conn: &mut ConnState, args: Vec<String>) -> RespValue {
        self.stats.commands.fetch_add(1, Ordering::SeqCst);
        let name = match args.first() {
            Some(n) => n.to_ascii_uppercase(),
            None => return err("ERR empty command"),
        };

        let password = self.store.lock().password.clone();
        if name == "AUTH" {
            let given = args.last().cloned().unwrap_or_default();
            return match password {
                Some(expected) if expected == given => {
                    conn.authed = true;
                    ok()
                }
                Some(_) => err("WRONGPASS invalid username-password pair or user is disabled."),
                None => err("ERR AUTH <password> called without any password configured for the default user."),
            };
        }
        if password.is_some() && !conn.authed {
            return err("NOAUTH Authentication required.");
        }

        match name.as_str() {
            "SELECT" => match arg(&args, 1).and_then(parse_int) {
                Ok(db) => {
                    conn.db = db as u16;
                    ok()
                }
                Err(e) => e,
            },
            "MULTI" => {
                if conn.queue.is_some() {
                    return err("ERR MULTI calls can not be nested");
                }
                conn.queue = Some(Vec::new());
                ok()
            }
            "DISCARD" => {
                if conn.queue.take().is_none() {
                    return err("ERR DISCARD without MULTI");
                }
                conn.queue_failed = false;
                conn.watched.clear();
                ok()
            }
            "EXEC" => {
                let Some(queue) = conn.queue.take() else {
                    return err("ERR EXEC without MULTI");
                };
                let failed = std::mem::take(&mut conn.queue_failed);
                let watched = std::mem::take(&mut conn.watched);
                if failed {
                    return err("EXECABORT Transaction discarded because of previous errors.");
                }
                let mut store = self.store.lock();
                if watched.iter().any(|(k, v)| store.version(k) != *v) {
                    return RespValue::Null;
                }
                RespValue::Array(
                    queue
                        .into_iter()
                        .map(|cmd| self.apply(&mut store, &cmd))
                        .collect(),
                )
            }
            "WATCH" => {
                if conn.queue.is_some() {
                    return err("ERR WATCH inside MULTI is not allowed");
                }
                let store = self.store.lock();
                for key in &args[1..] {
                    conn.watched.insert(key.clone(), store.version(key));
                }
                ok()
            }
            "UNWATCH" => {
                conn.watched.clear();
                ok()
            }
            _ if conn.queue.is_some() => {
                if !KNOWN.contains(&name.as_str()) {
                    conn.queue_failed = true;
                    return err(&format!("ERR unknown command '{}'", args[0]));
                }
                if let Some(queue) = conn.queue.as_mut() {
                    queue.push(args);
                }
                RespValue::SimpleString("QUEUED".into())
            }
            _ => {
                let mut store = self.store.lock();
                self.apply(&mut store, &args)
            }
        }
    }

    fn apply(&self, store: &mut Store, args: &[String]) -> RespValue {
        match self.try_apply(store, args) {
            Ok(v) | Err(v) => v,
        }
    }

    fn try_apply(&self, store: &mut Store, args: &[String]) -> Reply {
        let name = arg(args, 0)?.to_ascii_uppercase();
        match name.as_str() {
            "PING" => Ok(RespValue::SimpleString("PONG".into())),
            "INFO" => Ok(bulk("# Server\r\nredis_version:7.2.0\r\nrole:master\r\n")),
            "FLUSHDB" => {
                let keys: Vec<String> = store.data.keys().cloned().collect();
                for k in keys {
                    store.remove(&k);
                }
                Ok(ok())
            }

            // strings
            "SET" => {
                let key = arg(args, 1)?;
                store.put(key, arg(args, 2)?.to_string());
                if args.len() >= 5 && args[3].eq_ignore_ascii_case("EX") {
                    let ttl = parse_int(&args[4])?;
                    store.expiry.insert(key.to_string(), ttl);
                }
                Ok(ok())
            }
            "SETEX" => {
                let key = arg(args, 1)?;
                let ttl = parse_int(arg(args, 2)?)?;
                store.put(key, arg(args, 3)?.to_string());
                store.expiry.insert(key.to_string(), ttl);
                Ok(ok())
            }
            "SETNX" => {
                let key = arg(args, 1)?;
                if store.data.contains_key(key) {
                    return Ok(int(0));
                }
                store.put(key, arg(args, 2)?.to_string());
                Ok(int(1))
            }
            "GET" => Ok(store
                .string(arg(args, 1)?)?
                .map(|s| bulk(s.clone()))
                .unwrap_or(RespValue::Null)),
            "APPEND" => {
                let key = arg(args, 1)?;
                let mut value = store.string(key)?.cloned().unwrap_or_default();
                value.push_str(arg(args, 2)?);
                let len = value.len() as i64;
                store.data.insert(key.to_string(), Value::Str(value));
                store.touch(key);
                Ok(int(len))
            }
            "INCR" => store.incr_by(arg(args, 1)?, 1),
            "DECR" => store.incr_by(arg(args, 1)?, -1),
            "INCRBY" => store.incr_by(arg(args, 1)?, parse_int(arg(args, 2)?)?),
            "DECRBY" => store.incr_by(arg(args, 1)?, -parse_int(arg(args, 2)?)?),
            "MGET" => {
                let mut out = Vec::new();
                for key in &args[1..] {
                    out.push(match store.data.get(key) {
                        Some(Value::Str(s)) => bulk(s.clone()),
                        _ => RespValue::Null,
                    });
                }
                Ok(RespValue::Array(out))
            }
            "MSET" => {
                for pair in args[1..].chunks(2) {
                    store.put(&pair[0], arg(pair, 1)?.to_string());
                }
                Ok(ok())
            }

            // keys
            "DEL" => Ok(int(args[1..].iter().filter(|k| store.remove(k)).count() as i64)),
            "EXISTS" => Ok(int(args[1..].iter().filter(|k| store.data.contains_key(*k)).count() as i64)),
            "EXPIRE" | "EXPIREAT" => {
                let key = arg(args, 1)?;
                let ttl = parse_int(arg(args, 2)?)?;
                if !store.data.contains_key(key) {
                    return Ok(int(0));
                }
                store.expiry.insert(key.to_string(), ttl);
                store.touch(key);
                Ok(int(1))
            }
            "TTL" => {
                let key = arg(args, 1)?;
                Ok(int(match (store.data.contains_key(key), store.expiry.get(key)) {
                    (false, _) => -2,
                    (true, Some(ttl)) => *ttl,
                    (true, None) => -1,
                }))
            }
            "RENAME" => {
                let (from, to) = (arg(args, 1)?, arg(args, 2)?);
                let Some(value) = store.data.remove(from) else {
                    return Err(err("ERR no such key"));
                };
                store.data.insert(to.to_string(), value);
                store.touch(from);
                store.touch(to);
                Ok(ok())
            }

            // sorted sets
            "ZADD" => {
                let key = arg(args, 1)?;
                let score = parse_float(arg(args, 2)?)?;
                let member = arg(args, 3)?.to_string();
                let added = store.zset_mut(key)?.insert(member, score).is_none();
                store.touch(key);
                Ok(int(added as i64))
            }
            "ZINCRBY" => {
                let key = arg(args, 1)?;
                let by = parse_float(arg(args, 2)?)?;
                let entry = store.zset_mut(key)?.entry(arg(args, 3)?.to_string()).or_insert(0.0);
                *entry += by;
                let score = *entry;
                store.touch(key);
                Ok(bulk(score_text(score)))
            }
            "ZSCORE" => Ok(store
                .zset(arg(args, 1)?)?
                .and_then(|z| z.get(arg(args, 2).ok()?))
                .map(|s| bulk(score_text(*s)))
                .unwrap_or(RespValue::Null)),
            "ZCARD" => Ok(int(store.zset(arg(args, 1)?)?.map_or(0, |z| z.len()) as i64)),
            "ZREM" => {
                let key = arg(args, 1)?;
                let removed = store.zset_mut(key)?.remove(arg(args, 2)?).is_some();
                store.touch(key);
                Ok(int(removed as i64))
            }
            "ZRANGE" | "ZREVRANGE" => {
                let mut members = store.sorted(arg(args, 1)?)?;
                if name == "ZREVRANGE" {
                    members.reverse();
                }
                let with_scores = args.get(4).is_some_and(|a| a.eq_ignore_ascii_case("WITHSCORES"));
                let start = parse_int(arg(args, 2)?)?;
                let stop = parse_int(arg(args, 3)?)?;
                let mut out = Vec::new();
                if let Some((a, b)) = range(members.len(), start, stop) {
                    for (member, score) in &members[a..=b] {
                        out.push(bulk(member.clone()));
                        if with_scores {
                            out.push(bulk(score_text(*score)));
                        }
                    }
                }
                Ok(RespValue::Array(out))
            }

            // sets
            "SADD" => {
                let key = arg(args, 1)?;
                let added = store.set_mut(key)?.insert(arg(args, 2)?.to_string());
                store.touch(key);
                Ok(int(added as i64))
            }
            "SREM" => {
                let key = arg(args, 1)?;
                let removed = store.set_mut(key)?.remove(arg(args, 2)?);
                store.touch(key);
                Ok(int(removed as i64))
            }
            "SISMEMBER" => Ok(int(store
                .set(arg(args, 1)?)?
                .is_some_and(|s| args.get(2).is_some_and(|m| s.contains(m))) as i64)),
            "SMEMBERS" => Ok(strings(
                store.set(arg(args, 1)?)?.into_iter().flatten().cloned(),
            )),
            "SCARD" => Ok(int(store.set(arg(args, 1)?)?.map_or(0, |s| s.len()) as i64)),

            // hashes
            "HSET" | "HMSET" => {
                let key = arg(args, 1)?;
                let mut added = 0;
                for pair in args[2..].chunks(2) {
                    let value = arg(pair, 1)?.to_string();
                    if store.hash_mut(key)?.insert(pair[0].clone(), value).is_none() {
                        added += 1;
                    }
                }
                store.touch(key);
                Ok(if name == "HMSET" { ok() } else { int(added) })
            }
            "HGET" => Ok(store
                .hash(arg(args, 1)?)?
                .and_then(|h| h.get(arg(args, 2).ok()?))
                .map(|v| bulk(v.clone()))
                .unwrap_or(RespValue::Null)),
            "HGETALL" => {
                let mut out = Vec::new();
                if let Some(h) = store.hash(arg(args, 1)?)? {
                    for (f, v) in h {
                        out.push(bulk(f.clone()));
                        out.push(bulk(v.clone()));
                    }
                }
                Ok(RespValue::Array(out))
            }
            "HDEL" => {
                let key = arg(args, 1)?;
                let removed = store.hash_mut(key)?.remove(arg(args, 2)?).is_some();
                store.touch(key);
                Ok(int(removed as i64))
            }
            "HINCRBY" => {
                let key = arg(args, 1)?;
                let by = parse_int(arg(args, 3)?)?;
                let hash = store.hash_mut(key)?;
                let field = arg(args, 2)?.to_string();
                let current = match hash.get(&field) {
                    Some(v) => parse_int(v)?,
                    None => 0,
                };
                hash.insert(field, (current + by).to_string());
                store.touch(key);
                Ok(int(current + by))
            }

            // lists
            "LPUSH" | "RPUSH" => {
                let key = arg(args, 1)?;
                let list = store.list_mut(key)?;
                for value in &args[2..] {
                    if name == "LPUSH" {
                        list.push_front(value.clone());
                    } else {
                        list.push_back(value.clone());
                    }
                }
                let len = list.len() as i64;
                store.touch(key);
                Ok(int(len))
            }
            "LPOP" | "RPOP" => {
                let key = arg(args, 1)?;
                if store.list(key)?.is_none() {
                    return Ok(RespValue::Null);
                }
                let list = store.list_mut(key)?;
                let popped = if name == "LPOP" { list.pop_front() } else { list.pop_back() };
                store.touch(key);
                Ok(popped.map(bulk).unwrap_or(RespValue::Null))
            }
            "LLEN" => Ok(int(store.list(arg(args, 1)?)?.map_or(0, |l| l.len()) as i64)),
            "LRANGE" => {
                let start = parse_int(arg(args, 2)?)?;
                let stop = parse_int(arg(args, 3)?)?;
                let items: Vec<String> = match store.list(arg(args, 1)?)? {
                    Some(list) => match range(list.len(), start, stop) {
                        Some((a, b)) => list.range(a..=b).cloned().collect(),
                        None => Vec::new(),
                    },
                    None => Vec::new(),
                };
                Ok(strings(items))
            }

            // scripting
            "SCRIPT" => match arg(args, 1)?.to_ascii_uppercase().as_str() {
                "EXISTS" => {
                    self.stats.script_exists.fetch_add(1, Ordering::SeqCst);
                    Ok(RespValue::Array(
                        args[2..]
                            .iter()
                            .map(|sha| int(store.scripts.contains(sha) as i64))
                            .collect(),
                    ))
                }
                "LOAD" => {
                    self.stats.script_loads.fetch_add(1, Ordering::SeqCst);
                    let sha = fingerprint(arg(args, 2)?);
                    store.scripts.insert(sha.clone());
                    Ok(bulk(sha))
                }
                "FLUSH" => {
                    store.scripts.clear();
                    Ok(ok())
                }
                _ => Err(err("ERR unknown subcommand")),
            },
            "EVALSHA" => {
                self.stats.evalsha.fetch_add(1, Ordering::SeqCst);
                let sha = arg(args, 1)?;
                if !store.scripts.contains(sha) {
                    return Err(err("NOSCRIPT No matching script. Please use EVAL."));
                }
                if sha != CONDITIONAL_SCORE_UPDATE.sha() {
                    return Err(err("ERR fake server only runs the conditional score update"));
                }
                let key = arg(args, 3)?;
                let mode = arg(args, 4)?;
                let score = parse_float(arg(args, 5)?)?;
                let member = arg(args, 6)?;
                let comparison: ScoreComparison = match mode {
                    "LT" | "GT" => mode.parse().map_err(|_| err("ERR unknown comparison mode"))?,
                    _ => return Err(err(&format!("ERR unknown comparison mode {mode}"))),
                };
                let zset = store.zset_mut(key)?;
                if let Some(&current) = zset.get(member) {
                    if !comparison.improves(current, score) {
                        return Ok(int(0));
                    }
                }
                zset.insert(member.to_string(), score);
                store.touch(key);
                Ok(int(1))
            }

            _ => Err(err(&format!("ERR unknown command '{}'", args[0]))),
        }
    }
}
