//! Connection configuration.
//!
//! A [`ConnectionConfig`] can be built three ways:
//! - struct literal over [`Default`];
//! - a URL: `redis://[user:pass@]host[:port][/db]` or `rediss://…` (TLS, rejected at connect);
//! - a field map with the required keys `host`, `port`, `db` and the optional
//!   `password`, `username` and `algo` (password digest applied before AUTH).
//!
//! [`ConnectionConfig::from_env`] reads the URL from `REDBATCH_URL`.

use std::collections::HashMap;

use sha1::Sha1;
use sha2::{Digest, Sha256};

use crate::error::{RedbatchError, Result};

/// Default Redis port.
pub const DEFAULT_PORT: u16 = 6379;

/// Environment variable read by [`ConnectionConfig::from_env`].
pub const URL_ENV_VAR: &str = "REDBATCH_URL";

/// Hash applied to the configured password before it is sent with AUTH.
///
/// Deployments that provision Redis with a hashed secret store the plain
/// text in config and let the client derive the wire value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordDigest {
    Sha1,
    Sha256,
}

impl PasswordDigest {
    /// Parse an algorithm name (`sha1`, `sha256`), case-insensitive.
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            other => Err(RedbatchError::Config(format!(
                "unsupported password digest algorithm: {other}"
            ))),
        }
    }

    /// Lowercase hex digest of `password`.
    pub fn apply(self, password: &str) -> String {
        match self {
            Self::Sha1 => format!("{:x}", Sha1::digest(password.as_bytes())),
            Self::Sha256 => format!("{:x}", Sha256::digest(password.as_bytes())),
        }
    }
}

/// Full connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    /// Optional username (Redis 6+ ACL).
    pub username: Option<String>,
    pub password: Option<String>,
    /// When set, AUTH sends the hex digest of `password` instead of the password.
    pub password_digest: Option<PasswordDigest>,
    /// Logical database index selected right after AUTH.
    pub db: u16,
    /// Requested by `rediss://`. Connecting fails: TLS is not supported.
    pub tls: bool,
    /// Connection pool size.
    pub pool_size: usize,
    /// Connect timeout in milliseconds. Also bounds the wait for a free
    /// pooled connection.
    pub connect_timeout_ms: u64,
    /// Read/response timeout in milliseconds (0 = no timeout).
    pub read_timeout_ms: u64,
    /// Idle timeout in milliseconds (connections idle longer are dropped).
    pub idle_timeout_ms: u64,
    /// Maximum read buffer size per connection in bytes.
    pub max_buffer_size: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            username: None,
            password: None,
            password_digest: None,
            db: 0,
            tls: false,
            pool_size: 8,
            connect_timeout_ms: 5000,
            read_timeout_ms: 30_000,
            idle_timeout_ms: 300_000,
            max_buffer_size: crate::connection::tcp::DEFAULT_MAX_BUF_SIZE,
        }
    }
}

impl ConnectionConfig {
    /// Parse a Redis URL into a ConnectionConfig.
    pub fn from_url(url: &str) -> Result<Self> {
        let mut config = Self::default();

        let (scheme, rest) = url
            .split_once("://")
            .ok_or_else(|| RedbatchError::Config(format!("invalid URL, missing ://: {url}")))?;

        match scheme {
            "redis" => {}
            "rediss" => config.tls = true,
            _ => {
                return Err(RedbatchError::Config(format!(
                    "unknown URL scheme: {scheme}"
                )));
            }
        }

        let (host_part, db_part) = split_path(rest);
        if let Some(db_str) = db_part {
            config.db = db_str
                .parse()
                .map_err(|_| RedbatchError::Config(format!("invalid db number: {db_str}")))?;
        }

        let host_port = match host_part.rsplit_once('@') {
            Some((userinfo, hp)) => {
                parse_userinfo(&mut config, userinfo);
                hp
            }
            None => host_part,
        };
        parse_host_port(host_port, &mut config.host, &mut config.port)?;
        Ok(config)
    }

    /// Build a config from a field map.
    ///
    /// `host`, `port` and `db` are required; `password`, `username` and
    /// `algo` (password digest) are optional. Unknown keys are ignored so a
    /// larger application config section can be passed through as is.
    pub fn from_fields<K, V>(fields: &HashMap<K, V>) -> Result<Self>
    where
        K: std::borrow::Borrow<str> + std::hash::Hash + Eq,
        V: AsRef<str>,
    {
        let required = |name: &str| -> Result<&str> {
            fields
                .get(name)
                .map(|v| v.as_ref())
                .ok_or_else(|| RedbatchError::Config(format!("missing required field '{name}'")))
        };

        let mut config = Self {
            host: required("host")?.to_string(),
            ..Self::default()
        };
        let port = required("port")?;
        config.port = port
            .parse()
            .map_err(|_| RedbatchError::Config(format!("invalid port: {port}")))?;
        let db = required("db")?;
        config.db = db
            .parse()
            .map_err(|_| RedbatchError::Config(format!("invalid db number: {db}")))?;

        config.password = fields
            .get("password")
            .map(|v| v.as_ref().to_string())
            .filter(|p| !p.is_empty());
        config.username = fields
            .get("username")
            .map(|v| v.as_ref().to_string())
            .filter(|u| !u.is_empty());
        if let Some(algo) = fields.get("algo") {
            config.password_digest = Some(PasswordDigest::from_name(algo.as_ref())?);
        }
        Ok(config)
    }

    /// Parse the URL held in `REDBATCH_URL`.
    pub fn from_env() -> Result<Self> {
        let url = std::env::var(URL_ENV_VAR)
            .map_err(|_| RedbatchError::Config(format!("{URL_ENV_VAR} is not set")))?;
        Self::from_url(&url)
    }

    /// Return the primary address as "host:port".
    pub fn primary_addr(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// The password as it must be sent with AUTH (digest applied).
    pub fn auth_password(&self) -> Option<String> {
        let password = self.password.as_deref()?;
        Some(match self.password_digest {
            Some(digest) => digest.apply(password),
            None => password.to_string(),
        })
    }
}

// ── URL parsing helpers ────────────────────────────────────────────

/// Split `rest` into (before_path, Some(path)) or (rest, None).
fn split_path(rest: &str) -> (&str, Option<&str>) {
    match rest.split_once('/') {
        Some((before, after)) if !after.is_empty() => (before, Some(after)),
        Some((before, _)) => (before, None),
        None => (rest, None),
    }
}

/// Parse `user:pass`, `:pass` or a bare `pass` into config.
fn parse_userinfo(config: &mut ConnectionConfig, userinfo: &str) {
    match userinfo.split_once(':') {
        Some((user, pass)) => {
            if !user.is_empty() {
                config.username = Some(user.to_string());
            }
            if !pass.is_empty() {
                config.password = Some(pass.to_string());
            }
        }
        None if !userinfo.is_empty() => config.password = Some(userinfo.to_string()),
        None => {}
    }
}

/// Parse `host[:port]` or `[ipv6]:port`.
fn parse_host_port(s: &str, host: &mut String, port: &mut u16) -> Result<()> {
    if let Some(bracketed) = s.strip_prefix('[') {
        let (h, after) = bracketed
            .split_once(']')
            .ok_or_else(|| RedbatchError::Config(format!("unclosed IPv6 bracket: {s}")))?;
        *host = h.to_string();
        *port = match after.strip_prefix(':') {
            Some(p) => p
                .parse()
                .map_err(|_| RedbatchError::Config(format!("invalid port: {p}")))?,
            None => DEFAULT_PORT,
        };
    } else if let Some((h, p)) = s.rsplit_once(':') {
        *host = h.to_string();
        *port = p
            .parse()
            .map_err(|_| RedbatchError::Config(format!("invalid port: {p}")))?;
    } else {
        *host = s.to_string();
        *port = DEFAULT_PORT;
    }

    if host.is_empty() {
        *host = "127.0.0.1".to_string();
    }
    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────────
