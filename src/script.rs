//! Server-side Lua scripts addressed by SHA1 fingerprint.
//!
//! Scripts are compile-time literals. Their fingerprint is computed from the
//! body on first use, never hard-coded. Each [`Connection`] remembers which
//! fingerprints it has confirmed on its server, so provisioning costs at most
//! one `SCRIPT EXISTS` (plus a `SCRIPT LOAD` when missing) per connection.
//! A `NOSCRIPT` reply during invocation (the server cache was flushed or the
//! server restarted) triggers exactly one reload and retry.

use std::sync::OnceLock;

use sha1::{Digest, Sha1};
use tracing::{debug, warn};

use crate::connection::Connection;
use crate::error::{RedbatchError, Result};
use crate::resp::types::RespValue;

/// A named Lua script.
#[derive(Debug)]
pub struct Script {
    name: &'static str,
    body: &'static str,
    sha: OnceLock<String>,
}

impl Script {
    pub const fn new(name: &'static str, body: &'static str) -> Self {
        Self {
            name,
            body,
            sha: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn body(&self) -> &'static str {
        self.body
    }

    /// Lowercase hex SHA1 of the body, as used by `EVALSHA`.
    pub fn sha(&self) -> &str {
        self.sha.get_or_init(|| fingerprint(self.body))
    }
}

/// Lowercase hex SHA1 of `body`.
pub fn fingerprint(body: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(body.as_bytes());
    format!("{:x}", hasher.finalize())
}

static REGISTRY: [&Script; 1] = [&crate::conditional::CONDITIONAL_SCORE_UPDATE];

/// Every script this crate may invoke.
pub fn registry() -> &'static [&'static Script] {
    &REGISTRY
}

pub fn lookup(name: &str) -> Option<&'static Script> {
    REGISTRY.iter().copied().find(|s| s.name == name)
}

/// Make sure `script` is loaded on the server behind `conn`.
///
/// Returns without I/O when this connection already confirmed it.
pub async fn ensure_loaded(conn: &mut Connection, script: &Script) -> Result<()> {
    let sha = script.sha();
    if conn.has_script(sha) {
        return Ok(());
    }

    if !conn.script_exists(sha).await? {
        let returned = conn.script_load(script.body).await?;
        if returned != sha {
            return Err(RedbatchError::Protocol(format!(
                "server fingerprint {returned} does not match {sha} for script '{}'",
                script.name
            )));
        }
        debug!(script = script.name, %sha, "script loaded");
    }
    conn.mark_script_loaded(sha);
    Ok(())
}

/// Load every registered script on `conn`.
pub async fn preload(conn: &mut Connection) -> Result<()> {
    for script in registry() {
        ensure_loaded(conn, script).await?;
    }
    Ok(())
}

/// Run `script` by fingerprint.
///
/// On `NOSCRIPT` the cached confirmation is dropped, the script is loaded
/// again and the call retried once. A second `NOSCRIPT` is a
/// [`RedbatchError::Script`]. Other server errors pass through unchanged.
pub async fn invoke<K, A>(conn: &mut Connection, script: &Script, keys: &[K], args: &[A]) -> Result<RespValue>
where
    K: AsRef<[u8]>,
    A: AsRef<[u8]>,
{
    ensure_loaded(conn, script).await?;
    match conn.evalsha(script.sha(), keys, args).await {
        Err(e) if e.is_noscript() => {
            warn!(script = script.name, sha = script.sha(), "script missing on server, reloading");
            conn.forget_script(script.sha());
            ensure_loaded(conn, script).await?;
            conn.evalsha(script.sha(), keys, args)
                .await
                .map_err(|e| match e {
                    RedbatchError::Redis { message, .. } if message.starts_with("NOSCRIPT") => {
                        RedbatchError::Script {
                            name: script.name,
                            message,
                        }
                    }
                    other => other,
                })
        }
        other => other,
    }
}

// ── Tests ──────────────────────────────────────────────────────────
