//! Bridge from the synchronous client API to async I/O.
//!
//! All sockets live on one multi-threaded runtime owned by the crate.
//! Client calls park the calling thread on it through [`block_on`], which
//! refuses to run when the caller is itself a task on some tokio runtime.

use std::future::Future;
use std::sync::OnceLock;

use tokio::runtime::{Handle, Runtime};

use crate::error::{RedbatchError, Result};

/// `REDBATCH_RUNTIME_THREADS` overrides the worker count (CPU count by default).
pub const THREADS_ENV_VAR: &str = "REDBATCH_RUNTIME_THREADS";

static RUNTIME: OnceLock<Runtime> = OnceLock::new();

fn worker_threads() -> Option<usize> {
    std::env::var(THREADS_ENV_VAR)
        .ok()?
        .trim()
        .parse()
        .ok()
        .filter(|n: &usize| *n > 0)
}

/// The crate's runtime, built on first use.
pub fn get_runtime() -> &'static Runtime {
    RUNTIME.get_or_init(|| {
        let mut builder = tokio::runtime::Builder::new_multi_thread();
        builder.enable_all().thread_name("redbatch-io");
        if let Some(n) = worker_threads() {
            builder.worker_threads(n);
        }
        match builder.build() {
            Ok(rt) => rt,
            // get_or_init has no error path.
            Err(e) => panic!("redbatch: failed to start I/O runtime: {e}"),
        }
    })
}

/// Run a client round trip to completion on the crate's runtime.
///
/// Returns [`RedbatchError::Unsupported`] instead of blocking when called
/// from async code, where parking the thread would stall the caller's own
/// executor.
pub fn block_on<F, T>(future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    if Handle::try_current().is_ok() {
        return Err(RedbatchError::Unsupported(
            "blocking client call from inside an async runtime".into(),
        ));
    }
    get_runtime().block_on(future)
}

/// Spawn a background task on the crate's runtime.
pub fn spawn<F>(future: F) -> tokio::task::JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    get_runtime().spawn(future)
}

// ── Tests ──────────────────────────────────────────────────────────
