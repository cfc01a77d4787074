//! Process-wide tokio runtime and logging for the C ABI.
//!
//! C callers are synchronous, so every exported function blocks on one
//! lazily created multi-thread runtime. The IO tasks of open devices live
//! on that runtime between calls.

use std::future::Future;
use std::sync::OnceLock;

use synthlib_core::{Error, Result};
use tokio::runtime::Runtime;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable holding the `tracing` filter for library logging.
pub const LOG_ENV: &str = "SYNTHLIB_LOG";

static RUNTIME: OnceLock<std::io::Result<Runtime>> = OnceLock::new();
static LOGGING: OnceLock<()> = OnceLock::new();

fn runtime() -> Result<&'static Runtime> {
    let rt = RUNTIME.get_or_init(|| {
        init_logging();
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("holzworth-io")
            .enable_all()
            .build()
    });
    rt.as_ref()
        .map_err(|e| Error::Transport(format!("failed to start runtime: {e}")))
}

/// Run a future to completion on the shared runtime.
pub(crate) fn block_on<F: Future>(future: F) -> Result<F::Output> {
    Ok(runtime()?.block_on(future))
}

/// Install a subscriber when `SYNTHLIB_LOG` is set. Host applications that
/// install their own subscriber first keep it.
fn init_logging() {
    LOGGING.get_or_init(|| {
        let Ok(directive) = std::env::var(LOG_ENV) else {
            return;
        };
        let _ = tracing_subscriber::registry()
            .with(EnvFilter::new(directive))
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .try_init();
    });
}
