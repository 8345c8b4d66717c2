//! Subscriber setup for binaries and demos.
//!
//! Library code only emits `tracing` events inside spans handed to it; it
//! never installs a subscriber itself.

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Environment variable holding the log filter, e.g.
/// `COLBERT_RERANK_LOG=colbert_rerank=debug`.
pub const LOG_ENV: &str = "COLBERT_RERANK_LOG";

/// Install a formatted subscriber. Calling it more than once is a no-op.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("colbert_rerank=info"));

        let _ = tracing_subscriber::registry()
            .with(fmt::layer().with_target(true))
            .with(filter)
            .try_init();
    });
}
