//! Idle session sweeper

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::session::store::SessionStore;

/// Sweeper worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Time between sweeps
    pub interval: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
        }
    }
}

/// Run the sweeper worker until `shutdown_signal` resolves
pub async fn run<S, F>(
    options: &Options,
    store: Arc<SessionStore>,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!(interval_secs = options.interval.as_secs(), "Session sweeper starting...");

    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Session sweeper shutting down...");
                return;
            }
            _ = sleep_fn(options.interval) => {}
        }

        let removed = store.purge_expired();
        debug!(removed, remaining = store.len(), "Idle sweep finished");
    }
}
