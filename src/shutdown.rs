//! Graceful shutdown
//!
//! A stop request has to do two things: flip the writer's stop flag at once,
//! so any later write is dropped instead of racing the close, and wake the
//! ingest loop so it can close the open file before the process exits.

use std::sync::Arc;

use tokio::sync::Notify;
use tracing::warn;

use crate::archive::StopSignal;

#[derive(Debug, Clone)]
pub struct Shutdown {
    stop: StopSignal,
    notify: Arc<Notify>,
}

impl Shutdown {
    /// Shutdown handle driving the given writer stop flag
    pub fn new(stop: StopSignal) -> Self {
        Self {
            stop,
            notify: Arc::new(Notify::new()),
        }
    }

    /// Route Ctrl+C / SIGTERM to [`Shutdown::trigger`]
    ///
    /// Can only be installed once per process.
    pub fn install_signal_handler(&self) -> Result<(), ctrlc::Error> {
        let handle = self.clone();
        ctrlc::set_handler(move || {
            warn!("caught interrupt, cleaning up");
            handle.trigger();
        })
    }

    /// Mark the writer stopped and wake whoever waits in [`Shutdown::requested`]
    pub fn trigger(&self) {
        self.stop.stop();
        self.notify.notify_one();
    }

    pub fn is_triggered(&self) -> bool {
        self.stop.is_stopped()
    }

    /// Resolves once a stop was requested
    pub async fn requested(&self) {
        if self.is_triggered() {
            return;
        }
        self.notify.notified().await;
    }
}
