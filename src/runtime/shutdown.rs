//! # Shutdown
//!
//! SIGINT/SIGTERM handling for the watch loop. A received signal is latched,
//! so a controller stream that ends afterwards is not restarted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::info;

/// What the watch loop does once a controller stream has ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// Shutdown was requested, leave the loop
    Exit,
    /// The stream ended on its own, start a new controller
    Restart,
}

/// Latched shutdown request shared between the signal listener and the watch loop
#[derive(Debug, Default)]
pub struct Shutdown {
    requested: AtomicBool,
    notify: Notify,
}

impl Shutdown {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Request shutdown and wake every waiter. Repeated requests are no-ops.
    pub fn request(&self) {
        if !self.requested.swap(true, Ordering::SeqCst) {
            self.notify.notify_waiters();
        }
    }

    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Resolves once shutdown has been requested, immediately if it already was
    pub async fn wait(&self) {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a concurrent request is not missed
        notified.as_mut().enable();
        if self.is_requested() {
            return;
        }
        notified.await;
    }

    /// Decide between leaving the watch loop and restarting the controller
    #[must_use]
    pub fn after_stream_end(&self) -> StreamEnd {
        if self.is_requested() {
            StreamEnd::Exit
        } else {
            StreamEnd::Restart
        }
    }
}

/// Install SIGINT and SIGTERM handlers that request `shutdown`
///
/// Registration happens before this returns, so a failure surfaces to the
/// caller instead of leaving the controller without a shutdown path.
#[cfg(unix)]
pub fn listen_for_signals(shutdown: Arc<Shutdown>) -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    tokio::spawn(async move {
        let received = tokio::select! {
            _ = interrupt.recv() => "SIGINT",
            _ = terminate.recv() => "SIGTERM",
        };
        info!(signal = received, "Received shutdown signal, initiating graceful shutdown...");
        shutdown.request();
    });
    Ok(())
}

/// Install a Ctrl+C handler that requests `shutdown`
#[cfg(not(unix))]
pub fn listen_for_signals(shutdown: Arc<Shutdown>) -> std::io::Result<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!(signal = "ctrl-c", "Received shutdown signal, initiating graceful shutdown...");
                shutdown.request();
            }
            Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C"),
        }
    });
    Ok(())
}
