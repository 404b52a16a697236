//! Graceful shutdown.
//!
//! [`ShutdownToken`] is the cancellation token shared between the batch
//! loop and the [`ShutdownCoordinator`]. The coordinator is the only
//! writer: it triggers the token once, on the first termination signal.
//! Sessions race every blocking I/O call against [`ShutdownToken::cancelled`],
//! so triggering the token closes whichever connection is active.

use std::io;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

// ---------------------------------------------------------------------------
// Token
// ---------------------------------------------------------------------------

/// Set-once cancellation flag with async notification.
///
/// Clones observe the same flag. Once triggered it is never cleared.
#[derive(Debug, Clone)]
pub struct ShutdownToken {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl ShutdownToken {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// Request shutdown. Returns `true` only for the call that actually
    /// flipped the flag.
    pub fn trigger(&self) -> bool {
        self.tx.send_if_modified(|down| {
            if *down {
                false
            } else {
                *down = true;
                true
            }
        })
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the token has been triggered (immediately if it
    /// already was).
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|down| *down).await.is_err() {
            // Unreachable while `self` holds the sender; never resolve.
            std::future::pending::<()>().await;
        }
    }
}

impl Default for ShutdownToken {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// Background task that turns the first termination signal into a
/// token trigger. It never exits the process.
pub struct ShutdownCoordinator;

impl ShutdownCoordinator {
    /// Register signal handlers and spawn the listener task.
    pub fn spawn(token: ShutdownToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            match wait_for_signal().await {
                Ok(signal) => Self::handle_signal(&token, signal),
                Err(e) => error!(
                    action = "handle_sigterm",
                    result = "fail",
                    error = %e,
                    "Failed to install signal handler"
                ),
            }
        })
    }

    /// React to a received signal. Only the first call has an effect.
    pub fn handle_signal(token: &ShutdownToken, signal: &str) {
        if token.trigger() {
            info!(action = "handle_sigterm", result = "success", signal, "Shutdown requested");
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = terminate.recv() => Ok("SIGTERM"),
        res = tokio::signal::ctrl_c() => res.map(|_| "SIGINT"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> io::Result<&'static str> {
    tokio::signal::ctrl_c().await.map(|_| "SIGINT")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
