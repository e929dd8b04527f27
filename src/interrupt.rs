//! Process-wide Ctrl+C handling
//!
//! Listening for SIGINT through tokio replaces the default action for the
//! rest of the process. The listener is therefore installed once, at startup,
//! and everything that reacts to Ctrl+C watches the same [`Interrupt`].

use std::sync::Arc;
use tokio::sync::watch;
use crate::Result;

/// Shared "Ctrl+C was pressed" flag
#[derive(Debug, Clone)]
pub struct Interrupt {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for Interrupt {
    fn default() -> Self {
        Self::new()
    }
}

impl Interrupt {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx: Arc::new(tx), rx }
    }

    /// Route Ctrl+C into this interrupt.
    ///
    /// The handler is registered before this returns, so a signal sent
    /// afterwards is never lost. Must be called from within a tokio runtime.
    #[cfg(unix)]
    pub fn spawn_listener(&self) -> Result<()> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())?;
        let tx = self.tx.clone();
        tokio::spawn(async move {
            while sigint.recv().await.is_some() {
                tracing::info!("Received Ctrl+C");
                let _ = tx.send(true);
            }
        });
        Ok(())
    }

    #[cfg(not(unix))]
    pub fn spawn_listener(&self) -> Result<()> {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received Ctrl+C");
                let _ = tx.send(true);
            }
        });
        Ok(())
    }

    /// Raise the interrupt without a signal
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the interrupt is raised, immediately if it already was
    pub async fn triggered(&self) {
        let mut rx = self.rx.clone();
        let closed = rx.wait_for(|pressed| *pressed).await.is_err();
        if closed {
            std::future::pending::<()>().await;
        }
    }
}
