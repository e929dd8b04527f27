//! Clipboard access through a dedicated worker
//!
//! Copy requests are tagged with an id and handed to a worker thread that owns
//! the clipboard. Completions come back on a separate channel and are matched
//! to the waiting caller through the broker's pending map.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;
use crate::Result;
use crate::error::Error;

/// How long a caller waits for the worker before giving up
pub const COPY_TIMEOUT: Duration = Duration::from_secs(5);

/// Something that can place text on a clipboard.
///
/// Backends live on the worker thread only, so they need not be `Send`.
pub trait ClipboardBackend {
    fn set_text(&mut self, text: &str) -> std::result::Result<(), String>;
}

/// System clipboard via `arboard`, opened on first use
#[derive(Default)]
pub struct SystemClipboard {
    inner: Option<arboard::Clipboard>,
}

impl ClipboardBackend for SystemClipboard {
    fn set_text(&mut self, text: &str) -> std::result::Result<(), String> {
        if self.inner.is_none() {
            let clipboard = arboard::Clipboard::new()
                .map_err(|e| format!("failed to access clipboard: {}", e))?;
            self.inner = Some(clipboard);
        }
        match self.inner.as_mut() {
            Some(clipboard) => clipboard
                .set_text(text.to_string())
                .map_err(|e| format!("failed to copy to clipboard: {}", e)),
            None => Err("clipboard unavailable".to_string()),
        }
    }
}

struct CopyRequest {
    id: Uuid,
    text: String,
}

struct CopyCompletion {
    id: Uuid,
    outcome: std::result::Result<(), String>,
}

type Pending = Arc<Mutex<HashMap<Uuid, oneshot::Sender<std::result::Result<(), String>>>>>;

/// Issues clipboard requests and correlates their completions
pub struct ClipboardBroker {
    requests: mpsc::UnboundedSender<CopyRequest>,
    pending: Pending,
}

impl ClipboardBroker {
    /// Start the worker thread (building its backend there) and the
    /// completion dispatcher.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<B, F>(make_backend: F) -> Self
    where
        B: ClipboardBackend,
        F: FnOnce() -> B + Send + 'static,
    {
        let (request_tx, mut request_rx) = mpsc::unbounded_channel::<CopyRequest>();
        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<CopyCompletion>();
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));

        std::thread::spawn(move || {
            let mut backend = make_backend();
            while let Some(request) = request_rx.blocking_recv() {
                let outcome = backend.set_text(&request.text);
                if done_tx.send(CopyCompletion { id: request.id, outcome }).is_err() {
                    break;
                }
            }
        });

        let dispatch_pending = pending.clone();
        tokio::spawn(async move {
            while let Some(done) = done_rx.recv().await {
                let waiter = lock(&dispatch_pending).remove(&done.id);
                match waiter {
                    Some(tx) => {
                        let _ = tx.send(done.outcome);
                    }
                    None => tracing::debug!("Dropping clipboard completion for unknown request {}", done.id),
                }
            }
        });

        Self {
            requests: request_tx,
            pending,
        }
    }

    /// Copy `text` and wait for the worker to confirm
    pub async fn copy(&self, text: &str) -> Result<()> {
        let id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(id, tx);

        let request = CopyRequest {
            id,
            text: text.to_string(),
        };
        if self.requests.send(request).is_err() {
            lock(&self.pending).remove(&id);
            return Err(Error::Clipboard("clipboard worker has stopped".to_string()));
        }

        match tokio::time::timeout(COPY_TIMEOUT, rx).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(e))) => Err(Error::Clipboard(e)),
            Ok(Err(_)) => Err(Error::Clipboard("clipboard request dropped".to_string())),
            Err(_) => {
                lock(&self.pending).remove(&id);
                Err(Error::Clipboard("clipboard request timed out".to_string()))
            }
        }
    }

    /// Requests still waiting for a completion
    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RecordingBackend {
        copied: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl ClipboardBackend for RecordingBackend {
        fn set_text(&mut self, text: &str) -> std::result::Result<(), String> {
            if self.fail {
                return Err("no display".to_string());
            }
            self.copied.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_copy_round_trip() {
        let copied = Arc::new(Mutex::new(Vec::new()));
        let backend = RecordingBackend {
            copied: copied.clone(),
            fail: false,
        };
        let broker = ClipboardBroker::spawn(move || backend);

        broker.copy("https://teams/join/1").await.unwrap();
        broker.copy("https://teams/join/2").await.unwrap();

        assert_eq!(
            *copied.lock().unwrap(),
            vec!["https://teams/join/1", "https://teams/join/2"]
        );
        assert_eq!(broker.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_copies_are_correlated() {
        let copied = Arc::new(Mutex::new(Vec::new()));
        let backend = RecordingBackend {
            copied: copied.clone(),
            fail: false,
        };
        let broker = ClipboardBroker::spawn(move || backend);

        let (a, b, c) = tokio::join!(broker.copy("a"), broker.copy("b"), broker.copy("c"));
        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(copied.lock().unwrap().len(), 3);
        assert_eq!(broker.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_backend_failure_surfaces() {
        let backend = RecordingBackend {
            copied: Arc::new(Mutex::new(Vec::new())),
            fail: true,
        };
        let broker = ClipboardBroker::spawn(move || backend);

        let err = broker.copy("x").await.unwrap_err();
        assert!(matches!(err, Error::Clipboard(ref msg) if msg == "no display"));
        assert_eq!(broker.pending_count(), 0);
    }
}
