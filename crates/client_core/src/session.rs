//! Scoped error-report container.
//!
//! Callers that own user-visible reporting push failed operations here; the
//! UI drains the log for display and can subscribe to hear about new reports
//! as they land. One `ErrorLog` is created at app start and dropped at
//! sign-out; nothing is process-global.

use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};

use crate::error::ClientError;

pub struct ErrorLog {
    entries: Mutex<Vec<Arc<ClientError>>>,
    reports: broadcast::Sender<Arc<ClientError>>,
}

impl ErrorLog {
    pub fn new() -> Self {
        let (reports, _) = broadcast::channel(64);
        Self {
            entries: Mutex::new(Vec::new()),
            reports,
        }
    }

    /// Record a failure and notify subscribers. Returns the shared report so
    /// the caller can keep a handle to what it logged.
    pub async fn push(&self, error: ClientError) -> Arc<ClientError> {
        let report = Arc::new(error);
        self.entries.lock().await.push(Arc::clone(&report));
        let _ = self.reports.send(Arc::clone(&report));
        report
    }

    /// Take every pending report, leaving the log empty.
    pub async fn drain(&self) -> Vec<Arc<ClientError>> {
        let mut entries = self.entries.lock().await;
        std::mem::take(&mut *entries)
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ClientError>> {
        self.reports.subscribe()
    }
}

impl Default for ErrorLog {
    fn default() -> Self {
        Self::new()
    }
}
