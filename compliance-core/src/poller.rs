//! Document processing poller
//!
//! Uploaded documents are processed server-side. The poller asks for the
//! document on a self-rescheduling timer until it is ready or failed:
//!
//! - unexpected errors back off to a longer retry interval
//! - a definitive "not found" stops polling and forgets the document
//! - stopping or dropping the handle ends the loop at its next step

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::api::RequirementsApi;
use crate::error::ApiError;
use crate::models::{Document, DocumentStatus};

/// Poller timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    /// Delay between polls while the document is processing
    pub interval: Duration,
    /// Delay after an unexpected error
    pub error_backoff: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            error_backoff: Duration::from_secs(15),
        }
    }
}

/// Latest known state of a polled document
#[derive(Debug, Clone, PartialEq)]
pub enum PollStatus {
    /// Still processing
    Waiting(DocumentStatus),
    /// Last poll failed; retrying after the backoff
    Retrying(ApiError),
    /// Reached ready or failed
    Finished(Document),
    /// The service no longer knows the document
    Missing,
    Stopped,
}

impl PollStatus {
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            PollStatus::Finished(_) | PollStatus::Missing | PollStatus::Stopped
        )
    }
}

/// Polls `id` until it settles or `running` is cleared.
///
/// `on_status` sees every intermediate state.
pub async fn poll_until_settled<A, F>(
    api: &A,
    id: &str,
    config: &PollerConfig,
    running: &Cell<bool>,
    on_status: F,
) -> PollStatus
where
    A: RequirementsApi + ?Sized,
    F: Fn(&PollStatus),
{
    loop {
        if !running.get() {
            return PollStatus::Stopped;
        }

        let result = api.get_document(id).await;
        if !running.get() {
            debug!("Dropping poll result for {} after stop", id);
            return PollStatus::Stopped;
        }

        let delay = match result {
            Ok(document) if document.status.is_terminal() => {
                debug!("Document {} settled as {}", id, document.status);
                return PollStatus::Finished(document);
            }
            Ok(document) => {
                on_status(&PollStatus::Waiting(document.status));
                config.interval
            }
            Err(err) if err.is_not_found() => {
                debug!("Document {} not found, polling stopped", id);
                return PollStatus::Missing;
            }
            Err(err) => {
                warn!("Polling document {} failed: {}", id, err);
                on_status(&PollStatus::Retrying(err));
                config.error_backoff
            }
        };

        tokio::time::sleep(delay).await;
    }
}

/// Background poll of one document on the local task set
pub struct DocumentPoller {
    running: Rc<Cell<bool>>,
    tracked: Rc<RefCell<Option<String>>>,
    status_rx: watch::Receiver<PollStatus>,
    task: Option<JoinHandle<()>>,
}

impl DocumentPoller {
    /// Starts polling. Must be called from within a `tokio::task::LocalSet`.
    pub fn start<A>(api: Rc<A>, id: impl Into<String>, config: PollerConfig) -> Self
    where
        A: RequirementsApi + 'static,
    {
        let id = id.into();
        let running = Rc::new(Cell::new(true));
        let tracked = Rc::new(RefCell::new(Some(id.clone())));
        let (status_tx, status_rx) = watch::channel(PollStatus::Waiting(DocumentStatus::Pending));

        let task_running = Rc::clone(&running);
        let task_tracked = Rc::clone(&tracked);
        let task = tokio::task::spawn_local(async move {
            let outcome = poll_until_settled(&*api, &id, &config, &task_running, |status| {
                let _ = status_tx.send(status.clone());
            })
            .await;

            if outcome == PollStatus::Missing {
                *task_tracked.borrow_mut() = None;
            }
            task_running.set(false);
            let _ = status_tx.send(outcome);
        });

        Self {
            running,
            tracked,
            status_rx,
            task: Some(task),
        }
    }

    /// Document being polled; cleared when the service reports it missing
    pub fn tracked_id(&self) -> Option<String> {
        self.tracked.borrow().clone()
    }

    pub fn status(&self) -> PollStatus {
        self.status_rx.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    /// Next status change, or `None` once the poll task has ended
    pub async fn changed(&mut self) -> Option<PollStatus> {
        self.status_rx.changed().await.ok()?;
        Some(self.status())
    }

    /// Waits for a final status
    pub async fn wait(&mut self) -> PollStatus {
        loop {
            let status = self.status();
            if status.is_final() {
                return status;
            }
            if self.status_rx.changed().await.is_err() {
                return self.status();
            }
        }
    }

    /// Stops at the next step; an in-flight response is discarded
    pub fn stop(&self) {
        self.running.set(false);
    }
}

impl Drop for DocumentPoller {
    fn drop(&mut self) {
        self.running.set(false);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
