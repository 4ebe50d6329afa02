//! Background sync collaborators.
//!
//! The worker reacts to two platform-fired tags: [`CONTACT_FORM_SYNC`]
//! drains queued form submissions once connectivity returns, and
//! [`CONTENT_SYNC`] refreshes the configured content assets. The submission
//! queue itself is an external collaborator behind [`SubmissionQueue`]; the
//! worker only reports per-item success and leaves rescheduling of failures
//! to the platform.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;

use offkit_common::{OffkitError, Result};

/// Sync tag for queued contact form submissions.
pub const CONTACT_FORM_SYNC: &str = "contact-form-sync";

/// Periodic sync tag for content refresh.
pub const CONTENT_SYNC: &str = "content-sync";

/// A form submission captured while offline.
#[derive(Debug, Clone)]
pub struct PendingSubmission {
    pub id: u64,
    pub body: Bytes,
    pub content_type: String,
}

/// Store of submissions awaiting delivery.
#[async_trait]
pub trait SubmissionQueue: Send + Sync {
    /// Submissions still awaiting delivery, oldest first.
    async fn pending(&self) -> Result<Vec<PendingSubmission>>;

    /// Remove a delivered submission.
    async fn remove(&self, id: u64) -> Result<()>;
}

/// Outcome of one sync drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Submissions delivered and removed from the queue.
    pub delivered: usize,
    /// Submissions that failed and stay queued for the platform's retry.
    pub failed: usize,
}

/// In-memory queue for tests and simple embedders.
#[derive(Default)]
pub struct MemoryQueue {
    items: Mutex<Vec<PendingSubmission>>,
    next_id: AtomicU64,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a submission, returning its id.
    pub fn push(&self, body: Bytes, content_type: impl Into<String>) -> Result<u64> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.items
            .lock()
            .map_err(|_| OffkitError::sync("submission queue lock poisoned"))?
            .push(PendingSubmission {
                id,
                body,
                content_type: content_type.into(),
            });
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.items.lock().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SubmissionQueue for MemoryQueue {
    async fn pending(&self) -> Result<Vec<PendingSubmission>> {
        Ok(self
            .items
            .lock()
            .map_err(|_| OffkitError::sync("submission queue lock poisoned"))?
            .clone())
    }

    async fn remove(&self, id: u64) -> Result<()> {
        self.items
            .lock()
            .map_err(|_| OffkitError::sync("submission queue lock poisoned"))?
            .retain(|item| item.id != id);
        Ok(())
    }
}
