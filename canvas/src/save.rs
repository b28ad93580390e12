//! Save coordination for one editing session.
//!
//! DESIGN
//! ======
//! `SaveQueue` performs no I/O. The host asks it for a [`SaveRequest`], sends
//! the document however it likes, and reports the result back through
//! [`SaveQueue::complete`]. At most one request is in flight; anything
//! requested meanwhile waits in a single slot where a newer document replaces
//! an older one, so saves never interleave and the last edit always wins.
//!
//! A document that has never been saved gets its id here, once, before the
//! first request leaves. Retries and later saves carry the same id, so a create
//! whose response was lost turns into an update on the next attempt instead of
//! a second record.
//!
//! Only transient failures are retried. Validation and permission failures are
//! surfaced immediately and the local document is left as it was, so no work
//! is lost when a save cannot complete.

#[cfg(test)]
#[path = "save_test.rs"]
mod save_test;

use markup::{DocumentId, MarkupDocument};
use uuid::Uuid;

use crate::consts::{SAVE_MAX_ATTEMPTS, SAVE_RETRY_BASE_MS};

/// Identifies one in-flight request.
pub type Ticket = u64;

/// Why a save did not complete.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SaveFailure {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("transient I/O error: {0}")]
    Transient(String),
}

impl SaveFailure {
    /// Whether the same request may succeed if sent again.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Bounded exponential backoff for transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: SAVE_MAX_ATTEMPTS, base_delay_ms: SAVE_RETRY_BASE_MS }
    }
}

impl RetryPolicy {
    /// Delay before the next attempt after `attempts_made` failures, or `None`
    /// once the budget is spent.
    #[must_use]
    pub fn delay_after(&self, attempts_made: u32) -> Option<u64> {
        if attempts_made == 0 || attempts_made >= self.max_attempts {
            return None;
        }
        Some(self.base_delay_ms.saturating_mul(1 << (attempts_made - 1).min(16)))
    }
}

/// A save the host should perform now (after `delay_ms`).
#[derive(Debug, Clone, PartialEq)]
pub struct SaveRequest {
    pub ticket: Ticket,
    pub document: MarkupDocument,
    /// 1 for the first try.
    pub attempt: u32,
    pub delay_ms: u64,
}

/// Something to show the user.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveEvent {
    /// The server's copy; feed it to `EditorSession::apply_saved`.
    Saved(MarkupDocument),
    Failed { error: SaveFailure, attempts: u32 },
}

/// Result of [`SaveQueue::complete`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaveOutcome {
    pub event: Option<SaveEvent>,
    /// The next request to start, if any.
    pub next: Option<SaveRequest>,
}

struct InFlight {
    ticket: Ticket,
    document: MarkupDocument,
    attempt: u32,
}

pub struct SaveQueue {
    policy: RetryPolicy,
    next_ticket: Ticket,
    in_flight: Option<InFlight>,
    queued: Option<MarkupDocument>,
    draft_id: Option<DocumentId>,
    closed: bool,
}

impl Default for SaveQueue {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl SaveQueue {
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy, next_ticket: 1, in_flight: None, queued: None, draft_id: None, closed: false }
    }

    /// Ask to persist `document`. Returns a request to start now, or `None`
    /// when one is already in flight (the document is queued, replacing any
    /// older queued copy) or the session is closed.
    ///
    /// A document without an id is given the session's draft id first.
    pub fn request(&mut self, document: MarkupDocument) -> Option<SaveRequest> {
        if self.closed {
            tracing::debug!("save requested after close; ignored");
            return None;
        }
        let document = self.assign_id(document);
        if self.in_flight.is_some() {
            if self.queued.replace(document).is_some() {
                tracing::debug!("coalesced queued save");
            }
            return None;
        }
        Some(self.start(document, 1, 0))
    }

    /// Resolve the in-flight request identified by `ticket`.
    pub fn complete(&mut self, ticket: Ticket, result: Result<MarkupDocument, SaveFailure>) -> SaveOutcome {
        let Some(done) = self.in_flight.take_if(|f| f.ticket == ticket) else {
            tracing::warn!(ticket, "completion for unknown save ticket");
            return SaveOutcome::default();
        };

        match result {
            Ok(saved) => {
                let next = self.queued.take().filter(|_| !self.closed).map(|queued| self.start(queued, 1, 0));
                let event = (!self.closed).then_some(SaveEvent::Saved(saved));
                SaveOutcome { event, next }
            }
            Err(error) => {
                if !self.closed && error.is_retryable() {
                    if let Some(delay_ms) = self.policy.delay_after(done.attempt) {
                        tracing::debug!(attempt = done.attempt, delay_ms, %error, "retrying save");
                        let document = self.queued.take().unwrap_or(done.document);
                        return SaveOutcome { event: None, next: Some(self.start(document, done.attempt + 1, delay_ms)) };
                    }
                }
                tracing::warn!(attempts = done.attempt, %error, "save failed");
                if self.closed {
                    self.queued = None;
                    return SaveOutcome::default();
                }
                let next = self.queued.take().map(|queued| self.start(queued, 1, 0));
                SaveOutcome { event: Some(SaveEvent::Failed { error, attempts: done.attempt }), next }
            }
        }
    }

    /// The editor is gone. Pending completions are still accepted but nothing
    /// is reported back and nothing new starts.
    pub fn close(&mut self) {
        self.closed = true;
        self.queued = None;
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    #[must_use]
    pub fn in_flight(&self) -> Option<Ticket> {
        self.in_flight.as_ref().map(|f| f.ticket)
    }

    #[must_use]
    pub fn has_queued(&self) -> bool {
        self.queued.is_some()
    }

    fn assign_id(&mut self, mut document: MarkupDocument) -> MarkupDocument {
        if document.is_draft() {
            let id = *self.draft_id.get_or_insert_with(Uuid::new_v4);
            tracing::debug!(%id, "assigned id to new document");
            document.id = Some(id);
        }
        document
    }

    fn start(&mut self, document: MarkupDocument, attempt: u32, delay_ms: u64) -> SaveRequest {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.in_flight = Some(InFlight { ticket, document: document.clone(), attempt });
        SaveRequest { ticket, document, attempt, delay_ms }
    }
}
