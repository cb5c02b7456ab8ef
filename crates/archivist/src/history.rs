//! Bounded history of recently received responses.

use std::collections::VecDeque;

/// How many responses the client retains by default.
pub(crate) const DEFAULT_RESPONSE_HISTORY: usize = 10;

/// A captured HTTP exchange, kept for post-mortem inspection.
///
/// The body is an excerpt of the decoded text, not the raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseSnapshot {
    /// HTTP method of the request.
    pub method: String,
    /// Full URL the request was sent to.
    pub url: String,
    /// Response status code.
    pub status: u16,
    /// Excerpt of the response body text.
    pub body: String,
}

/// Fixed-capacity ring of the most recent responses, oldest evicted first.
#[derive(Debug)]
pub(crate) struct ResponseHistory {
    entries: VecDeque<ResponseSnapshot>,
    capacity: usize,
}

impl ResponseHistory {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub(crate) fn push(&mut self, snapshot: ResponseSnapshot) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(snapshot);
    }

    /// Retained responses, oldest first.
    pub(crate) fn snapshot(&self) -> Vec<ResponseSnapshot> {
        self.entries.iter().cloned().collect()
    }
}
