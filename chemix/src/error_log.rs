//! Append-only sink for errors raised by running reactions.
//!
//! Reaction bodies execute on pool threads, detached from the thread that
//! emitted their inputs, so their failures cannot propagate through a return
//! value. They flow instead through the reply slot of a blocking waiter, when
//! one exists, and through an [`ErrorLog`] in all cases. A log handle can be
//! injected at site construction so that several sites share one sink and so
//! that tests can observe failures deterministically.

use std::fmt;
use std::sync::{Arc, Mutex};

/// A failure recorded while executing a reaction body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionFailure {
    /// Header of the site that scheduled the reaction.
    pub site: String,
    /// Display form of the failed reaction.
    pub reaction: String,
    /// Human-readable description of the failure.
    pub message: String,
}

impl fmt::Display for ReactionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// A clonable handle to an append-only list of reaction failures.
///
/// All clones share the same underlying list. Entries are only ever appended;
/// [`entries()`](ErrorLog::entries) returns a snapshot taken under the log's
/// internal lock.
#[derive(Debug, Clone, Default)]
pub struct ErrorLog {
    entries: Arc<Mutex<Vec<ReactionFailure>>>,
}

impl ErrorLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a failure record.
    pub(crate) fn push(&self, failure: ReactionFailure) {
        self.entries.lock().unwrap().push(failure);
    }

    /// Returns a snapshot of all failures recorded so far.
    pub fn entries(&self) -> Vec<ReactionFailure> {
        self.entries.lock().unwrap().clone()
    }

    /// Returns the number of failures recorded so far.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Returns `true` if no failure was recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
