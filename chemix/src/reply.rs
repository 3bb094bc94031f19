//! One-shot reply slots backing blocking emissions.
//!
//! Every blocking emission creates one slot. The emitting thread parks on the
//! slot until a consuming reaction replies, the optional timeout elapses, or
//! the reaction finishes abnormally. The slot is a four-state machine with an
//! exactly-once transition out of the waiting state:
//!
//! ```text
//! Waiting ──► Replied(R) | TimedOut | Failed(reason)
//! ```
//!
//! The consuming side holds a move-only [`ReplyToken`]; replying consumes the
//! token, so a reaction body cannot reply twice. The checked variant returns
//! the token (and the value) back when the waiter has already given up, which
//! lets a body detect that its consumer timed out.

use std::error::Error;
use std::fmt;
use std::mem;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Instant;

/// State of a reply slot.
enum ReplyState<R> {
    /// The emitting thread is waiting (or about to wait).
    Waiting,
    /// A reaction replied; the value has not been taken yet.
    Replied(R),
    /// The waiter's timeout elapsed before any reply.
    TimedOut,
    /// The consuming reaction finished without a valid reply.
    Failed(String),
    /// The waiter took the outcome; the slot is spent.
    Spent,
}

/// Shared state of one reply slot.
pub(crate) struct ReplyCore<R> {
    state: Mutex<ReplyState<R>>,
    resolved: Condvar,
}

impl<R: Send + 'static> ReplyCore<R> {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ReplyState::Waiting),
            resolved: Condvar::new(),
        })
    }

    /// Attempts the `Waiting → Replied` transition.
    ///
    /// Returns the value back if the waiter is no longer there.
    fn try_reply(&self, value: R) -> Result<(), R> {
        let mut state = self.state.lock().unwrap();
        match &*state {
            ReplyState::Waiting => {
                *state = ReplyState::Replied(value);
                self.resolved.notify_one();
                Ok(())
            }
            _ => Err(value),
        }
    }
}

/// Type-erased view of a reply slot, used by the reaction completion hook.
pub(crate) trait ReplyStatus: Send + Sync {
    /// Performs the `Waiting → Failed` transition.
    ///
    /// Returns `true` iff the slot was still waiting, i.e. the reaction never
    /// replied to a live waiter. A slot that already timed out is left alone:
    /// the consumer gave up and no reply was owed anymore.
    fn fail_if_unreplied(&self, message: String) -> bool;
}

impl<R: Send + 'static> ReplyStatus for ReplyCore<R> {
    fn fail_if_unreplied(&self, message: String) -> bool {
        let mut state = self.state.lock().unwrap();
        match &*state {
            ReplyState::Waiting => {
                *state = ReplyState::Failed(message);
                self.resolved.notify_one();
                true
            }
            _ => false,
        }
    }
}

/// Outcome of a blocking wait.
pub(crate) enum WaitOutcome<R> {
    Replied(R),
    TimedOut,
    Failed(String),
}

/// The waiting half of a reply slot, held by the emitting thread.
pub(crate) struct ReplyReceiver<R> {
    core: Arc<ReplyCore<R>>,
}

impl<R: Send + 'static> ReplyReceiver<R> {
    pub(crate) fn new(core: Arc<ReplyCore<R>>) -> Self {
        Self { core }
    }

    /// Blocks until the slot resolves, or until the deadline.
    ///
    /// On timeout the slot atomically transitions to `TimedOut` under the same
    /// lock that guards replies, so a reply and a timeout can never both
    /// succeed.
    pub(crate) fn wait(self, deadline: Option<Instant>) -> WaitOutcome<R> {
        let mut state = self.core.state.lock().unwrap();
        loop {
            match &*state {
                ReplyState::Waiting => {}
                _ => break,
            }
            match deadline {
                None => state = self.core.resolved.wait(state).unwrap(),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        *state = ReplyState::TimedOut;
                        return WaitOutcome::TimedOut;
                    }
                    let (guard, _) = self
                        .core
                        .resolved
                        .wait_timeout(state, deadline - now)
                        .unwrap();
                    state = guard;
                }
            }
        }
        match mem::replace(&mut *state, ReplyState::Spent) {
            ReplyState::Replied(value) => WaitOutcome::Replied(value),
            ReplyState::Failed(message) => WaitOutcome::Failed(message),
            // `TimedOut` and `Spent` are only ever written by this receiver,
            // and `Waiting` is excluded by the loop above.
            _ => unreachable!("reply slot resolved to an impossible state"),
        }
    }
}

/// The replying half of a reply slot, handed to the reaction body that
/// consumed the blocking molecule.
///
/// The token is move-only: [`reply`](ReplyToken::reply) and
/// [`reply_checked`](ReplyToken::reply_checked) consume it, so at most one
/// reply can ever reach the waiter.
pub struct ReplyToken<R: Send + 'static> {
    core: Arc<ReplyCore<R>>,
}

impl<R: Send + 'static> ReplyToken<R> {
    pub(crate) fn new(core: Arc<ReplyCore<R>>) -> Self {
        Self { core }
    }

    /// Replies to the waiter.
    ///
    /// If the waiter already timed out the value is silently dropped; use
    /// [`reply_checked`](ReplyToken::reply_checked) to observe that case.
    pub fn reply(self, value: R) {
        let _ = self.core.try_reply(value);
    }

    /// Replies to the waiter, reporting whether the reply was delivered.
    ///
    /// On failure the waiter is gone (its timeout elapsed) and the value and
    /// token are handed back inside the error.
    pub fn reply_checked(self, value: R) -> Result<(), RefusedReply<R>> {
        match self.core.try_reply(value) {
            Ok(()) => Ok(()),
            Err(value) => Err(RefusedReply { value, token: self }),
        }
    }
}

impl<R: Send + 'static> fmt::Debug for ReplyToken<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplyToken").finish_non_exhaustive()
    }
}

/// Error returned when a checked reply finds that the waiter gave up.
pub struct RefusedReply<R: Send + 'static> {
    value: R,
    token: ReplyToken<R>,
}

impl<R: Send + 'static> RefusedReply<R> {
    /// Returns the undelivered value and the reply token.
    pub fn into_parts(self) -> (R, ReplyToken<R>) {
        (self.value, self.token)
    }
}

impl<R: Send + 'static> fmt::Debug for RefusedReply<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefusedReply").finish_non_exhaustive()
    }
}

impl<R: Send + 'static> fmt::Display for RefusedReply<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "the emitting thread timed out before the reply")
    }
}

impl<R: Send + 'static> Error for RefusedReply<R> {}
