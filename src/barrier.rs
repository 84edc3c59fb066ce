//! Threshold barrier: collect exactly K contributions, then fire once
//!
//! Contributors call [`ThresholdBarrier::contribute`] and return straight
//! away. The initiator waits in [`ThresholdBarrier::await_full`]; the first
//! waiter to observe the barrier full takes the contributions, every later
//! waiter gets [`WaitError::AlreadyFired`].
//!
//! State lives behind a mutex. Every change is published on a `watch`
//! channel, which both wakes waiters and lets initiators render progress.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;

/// Where a barrier is in its single collect/fire cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Collecting,
    Full,
    Fired,
    Cancelled,
}

/// Snapshot published to progress subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub received: usize,
    pub expected: usize,
    pub phase: Phase,
}

/// Why a waiter came back without contributions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WaitError {
    #[error("barrier was cancelled")]
    Cancelled,

    #[error("timed out with {received}/{expected} contributions")]
    TimedOut { received: usize, expected: usize },

    #[error("barrier already fired")]
    AlreadyFired,
}

/// Why a contribution was turned away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefuseReason {
    /// The admission check rejected it
    NotAdmitted,
    /// The barrier already holds `expected` contributions
    Full,
    Cancelled,
}

/// A refused contribution, handed back to its owner
#[derive(Debug)]
pub struct Refused<C> {
    pub contribution: C,
    pub reason: RefuseReason,
}

enum State<C> {
    Collecting(Vec<C>),
    Full(Vec<C>),
    Fired,
    Cancelled,
}

pub struct ThresholdBarrier<C> {
    expected: usize,
    state: Mutex<State<C>>,
    progress: watch::Sender<Progress>,
}

impl<C> ThresholdBarrier<C> {
    /// Creates a barrier that fires after `expected` contributions
    ///
    /// A barrier expecting nothing starts out full.
    #[must_use]
    pub fn new(expected: usize) -> Self {
        let (state, phase) = if expected == 0 {
            (State::Full(Vec::new()), Phase::Full)
        } else {
            (State::Collecting(Vec::with_capacity(expected)), Phase::Collecting)
        };
        let (progress, _) = watch::channel(Progress {
            received: 0,
            expected,
            phase,
        });
        Self {
            expected,
            state: Mutex::new(state),
            progress,
        }
    }

    #[must_use]
    pub fn expected(&self) -> usize {
        self.expected
    }

    /// Current progress snapshot
    #[must_use]
    pub fn progress(&self) -> Progress {
        *self.progress.borrow()
    }

    /// Subscribes to progress changes
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Progress> {
        self.progress.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, State<C>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueues a contribution
    ///
    /// # Errors
    /// Hands the contribution back if the barrier is full or cancelled
    pub fn contribute(&self, contribution: C) -> Result<Progress, Refused<C>> {
        self.contribute_if(contribution, |_| true)
    }

    /// Enqueues a contribution if `admit` accepts it given the contributions
    /// already collected
    ///
    /// The check and the enqueue happen under the same lock, so two racing
    /// contributors cannot both pass a uniqueness check.
    ///
    /// # Errors
    /// Hands the contribution back if it was not admitted, or if the barrier
    /// is full or cancelled
    pub fn contribute_if<F>(&self, contribution: C, admit: F) -> Result<Progress, Refused<C>>
    where
        F: FnOnce(&[C]) -> bool,
    {
        let mut state = self.lock();
        let items = match &mut *state {
            State::Collecting(items) => items,
            State::Full(_) | State::Fired => {
                return Err(Refused {
                    contribution,
                    reason: RefuseReason::Full,
                });
            }
            State::Cancelled => {
                return Err(Refused {
                    contribution,
                    reason: RefuseReason::Cancelled,
                });
            }
        };

        if !admit(items.as_slice()) {
            return Err(Refused {
                contribution,
                reason: RefuseReason::NotAdmitted,
            });
        }

        items.push(contribution);
        let received = items.len();
        let phase = if received == self.expected {
            let items = std::mem::take(items);
            *state = State::Full(items);
            Phase::Full
        } else {
            Phase::Collecting
        };

        let progress = Progress {
            received,
            expected: self.expected,
            phase,
        };
        self.progress.send_replace(progress);
        Ok(progress)
    }

    /// Takes the contributions if the barrier is full, or reports a terminal phase
    fn try_take(&self) -> Option<Result<Vec<C>, WaitError>> {
        let mut state = self.lock();
        match &*state {
            State::Collecting(_) => None,
            State::Fired => Some(Err(WaitError::AlreadyFired)),
            State::Cancelled => Some(Err(WaitError::Cancelled)),
            State::Full(_) => {
                let State::Full(items) = std::mem::replace(&mut *state, State::Fired) else {
                    unreachable!("matched Full above");
                };
                self.progress.send_replace(Progress {
                    received: items.len(),
                    expected: self.expected,
                    phase: Phase::Fired,
                });
                Some(Ok(items))
            }
        }
    }

    /// Waits until exactly `expected` contributions are in, then returns them
    /// in arrival order
    ///
    /// Dropping the future loses nothing: enqueued contributions stay in the
    /// barrier for the next waiter.
    ///
    /// # Errors
    /// [`WaitError::AlreadyFired`] if another waiter took the contributions,
    /// [`WaitError::Cancelled`] if the barrier was torn down
    pub async fn await_full(&self) -> Result<Vec<C>, WaitError> {
        let mut changes = self.progress.subscribe();
        loop {
            changes.borrow_and_update();
            if let Some(outcome) = self.try_take() {
                return outcome;
            }
            if changes.changed().await.is_err() {
                return Err(WaitError::Cancelled);
            }
        }
    }

    /// [`await_full`](Self::await_full) bounded by `timeout`
    ///
    /// # Errors
    /// [`WaitError::TimedOut`] when the deadline passes first; contributions
    /// collected so far are kept
    pub async fn await_full_timeout(&self, timeout: Duration) -> Result<Vec<C>, WaitError> {
        match tokio::time::timeout(timeout, self.await_full()).await {
            Ok(outcome) => outcome,
            Err(_) => {
                let progress = self.progress();
                Err(WaitError::TimedOut {
                    received: progress.received,
                    expected: progress.expected,
                })
            }
        }
    }

    /// Tears the barrier down, dropping any contributions not yet taken and
    /// waking every waiter with [`WaitError::Cancelled`]
    ///
    /// Returns how many contributions were discarded. A barrier that already
    /// fired is left alone.
    pub fn cancel(&self) -> usize {
        let mut state = self.lock();
        let discarded = match &*state {
            State::Collecting(items) | State::Full(items) => items.len(),
            State::Fired | State::Cancelled => return 0,
        };
        *state = State::Cancelled;
        self.progress.send_replace(Progress {
            received: 0,
            expected: self.expected,
            phase: Phase::Cancelled,
        });
        discarded
    }
}
