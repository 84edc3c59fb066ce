//! Registry of live coordination sessions
//!
//! One [`CoordinationRegistry`] is owned by the engine for the lifetime of the
//! process. It maps (secret, protocol) to the session collecting
//! contributions for it. Nothing here is persisted: after a restart a
//! `Signing` secret has no session and can only be aborted, a `Ready` secret
//! can simply be combined again.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::barrier::ThresholdBarrier;
use crate::contribution::{FragmentContribution, PassphraseContribution};
use crate::domain::{SecretId, UserId};

/// Which threshold protocol a session belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolKind {
    /// Holders sign with passphrases until every share can be created
    Signing,
    /// Holders unsign their shares until the secret can be recovered
    Combining,
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolKind::Signing => write!(f, "signing"),
            ProtocolKind::Combining => write!(f, "combine"),
        }
    }
}

/// A live rendezvous for one secret and one protocol
pub struct CoordinationSession<C> {
    pub secret: SecretId,
    pub kind: ProtocolKind,
    /// Owner for signing, requester for combining
    pub initiator: UserId,
    pub started_at: DateTime<Utc>,
    pub barrier: ThresholdBarrier<C>,
}

/// Sessions of a single protocol kind, keyed by secret
pub struct SessionTable<C> {
    kind: ProtocolKind,
    sessions: Mutex<HashMap<SecretId, Arc<CoordinationSession<C>>>>,
}

impl<C> SessionTable<C> {
    #[must_use]
    pub fn new(kind: ProtocolKind) -> Self {
        Self {
            kind,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn kind(&self) -> ProtocolKind {
        self.kind
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SecretId, Arc<CoordinationSession<C>>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the session for `secret`, creating it if there is none
    ///
    /// The boolean is `true` only for the caller that created the session;
    /// racing callers all get the same session.
    pub fn get_or_create(
        &self,
        secret: SecretId,
        expected: usize,
        initiator: UserId,
    ) -> (Arc<CoordinationSession<C>>, bool) {
        match self.lock().entry(secret) {
            Entry::Occupied(entry) => (entry.get().clone(), false),
            Entry::Vacant(entry) => {
                let session = Arc::new(CoordinationSession {
                    secret,
                    kind: self.kind,
                    initiator,
                    started_at: Utc::now(),
                    barrier: ThresholdBarrier::new(expected),
                });
                debug!(secret.id = %secret, kind = %self.kind, expected, "coordination session opened");
                (entry.insert(session).clone(), true)
            }
        }
    }

    #[must_use]
    pub fn get(&self, secret: &SecretId) -> Option<Arc<CoordinationSession<C>>> {
        self.lock().get(secret).cloned()
    }

    /// Removes the session for `secret` and tears its barrier down
    pub fn remove(&self, secret: &SecretId) -> Option<Arc<CoordinationSession<C>>> {
        let session = self.lock().remove(secret)?;
        self.teardown(&session);
        Some(session)
    }

    /// Removes `session` only if it is still the registered one
    ///
    /// Returns `false` when the slot was already cleared or reused.
    pub fn retire(&self, session: &Arc<CoordinationSession<C>>) -> bool {
        let removed = {
            let mut sessions = self.lock();
            match sessions.get(&session.secret) {
                Some(current) if Arc::ptr_eq(current, session) => {
                    sessions.remove(&session.secret);
                    true
                }
                _ => false,
            }
        };
        self.teardown(session);
        removed
    }

    fn teardown(&self, session: &CoordinationSession<C>) {
        let discarded = session.barrier.cancel();
        let open_for = Utc::now() - session.started_at;
        debug!(
            secret.id = %session.secret,
            kind = %self.kind,
            discarded,
            open_ms = open_for.num_milliseconds(),
            "coordination session closed"
        );
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Process-wide table of active signing and combine sessions
///
/// At most one session per secret per protocol exists at any time.
pub struct CoordinationRegistry {
    signing: SessionTable<PassphraseContribution>,
    combining: SessionTable<FragmentContribution>,
}

impl CoordinationRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            signing: SessionTable::new(ProtocolKind::Signing),
            combining: SessionTable::new(ProtocolKind::Combining),
        }
    }

    #[must_use]
    pub fn signing(&self) -> &SessionTable<PassphraseContribution> {
        &self.signing
    }

    #[must_use]
    pub fn combining(&self) -> &SessionTable<FragmentContribution> {
        &self.combining
    }

    /// Whether a session of protocol `kind` is registered for `secret`
    #[must_use]
    pub fn is_active(&self, secret: &SecretId, kind: ProtocolKind) -> bool {
        match kind {
            ProtocolKind::Signing => self.signing.get(secret).is_some(),
            ProtocolKind::Combining => self.combining.get(secret).is_some(),
        }
    }
}

impl Default for CoordinationRegistry {
    fn default() -> Self {
        Self::new()
    }
}
