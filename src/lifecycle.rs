//! Secret lifecycle: split by signing, recover by unsigning
//!
//! ```text
//! create ──► Signing ──(all parts signed, shares stored)──► Ready
//!               │
//!               └──(owner aborts, or the wait times out)──► Dead
//! ```
//!
//! `Ready` secrets can be combined any number of times; combining never
//! changes the record. Status changes are serialized through one lock so an
//! abort racing a completing split cannot resurrect a `Dead` secret or kill a
//! `Ready` one.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use zeroize::Zeroizing;

use crate::barrier::{Progress, RefuseReason, WaitError};
use crate::cipher::ShareCipher;
use crate::config::EngineConfig;
use crate::contribution::{FragmentContribution, PassphraseContribution};
use crate::domain::{Secret, SecretId, SecretStatus, Share, ShareIndex, SplitConfig};
use crate::error::{Error, Result};
use crate::primitive::{Fragments, SplittingPrimitive};
use crate::registry::{CoordinationRegistry, CoordinationSession, ProtocolKind};
use crate::repository::Repository;
use crate::session::SessionContext;

/// Result of offering a passphrase to a signing session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignOutcome {
    Accepted(Progress),
    /// This user already signed the secret; nothing changed
    AlreadySigned,
}

/// Result of offering a passphrase to a combine session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsignOutcome {
    Accepted { index: ShareIndex, progress: Progress },
    /// The user holds no share of this secret
    NoShares,
    /// None of the user's shares opened under the passphrase
    NoMatchingShare,
    /// The passphrase opened a share whose fragment is already in the session
    AlreadyContributed,
}

struct Inner {
    repo: Arc<dyn Repository>,
    primitive: Arc<dyn SplittingPrimitive>,
    registry: Arc<CoordinationRegistry>,
    cipher: ShareCipher,
    config: EngineConfig,
    transitions: Mutex<()>,
}

/// The coordination engine
///
/// Cheap to clone; clones share the same registry and repository.
#[derive(Clone)]
pub struct SecretLifecycle {
    inner: Arc<Inner>,
}

impl SecretLifecycle {
    #[must_use]
    pub fn new(
        repo: Arc<dyn Repository>,
        primitive: Arc<dyn SplittingPrimitive>,
        registry: Arc<CoordinationRegistry>,
        config: EngineConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                repo,
                primitive,
                registry,
                cipher: ShareCipher::new(config.kdf),
                config,
                transitions: Mutex::new(()),
            }),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &CoordinationRegistry {
        &self.inner.registry
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Loads a secret record
    ///
    /// # Errors
    /// [`Error::SecretNotFound`] or a repository error
    pub fn get_secret(&self, id: &SecretId) -> Result<Secret> {
        self.inner
            .repo
            .get_secret(id)?
            .ok_or(Error::SecretNotFound(*id))
    }

    /// Secrets owned by the session's user
    ///
    /// # Errors
    /// Propagates repository errors
    pub fn list(&self, ctx: &SessionContext) -> Result<Vec<Secret>> {
        self.inner.repo.list_secrets_for_user(&ctx.user_id())
    }

    /// Starts splitting `secret` among `config.share_count()` signers
    ///
    /// The owner's passphrase is the first signature. The returned handle
    /// keeps the raw secret; the owner awaits it to perform the split once
    /// everyone has signed. Dropping the handle before the wait settles
    /// aborts the secret, since nothing else can ever split it.
    ///
    /// # Errors
    /// [`Error::EmptySecret`] or a repository error
    pub fn create(
        &self,
        ctx: &SessionContext,
        label: &str,
        secret: Zeroizing<Vec<u8>>,
        passphrase: Zeroizing<String>,
        config: SplitConfig,
    ) -> Result<SigningHandle> {
        if secret.is_empty() {
            return Err(Error::EmptySecret);
        }

        let record = Secret::new(ctx.user_id(), label, config);
        self.inner.repo.create_secret(&record)?;

        let (session, _) = self.inner.registry.signing().get_or_create(
            record.id,
            usize::from(*config.share_count()),
            ctx.user_id(),
        );
        let first = PassphraseContribution {
            user: ctx.user_id(),
            username: ctx.username().to_string(),
            passphrase,
        };
        if let Err(refused) = session.barrier.contribute(first) {
            self.inner.registry.signing().retire(&session);
            return Err(refusal(record.id, ProtocolKind::Signing, refused.reason));
        }

        info!(
            secret.id = %record.id,
            user.name = %ctx.username(),
            parts = *record.parts,
            threshold = *record.threshold,
            "secret created, waiting for signatures"
        );

        Ok(SigningHandle {
            engine: self.clone(),
            secret: record,
            raw: secret,
            session,
            settled: false,
        })
    }

    /// Adds the session user's passphrase to the secret's signing session
    ///
    /// # Errors
    /// [`Error::InvalidStatus`] unless the secret is `Signing`,
    /// [`Error::NoActiveSession`] if nobody is waiting for signatures,
    /// [`Error::SessionFull`] or [`Error::Cancelled`] if the session closed first
    pub fn sign(
        &self,
        ctx: &SessionContext,
        id: &SecretId,
        passphrase: Zeroizing<String>,
    ) -> Result<SignOutcome> {
        self.get_secret(id)?.require(SecretStatus::Signing)?;
        let session = self
            .inner
            .registry
            .signing()
            .get(id)
            .ok_or(Error::NoActiveSession {
                id: *id,
                kind: ProtocolKind::Signing,
            })?;

        let user = ctx.user_id();
        let contribution = PassphraseContribution {
            user,
            username: ctx.username().to_string(),
            passphrase,
        };
        match session
            .barrier
            .contribute_if(contribution, |signed| signed.iter().all(|c| c.user != user))
        {
            Ok(progress) => {
                info!(
                    secret.id = %id,
                    user.name = %ctx.username(),
                    received = progress.received,
                    expected = progress.expected,
                    "secret signed"
                );
                Ok(SignOutcome::Accepted(progress))
            }
            Err(refused) if refused.reason == RefuseReason::NotAdmitted => {
                Ok(SignOutcome::AlreadySigned)
            }
            Err(refused) => Err(refusal(*id, ProtocolKind::Signing, refused.reason)),
        }
    }

    /// Gives up on a secret that is still collecting signatures
    ///
    /// Anyone waiting on the signing session is released with
    /// [`Error::Cancelled`]; passphrases collected so far are dropped.
    ///
    /// # Errors
    /// [`Error::NotPermitted`] for anyone but the owner,
    /// [`Error::InvalidStatus`] unless the secret is `Signing`
    pub fn abort(&self, ctx: &SessionContext, id: &SecretId) -> Result<Secret> {
        let secret = self.get_secret(id)?;
        if secret.owner != ctx.user_id() {
            return Err(Error::NotPermitted {
                id: *id,
                role: "owner",
                action: "abort it",
            });
        }
        let secret = self.kill(id)?;
        info!(secret.id = %id, user.name = %ctx.username(), "secret aborted");
        Ok(secret)
    }

    /// Moves a `Signing` secret to `Dead` and tears its session down
    fn kill(&self, id: &SecretId) -> Result<Secret> {
        let secret = {
            let _guard = self
                .inner
                .transitions
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let mut secret = self.get_secret(id)?;
            secret.require(SecretStatus::Signing)?;
            secret.transition_to(SecretStatus::Dead)?;
            self.inner.repo.update_secret(&secret)?;
            secret
        };
        self.inner.registry.signing().remove(id);
        Ok(secret)
    }

    /// Splits, seals and stores the shares once every passphrase is in
    ///
    /// Passphrases are paired with fragments in order: the n-th signature to
    /// arrive seals the fragment with the n-th smallest index.
    fn complete_signing(
        &self,
        id: SecretId,
        raw: &[u8],
        contributions: Vec<PassphraseContribution>,
    ) -> Result<Secret> {
        let config = self.get_secret(&id)?.split_config()?;
        if contributions.len() != usize::from(*config.share_count()) {
            return Err(Error::SplitFailed(format!(
                "collected {} signatures for {} parts",
                contributions.len(),
                *config.share_count()
            )));
        }

        let fragments = self.inner.primitive.split(raw, config)?;
        let shares = contributions
            .iter()
            .zip(&fragments)
            .map(|(signer, (index, fragment))| {
                debug!(secret.id = %id, user.name = %signer.username, index = %index, "sealing share");
                let sealed = self.inner.cipher.encrypt(fragment, &signer.passphrase)?;
                Ok(Share::new(id, signer.user, *index, sealed))
            })
            .collect::<Result<Vec<_>>>()?;
        drop(fragments);
        drop(contributions);

        let _guard = self
            .inner
            .transitions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut secret = self.get_secret(&id)?;
        secret.require(SecretStatus::Signing)?;

        for share in &shares {
            if let Err(e) = self.inner.repo.create_share(share) {
                self.rollback_shares(&id);
                return Err(e);
            }
        }
        secret.transition_to(SecretStatus::Ready)?;
        if let Err(e) = self.inner.repo.update_secret(&secret) {
            self.rollback_shares(&id);
            return Err(e);
        }

        info!(secret.id = %id, shares = shares.len(), "secret split and ready");
        Ok(secret)
    }

    fn rollback_shares(&self, id: &SecretId) {
        match self.inner.repo.delete_shares_for_secret(id) {
            Ok(removed) => warn!(secret.id = %id, removed, "rolled back partially stored shares"),
            Err(e) => error!(secret.id = %id, error = %e, "failed to roll back shares"),
        }
    }

    /// Opens a combine session for a `Ready` secret
    ///
    /// # Errors
    /// [`Error::InvalidStatus`] unless the secret is `Ready`,
    /// [`Error::SessionActive`] if someone is already combining it
    pub fn begin_combine(&self, ctx: &SessionContext, id: &SecretId) -> Result<CombineHandle> {
        let secret = self.get_secret(id)?;
        secret.require(SecretStatus::Ready)?;

        let (session, created) = self.inner.registry.combining().get_or_create(
            *id,
            usize::from(*secret.threshold),
            ctx.user_id(),
        );
        if !created {
            return Err(Error::SessionActive {
                id: *id,
                kind: ProtocolKind::Combining,
            });
        }

        info!(
            secret.id = %id,
            user.name = %ctx.username(),
            threshold = *secret.threshold,
            "combine started, waiting for unsignings"
        );
        Ok(CombineHandle {
            engine: self.clone(),
            secret,
            session,
        })
    }

    /// Decrypts one of the user's shares and adds its fragment to the
    /// secret's combine session
    ///
    /// A passphrase that opens none of the user's shares, or only shares
    /// already contributed, changes nothing and may be retried. Key
    /// derivation runs on the blocking pool.
    ///
    /// # Errors
    /// [`Error::InvalidStatus`] unless the secret is `Ready`,
    /// [`Error::NoActiveSession`] if nobody is combining it
    pub async fn unsign(&self, ctx: &SessionContext, id: &SecretId, passphrase: &str) -> Result<UnsignOutcome> {
        let engine = self.clone();
        let ctx = ctx.clone();
        let id = *id;
        let passphrase = Zeroizing::new(passphrase.to_string());
        tokio::task::spawn_blocking(move || engine.unsign_blocking(&ctx, &id, &passphrase)).await?
    }

    fn unsign_blocking(&self, ctx: &SessionContext, id: &SecretId, passphrase: &str) -> Result<UnsignOutcome> {
        self.get_secret(id)?.require(SecretStatus::Ready)?;
        let session = self
            .inner
            .registry
            .combining()
            .get(id)
            .ok_or(Error::NoActiveSession {
                id: *id,
                kind: ProtocolKind::Combining,
            })?;

        let user = ctx.user_id();
        let shares = self.inner.repo.list_shares_for_user_and_secret(&user, id)?;
        if shares.is_empty() {
            return Ok(UnsignOutcome::NoShares);
        }

        let mut opened_any = false;
        for share in shares {
            let fragment = match self.inner.cipher.decrypt(&share.ciphertext, passphrase) {
                Ok(fragment) => fragment,
                Err(Error::DecryptionFailed | Error::MalformedCiphertext) => continue,
                Err(e) => return Err(e),
            };
            opened_any = true;

            let index = share.index;
            let contribution = FragmentContribution {
                user,
                index,
                fragment,
            };
            match session
                .barrier
                .contribute_if(contribution, |collected| collected.iter().all(|c| c.index != index))
            {
                Ok(progress) => {
                    info!(
                        secret.id = %id,
                        user.name = %ctx.username(),
                        received = progress.received,
                        expected = progress.expected,
                        "share unsigned"
                    );
                    return Ok(UnsignOutcome::Accepted { index, progress });
                }
                Err(refused) if refused.reason == RefuseReason::NotAdmitted => continue,
                Err(refused) => return Err(refusal(*id, ProtocolKind::Combining, refused.reason)),
            }
        }

        if opened_any {
            Ok(UnsignOutcome::AlreadyContributed)
        } else {
            warn!(secret.id = %id, user.name = %ctx.username(), "unsign passphrase matched no share");
            Ok(UnsignOutcome::NoMatchingShare)
        }
    }

    /// Abandons a pending combine session
    ///
    /// # Errors
    /// [`Error::NoActiveSession`] if nothing is being combined,
    /// [`Error::NotPermitted`] for anyone but the requester
    pub fn cancel_combine(&self, ctx: &SessionContext, id: &SecretId) -> Result<()> {
        let session = self
            .inner
            .registry
            .combining()
            .get(id)
            .ok_or(Error::NoActiveSession {
                id: *id,
                kind: ProtocolKind::Combining,
            })?;
        if session.initiator != ctx.user_id() {
            return Err(Error::NotPermitted {
                id: *id,
                role: "requester",
                action: "cancel its combine",
            });
        }
        self.inner.registry.combining().retire(&session);
        info!(secret.id = %id, user.name = %ctx.username(), "combine cancelled");
        Ok(())
    }
}

fn refusal(id: SecretId, kind: ProtocolKind, reason: RefuseReason) -> Error {
    match reason {
        RefuseReason::Cancelled => Error::Cancelled { id, kind },
        RefuseReason::Full | RefuseReason::NotAdmitted => Error::SessionFull { id, kind },
    }
}

fn wait_failure(id: SecretId, kind: ProtocolKind, err: WaitError) -> Error {
    match err {
        WaitError::Cancelled => Error::Cancelled { id, kind },
        WaitError::AlreadyFired => Error::AlreadyFired { id, kind },
        WaitError::TimedOut { received, expected } => Error::TimedOut {
            id,
            kind,
            received,
            expected,
        },
    }
}

/// Held by the owner of a secret while it collects signatures
///
/// Dropping it before [`wait`](Self::wait) settles, including dropping the
/// wait future, moves the secret to `Dead`.
pub struct SigningHandle {
    engine: SecretLifecycle,
    secret: Secret,
    raw: Zeroizing<Vec<u8>>,
    session: Arc<CoordinationSession<PassphraseContribution>>,
    settled: bool,
}

impl SigningHandle {
    #[must_use]
    pub fn secret(&self) -> &Secret {
        &self.secret
    }

    /// Live signature count
    #[must_use]
    pub fn progress(&self) -> watch::Receiver<Progress> {
        self.session.barrier.subscribe()
    }

    /// Waits for every signature, then splits and stores the shares
    ///
    /// On timeout the secret is moved to `Dead`. If storing fails the secret
    /// stays `Signing` with no shares, and the owner can abort it.
    ///
    /// # Errors
    /// [`Error::Cancelled`] if the secret was aborted, [`Error::TimedOut`],
    /// or any split, encryption or repository error
    pub async fn wait(mut self) -> Result<Secret> {
        let id = self.secret.id;
        let engine = self.engine.clone();
        let session = self.session.clone();
        let timeout = engine.config().wait_timeout;

        match session.barrier.await_full_timeout(timeout).await {
            Ok(contributions) => {
                let raw = std::mem::take(&mut self.raw);
                let worker = engine.clone();
                let outcome =
                    tokio::task::spawn_blocking(move || worker.complete_signing(id, &raw, contributions))
                        .await;
                self.settled = true;
                engine.registry().signing().retire(&session);
                outcome?
            }
            Err(WaitError::TimedOut { received, expected }) => {
                self.settled = true;
                warn!(secret.id = %id, received, expected, "signing timed out, aborting secret");
                if let Err(e) = engine.kill(&id) {
                    warn!(secret.id = %id, error = %e, "could not abort timed out secret");
                    engine.registry().signing().retire(&session);
                }
                Err(Error::TimedOut {
                    id,
                    kind: ProtocolKind::Signing,
                    received,
                    expected,
                })
            }
            Err(err) => {
                self.settled = true;
                engine.registry().signing().retire(&session);
                Err(wait_failure(id, ProtocolKind::Signing, err))
            }
        }
    }
}

impl Drop for SigningHandle {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let id = self.secret.id;
        // a split still running on the blocking pool races this under the
        // transitions lock; whichever lands first wins
        match self.engine.kill(&id) {
            Ok(_) => warn!(secret.id = %id, "signing abandoned, secret aborted"),
            Err(e) => debug!(secret.id = %id, error = %e, "abandoned signing already settled"),
        }
        self.engine.registry().signing().retire(&self.session);
    }
}

/// Held by the requester of a combine while holders unsign
///
/// The combine session lives exactly as long as this handle: dropping it,
/// or the [`recover`](Self::recover) future, tears the session down.
pub struct CombineHandle {
    engine: SecretLifecycle,
    secret: Secret,
    session: Arc<CoordinationSession<FragmentContribution>>,
}

impl CombineHandle {
    #[must_use]
    pub fn secret(&self) -> &Secret {
        &self.secret
    }

    /// Live unsigning count
    #[must_use]
    pub fn progress(&self) -> watch::Receiver<Progress> {
        self.session.barrier.subscribe()
    }

    /// Waits for `threshold` fragments and recovers the secret
    ///
    /// The plaintext is returned to the caller only; it is never stored. The
    /// session is torn down whatever the outcome.
    ///
    /// # Errors
    /// [`Error::Cancelled`], [`Error::TimedOut`] or a recovery error
    pub async fn recover(self) -> Result<Zeroizing<Vec<u8>>> {
        let id = self.secret.id;
        let timeout = self.engine.config().wait_timeout;

        let outcome = match self.session.barrier.await_full_timeout(timeout).await {
            Ok(contributions) => {
                let fragments: Fragments = contributions
                    .into_iter()
                    .map(|c| (c.index, c.fragment))
                    .collect();
                self.engine.inner.primitive.combine(&fragments)
            }
            Err(err) => Err(wait_failure(id, ProtocolKind::Combining, err)),
        };

        match &outcome {
            Ok(_) => info!(secret.id = %id, "secret recovered"),
            Err(e) => warn!(secret.id = %id, error = %e, "combine ended without recovery"),
        }
        outcome
    }
}

impl Drop for CombineHandle {
    fn drop(&mut self) {
        if self.engine.registry().combining().retire(&self.session) {
            debug!(secret.id = %self.secret.id, "combine session released");
        }
    }
}
