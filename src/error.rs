//! error types for the coordination engine

use thiserror::Error;

use crate::domain::{SecretId, SecretStatus};
use crate::registry::ProtocolKind;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    // === precondition errors ===
    #[error("secret {0} not found")]
    SecretNotFound(SecretId),

    #[error("secret {id} is {actual}, expected {expected}")]
    InvalidStatus {
        id: SecretId,
        expected: SecretStatus,
        actual: SecretStatus,
    },

    #[error("secret {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: SecretId,
        from: SecretStatus,
        to: SecretStatus,
    },

    #[error("secret {id} has no active {kind} session")]
    NoActiveSession { id: SecretId, kind: ProtocolKind },

    #[error("secret {id} already has an active {kind} session")]
    SessionActive { id: SecretId, kind: ProtocolKind },

    #[error("{kind} session for secret {id} is already full")]
    SessionFull { id: SecretId, kind: ProtocolKind },

    #[error("only the {role} of secret {id} may {action}")]
    NotPermitted {
        id: SecretId,
        role: &'static str,
        action: &'static str,
    },

    #[error("invalid split configuration: {0}")]
    InvalidConfig(String),

    #[error("refusing to split an empty secret")]
    EmptySecret,

    // === coordination outcomes ===
    #[error("{kind} session for secret {id} was cancelled")]
    Cancelled { id: SecretId, kind: ProtocolKind },

    #[error("timed out waiting for {kind} on secret {id}: {received}/{expected} contributions")]
    TimedOut {
        id: SecretId,
        kind: ProtocolKind,
        received: usize,
        expected: usize,
    },

    #[error("{kind} session for secret {id} already fired")]
    AlreadyFired { id: SecretId, kind: ProtocolKind },

    // === primitive and cipher errors ===
    #[error("split failed: {0}")]
    SplitFailed(String),

    #[error("recovery failed: {0}")]
    CombineFailed(String),

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("decryption failed")]
    DecryptionFailed,

    #[error("malformed share ciphertext")]
    MalformedCiphertext,

    #[error("kdf failed: {0}")]
    KdfFailed(String),

    // === collaborator errors ===
    #[error("storage error: {0}")]
    Storage(String),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
