//! The `Secret` record and its lifecycle status

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{SecretId, ShareCount, SplitConfig, Threshold, UserId};
use crate::error::{Error, Result};

/// Where a secret is in its lifecycle
///
/// `Signing` is the only state with outgoing transitions: to `Ready` once
/// every holder has signed and the shares are stored, or to `Dead` when the
/// owner gives up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretStatus {
    Signing,
    Ready,
    Dead,
}

impl SecretStatus {
    /// Whether the state machine allows moving from `self` to `next`
    #[must_use]
    pub fn can_transition_to(self, next: SecretStatus) -> bool {
        matches!(
            (self, next),
            (SecretStatus::Signing, SecretStatus::Ready) | (SecretStatus::Signing, SecretStatus::Dead)
        )
    }
}

impl fmt::Display for SecretStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecretStatus::Signing => write!(f, "signing"),
            SecretStatus::Ready => write!(f, "ready"),
            SecretStatus::Dead => write!(f, "dead"),
        }
    }
}

/// A secret being split, or already split, among its holders
///
/// The secret value itself is never part of this record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret {
    pub id: SecretId,
    pub owner: UserId,
    pub label: String,
    pub parts: ShareCount,
    pub threshold: Threshold,
    status: SecretStatus,
    pub created_at: DateTime<Utc>,
}

impl Secret {
    /// Creates a fresh secret record in the `Signing` state
    #[must_use]
    pub fn new(owner: UserId, label: impl Into<String>, config: SplitConfig) -> Self {
        Self {
            id: SecretId::new(),
            owner,
            label: label.into(),
            parts: config.share_count(),
            threshold: config.threshold(),
            status: SecretStatus::Signing,
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn status(&self) -> SecretStatus {
        self.status
    }

    /// Re-validates the stored parts/threshold pair
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfig`] if a stored record breaks `threshold <= parts`
    pub fn split_config(&self) -> Result<SplitConfig> {
        SplitConfig::new(self.threshold, self.parts).map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    /// Fails with [`Error::InvalidStatus`] unless the secret is in `expected`
    ///
    /// # Errors
    /// Returns an error describing the actual status
    pub fn require(&self, expected: SecretStatus) -> Result<()> {
        if self.status != expected {
            return Err(Error::InvalidStatus {
                id: self.id,
                expected,
                actual: self.status,
            });
        }
        Ok(())
    }

    /// Applies a lifecycle transition
    ///
    /// # Errors
    /// Returns [`Error::InvalidTransition`] for anything but `Signing -> Ready`
    /// and `Signing -> Dead`
    pub fn transition_to(&mut self, next: SecretStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                id: self.id,
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}
