//! `ShareIndex` newtype for Shamir Secret Sharing

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// Fragment index (1..=255)
///
/// The x-coordinate a fragment was evaluated at. Index 0 is the secret itself
/// and is never handed out as a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ShareIndex(u8);

impl ShareIndex {
    /// Smallest valid fragment index
    pub const MIN: u8 = 1;

    /// Creates a new share index
    ///
    /// # Errors
    /// Returns an error if index is 0 (the secret's own coordinate)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use quorum::domain::ShareIndex;
    ///
    /// let index = ShareIndex::new(1).unwrap();
    /// assert_eq!(*index, 1);
    ///
    /// let max_index = ShareIndex::new(255).unwrap();
    /// assert_eq!(*max_index, 255);
    ///
    /// // Invalid: 0 would evaluate the polynomial at the secret
    /// assert!(ShareIndex::new(0).is_err());
    /// ```
    pub fn new(value: u8) -> Result<Self> {
        if value < Self::MIN {
            bail!("Share index 0 is the secret's own coordinate");
        }
        Ok(Self(value))
    }
}

impl std::ops::Deref for ShareIndex {
    type Target = u8;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Display for ShareIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u8> for ShareIndex {
    type Error = anyhow::Error;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ShareIndex> for u8 {
    fn from(value: ShareIndex) -> Self {
        value.0
    }
}
