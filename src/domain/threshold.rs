//! Threshold newtype for Shamir Secret Sharing

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Minimum number of unsigned shares needed to recover a secret (1..=255)
///
/// Invariant: threshold >= 1 (enforced at construction)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Threshold(u8);

impl Threshold {
    /// Creates a new threshold, returning an error if value is 0
    ///
    /// # Errors
    /// Returns an error if the threshold is 0
    ///
    /// # Examples
    ///
    /// ```rust
    /// use quorum::domain::Threshold;
    ///
    /// let threshold = Threshold::new(2).unwrap();
    /// assert_eq!(*threshold, 2);
    ///
    /// // A single holder may be trusted on their own
    /// assert!(Threshold::new(1).is_ok());
    ///
    /// // Invalid: nobody would ever be able to recover
    /// assert!(Threshold::new(0).is_err());
    /// ```
    pub fn new(value: u8) -> Result<Self> {
        if value == 0 {
            anyhow::bail!("Threshold must be at least 1 (got {value})");
        }
        Ok(Self(value))
    }
}

impl std::ops::Deref for Threshold {
    type Target = u8;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<u8> for Threshold {
    type Error = anyhow::Error;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Threshold> for u8 {
    fn from(value: Threshold) -> Self {
        value.0
    }
}
