//! The parts/threshold pair a secret is split with

use std::fmt;

use anyhow::{Result, bail};

use super::{ShareCount, Threshold};

/// How many signers a secret is split among and how many unsignings
/// recover it
///
/// Only constructible with `threshold <= share_count`, so a secret can never
/// ask for more unsignings than it has holders.
///
/// ```rust
/// use quorum::domain::SplitConfig;
///
/// let config = SplitConfig::from_raw(3, 2).unwrap();
/// assert_eq!(config.to_string(), "2-of-3");
/// assert!(SplitConfig::from_raw(3, 5).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitConfig {
    threshold: Threshold,
    share_count: ShareCount,
}

impl SplitConfig {
    /// # Errors
    /// Returns an error if the threshold exceeds the share count
    pub fn new(threshold: Threshold, share_count: ShareCount) -> Result<Self> {
        if *threshold > *share_count {
            bail!(
                "Threshold {} cannot exceed the {} signers the secret is split among",
                *threshold,
                *share_count
            );
        }
        Ok(Self {
            threshold,
            share_count,
        })
    }

    /// Validates raw numbers from a command line or a stored record
    ///
    /// # Errors
    /// Returns an error if either value is out of range or the threshold
    /// exceeds the share count
    pub fn from_raw(parts: u8, threshold: u8) -> Result<Self> {
        Self::new(Threshold::new(threshold)?, ShareCount::new(parts)?)
    }

    #[must_use]
    pub fn threshold(&self) -> Threshold {
        self.threshold
    }

    /// Number of shares, which is also the number of signers
    #[must_use]
    pub fn share_count(&self) -> ShareCount {
        self.share_count
    }
}

impl fmt::Display for SplitConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-of-{}", *self.threshold, *self.share_count)
    }
}
