//! Domain types for threshold secret custody
//!
//! Validated newtypes and configuration:
//! - [`Threshold`] - Minimum unsignings required for recovery (1..=255)
//! - [`ShareIndex`] - Fragment identifier (1..=255)
//! - [`ShareCount`] - Number of shares, and therefore signers (1..=255)
//! - [`SplitConfig`] - Validated threshold and share count pair
//!
//! Records owned by the repository:
//! - [`Secret`] with its [`SecretStatus`] state machine
//! - [`Share`] and [`User`]

mod config;
mod ids;
mod secret;
mod share;
mod share_count;
mod share_index;
mod threshold;

pub use config::SplitConfig;
pub use ids::{SecretId, ShareId, UserId};
pub use secret::{Secret, SecretStatus};
pub use share::{Share, User};
pub use share_count::ShareCount;
pub use share_index::ShareIndex;
pub use threshold::Threshold;
