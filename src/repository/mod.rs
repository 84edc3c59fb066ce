//! Persistence collaborator
//!
//! The engine only talks to [`Repository`]. Two stores ship with the crate:
//! [`MemoryRepository`] for tests and throwaway sessions, and
//! [`JsonFileRepository`] which snapshots every change to a file.

mod json;
mod memory;

pub use json::JsonFileRepository;
pub use memory::MemoryRepository;

use crate::domain::{Secret, SecretId, Share, User, UserId};
use crate::error::Result;

pub trait Repository: Send + Sync {
    /// Creates the user on first connection, refreshes it afterwards
    fn upsert_user(&self, username: &str, public_key: &str) -> Result<User>;

    fn create_secret(&self, secret: &Secret) -> Result<()>;

    fn get_secret(&self, id: &SecretId) -> Result<Option<Secret>>;

    fn update_secret(&self, secret: &Secret) -> Result<()>;

    /// Secrets owned by `owner`, oldest first
    fn list_secrets_for_user(&self, owner: &UserId) -> Result<Vec<Secret>>;

    /// Stores a share; fails if the secret already has a share at that index
    fn create_share(&self, share: &Share) -> Result<()>;

    fn list_shares_for_user_and_secret(&self, holder: &UserId, secret: &SecretId) -> Result<Vec<Share>>;

    /// Removes every share of `secret`, returning how many were removed
    fn delete_shares_for_secret(&self, secret: &SecretId) -> Result<usize>;
}
