//! Per-connection identity

use crate::domain::{User, UserId};
use crate::error::Result;
use crate::repository::Repository;

/// The authenticated user behind one participant session
///
/// Every engine call takes one of these instead of looking the user up from
/// ambient connection state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    user: User,
}

impl SessionContext {
    #[must_use]
    pub fn new(user: User) -> Self {
        Self { user }
    }

    /// Records the connecting user and opens a session for them
    ///
    /// # Errors
    /// Returns the repository's error if the user cannot be stored
    pub fn authenticate(repo: &dyn Repository, username: &str, public_key: &str) -> Result<Self> {
        let user = repo.upsert_user(username, public_key)?;
        tracing::info!(user.name = %user.username, user.id = %user.id, "user authenticated");
        Ok(Self::new(user))
    }

    #[must_use]
    pub fn user(&self) -> &User {
        &self.user
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user.id
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.user.username
    }
}
