use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use super::Repository;
use crate::domain::{Secret, SecretId, Share, User, UserId};
use crate::error::{Error, Result};

/// Plain tables shared by the in-memory and file-backed stores
#[derive(Debug, Default, Serialize, Deserialize)]
pub(super) struct Tables {
    users: Vec<User>,
    secrets: HashMap<SecretId, Secret>,
    shares: Vec<Share>,
}

impl Tables {
    pub(super) fn upsert_user(&mut self, username: &str, public_key: &str) -> User {
        if let Some(user) = self
            .users
            .iter()
            .find(|u| u.username == username && u.public_key == public_key)
        {
            return user.clone();
        }
        let user = User {
            id: UserId::new(),
            username: username.to_string(),
            public_key: public_key.to_string(),
        };
        self.users.push(user.clone());
        user
    }

    pub(super) fn create_secret(&mut self, secret: &Secret) -> Result<()> {
        if self.secrets.contains_key(&secret.id) {
            return Err(Error::Storage(format!("secret {} already exists", secret.id)));
        }
        self.secrets.insert(secret.id, secret.clone());
        Ok(())
    }

    pub(super) fn get_secret(&self, id: &SecretId) -> Option<Secret> {
        self.secrets.get(id).cloned()
    }

    pub(super) fn update_secret(&mut self, secret: &Secret) -> Result<()> {
        let slot = self
            .secrets
            .get_mut(&secret.id)
            .ok_or(Error::SecretNotFound(secret.id))?;
        *slot = secret.clone();
        Ok(())
    }

    pub(super) fn list_secrets_for_user(&self, owner: &UserId) -> Vec<Secret> {
        let mut secrets: Vec<_> = self
            .secrets
            .values()
            .filter(|s| &s.owner == owner)
            .cloned()
            .collect();
        secrets.sort_by_key(|s| s.created_at);
        secrets
    }

    pub(super) fn create_share(&mut self, share: &Share) -> Result<()> {
        if !self.secrets.contains_key(&share.secret) {
            return Err(Error::SecretNotFound(share.secret));
        }
        if self
            .shares
            .iter()
            .any(|s| s.secret == share.secret && s.index == share.index)
        {
            return Err(Error::Storage(format!(
                "secret {} already has a share at index {}",
                share.secret, share.index
            )));
        }
        self.shares.push(share.clone());
        Ok(())
    }

    pub(super) fn list_shares_for_user_and_secret(&self, holder: &UserId, secret: &SecretId) -> Vec<Share> {
        self.shares
            .iter()
            .filter(|s| &s.holder == holder && &s.secret == secret)
            .cloned()
            .collect()
    }

    pub(super) fn delete_shares_for_secret(&mut self, secret: &SecretId) -> usize {
        let before = self.shares.len();
        self.shares.retain(|s| &s.secret != secret);
        before - self.shares.len()
    }
}

/// Repository kept entirely in process memory
#[derive(Debug, Default)]
pub struct MemoryRepository {
    tables: RwLock<Tables>,
}

impl MemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Repository for MemoryRepository {
    fn upsert_user(&self, username: &str, public_key: &str) -> Result<User> {
        Ok(self.write().upsert_user(username, public_key))
    }

    fn create_secret(&self, secret: &Secret) -> Result<()> {
        self.write().create_secret(secret)
    }

    fn get_secret(&self, id: &SecretId) -> Result<Option<Secret>> {
        Ok(self.read().get_secret(id))
    }

    fn update_secret(&self, secret: &Secret) -> Result<()> {
        self.write().update_secret(secret)
    }

    fn list_secrets_for_user(&self, owner: &UserId) -> Result<Vec<Secret>> {
        Ok(self.read().list_secrets_for_user(owner))
    }

    fn create_share(&self, share: &Share) -> Result<()> {
        self.write().create_share(share)
    }

    fn list_shares_for_user_and_secret(&self, holder: &UserId, secret: &SecretId) -> Result<Vec<Share>> {
        Ok(self.read().list_shares_for_user_and_secret(holder, secret))
    }

    fn delete_shares_for_secret(&self, secret: &SecretId) -> Result<usize> {
        Ok(self.write().delete_shares_for_secret(secret))
    }
}
