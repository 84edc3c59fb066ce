use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use super::Repository;
use super::memory::Tables;
use crate::domain::{Secret, SecretId, Share, User, UserId};
use crate::error::Result;

/// Repository persisted as a single JSON document
///
/// Every mutation rewrites the document through a temporary file and a
/// rename, so a crash leaves either the old or the new snapshot.
#[derive(Debug)]
pub struct JsonFileRepository {
    path: PathBuf,
    tables: Mutex<Tables>,
}

impl JsonFileRepository {
    /// Opens the store at `path`, starting empty if the file does not exist
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let tables = if path.exists() {
            let raw = fs::read(&path)?;
            serde_json::from_slice(&raw)?
        } else {
            Tables::default()
        };
        debug!(path = %path.display(), "opened json store");
        Ok(Self {
            path,
            tables: Mutex::new(tables),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn flush(&self, tables: &Tables) -> Result<()> {
        let raw = serde_json::to_vec_pretty(tables)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Applies `change` and writes the snapshot; the in-memory tables are
    /// rolled back if the write fails
    fn mutate<T>(&self, change: impl FnOnce(&mut Tables) -> Result<T>) -> Result<T> {
        let mut tables = self.lock();
        let before = serde_json::to_value(&*tables)?;
        let out = change(&mut tables)?;
        if let Err(e) = self.flush(&tables) {
            *tables = serde_json::from_value(before)?;
            return Err(e);
        }
        Ok(out)
    }
}

impl Repository for JsonFileRepository {
    fn upsert_user(&self, username: &str, public_key: &str) -> Result<User> {
        self.mutate(|t| Ok(t.upsert_user(username, public_key)))
    }

    fn create_secret(&self, secret: &Secret) -> Result<()> {
        self.mutate(|t| t.create_secret(secret))
    }

    fn get_secret(&self, id: &SecretId) -> Result<Option<Secret>> {
        Ok(self.lock().get_secret(id))
    }

    fn update_secret(&self, secret: &Secret) -> Result<()> {
        self.mutate(|t| t.update_secret(secret))
    }

    fn list_secrets_for_user(&self, owner: &UserId) -> Result<Vec<Secret>> {
        Ok(self.lock().list_secrets_for_user(owner))
    }

    fn create_share(&self, share: &Share) -> Result<()> {
        self.mutate(|t| t.create_share(share))
    }

    fn list_shares_for_user_and_secret(&self, holder: &UserId, secret: &SecretId) -> Result<Vec<Share>> {
        Ok(self.lock().list_shares_for_user_and_secret(holder, secret))
    }

    fn delete_shares_for_secret(&self, secret: &SecretId) -> Result<usize> {
        self.mutate(|t| Ok(t.delete_shares_for_secret(secret)))
    }
}
