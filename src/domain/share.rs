//! Persisted share and user records

use serde::{Deserialize, Serialize};

use super::{SecretId, ShareId, ShareIndex, UserId};

/// One encrypted fragment held by one user
///
/// `ciphertext` is `nonce ‖ sealed fragment`; the raw fragment is never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Share {
    pub id: ShareId,
    pub secret: SecretId,
    pub holder: UserId,
    pub index: ShareIndex,
    pub ciphertext: Vec<u8>,
}

impl Share {
    #[must_use]
    pub fn new(secret: SecretId, holder: UserId, index: ShareIndex, ciphertext: Vec<u8>) -> Self {
        Self {
            id: ShareId::new(),
            secret,
            holder,
            index,
            ciphertext,
        }
    }
}

/// An authenticated participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub public_key: String,
}
