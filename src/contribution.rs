//! Ephemeral contributions carried by the two barriers
//!
//! Neither type is ever persisted. Secret material sits in `Zeroizing`
//! buffers and is redacted from `Debug` output.

use std::fmt;

use zeroize::Zeroizing;

use crate::domain::{ShareIndex, UserId};

/// A holder's passphrase, offered while a secret is being signed
pub struct PassphraseContribution {
    pub user: UserId,
    pub username: String,
    pub passphrase: Zeroizing<String>,
}

impl fmt::Debug for PassphraseContribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PassphraseContribution")
            .field("user", &self.user)
            .field("username", &self.username)
            .field("passphrase", &"<redacted>")
            .finish()
    }
}

/// A decrypted fragment, offered while a secret is being combined
pub struct FragmentContribution {
    pub user: UserId,
    pub index: ShareIndex,
    pub fragment: Zeroizing<Vec<u8>>,
}

impl fmt::Debug for FragmentContribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FragmentContribution")
            .field("user", &self.user)
            .field("index", &self.index)
            .field("fragment", &"<redacted>")
            .finish()
    }
}
