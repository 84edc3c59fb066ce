//! At-rest protection of share fragments
//!
//! Each fragment is sealed with ChaCha20-Poly1305 under a key stretched from
//! the holder's passphrase with Argon2id. The random 96-bit nonce doubles as
//! the Argon2 salt, so every share gets its own key while the stored format
//! stays `nonce ‖ sealed fragment`.
//!
//! A successful authenticated decrypt is the only evidence that a passphrase
//! belongs to a share.

use argon2::{Algorithm, Argon2, Params, Version};
use chacha20poly1305::{
    ChaCha20Poly1305, Key, Nonce,
    aead::{Aead, KeyInit},
};
use rand::RngCore;
use zeroize::Zeroizing;

use crate::error::{Error, Result};

/// Nonce length in bytes (96 bits)
pub const NONCE_LEN: usize = 12;

/// Poly1305 tag length in bytes
pub const TAG_LEN: usize = 16;

const KEY_LEN: usize = 32;

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB
    pub memory_kib: u32,
    /// Number of passes
    pub iterations: u32,
    /// Degree of parallelism
    pub parallelism: u32,
}

impl KdfParams {
    #[must_use]
    pub const fn new(memory_kib: u32, iterations: u32) -> Self {
        Self {
            memory_kib,
            iterations,
            parallelism: 1,
        }
    }

    fn argon2(&self) -> Result<Argon2<'static>> {
        let params = Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(KEY_LEN),
        )
        .map_err(|e| Error::KdfFailed(e.to_string()))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

impl Default for KdfParams {
    /// 19 MiB, 2 passes
    fn default() -> Self {
        Self::new(19 * 1024, 2)
    }
}

/// Seals and opens share fragments under passphrases
#[derive(Debug, Clone, Copy, Default)]
pub struct ShareCipher {
    kdf: KdfParams,
}

impl ShareCipher {
    #[must_use]
    pub fn new(kdf: KdfParams) -> Self {
        Self { kdf }
    }

    fn derive_key(&self, passphrase: &str, salt: &[u8]) -> Result<Zeroizing<[u8; KEY_LEN]>> {
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        self.kdf
            .argon2()?
            .hash_password_into(passphrase.as_bytes(), salt, &mut key[..])
            .map_err(|e| Error::KdfFailed(e.to_string()))?;
        Ok(key)
    }

    /// Encrypts a fragment, returning `nonce ‖ ciphertext ‖ tag`
    ///
    /// # Errors
    /// Returns an error if key derivation or sealing fails
    pub fn encrypt(&self, fragment: &[u8], passphrase: &str) -> Result<Vec<u8>> {
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let key = self.derive_key(passphrase, &nonce)?;
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key[..]));
        let sealed = cipher
            .encrypt(Nonce::from_slice(&nonce), fragment)
            .map_err(|e| Error::EncryptionFailed(e.to_string()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    /// Opens a sealed fragment
    ///
    /// # Errors
    /// Returns [`Error::DecryptionFailed`] when the passphrase does not match,
    /// or [`Error::MalformedCiphertext`] when the input is too short to hold a
    /// nonce and tag
    pub fn decrypt(&self, sealed: &[u8], passphrase: &str) -> Result<Zeroizing<Vec<u8>>> {
        if sealed.len() < NONCE_LEN + TAG_LEN {
            return Err(Error::MalformedCiphertext);
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);

        let key = self.derive_key(passphrase, nonce)?;
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key[..]));
        cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map(Zeroizing::new)
            .map_err(|_| Error::DecryptionFailed)
    }
}
