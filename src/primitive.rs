//! The threshold splitting primitive
//!
//! The engine only needs `split` and `combine`; [`Shamir`] binds them to
//! blahaj's GF256 Shamir Secret Sharing.

use std::collections::BTreeMap;

use blahaj::{Share, Sharks};
use zeroize::Zeroizing;

use crate::domain::{ShareIndex, SplitConfig};
use crate::error::{Error, Result};

/// Fragments keyed by their index, in ascending index order
pub type Fragments = BTreeMap<ShareIndex, Zeroizing<Vec<u8>>>;

/// Black-box threshold scheme
pub trait SplittingPrimitive: Send + Sync {
    /// Splits `secret` into exactly `config.share_count()` fragments with
    /// pairwise distinct indices, any `config.threshold()` of which recover it
    ///
    /// # Errors
    /// Returns an error if the scheme cannot produce the requested fragments
    fn split(&self, secret: &[u8], config: SplitConfig) -> Result<Fragments>;

    /// Recovers the secret from a set of fragments
    ///
    /// # Errors
    /// Returns an error if the fragments are inconsistent or too few
    fn combine(&self, fragments: &Fragments) -> Result<Zeroizing<Vec<u8>>>;
}

/// Shamir Secret Sharing over GF256
#[derive(Debug, Clone, Copy, Default)]
pub struct Shamir;

impl SplittingPrimitive for Shamir {
    fn split(&self, secret: &[u8], config: SplitConfig) -> Result<Fragments> {
        let sharks = Sharks(*config.threshold());
        let dealer = sharks.dealer(secret);

        let mut fragments = Fragments::new();
        for share in dealer.take(usize::from(*config.share_count())) {
            // blahaj serializes a share as [x, y...]
            let bytes = Zeroizing::new(Vec::from(&share));
            let (&x, y) = bytes
                .split_first()
                .ok_or_else(|| Error::SplitFailed("dealer produced an empty share".into()))?;
            let index = ShareIndex::new(x).map_err(|e| Error::SplitFailed(e.to_string()))?;

            if fragments.insert(index, Zeroizing::new(y.to_vec())).is_some() {
                return Err(Error::SplitFailed(format!("duplicate fragment index {index}")));
            }
        }

        if fragments.len() != usize::from(*config.share_count()) {
            return Err(Error::SplitFailed(format!(
                "expected {} fragments, dealer produced {}",
                *config.share_count(),
                fragments.len()
            )));
        }

        Ok(fragments)
    }

    fn combine(&self, fragments: &Fragments) -> Result<Zeroizing<Vec<u8>>> {
        if fragments.is_empty() {
            return Err(Error::CombineFailed("no fragments provided".into()));
        }
        let count = u8::try_from(fragments.len())
            .map_err(|_| Error::CombineFailed("more fragments than GF256 allows".into()))?;

        let mut shares = Vec::with_capacity(fragments.len());
        for (index, fragment) in fragments {
            let mut bytes = Zeroizing::new(Vec::with_capacity(fragment.len() + 1));
            bytes.push(**index);
            bytes.extend_from_slice(fragment);

            let share = Share::try_from(bytes.as_slice())
                .map_err(|e| Error::CombineFailed(format!("invalid fragment {index}: {e:?}")))?;
            shares.push(share);
        }

        Sharks(count)
            .recover(&shares)
            .map(Zeroizing::new)
            .map_err(|e| Error::CombineFailed(format!("{e:?}")))
    }
}
