//! Engine runtime configuration

use std::time::Duration;

use crate::cipher::KdfParams;

/// Default bound on how long an initiator waits for the other holders
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// How long a split owner or combine requester waits before the session
    /// is torn down
    pub wait_timeout: Duration,
    /// Passphrase stretching cost for share encryption
    pub kdf: KdfParams,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            kdf: KdfParams::default(),
        }
    }
}
