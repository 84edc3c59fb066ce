use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};

use crate::cipher::KdfParams;
use crate::config::EngineConfig;
use crate::domain::{SecretId, Threshold};

/// Validates that threshold is at least 1
fn validate_threshold(s: &str) -> Result<Threshold, String> {
    let value: u8 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    Threshold::new(value).map_err(|e| e.to_string())
}

#[derive(Parser, Debug)]
#[command(name = "quorum")]
#[command(about = "Split secrets among holders who sign and unsign their shares")]
#[command(version)]
pub struct Cli {
    /// JSON file holding users, secrets and encrypted shares (in-memory when omitted)
    #[arg(long, env = "QUORUM_STORE")]
    pub store: Option<PathBuf>,

    /// Seconds an owner or requester waits for the other holders
    #[arg(long, env = "QUORUM_WAIT_TIMEOUT", default_value_t = 600)]
    pub wait_timeout: u64,

    /// Argon2id memory cost in KiB for share passphrases
    #[arg(long, env = "QUORUM_KDF_MEMORY_KIB", default_value_t = 19 * 1024)]
    pub kdf_memory_kib: u32,

    /// Argon2id passes for share passphrases
    #[arg(long, env = "QUORUM_KDF_ITERATIONS", default_value_t = 2)]
    pub kdf_iterations: u32,
}

impl Cli {
    /// Builds the engine configuration from the parsed flags
    ///
    /// # Errors
    /// Returns an error for a zero timeout
    pub fn engine_config(&self) -> Result<EngineConfig> {
        if self.wait_timeout == 0 {
            bail!("--wait-timeout must be at least one second");
        }
        Ok(EngineConfig {
            wait_timeout: Duration::from_secs(self.wait_timeout),
            kdf: KdfParams::new(self.kdf_memory_kib, self.kdf_iterations),
        })
    }
}

/// One line typed into a participant session
#[derive(Parser, Debug)]
#[command(name = "quorum", no_binary_name = true, disable_version_flag = true)]
pub struct SessionLine {
    #[command(subcommand)]
    pub command: SessionCommand,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// Split a secret into shares, one per signer
    Split {
        /// How many shares to split the secret into
        #[arg(short, long, default_value_t = 3)]
        parts: u8,

        /// How many shares are required to reconstruct the secret
        #[arg(short, long, value_parser = validate_threshold, default_value = "2")]
        threshold: Threshold,
    },
    /// Sign a secret being split with your passphrase
    Sign { id: SecretId },
    /// Combine shares to recover a secret
    Combine { id: SecretId },
    /// Unsign your share of a secret being combined
    Unsign { id: SecretId },
    /// List your secrets
    #[command(alias = "ls")]
    List,
    /// Abort a secret that is still being signed
    Abort { id: SecretId },
    /// Cancel a combine you started
    Cancel { id: SecretId },
}

impl SessionLine {
    /// Parses a whitespace separated command line
    ///
    /// # Errors
    /// Returns clap's error, which renders its own usage text
    pub fn parse_line(line: &str) -> Result<Self, clap::Error> {
        Self::try_parse_from(line.split_whitespace())
    }
}
