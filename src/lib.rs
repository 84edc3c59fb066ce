// Library backing the quorum console; the engine is usable on its own

pub mod barrier;
pub mod cipher;
#[cfg(feature = "cli")]
pub mod cli;
#[cfg(feature = "cli")]
pub mod commands;
pub mod config;
pub mod contribution;
pub mod domain;
pub mod error;
pub mod lifecycle;
pub mod primitive;
pub mod registry;
pub mod repository;
pub mod session;

pub use config::EngineConfig;
pub use error::{Error, Result};
pub use lifecycle::{CombineHandle, SecretLifecycle, SignOutcome, SigningHandle, UnsignOutcome};
pub use session::SessionContext;
