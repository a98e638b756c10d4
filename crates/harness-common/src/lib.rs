//! # Harness Common
//!
//! Shared types, errors, and constants used by the vault deployment harness.
//!
//! ## Modules
//! - `types` - Secrets-service data model (UnsealMaterial, HaStatus, etc.)
//! - `error` - Failure taxonomy shared by the verifier and coordinator
//! - `constants` - Default settings, application names, and secret paths

pub mod constants;
pub mod error;
pub mod types;

pub use error::HarnessError;
pub use types::*;

/// Result alias used throughout the harness
pub type Result<T, E = HarnessError> = std::result::Result<T, E>;
