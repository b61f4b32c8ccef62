//! # vaultkeep-core
//!
//! Core types, configuration, and utilities for Vaultkeep.
//!
//! This crate provides shared functionality used across all Vaultkeep crates:
//!
//! - **Configuration**: Loading, validation, and management of config files
//! - **Types**: Vault items, per-category fields, and their encrypted record form
//! - **Utilities**: Path resolution, ID generation, and environment handling

pub mod config;
pub mod types;
pub mod error;
pub mod paths;
pub mod env;
pub mod id;
pub mod secret;

// Re-exports for convenience
pub use config::Config;
pub use error::{Error, Result};
pub use types::*;
pub use secret::SecretString;
