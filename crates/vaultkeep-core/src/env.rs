//! Environment variable handling.

use std::env;

/// Get an environment variable, returning None if not set or empty.
pub fn get_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
pub fn get_var_or(name: &str, default: &str) -> String {
    get_var(name).unwrap_or_else(|| default.to_string())
}

/// Get an environment variable as a boolean.
pub fn get_bool(name: &str) -> bool {
    get_var(name)
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

/// Get an environment variable as a u32.
pub fn get_u32(name: &str) -> Option<u32> {
    get_var(name).and_then(|v| v.parse().ok())
}

/// Common environment variable names.
pub mod vars {
    /// Vaultkeep home directory override.
    pub const VAULTKEEP_HOME: &str = "VAULTKEEP_HOME";

    /// Vaultkeep config file override.
    pub const VAULTKEEP_CONFIG: &str = "VAULTKEEP_CONFIG";

    /// File-backed store override.
    pub const VAULTKEEP_STORE: &str = "VAULTKEEP_STORE";

    /// Account identifier for CLI sessions.
    pub const VAULTKEEP_USER: &str = "VAULTKEEP_USER";

    /// Master password for non-interactive unlock.
    pub const VAULTKEEP_MASTER_PASSWORD: &str = "VAULTKEEP_MASTER_PASSWORD";

    /// Override for `kdf.iterations`.
    pub const VAULTKEEP_KDF_ITERATIONS: &str = "VAULTKEEP_KDF_ITERATIONS";

    /// Vaultkeep log level.
    pub const VAULTKEEP_LOG: &str = "VAULTKEEP_LOG";
}
