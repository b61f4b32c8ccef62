//! Path resolution utilities.

use crate::env;
use crate::error::ConfigError;
use std::path::PathBuf;

/// Get the Vaultkeep base directory (~/.vaultkeep, or `VAULTKEEP_HOME`).
pub fn base_dir() -> Result<PathBuf, ConfigError> {
    if let Some(home) = env::get_var(env::vars::VAULTKEEP_HOME) {
        return Ok(expand_tilde(&home));
    }
    let home = dirs::home_dir().ok_or_else(|| {
        ConfigError::Validation("Could not determine home directory".to_string())
    })?;
    Ok(home.join(".vaultkeep"))
}

/// Get the main config file path (~/.vaultkeep/vaultkeep.json5).
pub fn config_file() -> Result<PathBuf, ConfigError> {
    if let Some(path) = env::get_var(env::vars::VAULTKEEP_CONFIG) {
        return Ok(expand_tilde(&path));
    }
    Ok(base_dir()?.join("vaultkeep.json5"))
}

/// Get the default file-backed store path (~/.vaultkeep/vault.json).
pub fn store_file() -> Result<PathBuf, ConfigError> {
    if let Some(path) = env::get_var(env::vars::VAULTKEEP_STORE) {
        return Ok(expand_tilde(&path));
    }
    Ok(base_dir()?.join("vault.json"))
}

/// Get the export directory (~/.vaultkeep/exports).
pub fn exports_dir() -> Result<PathBuf, ConfigError> {
    Ok(base_dir()?.join("exports"))
}

/// Ensure all required directories exist.
pub fn ensure_dirs() -> Result<(), ConfigError> {
    let dirs = [base_dir()?, exports_dir()?];

    for dir in dirs {
        std::fs::create_dir_all(&dir)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o700))?;
        }
    }

    Ok(())
}

/// Expand tilde (~) in a path.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
