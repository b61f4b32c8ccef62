//! Per-invocation state shared by the commands.

use anyhow::Context as _;
use console::style;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use vaultkeep_core::{env, paths, Config, SecretString, UserId};
use vaultkeep_sync::{FileVaultStore, StaticAuth, SyncStatus, VaultSession, VaultStore};

/// User assumed when neither `--user` nor `VAULTKEEP_USER` is given.
pub const DEFAULT_USER: &str = "local";

pub struct Context {
    pub config: Config,
    config_path: Option<PathBuf>,
    user: Option<String>,
}

impl Context {
    pub fn new(config: Config, config_path: Option<PathBuf>, user: Option<String>) -> Self {
        Self {
            config,
            config_path,
            user,
        }
    }

    pub fn user(&self) -> UserId {
        UserId::new(self.user.as_deref().unwrap_or(DEFAULT_USER))
    }

    pub fn config_path(&self) -> anyhow::Result<PathBuf> {
        match &self.config_path {
            Some(path) => Ok(path.clone()),
            None => Ok(paths::config_file()?),
        }
    }

    pub fn open_store(&self) -> anyhow::Result<Arc<FileVaultStore>> {
        let path = self.config.store_path()?;
        debug!(path = %path.display(), user_id = %self.user(), "opening vault store");
        let store = FileVaultStore::open(&path)
            .with_context(|| format!("Failed to open vault store at {}", path.display()))?;
        Ok(Arc::new(store))
    }

    /// Read the master password from `VAULTKEEP_MASTER_PASSWORD` or the terminal.
    pub fn credentials(&self) -> anyhow::Result<StaticAuth> {
        let password = match env::get_var(env::vars::VAULTKEEP_MASTER_PASSWORD) {
            Some(password) => password,
            None => rpassword::prompt_password("Master password: ")
                .map_err(|e| anyhow::anyhow!("Failed to read master password: {}", e))?,
        };
        if password.is_empty() {
            anyhow::bail!("Master password must not be empty");
        }
        Ok(StaticAuth::new(self.user(), SecretString::new(password)))
    }

    /// Unlock the vault and wait for the initial load.
    pub async fn unlock(&self) -> anyhow::Result<VaultSession> {
        let store = self.open_store()?;
        let auth = self.credentials()?;
        let store: Arc<dyn VaultStore> = store;
        let session = VaultSession::unlock(&auth, store, &self.config).await?;

        let snapshot = session.engine().snapshot();
        if snapshot.status == SyncStatus::Error {
            if let Some(error) = &snapshot.error {
                anyhow::bail!("Vault could not be loaded: {}", error);
            }
        }
        let unreadable = snapshot.unreadable().count();
        if unreadable > 0 {
            eprintln!(
                "{} {} item(s) could not be decrypted. Wrong master password?",
                style("!").yellow().bold(),
                unreadable
            );
        }
        Ok(session)
    }
}
