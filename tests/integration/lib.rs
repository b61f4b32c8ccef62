//! Shared fixtures for the integration tests.

use std::sync::Arc;
use std::time::Duration;
use vaultkeep_core::config::{ConfigBuilder, MIN_KDF_ITERATIONS};
use vaultkeep_core::Config;
use vaultkeep_sync::{StaticAuth, SyncEngine, VaultSession, VaultSnapshot, VaultStore};

/// Config with the cheapest accepted key derivation and fast reconnects.
pub fn fast_config() -> Config {
    ConfigBuilder::new()
        .kdf_iterations(MIN_KDF_ITERATIONS)
        .retry(10, 50, 3)
        .build()
}

/// Unlock `user`'s vault on `store`.
pub async fn unlock(store: Arc<dyn VaultStore>, user: &str, password: &str) -> VaultSession {
    VaultSession::unlock(&StaticAuth::new(user, password), store, &fast_config())
        .await
        .expect("unlock")
}

/// Wait until `engine`'s snapshot satisfies `condition`.
pub async fn wait_for(engine: &SyncEngine, condition: impl FnMut(&VaultSnapshot) -> bool) -> VaultSnapshot {
    let mut rx = engine.watch();
    let snapshot = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(condition))
        .await
        .expect("snapshot condition not reached in time")
        .expect("engine dropped")
        .clone();
    snapshot
}
