//! Unlocked vault sessions.
//!
//! A [`VaultSession`] owns everything that exists only while a vault is
//! unlocked: the session key (inside its [`SyncEngine`]), the local cache,
//! and the security auditor. [`SessionRegistry`] tracks sessions per user
//! and locks them explicitly.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use vaultkeep_audit::{AuditReport, IssueMap, SecurityAuditor};
use vaultkeep_core::{Config, UserId};
use vaultkeep_crypto::{derive, generate_salt, KdfParams, SessionKey};

use crate::auth::AuthProvider;
use crate::engine::SyncEngine;
use crate::error::{Result, SyncError};
use crate::store::VaultStore;

/// Derive the session key for `auth`'s user, creating the salt on first use.
///
/// Derivation runs on a blocking thread.
pub async fn unlock_key(
    auth: &dyn AuthProvider,
    store: &dyn VaultStore,
    config: &Config,
) -> Result<SessionKey> {
    let user = auth.user_id();
    let password = auth
        .master_password()
        .filter(|p| !p.is_empty())
        .ok_or(SyncError::KeyUnavailable)?;
    let params = KdfParams::from_config(&config.kdf)?;

    let salt = match store.load_salt(&user).await? {
        Some(salt) => salt,
        None => {
            info!(user_id = %user, "creating key derivation salt");
            store.save_salt(&user, &generate_salt()).await?
        }
    };

    tokio::task::spawn_blocking(move || derive(&password, &salt, &params))
        .await
        .map_err(|e| SyncError::KeyDerivation(format!("derivation task failed: {e}")))?
        .map_err(SyncError::from)
}

/// One unlocked vault.
pub struct VaultSession {
    user: UserId,
    engine: SyncEngine,
    auditor: SecurityAuditor,
    unlocked_at: DateTime<Utc>,
    last_activity: Mutex<DateTime<Utc>>,
}

impl VaultSession {
    /// Derive the key, load the vault, and start syncing.
    ///
    /// A connection failure while loading does not fail the unlock: the
    /// session starts in the error state and keeps retrying.
    pub async fn unlock(
        auth: &dyn AuthProvider,
        store: Arc<dyn VaultStore>,
        config: &Config,
    ) -> Result<Self> {
        let user = auth.user_id();
        let key = unlock_key(auth, store.as_ref(), config).await?;

        let engine = SyncEngine::new(user.clone(), store, key, config);
        if let Err(e) = engine.start().await {
            if !e.is_retryable() {
                engine.close();
                return Err(e);
            }
            warn!(user_id = %user, error = %e, "vault unlocked while offline");
        }

        let now = Utc::now();
        info!(user_id = %user, "vault unlocked");
        Ok(Self {
            user,
            engine,
            auditor: SecurityAuditor::new(config.audit.clone()),
            unlocked_at: now,
            last_activity: Mutex::new(now),
        })
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }

    pub fn engine(&self) -> &SyncEngine {
        self.touch();
        &self.engine
    }

    pub fn unlocked_at(&self) -> DateTime<Utc> {
        self.unlocked_at
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        *self.last_activity.lock()
    }

    pub fn touch(&self) {
        *self.last_activity.lock() = Utc::now();
    }

    pub fn is_locked(&self) -> bool {
        !self.engine.is_open()
    }

    /// Issues to highlight in the current item list.
    pub async fn highlight(&self) -> Result<IssueMap> {
        let items = self.engine().items();
        Ok(self.auditor.highlight(&items).await?)
    }

    /// Aggregate audit of the current item list.
    pub async fn audit_report(&self) -> Result<AuditReport> {
        let items = self.engine().items();
        Ok(self.auditor.report(&items).await?)
    }

    /// Stop syncing and destroy the key and decrypted state.
    pub fn lock(&self) {
        if self.engine.is_open() {
            self.engine.close();
            info!(user_id = %self.user, "vault locked");
        }
    }
}

impl Drop for VaultSession {
    fn drop(&mut self) {
        self.lock();
    }
}

/// Unlocked sessions by user.
pub struct SessionRegistry {
    store: Arc<dyn VaultStore>,
    config: Config,
    sessions: RwLock<HashMap<UserId, Arc<VaultSession>>>,
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn VaultStore>, config: Config) -> Self {
        Self {
            store,
            config,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Unlock `auth`'s vault, replacing (and locking) any existing session.
    pub async fn unlock(&self, auth: &dyn AuthProvider) -> Result<Arc<VaultSession>> {
        let session = Arc::new(VaultSession::unlock(auth, self.store.clone(), &self.config).await?);
        let previous = self
            .sessions
            .write()
            .await
            .insert(session.user().clone(), session.clone());
        if let Some(previous) = previous {
            previous.lock();
        }
        Ok(session)
    }

    /// The unlocked session of `user`, marking it active.
    pub async fn get(&self, user: &UserId) -> Option<Arc<VaultSession>> {
        let session = self.sessions.read().await.get(user).cloned()?;
        session.touch();
        Some(session)
    }

    /// Lock `user`'s session. Returns whether one was unlocked.
    pub async fn lock(&self, user: &UserId) -> bool {
        match self.sessions.write().await.remove(user) {
            Some(session) => {
                session.lock();
                true
            }
            None => false,
        }
    }

    pub async fn lock_all(&self) {
        let sessions: Vec<_> = self.sessions.write().await.drain().collect();
        for (_, session) in sessions {
            session.lock();
        }
    }

    /// Lock sessions idle for longer than `session.idle_timeout_secs`.
    pub async fn lock_idle(&self, now: DateTime<Utc>) -> Vec<UserId> {
        let timeout = chrono::Duration::seconds(self.config.session.idle_timeout_secs as i64);
        let mut sessions = self.sessions.write().await;

        let idle: Vec<UserId> = sessions
            .iter()
            .filter(|(_, session)| now - session.last_activity() > timeout)
            .map(|(user, _)| user.clone())
            .collect();
        for user in &idle {
            if let Some(session) = sessions.remove(user) {
                session.lock();
                info!(user_id = %user, "locked idle vault");
            }
        }
        idle
    }

    pub async fn unlocked_users(&self) -> Vec<UserId> {
        self.sessions.read().await.keys().cloned().collect()
    }
}
