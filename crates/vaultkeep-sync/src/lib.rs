//! # vaultkeep-sync
//!
//! Store contract and synchronization for Vaultkeep.
//!
//! - **Store**: the [`VaultStore`] contract plus in-memory and file-backed stores
//! - **Cache**: a per-user [`LocalCache`] keyed by the store's change hash
//! - **Engine**: [`SyncEngine`] keeps the decrypted list in sync with the store
//! - **Sessions**: unlock, lock, and idle timeout per user
//! - **Transfer**: plaintext export and validated import

pub mod auth;
pub mod cache;
pub mod engine;
pub mod error;
pub mod session;
pub mod store;
pub mod transfer;

pub use auth::{AuthProvider, StaticAuth};
pub use cache::{CacheEntry, LocalCache};
pub use engine::{MutationOutcome, SyncEngine, SyncStats, SyncStatus, VaultEntry, VaultSnapshot};
pub use error::{Result, StoreError, StoreResult, SyncError};
pub use session::{unlock_key, SessionRegistry, VaultSession};
pub use store::{
    change_hash, ChangeInfo, ChangeSet, FetchOptions, FileVaultStore, MemoryVaultStore, StoreEvent,
    Subscription, VaultStore,
};
pub use transfer::{export_vault, import_vault, ExportDocument, ExportMetadata, ImportReport};
