//! Configuration schema definitions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Lowest PBKDF2 round count the engine accepts.
pub const MIN_KDF_ITERATIONS: u32 = 100_000;

/// Main Vaultkeep configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Key derivation settings.
    #[serde(default)]
    pub kdf: KdfConfig,

    /// Local cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Security audit settings.
    #[serde(default)]
    pub audit: AuditConfig,

    /// Session lifetime settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// Synchronization settings.
    #[serde(default)]
    pub sync: SyncConfig,

    /// Store location.
    #[serde(default)]
    pub store: StoreConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Key derivation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KdfConfig {
    /// PBKDF2-HMAC-SHA256 rounds.
    #[serde(default = "default_kdf_iterations")]
    pub iterations: u32,
}

impl Default for KdfConfig {
    fn default() -> Self {
        Self {
            iterations: default_kdf_iterations(),
        }
    }
}

fn default_kdf_iterations() -> u32 {
    310_000
}

/// Local cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Lifetime of a cache entry in seconds.
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,

    /// How often expired entries are evicted, in seconds.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

fn default_cache_ttl() -> u64 {
    300
}

fn default_sweep_interval() -> u64 {
    60
}

/// Security audit configuration.
///
/// Live highlighting and the aggregate report deliberately use different
/// age thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Passwords shorter than this many characters are weak.
    #[serde(default = "default_weak_min_length")]
    pub weak_min_length: usize,

    /// Age in days after which live highlighting flags a password as old.
    #[serde(default = "default_highlight_old_days")]
    pub highlight_old_days: u32,

    /// Age in days after which the audit report flags a password as old.
    #[serde(default = "default_report_old_days")]
    pub report_old_days: u32,

    /// Timeout for a background analysis request in milliseconds.
    #[serde(default = "default_task_timeout_ms")]
    pub task_timeout_ms: u64,

    /// Vaults with fewer items than this are analyzed inline.
    #[serde(default = "default_background_threshold")]
    pub background_threshold: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            weak_min_length: default_weak_min_length(),
            highlight_old_days: default_highlight_old_days(),
            report_old_days: default_report_old_days(),
            task_timeout_ms: default_task_timeout_ms(),
            background_threshold: default_background_threshold(),
        }
    }
}

impl AuditConfig {
    pub fn task_timeout(&self) -> Duration {
        Duration::from_millis(self.task_timeout_ms)
    }
}

fn default_weak_min_length() -> usize {
    8
}

fn default_highlight_old_days() -> u32 {
    90
}

fn default_report_old_days() -> u32 {
    180
}

fn default_task_timeout_ms() -> u64 {
    5_000
}

fn default_background_threshold() -> usize {
    50
}

/// Session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Idle time after which an unlocked vault is locked, in seconds.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout(),
        }
    }
}

impl SessionConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

fn default_idle_timeout() -> u64 {
    900
}

/// Synchronization configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// First reconnect delay in milliseconds.
    #[serde(default = "default_retry_initial_ms")]
    pub retry_initial_ms: u64,

    /// Upper bound on the reconnect delay in milliseconds.
    #[serde(default = "default_retry_max_ms")]
    pub retry_max_ms: u64,

    /// Reconnect delay multiplier (exponential backoff).
    #[serde(default = "default_retry_multiplier")]
    pub retry_multiplier: f64,

    /// Reconnect attempts before the error becomes blocking.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Default cap on entries returned by a vault listing. The session
    /// itself always holds the whole vault.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch_limit: Option<usize>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            retry_initial_ms: default_retry_initial_ms(),
            retry_max_ms: default_retry_max_ms(),
            retry_multiplier: default_retry_multiplier(),
            max_retries: default_max_retries(),
            fetch_limit: None,
        }
    }
}

impl SyncConfig {
    /// Backoff delay before reconnect attempt `attempt` (1-based).
    ///
    /// Clamped to `retry_max_ms` before it becomes a [`Duration`], so large
    /// attempt numbers saturate instead of overflowing.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let max_ms = self.retry_max_ms as f64;
        let delay_ms = (self.retry_initial_ms as f64 * self.retry_multiplier.powi(exponent)).min(max_ms);
        if delay_ms.is_nan() || delay_ms <= 0.0 {
            return Duration::ZERO;
        }
        Duration::from_millis(delay_ms as u64)
    }
}

fn default_retry_initial_ms() -> u64 {
    500
}

fn default_retry_max_ms() -> u64 {
    30_000
}

fn default_retry_multiplier() -> f64 {
    2.0
}

/// Upper bound accepted for `sync.max_retries`.
pub const MAX_RETRIES_LIMIT: u32 = 100;

fn default_max_retries() -> u32 {
    5
}

/// Store configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path of the file-backed store. Defaults to `~/.vaultkeep/vault.json`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON log lines.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
