//! Configuration loading and persistence.

use super::{Config, MAX_RETRIES_LIMIT, MIN_KDF_ITERATIONS};
use crate::env;
use crate::error::ConfigError;
use crate::paths;
use std::fs;
use std::path::{Path, PathBuf};

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = paths::config_file()?;
        Self::load(&path)
    }

    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        json5::from_str(content).map_err(|e| ConfigError::Json5(e.to_string()))
    }

    /// Save configuration to the default path.
    pub fn save_default(&self) -> Result<(), ConfigError> {
        let path = paths::config_file()?;
        self.save(&path)
    }

    /// Save configuration to a file path.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_json5()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write atomically
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, &content)?;
        fs::rename(&temp_path, path)?;

        Ok(())
    }

    /// Serialize to JSON5 string.
    pub fn to_json5(&self) -> Result<String, ConfigError> {
        // json5 has no serializer; plain JSON is valid JSON5.
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Validate the configuration, collecting all errors before returning.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        // 1. Key derivation must stay expensive
        if self.kdf.iterations < MIN_KDF_ITERATIONS {
            errors.push(format!(
                "kdf.iterations must be at least {}, got {}",
                MIN_KDF_ITERATIONS, self.kdf.iterations
            ));
        }

        // 2. Cache timing
        if self.cache.ttl_secs == 0 {
            errors.push("cache.ttl_secs must be greater than 0".to_string());
        }
        if self.cache.sweep_interval_secs == 0 {
            errors.push("cache.sweep_interval_secs must be greater than 0".to_string());
        }

        // 3. Audit thresholds
        if self.audit.weak_min_length == 0 {
            errors.push("audit.weak_min_length must be greater than 0".to_string());
        }
        if self.audit.highlight_old_days == 0 {
            errors.push("audit.highlight_old_days must be greater than 0".to_string());
        }
        if self.audit.report_old_days == 0 {
            errors.push("audit.report_old_days must be greater than 0".to_string());
        }
        if self.audit.task_timeout_ms == 0 {
            errors.push("audit.task_timeout_ms must be greater than 0".to_string());
        }

        // 4. Session lifetime
        if self.session.idle_timeout_secs == 0 {
            errors.push("session.idle_timeout_secs must be greater than 0".to_string());
        }

        // 5. Reconnect backoff
        if self.sync.retry_multiplier < 1.0 {
            errors.push(format!(
                "sync.retry_multiplier must be at least 1.0, got {}",
                self.sync.retry_multiplier
            ));
        }
        if self.sync.retry_initial_ms > self.sync.retry_max_ms {
            errors.push(format!(
                "sync.retry_initial_ms ({}) exceeds sync.retry_max_ms ({})",
                self.sync.retry_initial_ms, self.sync.retry_max_ms
            ));
        }
        if self.sync.max_retries > MAX_RETRIES_LIMIT {
            errors.push(format!(
                "sync.max_retries must be at most {MAX_RETRIES_LIMIT}, got {}",
                self.sync.max_retries
            ));
        }
        if self.sync.fetch_limit == Some(0) {
            errors.push("sync.fetch_limit must be greater than 0 when set".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors.join("; ")))
        }
    }

    /// Load configuration from the default path, falling back to defaults if no file exists.
    pub fn load_or_default() -> Self {
        let mut config = match Self::load_default() {
            Ok(config) => config,
            Err(ConfigError::NotFound(_)) => Self::default(),
            Err(e) => {
                tracing::warn!("Ignoring unreadable config: {}", e);
                Self::default()
            }
        };
        config.apply_env_overrides();
        config
    }

    /// Honor environment overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Some(iterations) = env::get_u32(env::vars::VAULTKEEP_KDF_ITERATIONS) {
            self.kdf.iterations = iterations;
        }
        if let Some(path) = env::get_var(env::vars::VAULTKEEP_STORE) {
            self.store.path = Some(paths::expand_tilde(&path));
        }
    }

    /// Resolve the file-backed store location.
    pub fn store_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.store.path {
            Some(path) => Ok(path.clone()),
            None => paths::store_file(),
        }
    }
}

/// Configuration builder for creating configs programmatically.
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new config builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the PBKDF2 round count.
    pub fn kdf_iterations(mut self, iterations: u32) -> Self {
        self.config.kdf.iterations = iterations;
        self
    }

    /// Set the cache TTL in seconds.
    pub fn cache_ttl_secs(mut self, secs: u64) -> Self {
        self.config.cache.ttl_secs = secs;
        self
    }

    /// Set the background analysis timeout.
    pub fn audit_timeout_ms(mut self, ms: u64) -> Self {
        self.config.audit.task_timeout_ms = ms;
        self
    }

    /// Set the vault size at which analysis moves to the background worker.
    pub fn background_threshold(mut self, items: usize) -> Self {
        self.config.audit.background_threshold = items;
        self
    }

    /// Set the reconnect backoff.
    pub fn retry(mut self, initial_ms: u64, max_ms: u64, max_retries: u32) -> Self {
        self.config.sync.retry_initial_ms = initial_ms;
        self.config.sync.retry_max_ms = max_ms;
        self.config.sync.max_retries = max_retries;
        self
    }

    /// Set the default cap on entries returned by a vault listing.
    pub fn fetch_limit(mut self, limit: usize) -> Self {
        self.config.sync.fetch_limit = Some(limit);
        self
    }

    /// Set the idle timeout in seconds.
    pub fn idle_timeout_secs(mut self, secs: u64) -> Self {
        self.config.session.idle_timeout_secs = secs;
        self
    }

    /// Set the store path.
    pub fn store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.store.path = Some(path.into());
        self
    }

    /// Build the config.
    pub fn build(self) -> Config {
        self.config
    }

    /// Validate and build the config, returning an error if validation fails.
    pub fn build_validated(self) -> Result<Config, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_parse_minimal_config() {
        let content = r#"{
            // comments are fine in json5
            kdf: { iterations: 200000 },
        }"#;

        let config = Config::parse(content).unwrap();
        assert_eq!(config.kdf.iterations, 200_000);
        assert_eq!(config.cache.ttl_secs, 300);
    }

    #[test]
    fn test_defaults_keep_distinct_old_thresholds() {
        let config = Config::default();
        assert_eq!(config.audit.highlight_old_days, 90);
        assert_eq!(config.audit.report_old_days, 180);
        assert_eq!(config.audit.weak_min_length, 8);
    }

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .kdf_iterations(150_000)
            .cache_ttl_secs(10)
            .audit_timeout_ms(250)
            .build();

        assert_eq!(config.kdf.iterations, 150_000);
        assert_eq!(config.cache.ttl(), Duration::from_secs(10));
        assert_eq!(config.audit.task_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_validate_default_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_low_iterations() {
        let result = ConfigBuilder::new().kdf_iterations(1_000).build_validated();
        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("kdf.iterations"), "Error should mention kdf: {}", err_msg);
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let mut config = Config::default();
        config.cache.ttl_secs = 0;
        config.session.idle_timeout_secs = 0;
        config.sync.retry_multiplier = 0.5;

        let err_msg = config.validate().unwrap_err().to_string();
        assert!(err_msg.contains("cache.ttl_secs"));
        assert!(err_msg.contains("session.idle_timeout_secs"));
        assert!(err_msg.contains("sync.retry_multiplier"));
    }

    #[test]
    fn test_retry_delay_backoff() {
        let config = ConfigBuilder::new().retry(100, 1_000, 5).build();
        assert_eq!(config.sync.retry_delay(1), Duration::from_millis(100));
        assert_eq!(config.sync.retry_delay(2), Duration::from_millis(200));
        assert_eq!(config.sync.retry_delay(3), Duration::from_millis(400));
        assert_eq!(config.sync.retry_delay(10), Duration::from_millis(1_000));
    }

    #[test]
    fn test_retry_delay_saturates_for_large_attempts() {
        let config = ConfigBuilder::new().retry(1, 1, 200).build();
        assert_eq!(config.sync.retry_delay(100), Duration::from_millis(1));
        assert_eq!(config.sync.retry_delay(u32::MAX), Duration::from_millis(1));

        let mut config = ConfigBuilder::new().retry(500, 30_000, 5).build();
        config.sync.retry_multiplier = f64::MAX;
        assert_eq!(config.sync.retry_delay(3), Duration::from_millis(30_000));
    }

    #[test]
    fn test_validate_bounds_max_retries() {
        let result = ConfigBuilder::new().retry(10, 100, MAX_RETRIES_LIMIT + 1).build_validated();
        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("sync.max_retries"), "Error should mention retries: {}", err_msg);

        assert!(ConfigBuilder::new().retry(10, 100, MAX_RETRIES_LIMIT).build_validated().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("vaultkeep.json5");

        let config = ConfigBuilder::new().kdf_iterations(123_456).build();
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.kdf.iterations, 123_456);
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load(Path::new("/nonexistent/vaultkeep.json5"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_store_path_override() {
        let config = ConfigBuilder::new().store_path("/tmp/vk.json").build();
        assert_eq!(config.store_path().unwrap(), PathBuf::from("/tmp/vk.json"));
    }
}
