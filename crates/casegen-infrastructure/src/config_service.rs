//! Configuration service implementation.
//!
//! This module provides a ConfigService that loads the root configuration
//! from the configuration file (~/.config/casegen/config.toml) and applies
//! environment overrides on top of it.

use crate::paths::CasegenPaths;
use casegen_core::config::ConfigRoot;
use casegen_core::error::{CasegenError, Result};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Overrides `client.base_url`.
pub const ENV_BASE_URL: &str = "CASEGEN_BASE_URL";
/// Overrides `client.session_cookie`.
pub const ENV_SESSION_COOKIE: &str = "CASEGEN_SESSION_COOKIE";

/// Configuration service that loads and caches the root configuration.
///
/// A missing file yields the defaults. A file that exists but cannot be
/// parsed is an error, so a typo never silently points the client at the
/// default service.
#[derive(Debug, Clone)]
pub struct ConfigService {
    path: PathBuf,
    config: Arc<RwLock<Option<ConfigRoot>>>,
}

impl ConfigService {
    /// Creates a service reading the config file from the default location.
    pub fn new() -> Result<Self> {
        let path = CasegenPaths::default()
            .config_file()
            .map_err(|e| CasegenError::config(e.to_string()))?;
        Ok(Self::with_path(path))
    }

    /// Creates a service reading the given file.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            config: Arc::new(RwLock::new(None)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Gets the root configuration, loading from file if not cached.
    pub fn get_config(&self) -> Result<ConfigRoot> {
        {
            let read_lock = self
                .config
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(ref cached) = *read_lock {
                return Ok(cached.clone());
            }
        }

        let mut loaded = Self::load_config(&self.path)?;
        apply_env_overrides(&mut loaded, |key| std::env::var(key).ok());

        {
            let mut write_lock = self
                .config
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            *write_lock = Some(loaded.clone());
        }

        Ok(loaded)
    }

    /// Invalidates the cache, forcing a reload on next access.
    pub fn invalidate_cache(&self) {
        let mut write_lock = self
            .config
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *write_lock = None;
    }

    /// Writes the default configuration if no file exists yet.
    ///
    /// Returns true when a file was created.
    pub fn write_default_if_missing(&self) -> Result<bool> {
        if self.path.exists() {
            return Ok(false);
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(&ConfigRoot::default())?;
        std::fs::write(&self.path, content)?;
        tracing::info!("[ConfigService] Wrote default config to {}", self.path.display());
        Ok(true)
    }

    fn load_config(path: &Path) -> Result<ConfigRoot> {
        if !path.exists() {
            tracing::debug!(
                "[ConfigService] {} not found, using defaults",
                path.display()
            );
            return Ok(ConfigRoot::default());
        }

        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| {
            CasegenError::config(format!("Failed to parse {}: {}", path.display(), e))
        })
    }
}

fn apply_env_overrides(config: &mut ConfigRoot, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(base_url) = lookup(ENV_BASE_URL).filter(|v| !v.trim().is_empty()) {
        config.client.base_url = base_url;
    }
    if let Some(cookie) = lookup(ENV_SESSION_COOKIE).filter(|v| !v.trim().is_empty()) {
        config.client.session_cookie = Some(cookie);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casegen_core::config::DEFAULT_BASE_URL;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let service = ConfigService::with_path(dir.path().join("config.toml"));

        let mut config = ConfigService::load_config(service.path()).unwrap();
        apply_env_overrides(&mut config, |_| None);

        assert_eq!(config.client.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.client.history_limit, 100);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[client]\nbase_url = \"http://qa.internal:8080\"\nrequest_timeout_secs = 60\n",
        )
        .unwrap();

        let config = ConfigService::load_config(&path).unwrap();

        assert_eq!(config.client.base_url, "http://qa.internal:8080");
        assert_eq!(config.client.request_timeout_secs, 60);
        assert_eq!(config.client.connect_timeout_secs, 10);
        assert!(config.client.session_cookie.is_none());
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[client\nbase_url = ").unwrap();

        let err = ConfigService::load_config(&path).unwrap_err();
        assert!(matches!(err, CasegenError::Config(_)));
    }

    #[test]
    fn test_env_overrides_win_over_file() {
        let mut config = ConfigRoot::default();
        apply_env_overrides(&mut config, |key| match key {
            ENV_BASE_URL => Some("http://override:5000".to_string()),
            ENV_SESSION_COOKIE => Some("session=abc".to_string()),
            _ => None,
        });

        assert_eq!(config.client.base_url, "http://override:5000");
        assert_eq!(config.client.session_cookie.as_deref(), Some("session=abc"));
    }

    #[test]
    fn test_write_default_if_missing_round_trips() {
        let dir = TempDir::new().unwrap();
        let service = ConfigService::with_path(dir.path().join("nested").join("config.toml"));

        assert!(service.write_default_if_missing().unwrap());
        assert!(!service.write_default_if_missing().unwrap());

        let config = ConfigService::load_config(service.path()).unwrap();
        assert_eq!(config, ConfigRoot::default());
    }
}
