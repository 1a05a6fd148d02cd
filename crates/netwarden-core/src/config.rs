//! Layered configuration for the Netwarden daemon and CLI.
//!
//! Precedence, lowest to highest: built-in defaults -> optional TOML file ->
//! `NETWARDEN_*` environment variables.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app_name: String,
    pub database_url: String,
    pub secret_key: String,
    pub access_token_expire_minutes: i64,
    pub refresh_token_expire_days: i64,
    pub scan_output_dir: String,
    pub default_scan_timeout_secs: u64,
    pub default_parallelism: i64,
    pub cors_origins: Vec<String>,
    pub default_admin_username: String,
    pub default_admin_password: String,
    pub log_level: String,
    pub log_format: LogFormat,
}

/// Output format for the `tracing-subscriber` installed by the daemon/CLI binaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            app_name: "Netwarden".to_string(),
            database_url: "sqlite://./data/netwarden.db".to_string(),
            secret_key: "change-this-to-a-random-secret-key-in-production".to_string(),
            access_token_expire_minutes: 30,
            refresh_token_expire_days: 7,
            scan_output_dir: "./scan_outputs".to_string(),
            default_scan_timeout_secs: 3600,
            default_parallelism: crate::types::DEFAULT_SCAN_PARALLELISM,
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:8080".to_string(),
            ],
            default_admin_username: "admin".to_string(),
            default_admin_password: "change-me-on-first-boot".to_string(),
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl Config {
    /// Loads defaults, overlays an optional TOML file, then overlays
    /// `NETWARDEN_*` environment variables, validating the result.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = Config::default();

        if let Some(path) = config_path {
            if path.exists() {
                config = Self::load_from_file(path)?;
            }
        }

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {path:?}: {e}")))?;
        Self::load_from_str(&contents)
    }

    pub fn load_from_str(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)
            .map_err(|e| Error::Config(format!("failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Overlays recognized `NETWARDEN_*` environment variables in place.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("NETWARDEN_APP_NAME") {
            self.app_name = v;
        }
        if let Ok(v) = std::env::var("NETWARDEN_DATABASE_URL") {
            self.database_url = v;
        }
        if let Ok(v) = std::env::var("NETWARDEN_SECRET_KEY") {
            self.secret_key = v;
        }
        if let Ok(v) = std::env::var("NETWARDEN_ACCESS_TOKEN_EXPIRE_MINUTES") {
            if let Ok(n) = v.parse() {
                self.access_token_expire_minutes = n;
            }
        }
        if let Ok(v) = std::env::var("NETWARDEN_REFRESH_TOKEN_EXPIRE_DAYS") {
            if let Ok(n) = v.parse() {
                self.refresh_token_expire_days = n;
            }
        }
        if let Ok(v) = std::env::var("NETWARDEN_SCAN_OUTPUT_DIR") {
            self.scan_output_dir = v;
        }
        if let Ok(v) = std::env::var("NETWARDEN_DEFAULT_SCAN_TIMEOUT_SECS") {
            if let Ok(n) = v.parse() {
                self.default_scan_timeout_secs = n;
            }
        }
        if let Ok(v) = std::env::var("NETWARDEN_DEFAULT_PARALLELISM") {
            if let Ok(n) = v.parse() {
                self.default_parallelism = n;
            }
        }
        if let Ok(v) = std::env::var("NETWARDEN_CORS_ORIGINS") {
            self.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(v) = std::env::var("NETWARDEN_ADMIN_USERNAME") {
            self.default_admin_username = v;
        }
        if let Ok(v) = std::env::var("NETWARDEN_ADMIN_PASSWORD") {
            self.default_admin_password = v;
        }
        if let Ok(v) = std::env::var("NETWARDEN_LOG_LEVEL") {
            self.log_level = v;
        }
        if let Ok(v) = std::env::var("NETWARDEN_LOG_FORMAT") {
            if v.eq_ignore_ascii_case("json") {
                self.log_format = LogFormat::Json;
            } else if v.eq_ignore_ascii_case("pretty") {
                self.log_format = LogFormat::Pretty;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.secret_key.trim().is_empty() {
            return Err(Error::Config("secret_key must not be empty".to_string()));
        }
        if self.access_token_expire_minutes <= 0 {
            return Err(Error::Config(
                "access_token_expire_minutes must be positive".to_string(),
            ));
        }
        if self.refresh_token_expire_days <= 0 {
            return Err(Error::Config(
                "refresh_token_expire_days must be positive".to_string(),
            ));
        }
        if !(crate::types::MIN_SCAN_PARALLELISM..=crate::types::MAX_SCAN_PARALLELISM)
            .contains(&self.default_parallelism)
        {
            return Err(Error::Config(format!(
                "default_parallelism must be between {} and {}",
                crate::types::MIN_SCAN_PARALLELISM,
                crate::types::MAX_SCAN_PARALLELISM
            )));
        }
        Ok(())
    }

    /// Resolves `scan_output_dir` to an absolute path, creating it if needed.
    pub fn ensure_output_dir(&self) -> Result<std::path::PathBuf> {
        let dir = std::path::PathBuf::from(&self.scan_output_dir);
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}
