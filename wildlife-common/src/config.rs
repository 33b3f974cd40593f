//! Configuration loading and resolution
//!
//! Settings are resolved once at startup into an immutable [`ServiceConfig`]
//! that is handed to each component at construction time. Priority order:
//! 1. Command-line arguments (highest priority)
//! 2. Environment variables
//! 3. TOML config file
//! 4. Compiled defaults (fallback)
//!
//! Arguments and environment variables are parsed by the binary and arrive
//! here as [`ConfigOverrides`].

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "WILDLIFE_CONFIG";

/// Compiled defaults
pub const DEFAULT_UPLOAD_DIR: &str = "./uploads";
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;
pub const DEFAULT_ALLOWED_EXTENSIONS: &str = "jpg,jpeg,png";
pub const DEFAULT_PREDICTOR_URL: &str = "http://localhost:8000";
pub const DEFAULT_PREDICTOR_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_DATABASE_PATH: &str = "./wildlife.db";
pub const DEFAULT_PORT: u16 = 8080;

/// TOML config file contents; every key is optional
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub upload_dir: Option<PathBuf>,
    #[serde(default)]
    pub max_upload_bytes: Option<u64>,
    /// Comma-separated, e.g. "jpg,jpeg,png"
    #[serde(default)]
    pub allowed_extensions: Option<String>,
    #[serde(default)]
    pub predictor_url: Option<String>,
    #[serde(default)]
    pub predictor_timeout_ms: Option<u64>,
    #[serde(default)]
    pub auto_create_species: Option<bool>,
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Values supplied on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub upload_dir: Option<PathBuf>,
    pub max_upload_bytes: Option<u64>,
    pub allowed_extensions: Option<String>,
    pub predictor_url: Option<String>,
    pub predictor_timeout_ms: Option<u64>,
    pub auto_create_species: Option<bool>,
    pub database_path: Option<PathBuf>,
    pub port: Option<u16>,
}

/// Resolved, immutable service configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    /// Root directory for stored uploads
    pub upload_dir: PathBuf,
    /// Largest accepted upload in bytes
    pub max_upload_bytes: u64,
    /// Lowercase extensions without the leading dot
    pub allowed_extensions: Vec<String>,
    /// Predictor base URL, without trailing slash
    pub predictor_url: String,
    pub predictor_timeout: Duration,
    /// Insert unseen predicted labels as new species
    pub auto_create_species: bool,
    pub database_path: PathBuf,
    pub port: u16,
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            allowed_extensions: parse_extensions(DEFAULT_ALLOWED_EXTENSIONS),
            predictor_url: DEFAULT_PREDICTOR_URL.to_string(),
            predictor_timeout: Duration::from_millis(DEFAULT_PREDICTOR_TIMEOUT_MS),
            auto_create_species: true,
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            port: DEFAULT_PORT,
            log_level: default_log_level(),
        }
    }
}

impl ServiceConfig {
    /// Merge overrides over TOML over compiled defaults, then validate
    pub fn resolve(overrides: ConfigOverrides, toml: Option<TomlConfig>) -> Result<Self> {
        let toml = toml.unwrap_or_default();
        let defaults = Self::default();

        let allowed_extensions = overrides
            .allowed_extensions
            .or(toml.allowed_extensions)
            .map(|s| parse_extensions(&s))
            .unwrap_or(defaults.allowed_extensions);

        let predictor_timeout = overrides
            .predictor_timeout_ms
            .or(toml.predictor_timeout_ms)
            .map(Duration::from_millis)
            .unwrap_or(defaults.predictor_timeout);

        let predictor_url = overrides
            .predictor_url
            .or(toml.predictor_url)
            .unwrap_or(defaults.predictor_url)
            .trim_end_matches('/')
            .to_string();

        let config = Self {
            upload_dir: overrides
                .upload_dir
                .or(toml.upload_dir)
                .unwrap_or(defaults.upload_dir),
            max_upload_bytes: overrides
                .max_upload_bytes
                .or(toml.max_upload_bytes)
                .unwrap_or(defaults.max_upload_bytes),
            allowed_extensions,
            predictor_url,
            predictor_timeout,
            auto_create_species: overrides
                .auto_create_species
                .or(toml.auto_create_species)
                .unwrap_or(defaults.auto_create_species),
            database_path: overrides
                .database_path
                .or(toml.database_path)
                .unwrap_or(defaults.database_path),
            port: overrides.port.or(toml.port).unwrap_or(defaults.port),
            log_level: toml.logging.level,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations no component could run with
    pub fn validate(&self) -> Result<()> {
        if self.max_upload_bytes == 0 {
            return Err(Error::Config("max_upload_bytes must be greater than 0".to_string()));
        }
        if self.allowed_extensions.is_empty() {
            return Err(Error::Config("allowed_extensions must list at least one extension".to_string()));
        }
        if !(self.predictor_url.starts_with("http://") || self.predictor_url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "predictor_url must be an http(s) URL, got '{}'",
                self.predictor_url
            )));
        }
        if self.predictor_timeout.is_zero() {
            return Err(Error::Config("predictor_timeout_ms must be greater than 0".to_string()));
        }
        Ok(())
    }

    /// Comma-separated allow-list, as shown in validation messages
    pub fn allowed_extensions_display(&self) -> String {
        self.allowed_extensions.join(",")
    }
}

/// Split a comma-separated extension list into lowercase entries
///
/// Leading dots and surrounding whitespace are dropped, empty entries skipped.
pub fn parse_extensions(list: &str) -> Vec<String> {
    list.split(',')
        .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect()
}

/// Where the TOML layer came from
///
/// Config is read before the tracing subscriber exists, so loading reports
/// its outcome here and the binary logs it once logging is up.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    /// Values were read from this file
    File(PathBuf),
    /// A path was given but nothing exists there
    MissingFile(PathBuf),
    /// No path given and no file in the default location
    Defaults,
}

/// Locate the config file
///
/// `explicit` is the path from the command line or `WILDLIFE_CONFIG`; the
/// binary's argument parser reads both. Otherwise
/// `<config dir>/wildlife/config.toml` is used when it exists.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    dirs::config_dir()
        .map(|d| d.join("wildlife").join("config.toml"))
        .filter(|p| p.exists())
}

/// Load the TOML config file
///
/// A missing file is not an error: `None` is returned so startup continues
/// on defaults. A file that exists but does not parse is.
pub fn load_toml_config(path: &Path) -> Result<Option<TomlConfig>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;

    Ok(Some(config))
}

/// Resolve the config path and load it, reporting where values came from
pub fn load_config_file(explicit: Option<&Path>) -> Result<(Option<TomlConfig>, ConfigSource)> {
    let Some(path) = resolve_config_path(explicit) else {
        return Ok((None, ConfigSource::Defaults));
    };

    match load_toml_config(&path)? {
        Some(toml) => Ok((Some(toml), ConfigSource::File(path))),
        None => Ok((None, ConfigSource::MissingFile(path))),
    }
}
