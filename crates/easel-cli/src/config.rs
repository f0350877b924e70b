//! Configuration file management for easel.
//!
//! Provides a TOML-based config file at `~/.config/easel/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use easel_db::config::DbConfig;

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    pub database: DatabaseSection,
    pub backend: BackendSection,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseSection {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BackendSection {
    /// Base URL of the OpenAI-compatible chat completions API.
    pub url: String,
    /// API key sent as a bearer token. May be empty for local backends.
    #[serde(default)]
    pub api_key: String,
    /// Default model identifier for `easel generate`.
    #[serde(default = "default_model")]
    pub model: String,
}

fn default_model() -> String {
    "gpt-4o-mini".to_owned()
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the easel config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/easel` or `~/.config/easel`.
/// We intentionally ignore the platform-specific `dirs::config_dir()`
/// (which returns `~/Library/Application Support` on macOS).
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("easel");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("easel")
}

/// Return the path to the easel config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents).context("failed to parse config file")?;
    Ok(config)
}

/// Serialize and write the config file, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix (the file holds an API key).
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolution
// -----------------------------------------------------------------------

/// Fully resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct EaselConfig {
    pub db_config: DbConfig,
    pub backend_url: String,
    pub backend_api_key: String,
    pub default_model: String,
}

impl EaselConfig {
    /// Resolve configuration from (in priority order) the CLI flag, the
    /// environment, the config file, and compiled-in defaults.
    pub fn resolve(cli_db_url: Option<&str>) -> Result<Self> {
        let file = load_config().ok();

        let database_url = cli_db_url
            .map(str::to_owned)
            .or_else(|| std::env::var("EASEL_DATABASE_URL").ok())
            .or_else(|| file.as_ref().map(|f| f.database.url.clone()))
            .unwrap_or_else(|| DbConfig::DEFAULT_URL.to_owned());

        let backend_url = std::env::var("EASEL_BACKEND_URL")
            .ok()
            .or_else(|| file.as_ref().map(|f| f.backend.url.clone()))
            .unwrap_or_else(|| "https://api.openai.com/v1".to_owned());

        let backend_api_key = std::env::var("EASEL_BACKEND_API_KEY")
            .ok()
            .or_else(|| file.as_ref().map(|f| f.backend.api_key.clone()))
            .unwrap_or_default();

        let default_model = file
            .as_ref()
            .map(|f| f.backend.model.clone())
            .unwrap_or_else(default_model);

        Ok(Self {
            db_config: DbConfig::new(database_url),
            backend_url,
            backend_api_key,
            default_model,
        })
    }
}
