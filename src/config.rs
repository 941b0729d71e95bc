//! Library configuration.
//!
//! Looked up, first match wins, at:
//! 1. `$MAILSIFT_CONFIG` (environment variable)
//! 2. `~/.config/mailsift/config.toml` (Linux/macOS)
//!    `%APPDATA%\mailsift\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Everything that can be set from `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Message decoding policy.
    pub parser: ParserConfig,
    /// Log output settings.
    pub logging: LoggingConfig,
}

/// Message decoding policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Name given to attachments whose filename cannot be recovered.
    pub default_attachment_name: String,
    /// Deepest multipart nesting that is still expanded. The root multipart
    /// is always expanded, so `0` behaves like `1`.
    pub max_depth: usize,
    /// Joins sibling body parts into one body.
    pub body_separator: String,
    /// Content type of the out-of-band public key attachment.
    pub public_key_mime_type: String,
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub level: String,
    /// Optional log file, written in addition to stderr.
    pub file: Option<PathBuf>,
}

// ── Defaults ────────────────────────────────────────────────────

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            default_attachment_name: "attachment.bin".to_string(),
            max_depth: 32,
            body_separator: "\n".to_string(),
            public_key_mime_type: "application/pgp-keys".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            file: None,
        }
    }
}

// ── Files ───────────────────────────────────────────────────────

/// Load the configuration from the first location that has a file.
///
/// A missing or broken file yields the built-in defaults.
pub fn load_config() -> Config {
    match config_file_path() {
        Some(path) if path.exists() => load_config_from(&path),
        _ => Config::default(),
    }
}

/// Load configuration from an explicit file, falling back to defaults.
pub fn load_config_from(path: &Path) -> Config {
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str::<Config>(&contents) {
            Ok(cfg) => {
                tracing::info!(path = %path.display(), "Configuration loaded");
                cfg
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Invalid config file, using defaults"
                );
                Config::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Unreadable config file, using defaults"
            );
            Config::default()
        }
    }
}

/// Save configuration to the given path, creating parent directories.
pub fn save_config(config: &Config, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    tracing::info!(path = %path.display(), "Configuration written");
    Ok(())
}

/// Where the configuration lives: `$MAILSIFT_CONFIG`, else the platform config dir.
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MAILSIFT_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    dirs::config_dir().map(|d| d.join("mailsift").join("config.toml"))
}
