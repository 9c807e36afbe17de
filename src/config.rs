//! Configuration file parser for ~/.config/toptweets/config.toml.
//!
//! The config file is optional and a missing file yields `Config::default()`.
//! Its `source_base`, `per_handle_limit` and `top_n` only seed the defaults:
//! anything saved with `toptweets settings` takes precedence at run time.
//! Unknown keys are ignored, though we log a warning for likely typos.
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::pipeline::PipelineOptions;
use crate::storage::{Settings, DEFAULT_PER_HANDLE_LIMIT, DEFAULT_SOURCE_BASE, DEFAULT_TOP_N};

/// Public raw-content proxy used when a direct fetch fails.
pub const DEFAULT_FALLBACK_PROXY: &str = "https://api.allorigins.win/raw?url=";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// SEC-014: Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default mirror base URL.
    pub source_base: String,

    /// Default number of entries kept per handle.
    pub per_handle_limit: usize,

    /// Default number of ranked items shown.
    pub top_n: usize,

    /// Time budget for one handle's fetch, fallback included.
    pub fetch_timeout_secs: u64,

    /// How many handles are fetched at once.
    pub max_concurrent_fetches: usize,

    /// Proxy prefix tried after a failed direct fetch. Empty disables it.
    pub fallback_proxy: String,

    /// User-Agent header sent to mirrors and the proxy.
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_base: DEFAULT_SOURCE_BASE.to_string(),
            per_handle_limit: DEFAULT_PER_HANDLE_LIMIT,
            top_n: DEFAULT_TOP_N,
            fetch_timeout_secs: crate::pipeline::DEFAULT_FETCH_TIMEOUT.as_secs(),
            max_concurrent_fetches: crate::pipeline::DEFAULT_MAX_CONCURRENT_FETCHES,
            fallback_proxy: DEFAULT_FALLBACK_PROXY.to_string(),
            user_agent: format!("toptweets/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Config {
    /// SEC-014: Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 7] = [
        "source_base",
        "per_handle_limit",
        "top_n",
        "fetch_timeout_secs",
        "max_concurrent_fetches",
        "fallback_proxy",
        "user_agent",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // SEC-014: Check file size before reading to prevent memory exhaustion
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            source = %config.source_base,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Settings used for any field the user has not saved.
    pub fn settings_defaults(&self) -> Settings {
        Settings {
            source_base: self.source_base.clone(),
            per_handle_limit: self.per_handle_limit,
            top_n: self.top_n,
        }
        .clamped()
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs.max(1)),
            max_concurrent_fetches: self.max_concurrent_fetches.max(1),
        }
    }

    /// The proxy prefix, or `None` when the fallback is disabled.
    pub fn fallback_prefix(&self) -> Option<&str> {
        let prefix = self.fallback_proxy.trim();
        (!prefix.is_empty()).then_some(prefix)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(name: &str, content: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("toptweets_config_test_{}", name));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    fn cleanup(path: &Path) {
        if let Some(dir) = path.parent() {
            std::fs::remove_dir_all(dir).ok();
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.source_base, "https://nitter.net");
        assert_eq!(config.per_handle_limit, 8);
        assert_eq!(config.top_n, 12);
        assert_eq!(config.fetch_timeout_secs, 20);
        assert_eq!(config.max_concurrent_fetches, 4);
        assert_eq!(config.fallback_prefix(), Some(DEFAULT_FALLBACK_PROXY));
        assert!(config.user_agent.starts_with("toptweets/"));
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/toptweets_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.top_n, 12);
    }

    #[test]
    fn test_whitespace_only_file_returns_default() {
        let path = write_config("whitespace", "   \n  \n  ");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.source_base, "https://nitter.net");
        cleanup(&path);
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let path = write_config("partial", "top_n = 5\n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.top_n, 5);
        assert_eq!(config.per_handle_limit, 8);
        assert_eq!(config.source_base, "https://nitter.net");
        cleanup(&path);
    }

    #[test]
    fn test_full_config() {
        let content = r#"
source_base = "https://mirror.example/"
per_handle_limit = 3
top_n = 20
fetch_timeout_secs = 5
max_concurrent_fetches = 2
fallback_proxy = ""
user_agent = "custom/1.0"
"#;
        let path = write_config("full", content);
        let config = Config::load(&path).unwrap();
        assert_eq!(config.source_base, "https://mirror.example/");
        assert_eq!(config.per_handle_limit, 3);
        assert_eq!(config.top_n, 20);
        assert_eq!(config.fallback_prefix(), None);
        assert_eq!(config.user_agent, "custom/1.0");

        let options = config.pipeline_options();
        assert_eq!(options.fetch_timeout, Duration::from_secs(5));
        assert_eq!(options.max_concurrent_fetches, 2);
        cleanup(&path);
    }

    #[test]
    fn test_settings_defaults_are_clamped() {
        let config = Config {
            source_base: "  ".into(),
            per_handle_limit: 0,
            top_n: 0,
            ..Config::default()
        };
        let settings = config.settings_defaults();
        assert_eq!(settings.source_base, DEFAULT_SOURCE_BASE);
        assert_eq!(settings.per_handle_limit, 1);
        assert_eq!(settings.top_n, 1);
    }

    #[test]
    fn test_zero_pipeline_options_are_raised() {
        let config = Config {
            fetch_timeout_secs: 0,
            max_concurrent_fetches: 0,
            ..Config::default()
        };
        let options = config.pipeline_options();
        assert_eq!(options.fetch_timeout, Duration::from_secs(1));
        assert_eq!(options.max_concurrent_fetches, 1);
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let path = write_config("invalid", "this is not [valid toml");
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
        cleanup(&path);
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let path = write_config("unknown", "top_n = 4\ntheme = \"dark\"\n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.top_n, 4);
        cleanup(&path);
    }

    #[test]
    fn test_wrong_type_returns_error() {
        let path = write_config("wrongtype", "top_n = \"twelve\"\n");
        assert!(Config::load(&path).is_err());
        cleanup(&path);
    }

    // SEC-014: File size limit
    #[test]
    fn test_too_large_file_rejected() {
        let path = write_config("too_large", &"a".repeat(1_048_577));
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));
        cleanup(&path);
    }
}
