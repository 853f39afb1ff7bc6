//! # Marquee Configuration
//!
//! Configuration management for the digest engine and the daemon.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     MARQUEE_HOSTNAME=media.local                                       │
//! │     MARQUEE_TOKEN=abc123                                               │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/marquee/marquee.toml (Linux)                             │
//! │     ~/Library/Application Support/com.marquee.marquee/marquee.toml     │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     localhost:32400 over http, 15 minute refresh                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # marquee.toml
//! [server]
//! hostname = "media.local"
//! port = 32400
//! https = false
//! token = "abc123"
//!
//! [digest]
//! refresh_minutes = 15
//! fetch_timeout_secs = 30
//!
//! [cache]
//! path = "/var/cache/marquee/cache.json"
//!
//! [client]
//! identifier = "550e8400-e29b-41d4-a716-446655440000"
//! product = "Marquee"
//! device_name = "marquee-daemon"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::error::{DigestError, DigestResult};

/// Smallest refresh interval `marquee init` will write.
pub const MIN_SETUP_REFRESH_MINUTES: u64 = 5;

// =============================================================================
// Server Settings
// =============================================================================

/// Where the media server lives and how to authenticate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_hostname")]
    pub hostname: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Use https instead of http.
    #[serde(default)]
    pub https: bool,

    /// `X-Plex-Token` sent with every query.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

fn default_hostname() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    32400
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            hostname: default_hostname(),
            port: default_port(),
            https: false,
            token: None,
        }
    }
}

impl ServerSettings {
    /// Builds `{http|https}://hostname:port/`.
    pub fn base_url(&self) -> DigestResult<Url> {
        let scheme = if self.https { "https" } else { "http" };
        let mut url = Url::parse(&format!("{scheme}://{}", self.hostname))?;
        url.set_port(Some(self.port))
            .map_err(|_| DigestError::InvalidUrl(format!("cannot set port on {url}")))?;
        Ok(url)
    }

    /// Identity of the server endpoint, used to decide whether a
    /// reconfiguration points at a different server.
    pub fn endpoint(&self) -> (String, u16, bool) {
        (self.hostname.to_lowercase(), self.port, self.https)
    }

    /// Returns the token if present and non-empty.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.trim().is_empty())
    }
}

// =============================================================================
// Digest Settings
// =============================================================================

/// Schedule of the digest cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestSettings {
    /// Minutes between cycles.
    #[serde(default = "default_refresh_minutes")]
    pub refresh_minutes: u64,

    /// Upper bound on each individual query (seconds).
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
}

fn default_refresh_minutes() -> u64 {
    15
}

fn default_fetch_timeout() -> u64 {
    30
}

impl Default for DigestSettings {
    fn default() -> Self {
        DigestSettings {
            refresh_minutes: default_refresh_minutes(),
            fetch_timeout_secs: default_fetch_timeout(),
        }
    }
}

// =============================================================================
// Cache Settings
// =============================================================================

/// Location of the snapshot file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Defaults to `cache.json` in the platform cache directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

// =============================================================================
// Client Identity
// =============================================================================

/// How Marquee introduces itself to the server (`X-Plex-*` headers).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientIdentity {
    /// Stable client identifier (UUID v4), generated on first run.
    #[serde(default = "default_identifier")]
    pub identifier: String,

    #[serde(default = "default_product")]
    pub product: String,

    #[serde(default = "default_device_name")]
    pub device_name: String,
}

fn default_identifier() -> String {
    Uuid::new_v4().to_string()
}

fn default_product() -> String {
    "Marquee".to_string()
}

fn default_device_name() -> String {
    "marquee-daemon".to_string()
}

impl Default for ClientIdentity {
    fn default() -> Self {
        ClientIdentity {
            identifier: default_identifier(),
            product: default_product(),
            device_name: default_device_name(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete Marquee configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarqueeConfig {
    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub digest: DigestSettings,

    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub client: ClientIdentity,
}

impl MarqueeConfig {
    /// Creates a new config with defaults and a generated client identifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (marquee.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> DigestResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> DigestResult<PathBuf> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| DigestError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| DigestError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)
            .map_err(|e| DigestError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Config saved");
        Ok(path)
    }

    /// Validates what the running engine needs.
    pub fn validate(&self) -> DigestResult<()> {
        if self.server.token().is_none() {
            return Err(DigestError::MissingToken);
        }

        if self.server.hostname.trim().is_empty() {
            return Err(DigestError::InvalidConfig("hostname must not be empty".into()));
        }

        if self.digest.refresh_minutes == 0 {
            return Err(DigestError::InvalidConfig(
                "refresh_minutes must be greater than 0".into(),
            ));
        }

        if self.digest.fetch_timeout_secs == 0 {
            return Err(DigestError::InvalidConfig(
                "fetch_timeout_secs must be greater than 0".into(),
            ));
        }

        self.server.base_url()?;
        Ok(())
    }

    /// Validates what `marquee init` is willing to write.
    ///
    /// On top of [`MarqueeConfig::validate`]: a refresh of at least
    /// [`MIN_SETUP_REFRESH_MINUTES`] and a port in `1..=65535`. Port 0 is
    /// refused because no server can be reached on it.
    pub fn validate_for_setup(&self) -> DigestResult<()> {
        self.validate()?;

        if self.server.port == 0 {
            return Err(DigestError::InvalidConfig(
                "port must be between 1 and 65535".into(),
            ));
        }

        if self.digest.refresh_minutes < MIN_SETUP_REFRESH_MINUTES {
            return Err(DigestError::InvalidConfig(format!(
                "refresh_minutes must be at least {MIN_SETUP_REFRESH_MINUTES}, got {}",
                self.digest.refresh_minutes
            )));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    /// Applies overrides from any variable source.
    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(hostname) = lookup("MARQUEE_HOSTNAME") {
            debug!(hostname = %hostname, "Overriding hostname from environment");
            self.server.hostname = hostname;
        }

        if let Some(port) = lookup("MARQUEE_PORT") {
            match port.parse::<u16>() {
                Ok(p) => self.server.port = p,
                Err(_) => warn!(port = %port, "Ignoring invalid MARQUEE_PORT"),
            }
        }

        if let Some(https) = lookup("MARQUEE_HTTPS") {
            match https.to_lowercase().as_str() {
                "1" | "true" | "yes" => self.server.https = true,
                "0" | "false" | "no" => self.server.https = false,
                _ => warn!(https = %https, "Ignoring invalid MARQUEE_HTTPS"),
            }
        }

        if let Some(token) = lookup("MARQUEE_TOKEN") {
            debug!("Overriding token from environment");
            self.server.token = Some(token);
        }

        if let Some(minutes) = lookup("MARQUEE_REFRESH_MINUTES") {
            match minutes.parse::<u64>() {
                Ok(m) => self.digest.refresh_minutes = m,
                Err(_) => warn!(minutes = %minutes, "Ignoring invalid MARQUEE_REFRESH_MINUTES"),
            }
        }

        if let Some(path) = lookup("MARQUEE_CACHE_PATH") {
            self.cache.path = Some(PathBuf::from(path));
        }
    }

    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("com", "marquee", "marquee")
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("marquee.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Returns the snapshot file path.
    pub fn cache_path(&self) -> PathBuf {
        self.cache.path.clone().unwrap_or_else(|| {
            Self::project_dirs()
                .map(|dirs| dirs.data_dir().join("cache.json"))
                .unwrap_or_else(|| PathBuf::from("marquee-cache.json"))
        })
    }

    /// Returns the digest interval.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.digest.refresh_minutes.saturating_mul(60))
    }

    /// Returns the per-query timeout.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.digest.fetch_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn configured() -> MarqueeConfig {
        let mut config = MarqueeConfig::default();
        config.server.token = Some("secret".into());
        config
    }

    #[test]
    fn test_default_config() {
        let config = MarqueeConfig::default();
        assert!(!config.client.identifier.is_empty());
        assert_eq!(config.server.port, 32400);
        assert_eq!(config.digest.refresh_minutes, 15);
        assert_eq!(config.refresh_interval(), Duration::from_secs(900));
    }

    #[test]
    fn test_missing_token_is_fatal() {
        let mut config = MarqueeConfig::default();
        assert!(matches!(config.validate(), Err(DigestError::MissingToken)));

        config.server.token = Some("   ".into());
        assert!(matches!(config.validate(), Err(DigestError::MissingToken)));

        config.server.token = Some("secret".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_engine_accepts_short_intervals_setup_does_not() {
        let mut config = configured();
        config.digest.refresh_minutes = 1;
        assert!(config.validate().is_ok());
        assert!(config.validate_for_setup().is_err());

        config.digest.refresh_minutes = 5;
        assert!(config.validate_for_setup().is_ok());

        config.digest.refresh_minutes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_setup_rejects_port_zero() {
        let mut config = configured();
        config.server.port = 0;
        assert!(config.validate_for_setup().is_err());
    }

    #[test]
    fn test_base_url() {
        let mut config = configured();
        config.server.hostname = "media.local".into();
        assert_eq!(
            config.server.base_url().unwrap().as_str(),
            "http://media.local:32400/"
        );

        config.server.https = true;
        config.server.port = 443;
        // Default port for the scheme is elided
        assert_eq!(
            config.server.base_url().unwrap().as_str(),
            "https://media.local/"
        );
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("MARQUEE_HOSTNAME", "nas"),
            ("MARQUEE_PORT", "8080"),
            ("MARQUEE_HTTPS", "true"),
            ("MARQUEE_TOKEN", "from-env"),
            ("MARQUEE_REFRESH_MINUTES", "not-a-number"),
            ("MARQUEE_CACHE_PATH", "/tmp/marquee.json"),
        ]
        .into_iter()
        .collect();

        let mut config = MarqueeConfig::default();
        config.apply_overrides_from(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.server.hostname, "nas");
        assert_eq!(config.server.port, 8080);
        assert!(config.server.https);
        assert_eq!(config.server.token(), Some("from-env"));
        assert_eq!(config.digest.refresh_minutes, 15);
        assert_eq!(config.cache_path(), PathBuf::from("/tmp/marquee.json"));
    }

    #[test]
    fn test_toml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("marquee.toml");

        let mut config = configured();
        config.server.hostname = "media.local".into();
        config.save(Some(path.clone())).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[server]"));
        assert!(contents.contains("[digest]"));

        let loaded: MarqueeConfig = toml::from_str(&contents).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: MarqueeConfig = toml::from_str("[server]\ntoken = \"t\"\n").unwrap();
        assert_eq!(config.server.hostname, "localhost");
        assert_eq!(config.digest.fetch_timeout_secs, 30);
        assert!(config.validate().is_ok());
    }
}
