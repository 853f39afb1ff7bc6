//! # Digest Error Types
//!
//! Error types for the digest engine and its I/O collaborators.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Digest Error Categories                            │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │  Connectivity   │  │     Protocol            │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Connection     │  │  InvalidResponse        │ │
//! │  │  MissingToken   │  │  Timeout        │  │  Core (bad records)     │ │
//! │  │  InvalidUrl     │  │  HttpStatus     │  │                         │ │
//! │  │  ConfigLoad/Save│  │  Unauthorized   │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │    Account      │  │     Cycle       │  │      Engine             │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  AuthFailed     │  │  Incomplete     │  │  NotConfigured          │ │
//! │  │                 │  │  Listener       │  │  ShuttingDown           │ │
//! │  │                 │  │                 │  │  ChannelError           │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Snapshot save failures never surface here: the engine logs them and the
//! cycle carries on.

use marquee_core::CoreError;
use thiserror::Error;

/// Result type alias for digest operations.
pub type DigestResult<T> = Result<T, DigestError>;

/// Everything that can go wrong between the media server and a listener.
#[derive(Debug, Error)]
pub enum DigestError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// No auth token configured.
    #[error("Server token not configured. Run `marquee init` first.")]
    MissingToken,

    /// Server address could not be turned into a URL.
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Connectivity Errors
    // =========================================================================
    /// The server could not be reached.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A query took longer than the fetch timeout.
    #[error("Query {path} timed out after {secs} seconds")]
    Timeout { path: String, secs: u64 },

    /// The server answered with an unexpected status.
    #[error("Query {path} returned HTTP {status}")]
    HttpStatus { path: String, status: u16 },

    /// The token was rejected.
    #[error("Server rejected the token (HTTP 401)")]
    Unauthorized,

    // =========================================================================
    // Protocol Errors
    // =========================================================================
    /// The response body could not be interpreted.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// A record failed domain validation.
    #[error(transparent)]
    Core(#[from] CoreError),

    // =========================================================================
    // Cycle Errors
    // =========================================================================
    /// A listener panicked.
    #[error("Listener for '{event}' failed: {message}")]
    Listener { event: String, message: String },

    /// Some fetch branches of a digest cycle failed.
    ///
    /// The branches that succeeded were applied to the snapshot.
    #[error("Digest incomplete, {} queries failed: {}", .failures.len(), .failures.join("; "))]
    Incomplete { failures: Vec<String> },

    // =========================================================================
    // Engine Errors
    // =========================================================================
    /// A cycle was requested before any server was configured.
    #[error("Digest engine has no server configured")]
    NotConfigured,

    /// The engine is shutting down.
    #[error("Digest engine is shutting down")]
    ShuttingDown,

    /// Channel send/receive failed.
    #[error("Channel error: {0}")]
    ChannelError(String),

    // =========================================================================
    // Account Errors
    // =========================================================================
    /// plex.tv sign-in was refused.
    #[error("Sign-in failed: {0}")]
    AuthFailed(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<reqwest::Error> for DigestError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            DigestError::InvalidResponse(err.to_string())
        } else {
            DigestError::ConnectionFailed(err.to_string())
        }
    }
}

impl From<url::ParseError> for DigestError {
    fn from(err: url::ParseError) -> Self {
        DigestError::InvalidUrl(err.to_string())
    }
}

impl From<serde_json::Error> for DigestError {
    fn from(err: serde_json::Error) -> Self {
        DigestError::InvalidResponse(err.to_string())
    }
}

impl From<std::io::Error> for DigestError {
    fn from(err: std::io::Error) -> Self {
        DigestError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for DigestError {
    fn from(err: toml::de::Error) -> Self {
        DigestError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for DigestError {
    fn from(err: toml::ser::Error) -> Self {
        DigestError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl DigestError {
    /// Returns true if the next scheduled cycle may succeed without changes.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DigestError::ConnectionFailed(_)
                | DigestError::Timeout { .. }
                | DigestError::HttpStatus { .. }
                | DigestError::Incomplete { .. }
        )
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            DigestError::InvalidConfig(_)
                | DigestError::MissingToken
                | DigestError::InvalidUrl(_)
                | DigestError::ConfigLoadFailed(_)
                | DigestError::ConfigSaveFailed(_)
                | DigestError::Unauthorized
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(DigestError::ConnectionFailed("refused".into()).is_retryable());
        assert!(DigestError::Timeout {
            path: "/status/sessions".into(),
            secs: 30
        }
        .is_retryable());
        assert!(DigestError::Incomplete {
            failures: vec!["x".into()]
        }
        .is_retryable());

        assert!(!DigestError::MissingToken.is_retryable());
        assert!(!DigestError::Unauthorized.is_retryable());
    }

    #[test]
    fn test_config_errors() {
        assert!(DigestError::MissingToken.is_config_error());
        assert!(DigestError::InvalidConfig("port".into()).is_config_error());
        assert!(!DigestError::ShuttingDown.is_config_error());
    }

    #[test]
    fn test_error_display() {
        let err = DigestError::Incomplete {
            failures: vec!["sessions: refused".into(), "section 2: timeout".into()],
        };
        let message = err.to_string();
        assert!(message.contains("2 queries failed"));
        assert!(message.contains("section 2: timeout"));

        let err = DigestError::HttpStatus {
            path: "/library/sections".into(),
            status: 500,
        };
        assert_eq!(err.to_string(), "Query /library/sections returned HTTP 500");
    }
}
