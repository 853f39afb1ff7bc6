//! # Error Types
//!
//! Domain-specific error types for marquee-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  marquee-core errors (this file)                                       │
//! │  └── CoreError        - Record ingestion and identity failures         │
//! │                                                                         │
//! │  marquee-store errors (separate crate)                                 │
//! │  └── StoreError       - Cache file failures                            │
//! │                                                                         │
//! │  marquee-digest errors (separate crate)                                │
//! │  └── DigestError      - What the daemon sees                           │
//! │                                                                         │
//! │  Flow: CoreError → DigestError → logs                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Record-level domain errors.
///
/// None of these are fatal to a digest cycle: the offending record is skipped
/// and logged, the rest of the batch is processed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A record lacks the data needed to build its cache key.
    ///
    /// ## When This Occurs
    /// - A playback session has neither a `TranscodeSession` child nor a
    ///   `sessionKey` attribute
    /// - A library item has no `ratingKey`
    #[error("Malformed {tag} record '{title}': {reason}")]
    MalformedRecord {
        tag: String,
        title: String,
        reason: String,
    },

    /// A server response could not be interpreted as a record.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

impl CoreError {
    /// Creates a MalformedRecord error.
    pub fn malformed(
        tag: impl Into<String>,
        title: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        CoreError::MalformedRecord {
            tag: tag.into(),
            title: title.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::malformed("Video", "Movie A", "no session identity");
        assert_eq!(
            err.to_string(),
            "Malformed Video record 'Movie A': no session identity"
        );
    }
}
