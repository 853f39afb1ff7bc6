//! # marquee-core: Pure Digest Logic for Marquee
//!
//! Everything Marquee decides about a media server's state, with no I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Marquee Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    marquee daemon (apps/daemon)                 │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │     marquee-digest: client ──► engine ──► dispatcher             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ marquee-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │  record   │  │   types   │  │   diff    │  │   error   │  │   │
//! │  │   │ServerRec. │  │ Session   │  │ Retention │  │ CoreError │  │   │
//! │  │   │ RecordTag │  │ MediaItem │  │  Change   │  │           │  │   │
//! │  │   │           │  │ Snapshot  │  │           │  │           │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO NETWORK • NO FILES • NO TIMERS                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              marquee-store (snapshot persistence)               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`record`] - Typed view over media server responses
//! - [`types`] - Session, MediaItem and the Snapshot
//! - [`diff`] - New/ended detection between two snapshots
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use marquee_core::{diff_media, RecordTag, ServerRecord};
//!
//! let fresh = vec![ServerRecord::new(RecordTag::Video).with_rating_key("4711")];
//! let result = diff_media(&BTreeMap::new(), fresh);
//!
//! assert_eq!(result.added().count(), 1);
//! assert!(result.snapshot.contains_key("4711"));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod diff;
pub mod error;
pub mod record;
pub mod types;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use diff::{diff, diff_media, diff_sessions, Change, Diff, Retention};
pub use error::{CoreError, CoreResult};
pub use record::{parse_container, RecordTag, ServerRecord};
pub use types::{MediaItem, Session, Snapshot, DIRECT_SESSION_KEY_PREFIX, SESSION_KEY_PREFIX};
