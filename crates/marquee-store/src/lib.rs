//! # marquee-store: Snapshot Persistence for Marquee
//!
//! Keeps the digest's memory across restarts so a restarted daemon does not
//! re-announce every item and session it already knew about.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Marquee Data Flow                                │
//! │                                                                         │
//! │  DigestEngine (end of every cycle)                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  marquee-store (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌────────────────────┐   ┌───────────────┐   ┌────────────┐  │   │
//! │  │   │  SnapshotStore     │   │ JsonFileStore │   │ MemoryStore│  │   │
//! │  │   │  (async trait)     │◄──│ atomic write  │   │  (tests)   │  │   │
//! │  │   └────────────────────┘   └───────────────┘   └────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ~/.cache/marquee/cache.json  (platform cache dir by default)          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use marquee_store::{JsonFileStore, SnapshotStore};
//!
//! let store = JsonFileStore::new("/var/cache/marquee/cache.json");
//! let snapshot = store.load().await?;
//! store.save(&snapshot).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{StoreError, StoreResult};
pub use store::{JsonFileStore, MemoryStore, SnapshotStore};
