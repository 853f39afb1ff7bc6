//! # marquee-digest: Digest Engine for Marquee
//!
//! Polls a media server on a schedule, compares what it sees with the
//! cached snapshot and tells listeners what changed.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Digest Architecture                              │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                DigestEngine (one Tokio task)                     │  │
//! │  │                                                                  │  │
//! │  │  Owns the Snapshot and the Ticker                                │  │
//! │  │  Driven through a cloneable DigestHandle                         │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │ MediaServer    │  │ marquee-core   │  │  EventDispatcher       │    │
//! │  │ Client         │  │ differ         │  │                        │    │
//! │  │                │  │                │  │ newSession, endSession │    │
//! │  │ HTTP/JSON with │  │ sessions:      │  │ newMedia, start, stop, │    │
//! │  │ X-Plex headers │  │   replace      │  │ startDigest, endDigest │    │
//! │  │                │  │ media:         │  │ startQuery, endQuery   │    │
//! │  │                │  │   accumulate   │  │                        │    │
//! │  └────────────────┘  └────────────────┘  └────────────────────────┘    │
//! │                               │                                         │
//! │                               ▼                                         │
//! │                  ┌──────────────────────────┐                          │
//! │                  │ marquee-store            │                          │
//! │                  │ SnapshotStore (JSON)     │                          │
//! │                  └──────────────────────────┘                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`client`] - Media server queries and plex.tv sign-in
//! - [`config`] - Server, schedule and cache settings (TOML + env)
//! - [`dispatcher`] - Listener registry and event types
//! - [`engine`] - `DigestEngine`, its builder and handle
//! - [`error`] - Digest error types
//! - [`ticker`] - Re-armable schedule timer
//!
//! ## Usage
//! ```rust,ignore
//! use marquee_digest::{DigestEngine, EventKind, MarqueeConfig};
//!
//! let config = MarqueeConfig::load(None)?;
//! let handle = DigestEngine::builder().config(config).build().await?.spawn();
//!
//! handle.on(EventKind::NewMedia, |event| println!("{event:?}"));
//! handle.start().await?;
//! ```

pub mod client;
pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod ticker;

#[cfg(test)]
mod testing;

pub use client::{sign_in, MediaServerClient, PlexClient};
pub use config::{CacheSettings, ClientIdentity, DigestSettings, MarqueeConfig, ServerSettings};
pub use dispatcher::{DigestEvent, EventDispatcher, EventKind, Listener, ListenerId};
pub use engine::{
    plex_client_factory, ClientFactory, DigestEngine, DigestEngineBuilder, DigestHandle,
    DigestPhase, DigestStatus,
};
pub use error::{DigestError, DigestResult};
pub use ticker::Ticker;
