//! # Domain Types
//!
//! The three things Marquee remembers between digests.
//!
//! ## Snapshot Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           Snapshot                                      │
//! │                                                                         │
//! │  ┌──────────────────────┐ ┌──────────────────────┐ ┌────────────────┐  │
//! │  │   recentlyAdded      │ │      sessions        │ │    servers     │  │
//! │  │  ──────────────────  │ │  ──────────────────  │ │  ────────────  │  │
//! │  │  "4711" → MediaItem  │ │  "session:t1" →      │ │  (reserved)    │  │
//! │  │  "4712" → MediaItem  │ │        Session       │ │                │  │
//! │  │                      │ │                      │ │                │  │
//! │  │  append-only         │ │  replaced each cycle │ │                │  │
//! │  └──────────────────────┘ └──────────────────────┘ └────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Session Identity
//! A session is keyed by its transcoder (`"session:" + TranscodeSession.key`).
//! Direct-play sessions have no transcoder, so the record's own `sessionKey`
//! attribute is used instead, in the same `session:` namespace. A session
//! with neither is malformed and never enters the snapshot.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::record::{RecordTag, ServerRecord};

/// Prefix of every session cache key.
pub const SESSION_KEY_PREFIX: &str = "session:";

/// Prefix of session keys derived from `sessionKey` (direct play).
pub const DIRECT_SESSION_KEY_PREFIX: &str = "session:direct:";

// =============================================================================
// Session
// =============================================================================

/// An active playback, with its `User`, `Player` and `TranscodeSession`
/// children extracted once per fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Account watching.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<ServerRecord>,

    /// Playing device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player: Option<ServerRecord>,

    /// Transcoder, absent for direct play.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcode: Option<ServerRecord>,

    /// The session record as returned by the server.
    #[serde(flatten)]
    pub record: ServerRecord,
}

impl Session {
    /// Wraps a fetched record, extracting its sub-records by tag.
    pub fn from_record(record: ServerRecord) -> Self {
        Session {
            user: record.child(&RecordTag::User).cloned(),
            player: record.child(&RecordTag::Player).cloned(),
            transcode: record.child(&RecordTag::TranscodeSession).cloned(),
            record,
        }
    }

    /// Builds the snapshot key for this session.
    ///
    /// Transcoded sessions are keyed `session:<transcode key>`. Direct play
    /// falls back to `session:direct:<sessionKey>`, so the two id spaces
    /// never collide. A session that starts transcoding mid-playback changes
    /// key and is reported as ended, then new.
    ///
    /// ## Errors
    /// `MalformedRecord` when neither a transcode key nor a `sessionKey`
    /// attribute is available.
    pub fn cache_key(&self) -> CoreResult<String> {
        let transcode_key = self
            .transcode
            .as_ref()
            .and_then(|transcode| transcode.key.as_deref())
            .filter(|key| !key.is_empty());
        if let Some(key) = transcode_key {
            return Ok(format!("{SESSION_KEY_PREFIX}{key}"));
        }

        match self.record.attribute_str("sessionKey") {
            Some(id) if !id.is_empty() => Ok(format!("{DIRECT_SESSION_KEY_PREFIX}{id}")),
            _ => Err(CoreError::malformed(
                self.record.tag.as_str(),
                self.record.display_title(),
                "session has no TranscodeSession key and no sessionKey",
            )),
        }
    }

    /// Title of the content being played.
    pub fn title(&self) -> &str {
        self.record.display_title()
    }

    /// Name of the watching account.
    pub fn user_title(&self) -> &str {
        self.user
            .as_ref()
            .and_then(|user| user.title.as_deref())
            .unwrap_or("Someone")
    }

    /// Name of the playing device.
    pub fn player_title(&self) -> &str {
        self.player
            .as_ref()
            .and_then(|player| player.title.as_deref())
            .unwrap_or("an unknown player")
    }
}

// =============================================================================
// Media Item
// =============================================================================

/// A library item seen in a section's recently-added list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaItem(ServerRecord);

impl MediaItem {
    /// Wraps a fetched record.
    ///
    /// ## Errors
    /// `MalformedRecord` if the record has no rating key.
    pub fn from_record(record: ServerRecord) -> CoreResult<Self> {
        match record.rating_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(MediaItem(record)),
            _ => Err(CoreError::malformed(
                record.tag.as_str(),
                record.display_title(),
                "library item has no ratingKey",
            )),
        }
    }

    /// The snapshot key of this item.
    pub fn rating_key(&self) -> &str {
        self.0.rating_key.as_deref().unwrap_or_default()
    }

    /// Display title.
    pub fn title(&self) -> &str {
        self.0.display_title()
    }

    /// The underlying record.
    pub fn record(&self) -> &ServerRecord {
        &self.0
    }

    /// Unwraps into the underlying record.
    pub fn into_record(self) -> ServerRecord {
        self.0
    }
}

// =============================================================================
// Snapshot
// =============================================================================

/// Last known state of the media server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Every library item ever seen, by rating key.
    #[serde(default)]
    pub recently_added: BTreeMap<String, MediaItem>,

    /// Known servers. Not populated by the digest.
    #[serde(default)]
    pub servers: BTreeMap<String, ServerRecord>,

    /// Sessions active at the last digest, by session key.
    #[serde(default)]
    pub sessions: BTreeMap<String, Session>,
}

impl Snapshot {
    /// Creates an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// True if nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.recently_added.is_empty() && self.servers.is_empty() && self.sessions.is_empty()
    }
}
