//! # Snapshot Differ
//!
//! Compares a freshly fetched list against the previous keyed map and reports
//! what appeared and what went away.
//!
//! ## Retention Policies
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                            diff()                                       │
//! │                                                                         │
//! │  previous: { a, b, c }        fresh: [ b, c, d ]                        │
//! │                                                                         │
//! │  Retention::Replace  (sessions)                                         │
//! │    snapshot = { b, c, d }                                               │
//! │    changes  = [ New(d), Ended(a) ]                                      │
//! │                                                                         │
//! │  Retention::Accumulate  (recently added media)                          │
//! │    snapshot = { a, b, c, d }      entries are never removed             │
//! │    changes  = [ New(d) ]                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Ordering
//! `New` changes follow the order of the fresh list. `Ended` changes follow the
//! key order of the previous map and come after every `New`.
//!
//! A key seen twice in the same fresh list is announced once; the later record
//! is the one kept.

use std::collections::{BTreeMap, HashSet};

use crate::error::{CoreError, CoreResult};
use crate::record::ServerRecord;
use crate::types::{MediaItem, Session};

// =============================================================================
// Diff Types
// =============================================================================

/// What happens to entries missing from the fresh list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retention {
    /// The fresh list is the whole truth; missing entries have ended.
    Replace,
    /// The fresh list is a window; missing entries are kept.
    Accumulate,
}

/// A single observed change.
#[derive(Debug, Clone, PartialEq)]
pub enum Change<T> {
    /// Not present in the previous map.
    New(T),
    /// Present previously, absent now.
    Ended(T),
}

impl<T> Change<T> {
    /// Borrows the changed entry.
    pub fn item(&self) -> &T {
        match self {
            Change::New(item) | Change::Ended(item) => item,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, Change::New(_))
    }
}

/// Result of one diff pass.
#[derive(Debug, Clone)]
pub struct Diff<T> {
    /// The map that replaces the previous one.
    pub snapshot: BTreeMap<String, T>,
    /// Ordered changes.
    pub changes: Vec<Change<T>>,
    /// Entries skipped because no key could be derived.
    pub rejected: Vec<CoreError>,
}

impl<T> Diff<T> {
    /// Entries that appeared.
    pub fn added(&self) -> impl Iterator<Item = &T> {
        self.changes.iter().filter_map(|change| match change {
            Change::New(item) => Some(item),
            Change::Ended(_) => None,
        })
    }

    /// Entries that went away.
    pub fn ended(&self) -> impl Iterator<Item = &T> {
        self.changes.iter().filter_map(|change| match change {
            Change::Ended(item) => Some(item),
            Change::New(_) => None,
        })
    }
}

// =============================================================================
// Diffing
// =============================================================================

/// Diffs `fresh` against `previous` using `key_fn` for identity.
///
/// Entries whose key cannot be derived are left out of the snapshot and
/// returned in [`Diff::rejected`].
pub fn diff<T, F>(
    previous: &BTreeMap<String, T>,
    fresh: Vec<T>,
    key_fn: F,
    retention: Retention,
) -> Diff<T>
where
    T: Clone,
    F: Fn(&T) -> CoreResult<String>,
{
    let mut snapshot = match retention {
        Retention::Replace => BTreeMap::new(),
        Retention::Accumulate => previous.clone(),
    };
    let mut changes = Vec::new();
    let mut rejected = Vec::new();
    let mut announced = HashSet::new();

    for item in fresh {
        let key = match key_fn(&item) {
            Ok(key) => key,
            Err(err) => {
                rejected.push(err);
                continue;
            }
        };

        if !previous.contains_key(&key) && announced.insert(key.clone()) {
            changes.push(Change::New(item.clone()));
        }
        snapshot.insert(key, item);
    }

    if retention == Retention::Replace {
        for (key, item) in previous {
            if !snapshot.contains_key(key) {
                changes.push(Change::Ended(item.clone()));
            }
        }
    }

    Diff {
        snapshot,
        changes,
        rejected,
    }
}

/// Diffs a fresh `/status/sessions` listing against the known sessions.
pub fn diff_sessions(
    previous: &BTreeMap<String, Session>,
    fresh: Vec<ServerRecord>,
) -> Diff<Session> {
    let sessions = fresh.into_iter().map(Session::from_record).collect();
    diff(previous, sessions, Session::cache_key, Retention::Replace)
}

/// Diffs the fresh recently-added listings against every item seen so far.
pub fn diff_media(
    previous: &BTreeMap<String, MediaItem>,
    fresh: Vec<ServerRecord>,
) -> Diff<MediaItem> {
    let mut rejected = Vec::new();
    let mut items = Vec::with_capacity(fresh.len());
    for record in fresh {
        match MediaItem::from_record(record) {
            Ok(item) => items.push(item),
            Err(err) => rejected.push(err),
        }
    }

    let mut result = diff(
        previous,
        items,
        |item: &MediaItem| Ok(item.rating_key().to_string()),
        Retention::Accumulate,
    );
    rejected.append(&mut result.rejected);
    result.rejected = rejected;
    result
}
