//! # Event Dispatcher
//!
//! Explicit listener registry owned by the digest engine.
//!
//! ## Dispatch Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        EventDispatcher                                  │
//! │                                                                         │
//! │  newSession ──► [ listener #1, listener #4 ]                            │
//! │  endSession ──► [ listener #2 ]                                         │
//! │  newMedia   ──► [ listener #3, listener #5, listener #6 ]               │
//! │                                                                         │
//! │  emit(NewMedia(item))                                                   │
//! │    1. snapshot the listener list (lock released before calling)         │
//! │    2. call #3, #5, #6 in registration order on the caller's task        │
//! │    3. a panicking listener is logged; the others still run              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Listeners may register or remove listeners from inside a callback; the
//! change takes effect from the next emit.

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use marquee_core::{MediaItem, Session};
use tracing::{debug, error, info};

use crate::error::DigestError;

// =============================================================================
// Events
// =============================================================================

/// Names of the events the engine emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventKind {
    Start,
    Stop,
    StartDigest,
    EndDigest,
    NewSession,
    EndSession,
    NewMedia,
    StartQuery,
    EndQuery,
}

impl EventKind {
    /// Every event kind, in declaration order.
    pub const ALL: [EventKind; 9] = [
        EventKind::Start,
        EventKind::Stop,
        EventKind::StartDigest,
        EventKind::EndDigest,
        EventKind::NewSession,
        EventKind::EndSession,
        EventKind::NewMedia,
        EventKind::StartQuery,
        EventKind::EndQuery,
    ];

    /// Returns the event's wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Start => "start",
            EventKind::Stop => "stop",
            EventKind::StartDigest => "startDigest",
            EventKind::EndDigest => "endDigest",
            EventKind::NewSession => "newSession",
            EventKind::EndSession => "endSession",
            EventKind::NewMedia => "newMedia",
            EventKind::StartQuery => "startQuery",
            EventKind::EndQuery => "endQuery",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventKind {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| DigestError::InvalidConfig(format!("Unknown event name: '{s}'")))
    }
}

/// An emitted event and its payload.
#[derive(Debug, Clone, PartialEq)]
pub enum DigestEvent {
    Start,
    Stop,
    StartDigest,
    EndDigest,
    NewSession(Session),
    EndSession(Session),
    NewMedia(MediaItem),
    /// A query to the media server is about to be sent.
    StartQuery(String),
    /// A query finished, successfully or not.
    EndQuery(String),
}

impl DigestEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            DigestEvent::Start => EventKind::Start,
            DigestEvent::Stop => EventKind::Stop,
            DigestEvent::StartDigest => EventKind::StartDigest,
            DigestEvent::EndDigest => EventKind::EndDigest,
            DigestEvent::NewSession(_) => EventKind::NewSession,
            DigestEvent::EndSession(_) => EventKind::EndSession,
            DigestEvent::NewMedia(_) => EventKind::NewMedia,
            DigestEvent::StartQuery(_) => EventKind::StartQuery,
            DigestEvent::EndQuery(_) => EventKind::EndQuery,
        }
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Callback invoked for a matching event.
pub type Listener = Arc<dyn Fn(&DigestEvent) + Send + Sync>;

/// Identifies a registration for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// Registry of listeners keyed by event kind.
#[derive(Default)]
pub struct EventDispatcher {
    listeners: RwLock<BTreeMap<EventKind, Vec<(ListenerId, Listener)>>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: BTreeMap<&str, usize> = self
            .read()
            .iter()
            .map(|(kind, list)| (kind.as_str(), list.len()))
            .collect();
        f.debug_struct("EventDispatcher")
            .field("listeners", &counts)
            .finish()
    }
}

impl EventDispatcher {
    /// Creates a dispatcher with no listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a dispatcher with the built-in logging listeners installed.
    pub fn with_logging() -> Self {
        let dispatcher = Self::new();
        install_logging_listeners(&dispatcher);
        dispatcher
    }

    /// Registers `listener` for `kind`. Listeners run in registration order.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&DigestEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.write()
            .entry(kind)
            .or_default()
            .push((id, Arc::new(listener)));
        debug!(event = %kind, listener = id.0, "Listener added");
        id
    }

    /// Removes one registration. Returns false if it was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.write();
        for (kind, list) in listeners.iter_mut() {
            if let Some(pos) = list.iter().position(|(existing, _)| *existing == id) {
                list.remove(pos);
                debug!(event = %kind, listener = id.0, "Listener removed");
                return true;
            }
        }
        false
    }

    /// Removes every listener of `kind`, or every listener when `None`.
    /// Returns how many were removed.
    pub fn remove_all_listeners(&self, kind: Option<EventKind>) -> usize {
        let mut listeners = self.write();
        let removed = match kind {
            Some(kind) => listeners.remove(&kind).map_or(0, |list| list.len()),
            None => {
                let count = listeners.values().map(Vec::len).sum();
                listeners.clear();
                count
            }
        };
        debug!(event = ?kind.map(|k| k.as_str()), removed, "Listeners removed");
        removed
    }

    /// Number of listeners registered for `kind`.
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.read().get(&kind).map_or(0, Vec::len)
    }

    /// Invokes every listener registered for the event's kind.
    ///
    /// Returns one `Listener` error per listener that panicked.
    pub fn emit(&self, event: &DigestEvent) -> Vec<DigestError> {
        let kind = event.kind();
        let targets: Vec<(ListenerId, Listener)> =
            self.read().get(&kind).cloned().unwrap_or_default();

        let mut failures = Vec::new();
        for (id, listener) in targets {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| listener(event))) {
                let message = panic_message(payload.as_ref());
                error!(event = %kind, listener = id.0, %message, "Listener failed");
                failures.push(DigestError::Listener {
                    event: kind.as_str().to_string(),
                    message,
                });
            }
        }
        failures
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<EventKind, Vec<(ListenerId, Listener)>>> {
        self.listeners.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<EventKind, Vec<(ListenerId, Listener)>>> {
        self.listeners.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "listener panicked".to_string()
    }
}

// =============================================================================
// Logging Listeners
// =============================================================================

fn install_logging_listeners(dispatcher: &EventDispatcher) {
    dispatcher.on(EventKind::Start, |_| info!("Digest engine started"));
    dispatcher.on(EventKind::Stop, |_| info!("Digest engine stopped"));
    dispatcher.on(EventKind::StartDigest, |_| info!("Digest started"));
    dispatcher.on(EventKind::EndDigest, |_| info!("Digest finished"));

    dispatcher.on(EventKind::StartQuery, |event| {
        if let DigestEvent::StartQuery(path) = event {
            debug!(%path, "Query started");
        }
    });
    dispatcher.on(EventKind::EndQuery, |event| {
        if let DigestEvent::EndQuery(path) = event {
            debug!(%path, "Query finished");
        }
    });

    dispatcher.on(EventKind::NewSession, |event| {
        if let DigestEvent::NewSession(session) = event {
            info!(
                "{} has started watching {} on {}",
                session.user_title(),
                session.title(),
                session.player_title()
            );
        }
    });
    dispatcher.on(EventKind::EndSession, |event| {
        if let DigestEvent::EndSession(session) = event {
            info!(
                "{} has stopped watching {}",
                session.user_title(),
                session.title()
            );
        }
    });
    dispatcher.on(EventKind::NewMedia, |event| {
        if let DigestEvent::NewMedia(item) = event {
            info!(rating_key = item.rating_key(), "{} was added", item.title());
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&'static str) -> Listener) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_for_make = log.clone();
        let make = move |name: &'static str| -> Listener {
            let log = log_for_make.clone();
            Arc::new(move |event: &DigestEvent| {
                log.lock().unwrap().push(format!("{name}:{}", event.kind()));
            })
        };
        (log, make)
    }

    #[test]
    fn test_event_names() {
        assert_eq!(EventKind::NewSession.as_str(), "newSession");
        assert_eq!("endDigest".parse::<EventKind>().unwrap(), EventKind::EndDigest);
        assert_eq!("NEWMEDIA".parse::<EventKind>().unwrap(), EventKind::NewMedia);
        assert!("finish".parse::<EventKind>().is_err());
        assert_eq!(DigestEvent::StartQuery("/x".into()).kind(), EventKind::StartQuery);
    }

    #[test]
    fn test_listeners_run_in_registration_order() {
        let dispatcher = EventDispatcher::new();
        let (log, make) = recorder();

        let first = make("a");
        let second = make("b");
        dispatcher.on(EventKind::StartDigest, move |e| first(e));
        dispatcher.on(EventKind::StartDigest, move |e| second(e));
        let other = make("c");
        dispatcher.on(EventKind::Stop, move |e| other(e));

        dispatcher.emit(&DigestEvent::StartDigest);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["a:startDigest".to_string(), "b:startDigest".to_string()]
        );
    }

    #[test]
    fn test_remove_listener() {
        let dispatcher = EventDispatcher::new();
        let (log, make) = recorder();

        let listener = make("a");
        let id = dispatcher.on(EventKind::Start, move |e| listener(e));
        assert_eq!(dispatcher.listener_count(EventKind::Start), 1);

        assert!(dispatcher.remove_listener(id));
        assert!(!dispatcher.remove_listener(id));
        dispatcher.emit(&DigestEvent::Start);

        assert!(log.lock().unwrap().is_empty());
        assert_eq!(dispatcher.listener_count(EventKind::Start), 0);
    }

    #[test]
    fn test_remove_all_listeners() {
        let dispatcher = EventDispatcher::with_logging();
        assert_eq!(dispatcher.listener_count(EventKind::NewMedia), 1);

        assert_eq!(dispatcher.remove_all_listeners(Some(EventKind::NewMedia)), 1);
        assert_eq!(dispatcher.listener_count(EventKind::NewMedia), 0);
        assert_eq!(dispatcher.listener_count(EventKind::Start), 1);

        assert_eq!(dispatcher.remove_all_listeners(None), 8);
        assert!(EventKind::ALL
            .iter()
            .all(|kind| dispatcher.listener_count(*kind) == 0));
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let dispatcher = EventDispatcher::new();
        let (log, make) = recorder();

        dispatcher.on(EventKind::EndDigest, |_| panic!("boom"));
        let survivor = make("after");
        dispatcher.on(EventKind::EndDigest, move |e| survivor(e));

        let failures = dispatcher.emit(&DigestEvent::EndDigest);
        assert_eq!(failures.len(), 1);
        assert!(failures[0].to_string().contains("boom"));
        assert_eq!(*log.lock().unwrap(), vec!["after:endDigest".to_string()]);
    }

    #[test]
    fn test_listener_may_register_during_emit() {
        let dispatcher = Arc::new(EventDispatcher::new());
        let inner = dispatcher.clone();
        dispatcher.on(EventKind::Start, move |_| {
            inner.on(EventKind::Stop, |_| {});
        });

        dispatcher.emit(&DigestEvent::Start);
        assert_eq!(dispatcher.listener_count(EventKind::Stop), 1);
    }
}
