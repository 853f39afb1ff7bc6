//! Test doubles for the engine: a scripted client and an event recorder.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use marquee_core::{RecordTag, ServerRecord, Session};

use crate::client::MediaServerClient;
use crate::dispatcher::{DigestEvent, EventDispatcher, EventKind};
use crate::engine::ClientFactory;
use crate::error::{DigestError, DigestResult};

enum Reply {
    Records(Vec<ServerRecord>),
    Error(String),
    Hang,
}

/// Client answering from a per-path script. Unscripted paths return no
/// records.
#[derive(Default)]
pub struct FakeClient {
    responses: Mutex<HashMap<String, Reply>>,
    calls: Mutex<Vec<String>>,
}

impl FakeClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, path: &str, records: Vec<ServerRecord>) {
        self.responses
            .lock()
            .unwrap()
            .insert(path.to_string(), Reply::Records(records));
    }

    pub fn fail(&self, path: &str, message: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(path.to_string(), Reply::Error(message.to_string()));
    }

    /// Queries for `path` never answer.
    pub fn hang(&self, path: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(path.to_string(), Reply::Hang);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Factory handing out this client for every configuration.
    pub fn factory(self: &Arc<Self>) -> ClientFactory {
        let client = self.clone();
        Arc::new(move |_config| Ok(client.clone() as Arc<dyn MediaServerClient>))
    }
}

#[async_trait]
impl MediaServerClient for FakeClient {
    async fn query(&self, path: &str) -> DigestResult<Vec<ServerRecord>> {
        self.calls.lock().unwrap().push(path.to_string());
        let reply = match self.responses.lock().unwrap().get(path) {
            Some(Reply::Records(records)) => Some(Ok(records.clone())),
            Some(Reply::Error(message)) => Some(Err(DigestError::ConnectionFailed(message.clone()))),
            Some(Reply::Hang) => None,
            None => Some(Ok(Vec::new())),
        };
        match reply {
            Some(result) => result,
            None => std::future::pending().await,
        }
    }
}

/// Dispatcher that records every event it sees.
#[derive(Clone)]
pub struct Recorder {
    dispatcher: Arc<EventDispatcher>,
    events: Arc<Mutex<Vec<DigestEvent>>>,
}

impl Recorder {
    pub fn new() -> Self {
        let dispatcher = Arc::new(EventDispatcher::new());
        let events = Arc::new(Mutex::new(Vec::new()));
        for kind in EventKind::ALL {
            let events = events.clone();
            dispatcher.on(kind, move |event| events.lock().unwrap().push(event.clone()));
        }
        Recorder { dispatcher, events }
    }

    pub fn dispatcher(&self) -> Arc<EventDispatcher> {
        self.dispatcher.clone()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.events.lock().unwrap().iter().map(DigestEvent::kind).collect()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.kinds().into_iter().filter(|k| *k == kind).count()
    }

    /// Rating keys of every `newMedia` payload, in emission order.
    pub fn new_media(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                DigestEvent::NewMedia(item) => Some(item.rating_key().to_string()),
                _ => None,
            })
            .collect()
    }

    /// Session payloads of `kind` (`NewSession` or `EndSession`).
    pub fn sessions(&self, kind: EventKind) -> Vec<Session> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|event| event.kind() == kind)
            .filter_map(|event| match event {
                DigestEvent::NewSession(session) | DigestEvent::EndSession(session) => {
                    Some(session.clone())
                }
                _ => None,
            })
            .collect()
    }
}

pub fn section(key: &str) -> ServerRecord {
    ServerRecord::new(RecordTag::Directory)
        .with_key(key)
        .with_title(format!("Section {key}"))
}

pub fn media(rating_key: &str) -> ServerRecord {
    ServerRecord::new(RecordTag::Video)
        .with_rating_key(rating_key)
        .with_title(format!("Item {rating_key}"))
}

pub fn session(transcode: &str, user: &str, player: &str, title: &str) -> ServerRecord {
    ServerRecord::new(RecordTag::Video)
        .with_title(title)
        .with_child(ServerRecord::new(RecordTag::User).with_title(user))
        .with_child(ServerRecord::new(RecordTag::Player).with_title(player))
        .with_child(ServerRecord::new(RecordTag::TranscodeSession).with_key(transcode))
}

