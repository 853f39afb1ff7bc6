//! # Digest Engine
//!
//! The recurring fetch → diff → emit → persist cycle.
//!
//! ## Cycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          run_cycle()                                    │
//! │                                                                         │
//! │  Idle ──► Fetching ──► Diffing ──► Emitting ──► Persisting ──► Idle     │
//! │              │            │           │              │                  │
//! │              │            │           │              └─ save snapshot   │
//! │              │            │           │                 (errors logged) │
//! │              │            │           └─ newSession / endSession /      │
//! │              │            │              newMedia (muted in bootstrap)  │
//! │              │            └─ diff only the branches that succeeded      │
//! │              │                                                          │
//! │              ├─ /status/sessions ─────────────┐  concurrently,          │
//! │              └─ /library/sections ──┐         │  each with a timeout    │
//! │                                     ▼         │                         │
//! │                 /library/sections/{k}/recentlyAdded  (one per section)  │
//! │                                               │                         │
//! │                           join point ◄────────┘                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Scheduling
//! The engine runs as one task. It owns the only mutable [`Snapshot`] and a
//! single [`Ticker`], and it processes one command or one tick at a time, so
//! at most one cycle is ever in flight. [`DigestHandle`] is the cloneable
//! front door to that task.
//!
//! ## Bootstrap
//! A cycle that starts without a cached snapshot only learns the server's
//! state; lifecycle events are suppressed. The flag clears after the first
//! cycle in which every fetch succeeded. Pointing the engine at a different
//! server sets it again.

use std::future::Future;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use marquee_core::{diff_media, diff_sessions, Change, CoreError, ServerRecord, Snapshot};
use marquee_store::{JsonFileStore, MemoryStore, SnapshotStore, StoreError};
use tokio::sync::{mpsc, oneshot, watch, RwLock};
use tracing::{debug, error, info, instrument, warn};

use crate::client::{paths, MediaServerClient, PlexClient};
use crate::config::MarqueeConfig;
use crate::dispatcher::{DigestEvent, EventDispatcher, EventKind, ListenerId};
use crate::error::{DigestError, DigestResult};
use crate::ticker::Ticker;

/// Builds a client for a configuration.
pub type ClientFactory =
    Arc<dyn Fn(&MarqueeConfig) -> DigestResult<Arc<dyn MediaServerClient>> + Send + Sync>;

/// Factory producing HTTP clients.
pub fn plex_client_factory() -> ClientFactory {
    Arc::new(|config: &MarqueeConfig| {
        let client = PlexClient::new(&config.server, &config.client)?;
        Ok(Arc::new(client) as Arc<dyn MediaServerClient>)
    })
}

// =============================================================================
// Status
// =============================================================================

/// Where the engine is within a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DigestPhase {
    #[default]
    Idle,
    Fetching,
    Diffing,
    Emitting,
    Persisting,
}

impl std::fmt::Display for DigestPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DigestPhase::Idle => write!(f, "idle"),
            DigestPhase::Fetching => write!(f, "fetching"),
            DigestPhase::Diffing => write!(f, "diffing"),
            DigestPhase::Emitting => write!(f, "emitting"),
            DigestPhase::Persisting => write!(f, "persisting"),
        }
    }
}

/// Observable engine state.
#[derive(Debug, Clone, PartialEq)]
pub struct DigestStatus {
    pub phase: DigestPhase,
    pub running: bool,
    pub configured: bool,
    pub bootstrap: bool,
    /// Completed cycles, successful or not.
    pub cycles: u64,
    pub last_digest_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub cached_sessions: usize,
    pub cached_media: usize,
    pub refresh_interval: Duration,
}

impl Default for DigestStatus {
    fn default() -> Self {
        DigestStatus {
            phase: DigestPhase::Idle,
            running: false,
            configured: false,
            bootstrap: true,
            cycles: 0,
            last_digest_at: None,
            last_error: None,
            cached_sessions: 0,
            cached_media: 0,
            refresh_interval: MarqueeConfig::default().refresh_interval(),
        }
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Owns the snapshot, the schedule and the cycle.
pub struct DigestEngine {
    config: Option<MarqueeConfig>,
    client: Option<Arc<dyn MediaServerClient>>,
    client_factory: ClientFactory,
    store: Arc<dyn SnapshotStore>,
    dispatcher: Arc<EventDispatcher>,
    snapshot: Snapshot,
    bootstrap: bool,
    running: bool,
    ticker: Ticker,
    fetch_timeout: Duration,
    cycles: u64,
    status: Arc<RwLock<DigestStatus>>,
    status_tx: watch::Sender<DigestStatus>,
}

/// Builder for [`DigestEngine`].
///
/// ## Example
/// ```rust,ignore
/// let engine = DigestEngine::builder()
///     .config(config)
///     .dispatcher(Arc::new(EventDispatcher::with_logging()))
///     .build()
///     .await?;
/// let handle = engine.spawn();
/// handle.start().await?;
/// ```
#[derive(Default)]
pub struct DigestEngineBuilder {
    config: Option<MarqueeConfig>,
    store: Option<Arc<dyn SnapshotStore>>,
    dispatcher: Option<Arc<EventDispatcher>>,
    client_factory: Option<ClientFactory>,
}

impl DigestEngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Server and schedule. Without it the engine starts unconfigured.
    pub fn config(mut self, config: MarqueeConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Snapshot persistence. Defaults to a [`JsonFileStore`] at the
    /// configured cache path.
    pub fn store(mut self, store: Arc<dyn SnapshotStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Listener registry. Defaults to [`EventDispatcher::with_logging`].
    pub fn dispatcher(mut self, dispatcher: Arc<EventDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// How clients are built on configure. Defaults to [`PlexClient`].
    pub fn client_factory(mut self, factory: ClientFactory) -> Self {
        self.client_factory = Some(factory);
        self
    }

    /// Validates the config, loads the snapshot and builds the engine.
    ///
    /// A missing or unreadable snapshot is not an error: the engine starts
    /// empty and in bootstrap mode.
    pub async fn build(self) -> DigestResult<DigestEngine> {
        let client_factory = self.client_factory.unwrap_or_else(plex_client_factory);

        let client = match &self.config {
            Some(config) => {
                config.validate()?;
                Some(client_factory(config)?)
            }
            None => None,
        };

        let store: Arc<dyn SnapshotStore> = match (self.store, &self.config) {
            (Some(store), _) => store,
            (None, Some(config)) => Arc::new(JsonFileStore::new(config.cache_path())),
            (None, None) => Arc::new(MemoryStore::new()),
        };

        let (snapshot, bootstrap) = match store.load().await {
            Ok(snapshot) => {
                info!(
                    sessions = snapshot.sessions.len(),
                    media = snapshot.recently_added.len(),
                    "Read cache successfully"
                );
                (snapshot, false)
            }
            Err(StoreError::NotFound { path }) => {
                warn!(path = %path.display(), "Cache not found, starting with an empty cache");
                (Snapshot::new(), true)
            }
            Err(err @ StoreError::Parse { .. }) => {
                warn!(error = %err, "Cache unreadable, starting with an empty cache");
                (Snapshot::new(), true)
            }
            Err(err) => {
                error!(error = %err, "Failed to read cache, starting with an empty cache");
                (Snapshot::new(), true)
            }
        };

        let period = self
            .config
            .as_ref()
            .map(MarqueeConfig::refresh_interval)
            .unwrap_or_else(|| MarqueeConfig::default().refresh_interval());
        let fetch_timeout = self
            .config
            .as_ref()
            .map(MarqueeConfig::fetch_timeout)
            .unwrap_or_else(|| MarqueeConfig::default().fetch_timeout());

        let status = DigestStatus {
            configured: client.is_some(),
            bootstrap,
            cached_sessions: snapshot.sessions.len(),
            cached_media: snapshot.recently_added.len(),
            refresh_interval: period,
            ..DigestStatus::default()
        };
        let (status_tx, _) = watch::channel(status.clone());

        Ok(DigestEngine {
            config: self.config,
            client,
            client_factory,
            store,
            dispatcher: self
                .dispatcher
                .unwrap_or_else(|| Arc::new(EventDispatcher::with_logging())),
            snapshot,
            bootstrap,
            running: false,
            ticker: Ticker::new(period),
            fetch_timeout,
            cycles: 0,
            status: Arc::new(RwLock::new(status)),
            status_tx,
        })
    }
}

impl DigestEngine {
    pub fn builder() -> DigestEngineBuilder {
        DigestEngineBuilder::new()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.dispatcher
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_bootstrap(&self) -> bool {
        self.bootstrap
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Replaces the server settings and client.
    ///
    /// The connection to the new server is checked with a `/library` query. A running engine
    /// then runs a cycle immediately and re-arms its schedule; the schedule
    /// is armed even if the check failed, and its error is returned.
    ///
    /// ## Errors
    /// `MissingToken` / `InvalidConfig` leave the engine untouched.
    #[instrument(skip(self, config), fields(host = %config.server.hostname))]
    pub async fn configure(&mut self, config: MarqueeConfig) -> DigestResult<()> {
        config.validate()?;
        let client = (self.client_factory)(&config)?;

        let server_changed = self
            .config
            .as_ref()
            .is_some_and(|old| old.server.endpoint() != config.server.endpoint());
        if server_changed {
            info!("Server changed, next digest will bootstrap");
            self.bootstrap = true;
        }

        self.ticker.disarm();
        self.ticker.set_period(config.refresh_interval());
        self.fetch_timeout = config.fetch_timeout();
        self.client = Some(client.clone());
        self.config = Some(config);
        self.publish(|status| {
            status.configured = true;
            status.refresh_interval = self.ticker.period();
        })
        .await;

        info!("Testing the connection to the server");
        let connection = self.fetch(paths::LIBRARY, client.library()).await.map(|_| ());
        match &connection {
            Ok(()) => info!("Server connection OK"),
            Err(err) => error!(error = %err, "Server connection test failed"),
        }

        if self.running {
            if connection.is_ok() {
                self.run_scheduled().await;
            } else {
                self.ticker.arm();
            }
        }

        connection
    }

    /// Changes the period between cycles.
    ///
    /// A running engine cancels its pending tick, runs a cycle now and arms
    /// one period ahead. A stopped engine only records the new period.
    pub async fn set_interval(&mut self, minutes: u64) -> DigestResult<()> {
        if minutes == 0 {
            return Err(DigestError::InvalidConfig(
                "refresh interval must be at least 1 minute".into(),
            ));
        }

        let period = Duration::from_secs(minutes.saturating_mul(60));
        self.ticker.set_period(period);
        if let Some(config) = self.config.as_mut() {
            config.digest.refresh_minutes = minutes;
        }
        self.publish(|status| status.refresh_interval = period).await;

        info!(minutes, running = self.running, "Refresh interval changed");
        if self.running {
            self.ticker.disarm();
            self.run_scheduled().await;
        }
        Ok(())
    }

    /// Starts the schedule: emits `start`, runs a cycle immediately and arms
    /// the ticker. No-op if already running.
    pub async fn start(&mut self) -> DigestResult<()> {
        if self.running {
            return Ok(());
        }
        if self.client.is_none() {
            return Err(DigestError::NotConfigured);
        }

        self.running = true;
        self.publish(|status| status.running = true).await;
        self.emit(&DigestEvent::Start);
        self.run_scheduled().await;
        Ok(())
    }

    /// Disarms the schedule and emits `stop`. No-op if not running.
    /// Configuration and snapshot are kept.
    pub async fn stop(&mut self) {
        if !self.running {
            return;
        }

        self.running = false;
        self.ticker.disarm();
        self.publish(|status| status.running = false).await;
        self.emit(&DigestEvent::Stop);
    }

    /// Stops the engine and removes every listener.
    pub async fn shutdown(&mut self) {
        self.stop().await;
        let removed = self.dispatcher.remove_all_listeners(None);
        info!(removed, "Digest engine shut down");
    }

    /// Runs one full cycle.
    ///
    /// ## Errors
    /// - `NotConfigured` if no server has been configured
    /// - `Incomplete` if some fetches failed; the others were still applied
    #[instrument(skip(self), fields(cycle = self.cycles + 1, bootstrap = self.bootstrap))]
    pub async fn run_cycle(&mut self) -> DigestResult<()> {
        let client = self.client.clone().ok_or(DigestError::NotConfigured)?;
        let mut failures = Vec::new();

        // ---------------------------------------------------------------------
        // Fetching
        // ---------------------------------------------------------------------
        self.enter(DigestPhase::Fetching).await;
        self.emit(&DigestEvent::StartDigest);

        let (sessions, sections) = tokio::join!(
            self.fetch(paths::SESSIONS, client.sessions()),
            self.fetch(paths::SECTIONS, client.sections()),
        );

        let sessions = match sessions {
            Ok(records) => Some(records),
            Err(err) => {
                warn!(error = %err, "Session fetch failed, keeping cached sessions");
                failures.push(format!("{}: {err}", paths::SESSIONS));
                None
            }
        };

        let media = match sections {
            Ok(sections) => Some(
                self.fetch_recently_added(client.as_ref(), &sections, &mut failures)
                    .await,
            ),
            Err(err) => {
                warn!(error = %err, "Section fetch failed, skipping recently added");
                failures.push(format!("{}: {err}", paths::SECTIONS));
                None
            }
        };

        // ---------------------------------------------------------------------
        // Diffing
        // ---------------------------------------------------------------------
        self.enter(DigestPhase::Diffing).await;
        let mut events = Vec::new();

        if let Some(records) = sessions {
            let diff = diff_sessions(&self.snapshot.sessions, records);
            log_rejected(&diff.rejected);
            self.snapshot.sessions = diff.snapshot;
            events.extend(diff.changes.into_iter().map(|change| match change {
                Change::New(session) => DigestEvent::NewSession(session),
                Change::Ended(session) => DigestEvent::EndSession(session),
            }));
        }

        if let Some(records) = media {
            let diff = diff_media(&self.snapshot.recently_added, records);
            log_rejected(&diff.rejected);
            self.snapshot.recently_added = diff.snapshot;
            events.extend(diff.changes.into_iter().filter_map(|change| match change {
                Change::New(item) => Some(DigestEvent::NewMedia(item)),
                Change::Ended(_) => None,
            }));
        }

        // ---------------------------------------------------------------------
        // Emitting
        // ---------------------------------------------------------------------
        self.enter(DigestPhase::Emitting).await;
        if self.bootstrap {
            info!(suppressed = events.len(), "Bootstrap digest, events suppressed");
        } else {
            for event in &events {
                self.emit(event);
            }
        }

        // ---------------------------------------------------------------------
        // Persisting
        // ---------------------------------------------------------------------
        self.enter(DigestPhase::Persisting).await;
        match self.store.save(&self.snapshot).await {
            Ok(()) => debug!("Cache written"),
            Err(err) => error!(error = %err, "Failed to write cache"),
        }

        self.emit(&DigestEvent::EndDigest);

        if failures.is_empty() {
            self.bootstrap = false;
        }
        self.cycles += 1;

        let result = if failures.is_empty() {
            Ok(())
        } else {
            Err(DigestError::Incomplete { failures })
        };

        let last_error = result.as_ref().err().map(ToString::to_string);
        let (sessions, media) = (self.snapshot.sessions.len(), self.snapshot.recently_added.len());
        let (bootstrap, cycles) = (self.bootstrap, self.cycles);
        self.publish(|status| {
            status.phase = DigestPhase::Idle;
            status.bootstrap = bootstrap;
            status.cycles = cycles;
            status.last_digest_at = Some(Utc::now());
            status.last_error = last_error;
            status.cached_sessions = sessions;
            status.cached_media = media;
        })
        .await;

        info!(
            sessions,
            media,
            emitted = if bootstrap { 0 } else { events.len() },
            "Digest complete"
        );
        result
    }

    /// Spawns the scheduler task and returns its handle.
    pub fn spawn(self) -> DigestHandle {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let handle = DigestHandle {
            status: self.status.clone(),
            status_rx: self.status_tx.subscribe(),
            dispatcher: self.dispatcher.clone(),
            cmd_tx,
        };

        tokio::spawn(async move {
            self.run(cmd_rx).await;
        });

        handle
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Scheduler loop.
    async fn run(mut self, mut cmd_rx: mpsc::Receiver<DigestCommand>) {
        info!(
            configured = self.client.is_some(),
            bootstrap = self.bootstrap,
            "Digest engine task started"
        );

        enum Wake {
            Tick,
            Command(Option<DigestCommand>),
        }

        loop {
            let wake = tokio::select! {
                _ = self.ticker.tick() => Wake::Tick,
                cmd = cmd_rx.recv() => Wake::Command(cmd),
            };

            match wake {
                Wake::Tick => {
                    if self.running {
                        self.run_scheduled().await;
                    }
                }
                Wake::Command(Some(cmd)) => {
                    if self.handle_command(cmd).await.is_break() {
                        break;
                    }
                }
                Wake::Command(None) => {
                    debug!("All handles dropped");
                    self.shutdown().await;
                    break;
                }
            }
        }

        info!("Digest engine task exited");
    }

    async fn handle_command(&mut self, cmd: DigestCommand) -> ControlFlow<()> {
        match cmd {
            DigestCommand::Configure { config, ack } => {
                let _ = ack.send(self.configure(*config).await);
            }
            DigestCommand::SetInterval { minutes, ack } => {
                let _ = ack.send(self.set_interval(minutes).await);
            }
            DigestCommand::Start { ack } => {
                let _ = ack.send(self.start().await);
            }
            DigestCommand::Stop { ack } => {
                self.stop().await;
                let _ = ack.send(());
            }
            DigestCommand::RunCycle { ack } => {
                let _ = ack.send(self.run_cycle().await);
            }
            DigestCommand::Shutdown { ack } => {
                self.shutdown().await;
                let _ = ack.send(());
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    /// Runs a cycle and re-arms the ticker if still running.
    async fn run_scheduled(&mut self) {
        if let Err(err) = self.run_cycle().await {
            error!(error = %err, "Digest failed");
        }
        if self.running {
            self.ticker.arm();
        }
    }

    async fn fetch_recently_added(
        &self,
        client: &dyn MediaServerClient,
        sections: &[ServerRecord],
        failures: &mut Vec<String>,
    ) -> Vec<ServerRecord> {
        let section_keys: Vec<(&str, String)> = sections
            .iter()
            .filter_map(|section| match section.key.as_deref() {
                Some(key) if !key.is_empty() => Some((key, paths::section_recently_added(key))),
                _ => {
                    warn!(title = section.display_title(), "Section without key skipped");
                    None
                }
            })
            .collect();

        let results = join_all(
            section_keys
                .iter()
                .map(|(key, path)| self.fetch(path, client.recently_added(Some(*key)))),
        )
        .await;

        let mut records = Vec::new();
        for ((_, path), result) in section_keys.iter().zip(results) {
            match result {
                Ok(mut items) => records.append(&mut items),
                Err(err) => {
                    warn!(%path, error = %err, "Recently added fetch failed");
                    failures.push(format!("{path}: {err}"));
                }
            }
        }
        records
    }

    /// Runs one query under the fetch timeout, between `startQuery` and
    /// `endQuery`.
    ///
    /// `endQuery` is emitted for failed and timed-out queries too, so every
    /// `startQuery` has a matching `endQuery`.
    async fn fetch<F>(&self, path: &str, query: F) -> DigestResult<Vec<ServerRecord>>
    where
        F: Future<Output = DigestResult<Vec<ServerRecord>>>,
    {
        self.emit(&DigestEvent::StartQuery(path.to_string()));

        let result = match tokio::time::timeout(self.fetch_timeout, query).await {
            Ok(result) => result,
            Err(_) => Err(DigestError::Timeout {
                path: path.to_string(),
                secs: self.fetch_timeout.as_secs(),
            }),
        };

        self.emit(&DigestEvent::EndQuery(path.to_string()));
        result
    }

    fn emit(&self, event: &DigestEvent) {
        self.dispatcher.emit(event);
    }

    async fn enter(&self, phase: DigestPhase) {
        debug!(%phase, "Digest phase");
        self.publish(|status| status.phase = phase).await;
    }

    async fn publish(&self, update: impl FnOnce(&mut DigestStatus)) {
        let mut status = self.status.write().await;
        update(&mut status);
        self.status_tx.send_replace(status.clone());
    }
}

fn log_rejected(rejected: &[CoreError]) {
    for err in rejected {
        warn!(error = %err, "Record skipped");
    }
}

// =============================================================================
// Handle
// =============================================================================

/// Commands accepted by the engine task.
#[derive(Debug)]
pub enum DigestCommand {
    Configure {
        config: Box<MarqueeConfig>,
        ack: oneshot::Sender<DigestResult<()>>,
    },
    SetInterval {
        minutes: u64,
        ack: oneshot::Sender<DigestResult<()>>,
    },
    Start {
        ack: oneshot::Sender<DigestResult<()>>,
    },
    Stop {
        ack: oneshot::Sender<()>,
    },
    RunCycle {
        ack: oneshot::Sender<DigestResult<()>>,
    },
    Shutdown {
        ack: oneshot::Sender<()>,
    },
}

/// Handle for interacting with a spawned engine.
#[derive(Clone)]
pub struct DigestHandle {
    status: Arc<RwLock<DigestStatus>>,
    status_rx: watch::Receiver<DigestStatus>,
    dispatcher: Arc<EventDispatcher>,
    cmd_tx: mpsc::Sender<DigestCommand>,
}

impl DigestHandle {
    /// Returns the current status.
    pub async fn status(&self) -> DigestStatus {
        self.status.read().await.clone()
    }

    /// Subscribes to status changes.
    pub fn subscribe(&self) -> watch::Receiver<DigestStatus> {
        self.status_rx.clone()
    }

    /// The engine's listener registry.
    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.dispatcher
    }

    /// Registers a listener on the running engine.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&DigestEvent) + Send + Sync + 'static,
    {
        self.dispatcher.on(kind, listener)
    }

    pub async fn configure(&self, config: MarqueeConfig) -> DigestResult<()> {
        let (ack, rx) = oneshot::channel();
        self.send(DigestCommand::Configure {
            config: Box::new(config),
            ack,
        })
        .await?;
        rx.await.map_err(|_| ack_dropped())?
    }

    pub async fn set_interval(&self, minutes: u64) -> DigestResult<()> {
        let (ack, rx) = oneshot::channel();
        self.send(DigestCommand::SetInterval { minutes, ack }).await?;
        rx.await.map_err(|_| ack_dropped())?
    }

    pub async fn start(&self) -> DigestResult<()> {
        let (ack, rx) = oneshot::channel();
        self.send(DigestCommand::Start { ack }).await?;
        rx.await.map_err(|_| ack_dropped())?
    }

    pub async fn stop(&self) -> DigestResult<()> {
        let (ack, rx) = oneshot::channel();
        self.send(DigestCommand::Stop { ack }).await?;
        rx.await.map_err(|_| ack_dropped())
    }

    /// Runs a cycle now, outside the schedule.
    pub async fn run_cycle(&self) -> DigestResult<()> {
        let (ack, rx) = oneshot::channel();
        self.send(DigestCommand::RunCycle { ack }).await?;
        rx.await.map_err(|_| ack_dropped())?
    }

    /// Stops the engine, removes all listeners and ends the engine task.
    pub async fn shutdown(&self) -> DigestResult<()> {
        let (ack, rx) = oneshot::channel();
        self.send(DigestCommand::Shutdown { ack }).await?;
        rx.await.map_err(|_| ack_dropped())
    }

    async fn send(&self, cmd: DigestCommand) -> DigestResult<()> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| DigestError::ChannelError("Digest command channel closed".into()))
    }
}

/// The engine task ended before answering.
fn ack_dropped() -> DigestError {
    DigestError::ShuttingDown
}
