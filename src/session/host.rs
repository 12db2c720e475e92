//! Match Session Host
//!
//! Runs one match on its own tokio task at a wall-clock tick rate. The tick
//! task is the only owner of the `MatchState`; everyone else talks to it
//! through a command queue and reads published snapshots.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::core::hash::StateHash;
use crate::game::action::PlayerAction;
use crate::game::config::MatchRules;
use crate::game::events::GameEvent;
use crate::game::state::{MatchSnapshot, MatchState, Outcome};
use crate::game::tick::tick;
use crate::replay::{ReplayStore, Watcher};
use crate::session::status;

/// Configuration for a match session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Normal tick rate.
    pub baseline_tps: u32,
    /// Tick rate while sped up.
    pub fast_tps: u32,
    /// Pending commands before senders are refused.
    pub command_capacity: usize,
    /// Event channel depth per subscriber.
    pub event_capacity: usize,
    /// How often the status line is refreshed.
    pub status_interval: Duration,
    /// Where the finished match's log is saved. `None` keeps it in memory.
    pub replay_store: Option<ReplayStore>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            baseline_tps: 60,
            fast_tps: 180,
            command_capacity: 64,
            event_capacity: 256,
            status_interval: Duration::from_millis(250),
            replay_store: None,
        }
    }
}

impl SessionConfig {
    /// Default session paced by the match rules' tick rates.
    pub fn for_rules(rules: &MatchRules) -> Self {
        Self {
            baseline_tps: rules.baseline_tps,
            fast_tps: rules.fast_tps,
            ..Self::default()
        }
    }

    /// Save finished matches to `store`.
    pub fn with_replay_store(mut self, store: ReplayStore) -> Self {
        self.replay_store = Some(store);
        self
    }
}

/// A request to the tick task. Applied at the next tick boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    /// Apply a player action (recorded if accepted).
    Action(PlayerAction),
    /// Switch between baseline and fast tick rate.
    SetSpeed {
        /// Use the fast rate
        fast: bool,
    },
    /// Stop simulating until resumed. Commands are still applied.
    Pause,
    /// Continue simulating.
    Resume,
    /// End the match as abandoned.
    Abandon,
}

/// What a finished session hands back.
#[derive(Debug, Clone)]
pub struct SessionReport {
    /// Session identifier.
    pub id: Uuid,
    /// How the match ended.
    pub outcome: Option<Outcome>,
    /// Frames simulated.
    pub frames: u32,
    /// State hash of the final frame.
    pub final_hash: StateHash,
    /// Commands the match refused.
    pub rejected_actions: usize,
    /// The recorded log.
    pub watcher: Option<Watcher>,
    /// Where the log was saved.
    pub replay_path: Option<PathBuf>,
    /// Why saving failed, if it did.
    pub persist_error: Option<String>,
}

/// Session errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The session has finished.
    #[error("Session closed")]
    Closed,

    /// Too many commands are waiting.
    #[error("Command queue full")]
    QueueFull,

    /// The tick task did not complete.
    #[error("Session task failed: {0}")]
    TaskFailed(String),
}

// =============================================================================
// HANDLE
// =============================================================================

/// Caller side of a running session.
pub struct SessionHandle {
    id: Uuid,
    commands: mpsc::Sender<SessionCommand>,
    snapshot: Arc<RwLock<MatchSnapshot>>,
    status: watch::Receiver<String>,
    event_tx: broadcast::Sender<GameEvent>,
    shutdown_tx: broadcast::Sender<()>,
    task: JoinHandle<SessionReport>,
}

impl SessionHandle {
    /// Session identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Queue a command, waiting for room.
    pub async fn send(&self, command: SessionCommand) -> Result<(), SessionError> {
        self.commands.send(command).await.map_err(|_| SessionError::Closed)
    }

    /// Queue a command without waiting.
    pub fn try_send(&self, command: SessionCommand) -> Result<(), SessionError> {
        self.commands.try_send(command).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => SessionError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => SessionError::Closed,
        })
    }

    /// Queue a player action.
    pub async fn act(&self, action: PlayerAction) -> Result<(), SessionError> {
        self.send(SessionCommand::Action(action)).await
    }

    /// Latest published snapshot.
    pub async fn snapshot(&self) -> MatchSnapshot {
        self.snapshot.read().await.clone()
    }

    /// Latest status line.
    pub fn status(&self) -> String {
        self.status.borrow().clone()
    }

    /// Subscribe to match events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<GameEvent> {
        self.event_tx.subscribe()
    }

    /// Abandon the match if it is still running.
    pub fn shutdown(&self) {
        // Nobody listening means the session already finished
        let _ = self.shutdown_tx.send(());
    }

    /// True once the tick task has returned.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the session to end and persist.
    pub async fn join(self) -> Result<SessionReport, SessionError> {
        self.task
            .await
            .map_err(|err| SessionError::TaskFailed(err.to_string()))
    }
}

// =============================================================================
// TICK TASK
// =============================================================================

enum Wake {
    Tick,
    Shutdown,
}

/// The tick task of one match.
pub struct MatchSession {
    id: Uuid,
    state: MatchState,
    config: SessionConfig,
    commands: mpsc::Receiver<SessionCommand>,
    snapshot: Arc<RwLock<MatchSnapshot>>,
    event_tx: broadcast::Sender<GameEvent>,
    /// Stops the refresh loop once the match is over.
    stop_tx: broadcast::Sender<()>,
    paused: bool,
    fast: bool,
    rejected_actions: usize,
}

impl MatchSession {
    /// Start hosting `state` and return its handle.
    ///
    /// Must be called inside a tokio runtime.
    pub fn spawn(state: MatchState, config: SessionConfig) -> SessionHandle {
        let id = Uuid::new_v4();
        let initial = state.snapshot();

        let (command_tx, command_rx) = mpsc::channel(config.command_capacity.max(1));
        let (event_tx, _) = broadcast::channel(config.event_capacity.max(1));
        let (shutdown_tx, _) = broadcast::channel(1);
        let (status_tx, status_rx) = watch::channel(status::status_line(&initial));
        let snapshot = Arc::new(RwLock::new(initial));

        let (stop_tx, _) = broadcast::channel(1);

        // Subscribed before the task starts so an early shutdown is not lost
        let shutdown_rx = shutdown_tx.subscribe();
        let refresh = tokio::spawn(status::refresh_loop(
            Arc::clone(&snapshot),
            status_tx,
            stop_tx.subscribe(),
            config.status_interval,
        ));

        let session = MatchSession {
            id,
            state,
            config,
            commands: command_rx,
            snapshot: Arc::clone(&snapshot),
            event_tx: event_tx.clone(),
            stop_tx,
            paused: false,
            fast: false,
            rejected_actions: 0,
        };
        let task = tokio::spawn(session.run(shutdown_rx, refresh));

        SessionHandle {
            id,
            commands: command_tx,
            snapshot,
            status: status_rx,
            event_tx,
            shutdown_tx,
            task,
        }
    }

    fn tick_period(&self) -> Duration {
        let tps = if self.fast { self.config.fast_tps } else { self.config.baseline_tps };
        Duration::from_micros(1_000_000 / u64::from(tps.max(1)))
    }

    #[instrument(skip_all, fields(session = %self.id, level_name = %self.state.level_name))]
    async fn run(
        mut self,
        mut shutdown_rx: broadcast::Receiver<()>,
        refresh: JoinHandle<()>,
    ) -> SessionReport {
        info!("session started");
        let mut ticker = pacing(self.tick_period(), Instant::now());

        loop {
            let wake = tokio::select! {
                _ = ticker.tick() => Wake::Tick,
                _ = shutdown_rx.recv() => Wake::Shutdown,
            };

            if let Wake::Shutdown = wake {
                info!(frame = self.state.frame, "shutdown requested");
                self.state.abandon();
                let events = self.state.take_events();
                self.publish(events).await;
                break;
            }

            let speed_before = self.fast;
            self.drain_commands();
            if self.fast != speed_before {
                // The frame for this wake-up already ran on the old pace
                let period = self.tick_period();
                ticker = pacing(period, Instant::now() + period);
            }

            if self.state.is_ended() {
                let events = self.state.take_events();
                self.publish(events).await;
                break;
            }
            if self.paused {
                continue;
            }

            let result = tick(&mut self.state);
            self.publish(result.events).await;
            if result.match_ended {
                break;
            }
        }

        self.finish(refresh).await
    }

    /// Apply every queued command. Only called between ticks.
    fn drain_commands(&mut self) {
        loop {
            let command = match self.commands.try_recv() {
                Ok(command) => command,
                Err(mpsc::error::TryRecvError::Empty) => return,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    if !self.state.is_ended() {
                        warn!(frame = self.state.frame, "all handles dropped, abandoning");
                        self.state.abandon();
                    }
                    return;
                }
            };

            match command {
                SessionCommand::Action(action) => {
                    let kind = action.kind();
                    if let Err(reason) = self.state.apply(action) {
                        self.rejected_actions += 1;
                        debug!(frame = self.state.frame, action = kind, %reason, "action rejected");
                    }
                }
                SessionCommand::SetSpeed { fast } => {
                    self.fast = fast;
                    debug!(fast, "speed changed");
                }
                SessionCommand::Pause => self.paused = true,
                SessionCommand::Resume => self.paused = false,
                SessionCommand::Abandon => {
                    self.state.abandon();
                }
            }

            if self.state.is_ended() {
                return;
            }
        }
    }

    async fn publish(&self, events: Vec<GameEvent>) {
        *self.snapshot.write().await = self.state.snapshot();
        for event in events {
            // Lagging or absent subscribers are not our problem
            let _ = self.event_tx.send(event);
        }
    }

    async fn finish(mut self, refresh: JoinHandle<()>) -> SessionReport {
        let _ = self.stop_tx.send(());
        if let Err(err) = refresh.await {
            warn!(%err, "status loop did not stop cleanly");
        }

        let (watcher, replay_path, persist_error) =
            persist(self.config.replay_store.clone(), self.state.take_watcher()).await;

        let report = SessionReport {
            id: self.id,
            outcome: self.state.outcome(),
            frames: self.state.frame,
            final_hash: self.state.compute_hash(),
            rejected_actions: self.rejected_actions,
            watcher,
            replay_path,
            persist_error,
        };
        info!(
            outcome = ?report.outcome,
            frames = report.frames,
            hash = %hex::encode(&report.final_hash[..8]),
            "session finished"
        );
        report
    }
}

/// Save the log on a blocking thread. Failure is logged, never fatal.
async fn persist(
    store: Option<ReplayStore>,
    watcher: Option<Watcher>,
) -> (Option<Watcher>, Option<PathBuf>, Option<String>) {
    let (store, watcher) = match (store, watcher) {
        (Some(store), Some(watcher)) => (store, watcher),
        (_, watcher) => return (watcher, None, None),
    };

    let saved = tokio::task::spawn_blocking(move || {
        let result = store.save(&watcher);
        (watcher, result)
    })
    .await;

    match saved {
        Ok((watcher, Ok(path))) => (Some(watcher), Some(path), None),
        Ok((watcher, Err(err))) => {
            error!(%err, "failed to save replay");
            (Some(watcher), None, Some(err.to_string()))
        }
        Err(err) => {
            error!(%err, "replay save task failed");
            (None, None, Some(err.to_string()))
        }
    }
}

/// Ticker firing every `period`, first at `start`.
fn pacing(period: Duration, start: Instant) -> Interval {
    let mut ticker = interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}
