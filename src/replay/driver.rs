//! Replay Driver
//!
//! Re-runs a match from its action log. Each step applies every entry stamped
//! with the current frame, then runs one normal tick, exactly like the live
//! host does.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::core::hash::StateHash;
use crate::game::action::PlayerAction;
use crate::game::config::Catalog;
use crate::game::state::{MatchPhase, MatchState, Outcome, PlayerMapState};
use crate::game::tick::{tick, TickResult};
use crate::replay::error::ReplayError;
use crate::replay::watcher::{Action, Watcher};

/// Result of one replay step.
#[derive(Debug)]
pub enum ReplayStep {
    /// One frame simulated.
    Ticked(TickResult),
    /// The log's `Stop` was reached or the match ended.
    Finished,
}

/// Summary of a completed replay.
#[derive(Clone, Debug, PartialEq)]
pub struct ReplayReport {
    /// Level replayed
    pub level_name: String,
    /// Frames simulated
    pub frames: u32,
    /// Outcome, if the match reached `Ended`
    pub outcome: Option<Outcome>,
    /// State hash after the last step
    pub final_hash: StateHash,
    /// Final player resources
    pub player: PlayerMapState,
    /// Log entries applied
    pub actions_applied: usize,
}

/// Drives a fresh match through a recorded log.
pub struct ReplayDriver {
    state: MatchState,
    actions: Vec<Action>,
    cursor: usize,
    stopped: bool,
}

impl ReplayDriver {
    /// Validate the log and rebuild its starting state from `catalog`.
    pub fn new(catalog: Arc<Catalog>, watcher: Watcher) -> Result<Self, ReplayError> {
        watcher.validate()?;
        let state = MatchState::for_replay(catalog, &watcher)?;
        debug!(
            level_name = %watcher.name,
            actions = watcher.actions.len(),
            "replay prepared"
        );

        Ok(Self {
            state,
            actions: watcher.actions,
            cursor: 0,
            stopped: false,
        })
    }

    /// The reconstructed match.
    pub fn state(&self) -> &MatchState {
        &self.state
    }

    /// True once nothing more will be simulated.
    pub fn is_finished(&self) -> bool {
        self.stopped || self.state.is_ended()
    }

    /// Apply this frame's log entries, then tick once.
    pub fn step(&mut self) -> Result<ReplayStep, ReplayError> {
        if self.is_finished() {
            return Ok(ReplayStep::Finished);
        }

        self.apply_due_actions()?;

        if self.is_finished() {
            return Ok(ReplayStep::Finished);
        }

        // A live match only leaves this phase through a logged StartWave
        let exhausted = self.cursor >= self.actions.len();
        if exhausted && self.state.phase == MatchPhase::NextWaveReady {
            return Err(ReplayError::Truncated { frame: self.state.frame });
        }

        Ok(ReplayStep::Ticked(tick(&mut self.state)))
    }

    fn apply_due_actions(&mut self) -> Result<(), ReplayError> {
        let current = self.state.frame;

        while let Some(entry) = self.actions.get(self.cursor) {
            if entry.frame > current {
                break;
            }
            if entry.frame < current {
                return Err(ReplayError::MissedAction { frame: entry.frame, current });
            }
            let action = entry.action.clone();
            self.cursor += 1;

            if action == PlayerAction::Stop {
                // Recorded either by the tick that ended the match or by an
                // abandon at this frame
                self.state.abandon();
                self.stopped = true;
                if self.cursor < self.actions.len() {
                    warn!(
                        remaining = self.actions.len() - self.cursor,
                        "entries after Stop ignored"
                    );
                }
                return Ok(());
            }

            if let Err(reason) = self.state.apply(action.clone()) {
                return Err(ReplayError::Desync { frame: current, action, reason });
            }
        }
        Ok(())
    }

    /// Run until the log's `Stop` or the end of the match.
    pub fn run_to_end(&mut self) -> Result<ReplayReport, ReplayError> {
        while let ReplayStep::Ticked(_) = self.step()? {}

        let report = self.report();
        info!(
            level_name = %report.level_name,
            frames = report.frames,
            outcome = ?report.outcome,
            hash = %hex::encode(&report.final_hash[..8]),
            "replay finished"
        );
        Ok(report)
    }

    /// Run to the end and compare against a recorded final hash.
    pub fn verify(&mut self, expected: &StateHash) -> Result<ReplayReport, ReplayError> {
        let report = self.run_to_end()?;
        if &report.final_hash != expected {
            return Err(ReplayError::HashMismatch {
                expected: hex::encode(expected),
                computed: hex::encode(report.final_hash),
            });
        }
        Ok(report)
    }

    /// Summary of the replay so far.
    pub fn report(&self) -> ReplayReport {
        ReplayReport {
            level_name: self.state.level_name.clone(),
            frames: self.state.frame,
            outcome: self.state.outcome(),
            final_hash: self.state.compute_hash(),
            player: self.state.player,
            actions_applied: self.cursor,
        }
    }
}

/// Replay a log from the start and return its report.
pub fn replay(catalog: Arc<Catalog>, watcher: Watcher) -> Result<ReplayReport, ReplayError> {
    ReplayDriver::new(catalog, watcher)?.run_to_end()
}
