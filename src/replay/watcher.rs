//! Action Log Recording
//!
//! The watcher is the persisted record of one match: where it was played,
//! what the player started with, and every accepted action stamped with the
//! frame it was applied on. Replaying it against the same catalog rebuilds
//! the match frame for frame.

use std::io::{Read, Write};
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

use crate::core::hash::{hash_with_domain, StateHash};
use crate::game::action::PlayerAction;
use crate::game::state::PlayerMapState;
use crate::replay::error::ReplayError;

/// Current action log version.
pub const WATCHER_VERSION: u32 = 1;

/// Domain tag for log fingerprints.
const FINGERPRINT_DOMAIN: &[u8] = b"TD_SIM_WATCHER_V1";

/// One logged action.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Frame the action was applied on (before that frame's tick ran)
    pub frame: u32,
    /// The action itself
    pub action: PlayerAction,
}

/// The action log of one match.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Watcher {
    /// Version for forward compatibility.
    pub version: u32,

    /// Level the match was played on.
    pub name: String,

    /// When the match started.
    pub time: DateTime<Utc>,

    /// Player resources at frame 0.
    pub init_player_map_state: PlayerMapState,

    /// Accepted actions in non-decreasing frame order.
    pub actions: Vec<Action>,
}

impl Watcher {
    /// Create an empty log.
    pub fn new(
        name: String,
        time: DateTime<Utc>,
        init_player_map_state: PlayerMapState,
        capacity: usize,
    ) -> Self {
        Self {
            version: WATCHER_VERSION,
            name,
            time,
            init_player_map_state,
            actions: Vec::with_capacity(capacity),
        }
    }

    /// Append an action. Frames must not go backwards.
    pub fn append(&mut self, frame: u32, action: PlayerAction) -> Result<(), ReplayError> {
        if let Some(previous) = self.last_frame() {
            if frame < previous {
                return Err(ReplayError::UnorderedLog { previous, frame });
            }
        }
        self.actions.push(Action { frame, action });
        Ok(())
    }

    /// Frame of the latest entry.
    pub fn last_frame(&self) -> Option<u32> {
        self.actions.last().map(|a| a.frame)
    }

    /// True once the terminal `Stop` has been appended.
    pub fn is_finished(&self) -> bool {
        matches!(self.actions.last(), Some(Action { action: PlayerAction::Stop, .. }))
    }

    /// Check the version and frame order of a loaded log.
    pub fn validate(&self) -> Result<(), ReplayError> {
        if self.version != WATCHER_VERSION {
            return Err(ReplayError::VersionMismatch {
                expected: WATCHER_VERSION,
                got: self.version,
            });
        }
        for pair in self.actions.windows(2) {
            if pair[1].frame < pair[0].frame {
                return Err(ReplayError::UnorderedLog {
                    previous: pair[0].frame,
                    frame: pair[1].frame,
                });
            }
        }
        Ok(())
    }

    // =========================================================================
    // Encoding
    // =========================================================================

    /// Write as pretty JSON (the file format).
    pub fn write_json<W: Write>(&self, writer: W) -> Result<(), ReplayError> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Read and validate a JSON log.
    pub fn read_json<R: Read>(reader: R) -> Result<Self, ReplayError> {
        let watcher: Self = serde_json::from_reader(reader)?;
        watcher.validate()?;
        Ok(watcher)
    }

    /// Serialize to compact bytes using bincode.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ReplayError> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize and validate compact bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ReplayError> {
        let watcher: Self = bincode::deserialize(data)?;
        watcher.validate()?;
        Ok(watcher)
    }

    /// Content hash of the log, independent of file formatting.
    pub fn fingerprint(&self) -> Result<StateHash, ReplayError> {
        Ok(hash_with_domain(FINGERPRINT_DOMAIN, &self.to_bytes()?))
    }
}
