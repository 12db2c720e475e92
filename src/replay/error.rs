//! Replay Errors

use std::path::PathBuf;
use thiserror::Error;

use crate::game::action::{ActionRejected, PlayerAction};
use crate::game::config::ConfigError;

/// Errors from recording, persisting or replaying an action log.
#[derive(Error, Debug)]
pub enum ReplayError {
    /// Log file could not be read or written.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Log is not valid JSON for this format.
    #[error("Invalid action log JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Compact encoding failed.
    #[error("Invalid action log encoding: {0}")]
    Encoding(#[from] bincode::Error),

    /// Log was written by an incompatible version.
    #[error("Version mismatch: expected {expected}, got {got}")]
    VersionMismatch {
        /// Version this build reads
        expected: u32,
        /// Version found in the log
        got: u32,
    },

    /// An entry is stamped earlier than the one before it.
    #[error("Action at frame {frame} follows an action at frame {previous}")]
    UnorderedLog {
        /// Previous entry's frame
        previous: u32,
        /// Offending entry's frame
        frame: u32,
    },

    /// The match the log was recorded on cannot be rebuilt.
    #[error("Cannot rebuild match: {0}")]
    Config(#[from] ConfigError),

    /// The reconstructed state refused a logged action.
    #[error("Replay desync at frame {frame}: {action} rejected ({reason})")]
    Desync {
        /// Frame of the rejected entry
        frame: u32,
        /// The logged action
        action: PlayerAction,
        /// Why the reconstructed state refused it
        reason: ActionRejected,
    },

    /// An entry is stamped before the frame the replay has reached.
    #[error("Action at frame {frame} was skipped (replay is at frame {current})")]
    MissedAction {
        /// Entry frame
        frame: u32,
        /// Replay frame
        current: u32,
    },

    /// The log ran out while the match still waited for the player.
    #[error("Action log ended at frame {frame} before the match did")]
    Truncated {
        /// Frame where the replay stalled
        frame: u32,
    },

    /// Replay finished but the state differs from the recorded one.
    #[error("Final state hash mismatch: expected {expected}, got {computed}")]
    HashMismatch {
        /// Recorded hash (hex)
        expected: String,
        /// Replayed hash (hex)
        computed: String,
    },
}
