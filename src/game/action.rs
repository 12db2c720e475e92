//! Player Actions
//!
//! The only way a player (or a replay) mutates a match. Every accepted action
//! is recorded in the action log at the frame it was applied.

use std::fmt;
use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::game::tower::TowerIndex;

/// A player intent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerAction {
    /// Buy and place a tower at integer map coordinates
    PutTower { name: String, x: i32, y: i32 },
    /// Sell a tower for a partial refund
    SellTower { index: TowerIndex },
    /// Buy the next upgrade tier
    UpgradeTower { index: TowerIndex },
    /// Resume firing
    TurnOn { index: TowerIndex },
    /// Stop firing
    TurnOff { index: TowerIndex },
    /// Aim at the enemy furthest along the path
    TuneFirst { index: TowerIndex },
    /// Aim at the enemy with the most health
    TuneStrong { index: TowerIndex },
    /// Aim at the enemy with the least health
    TuneWeak { index: TowerIndex },
    /// Release the next wave
    StartWave,
    /// Terminal record, appended when the match ends
    Stop,
}

impl PlayerAction {
    /// Tower the action targets, if any.
    pub fn tower_index(&self) -> Option<TowerIndex> {
        match self {
            PlayerAction::SellTower { index }
            | PlayerAction::UpgradeTower { index }
            | PlayerAction::TurnOn { index }
            | PlayerAction::TurnOff { index }
            | PlayerAction::TuneFirst { index }
            | PlayerAction::TuneStrong { index }
            | PlayerAction::TuneWeak { index } => Some(*index),
            PlayerAction::PutTower { .. } | PlayerAction::StartWave | PlayerAction::Stop => None,
        }
    }

    /// Short kind name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PlayerAction::PutTower { .. } => "PutTower",
            PlayerAction::SellTower { .. } => "SellTower",
            PlayerAction::UpgradeTower { .. } => "UpgradeTower",
            PlayerAction::TurnOn { .. } => "TurnOn",
            PlayerAction::TurnOff { .. } => "TurnOff",
            PlayerAction::TuneFirst { .. } => "TuneFirst",
            PlayerAction::TuneStrong { .. } => "TuneStrong",
            PlayerAction::TuneWeak { .. } => "TuneWeak",
            PlayerAction::StartWave => "StartWave",
            PlayerAction::Stop => "Stop",
        }
    }
}

impl fmt::Display for PlayerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerAction::PutTower { name, x, y } => write!(f, "PutTower({} at {},{})", name, x, y),
            other => match other.tower_index() {
                Some(index) => write!(f, "{}({})", other.kind(), index),
                None => f.write_str(other.kind()),
            },
        }
    }
}

/// Why a player intent was refused. A refused action changes nothing and is
/// not logged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionRejected {
    #[error("Not enough money: need {needed}, have {available}")]
    InsufficientFunds { needed: u32, available: u32 },

    #[error("Position ({x}, {y}) is on the enemy path")]
    OnPath { x: i32, y: i32 },

    #[error("Position ({x}, {y}) is outside the playable area")]
    OutsidePlayableArea { x: i32, y: i32 },

    #[error("Unknown tower type: {0}")]
    UnknownTower(String),

    #[error("Tower {0} is locked")]
    TowerLocked(String),

    #[error("No tower with index {0}")]
    NoSuchTower(TowerIndex),

    #[error("Tower {0} was sold")]
    TowerSold(TowerIndex),

    #[error("Tower {0} has no upgrades left")]
    UpgradesExhausted(TowerIndex),

    #[error("Next upgrade of tower {0} is locked")]
    UpgradeLocked(TowerIndex),

    #[error("No waves left")]
    NoNextWave,

    #[error("A wave is already running")]
    WaveRunning,

    #[error("Match has ended")]
    MatchEnded,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_shape() {
        let action = PlayerAction::PutTower { name: "archer".into(), x: 10, y: -3 };
        let json = serde_json::to_string(&action).unwrap();
        assert_eq!(json, r#"{"PutTower":{"name":"archer","x":10,"y":-3}}"#);

        let sell: PlayerAction = serde_json::from_str(r#"{"SellTower":{"index":4}}"#).unwrap();
        assert_eq!(sell, PlayerAction::SellTower { index: TowerIndex(4) });

        let stop: PlayerAction = serde_json::from_str(r#""Stop""#).unwrap();
        assert_eq!(stop, PlayerAction::Stop);
    }

    #[test]
    fn test_display() {
        assert_eq!(PlayerAction::TuneWeak { index: TowerIndex(2) }.to_string(), "TuneWeak(#2)");
        assert_eq!(PlayerAction::StartWave.to_string(), "StartWave");
        assert_eq!(
            ActionRejected::InsufficientFunds { needed: 700, available: 650 }.to_string(),
            "Not enough money: need 700, have 650"
        );
    }
}
