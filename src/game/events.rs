//! Game Events
//!
//! Events generated during simulation for renderers, logs and the session
//! broadcast. Events never feed back into the simulation.

use serde::{Serialize, Deserialize};

use crate::game::state::Outcome;
use crate::game::tower::{AimStrategy, TowerIndex};

/// Priority for event ordering within a frame.
///
/// Lower value = delivered first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventPriority {
    /// Player actions applied before the frame ran
    Action = 0,
    /// Shots, kills and leaks
    Combat = 1,
    /// Enemies entering the map
    Spawn = 2,
    /// Wave and match transitions
    Phase = 3,
}

/// Game event data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GameEventData {
    /// Tower bought and placed
    TowerPlaced {
        index: TowerIndex,
        name: String,
        x: i32,
        y: i32,
    },

    /// Tower sold
    TowerSold {
        index: TowerIndex,
        refund: u32,
    },

    /// Upgrade tier bought
    TowerUpgraded {
        index: TowerIndex,
        tier: usize,
        price: u32,
    },

    /// Tower switched on or off
    TowerToggled {
        index: TowerIndex,
        turned_on: bool,
    },

    /// Aim strategy changed
    TowerTuned {
        index: TowerIndex,
        aim: AimStrategy,
    },

    /// Next wave released
    WaveStarted {
        wave: usize,
    },

    /// Enemy entered the path
    EnemySpawned {
        spawn_seq: u32,
        name: String,
    },

    /// Tower fired
    ProjectileLaunched {
        tower: TowerIndex,
    },

    /// Enemy killed by a tower
    EnemyKilled {
        spawn_seq: u32,
        reward: u32,
    },

    /// Enemy reached the end of the path
    EnemyLeaked {
        spawn_seq: u32,
        damage: u32,
    },

    /// Wave fully spawned and defeated
    WaveCleared {
        wave: usize,
    },

    /// Match over
    MatchEnded {
        outcome: Outcome,
        duration_frames: u32,
    },
}

impl GameEventData {
    /// Delivery priority of this kind of event.
    pub fn priority(&self) -> EventPriority {
        match self {
            GameEventData::TowerPlaced { .. }
            | GameEventData::TowerSold { .. }
            | GameEventData::TowerUpgraded { .. }
            | GameEventData::TowerToggled { .. }
            | GameEventData::TowerTuned { .. }
            | GameEventData::WaveStarted { .. } => EventPriority::Action,
            GameEventData::ProjectileLaunched { .. }
            | GameEventData::EnemyKilled { .. }
            | GameEventData::EnemyLeaked { .. } => EventPriority::Combat,
            GameEventData::EnemySpawned { .. } => EventPriority::Spawn,
            GameEventData::WaveCleared { .. } | GameEventData::MatchEnded { .. } => {
                EventPriority::Phase
            }
        }
    }
}

/// A game event with timing and priority.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Frame when the event occurred
    pub frame: u32,

    /// Delivery priority
    pub priority: EventPriority,

    /// Event data
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event.
    pub fn new(frame: u32, data: GameEventData) -> Self {
        Self {
            frame,
            priority: data.priority(),
            data,
        }
    }

    /// Ordering key within a batch. Sort stably so equal keys keep
    /// generation order.
    pub fn sort_key(&self) -> (u32, EventPriority) {
        (self.frame, self.priority)
    }

    /// Create enemy killed event.
    pub fn enemy_killed(frame: u32, spawn_seq: u32, reward: u32) -> Self {
        Self::new(frame, GameEventData::EnemyKilled { spawn_seq, reward })
    }

    /// Create enemy leaked event.
    pub fn enemy_leaked(frame: u32, spawn_seq: u32, damage: u32) -> Self {
        Self::new(frame, GameEventData::EnemyLeaked { spawn_seq, damage })
    }

    /// Create match ended event.
    pub fn match_ended(frame: u32, outcome: Outcome) -> Self {
        Self::new(
            frame,
            GameEventData::MatchEnded {
                outcome,
                duration_frames: frame,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_ordering() {
        let mut events = vec![
            GameEvent::match_ended(10, Outcome::Loss),
            GameEvent::new(10, GameEventData::EnemySpawned { spawn_seq: 3, name: "grunt".into() }),
            GameEvent::enemy_leaked(10, 1, 10),
            GameEvent::new(9, GameEventData::WaveCleared { wave: 0 }),
            GameEvent::enemy_killed(10, 2, 15),
            GameEvent::new(10, GameEventData::TowerSold { index: TowerIndex(0), refund: 70 }),
        ];
        events.sort_by_key(GameEvent::sort_key);

        let priorities: Vec<_> = events.iter().map(|e| (e.frame, e.priority)).collect();
        assert_eq!(
            priorities,
            vec![
                (9, EventPriority::Phase),
                (10, EventPriority::Action),
                (10, EventPriority::Combat),
                (10, EventPriority::Combat),
                (10, EventPriority::Spawn),
                (10, EventPriority::Phase),
            ]
        );

        // Stable within a priority
        assert_eq!(events[2].data, GameEventData::EnemyLeaked { spawn_seq: 1, damage: 10 });
        assert_eq!(events[3].data, GameEventData::EnemyKilled { spawn_seq: 2, reward: 15 });
    }
}
