//! Enemy Movement and Damage
//!
//! Enemies walk the path waypoint to waypoint at a fixed speed. They die
//! either by losing all health or by reaching the last waypoint, and stay in
//! the map's arena (flagged dead) until their wave is cleared.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};
use slotmap::new_key_type;

use crate::core::geometry::{frames_to_cover, Path, Point};
use crate::game::config::{AttackType, EnemyConfig};

new_key_type! {
    /// Generational handle to an enemy in the map's arena.
    ///
    /// Handles outlive their enemy safely: after a wave is cleared every old
    /// handle resolves to nothing.
    pub struct EnemyId;
}

/// What happened to an enemy during one `advance`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Advance {
    /// Already dead, nothing to do.
    Idle,
    /// First frame: aimed at the first leg, did not move.
    Initialized,
    /// Took one step along the path.
    Moved,
    /// Health had reached zero.
    Killed,
    /// Arrived at the final waypoint.
    ReachedEnd,
}

/// A live (or dead but retained) enemy.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Enemy {
    /// Config name
    pub name: String,
    /// Per-match spawn order, used to break targeting ties
    pub spawn_seq: u32,
    /// Speed in map units per frame
    pub vrms: f32,
    /// Health at spawn
    pub max_health: u32,
    /// Current health, never increases
    pub health: u32,
    /// Damage dealt to the player on reaching the end
    pub damage: u32,
    /// Money still owed to the player for this kill
    pub money_award: u32,
    /// Signed damage delta per attack type
    pub resistances: BTreeMap<AttackType, i32>,
    /// Current position
    pub position: Point,
    /// Per-frame step on the current leg
    pub velocity: Point,
    /// Waypoint last reached (-1 before the first frame)
    pub current_waypoint: i32,
    /// Frames left until the next waypoint
    pub frames_to_next_waypoint: u32,
    /// Terminal flag
    pub dead: bool,
    /// Died by reaching the end of the path
    pub reached_end: bool,
    /// Damage owed to the player, consumed once
    pub pending_damage_to_player: u32,
}

impl Enemy {
    /// Spawn at the start of the path.
    pub fn spawn(config: &EnemyConfig, path: &Path, spawn_seq: u32) -> Self {
        Self {
            name: config.name.clone(),
            spawn_seq,
            vrms: config.vrms,
            max_health: config.max_health,
            health: config.max_health,
            damage: config.damage,
            money_award: config.money_award,
            resistances: config.resistances(),
            position: path.start().unwrap_or(Point::ZERO),
            velocity: Point::ZERO,
            current_waypoint: -1,
            frames_to_next_waypoint: 0,
            dead: false,
            reached_end: false,
            pending_damage_to_player: 0,
        }
    }

    /// True while the enemy can be targeted and blocks wave completion.
    #[inline]
    pub fn is_alive(&self) -> bool {
        !self.dead
    }

    /// Advance one frame.
    ///
    /// Health death is checked before movement and never owes damage to the
    /// player.
    pub fn advance(&mut self, path: &Path) -> Advance {
        if self.dead {
            return Advance::Idle;
        }

        if self.health == 0 {
            self.dead = true;
            return Advance::Killed;
        }

        if self.current_waypoint == -1 {
            return self.retarget(path);
        }

        self.position = self.position + self.velocity;
        self.frames_to_next_waypoint = self.frames_to_next_waypoint.saturating_sub(1);

        if self.frames_to_next_waypoint == 0 {
            return self.retarget(path);
        }

        Advance::Moved
    }

    /// Snap to the next waypoint and aim at the one after it.
    fn retarget(&mut self, path: &Path) -> Advance {
        self.current_waypoint += 1;
        let reached = self.current_waypoint as usize;

        if let Some(point) = path.get(reached) {
            // Snapping removes drift from incremental steps
            self.position = point;
        }

        let next = match path.get(reached + 1) {
            Some(next) => next,
            None => {
                self.reached_end = true;
                self.pending_damage_to_player = self.damage;
                self.dead = true;
                self.velocity = Point::ZERO;
                return Advance::ReachedEnd;
            }
        };

        let frames = frames_to_cover(self.position.distance(next), self.vrms).max(1);
        let delta = next - self.position;
        self.frames_to_next_waypoint = frames;
        self.velocity = Point::new(delta.x / frames as f32, delta.y / frames as f32);

        if reached == 0 {
            Advance::Initialized
        } else {
            Advance::Moved
        }
    }

    /// Damage after this enemy's resistance or weakness to `attack_type`.
    pub fn final_damage(&self, attack_type: AttackType, damage: u32) -> u32 {
        match self.resistances.get(&attack_type) {
            Some(&delta) => damage.saturating_add_signed(delta),
            None => damage,
        }
    }

    /// Apply already-adjusted damage, flooring health at zero.
    #[inline]
    pub fn take_damage(&mut self, damage: u32) {
        self.health = self.health.saturating_sub(damage);
    }

    /// Remaining distance on the current leg, used by the First strategy.
    #[inline]
    pub fn leg_remaining(&self) -> f32 {
        self.frames_to_next_waypoint as f32 * self.vrms
    }

    /// Take the damage owed to the player. Non-zero at most once.
    pub fn take_damage_to_player(&mut self) -> u32 {
        std::mem::take(&mut self.pending_damage_to_player)
    }

    /// Take the kill reward. Only tower kills pay, and only once.
    pub fn take_reward(&mut self) -> u32 {
        if self.dead && !self.reached_end {
            std::mem::take(&mut self.money_award)
        } else {
            0
        }
    }
}
