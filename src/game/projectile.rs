//! Projectiles
//!
//! Fire-and-forget shots. Velocity and time-to-live are fixed at launch; when
//! the countdown reaches zero the captured target takes the damage wherever
//! it is. There is no geometric hit test.

use serde::{Serialize, Deserialize};
use slotmap::SlotMap;

use crate::core::geometry::{frames_to_cover, Point};
use crate::game::config::AttackType;
use crate::game::enemy::{Enemy, EnemyId};
use crate::game::tower::TowerIndex;

/// Damage delivered by a projectile that resolved this frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Hit {
    /// Enemy that took the damage
    pub target: EnemyId,
    /// Damage after resistances
    pub damage: u32,
}

/// A projectile in flight.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Projectile {
    /// Current position
    pub position: Point,
    /// Per-frame step
    pub velocity: Point,
    /// Frames until impact
    pub ttl: u32,
    /// Raw damage before resistances
    pub damage: u32,
    /// Damage type
    pub attack_type: AttackType,
    /// Enemy captured at launch
    pub target: EnemyId,
    /// Tower that fired it
    pub source: TowerIndex,
    /// Resolved
    pub dead: bool,
}

impl Projectile {
    /// Launch from `from` toward the target's current position.
    ///
    /// A zero flight time means the shot lands on its first update.
    pub fn launch(
        from: Point,
        to: Point,
        speed: f32,
        damage: u32,
        attack_type: AttackType,
        target: EnemyId,
        source: TowerIndex,
    ) -> Self {
        let ttl = frames_to_cover(from.distance(to), speed);
        let velocity = if ttl == 0 {
            Point::ZERO
        } else {
            let delta = to - from;
            Point::new(delta.x / ttl as f32, delta.y / ttl as f32)
        };

        Self {
            position: from,
            velocity,
            ttl,
            damage,
            attack_type,
            target,
            source,
            dead: false,
        }
    }

    /// Advance one frame, resolving against the target when time runs out.
    ///
    /// The target is not re-validated: an enemy that already died still
    /// takes the damage. A target removed with its wave is simply missed.
    pub fn update(&mut self, enemies: &mut SlotMap<EnemyId, Enemy>) -> Option<Hit> {
        self.position = self.position + self.velocity;
        self.ttl = self.ttl.saturating_sub(1);

        if self.dead || self.ttl != 0 {
            return None;
        }

        self.dead = true;
        let enemy = enemies.get_mut(self.target)?;
        let damage = enemy.final_damage(self.attack_type, self.damage);
        enemy.take_damage(damage);

        Some(Hit { target: self.target, damage })
    }
}
