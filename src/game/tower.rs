//! Towers
//!
//! Stationary shooters with a cooldown, a radius, an aim strategy and an
//! upgrade ladder. Sold towers keep their index and stay in the map but are
//! never updated or targeted again.

use std::cmp::Ordering;
use std::fmt;
use serde::{Serialize, Deserialize};
use slotmap::SlotMap;

use crate::core::geometry::Point;
use crate::game::config::{AttackType, TowerConfig, UpgradeConfig};
use crate::game::enemy::{Enemy, EnemyId};
use crate::game::projectile::Projectile;

/// Stable tower identity, assigned from a per-match counter.
///
/// The same index addresses the tower in the UI and in the action log.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TowerIndex(pub u32);

impl fmt::Display for TowerIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a tower chooses among enemies in range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Default)]
pub enum AimStrategy {
    /// Furthest along the path
    #[default]
    First,
    /// Most current health
    Strongest,
    /// Least current health
    Weakest,
}

impl AimStrategy {
    /// Stable byte for hashing.
    pub fn as_u8(self) -> u8 {
        match self {
            AimStrategy::First => 0,
            AimStrategy::Strongest => 1,
            AimStrategy::Weakest => 2,
        }
    }

    /// Compare two candidates. `Greater` means `a` is preferred.
    ///
    /// Remaining ties go to the earlier spawn so the choice never depends on
    /// arena order.
    fn rank(self, a: &Enemy, b: &Enemy) -> Ordering {
        let primary = match self {
            AimStrategy::First => a.current_waypoint.cmp(&b.current_waypoint).then_with(|| {
                // Less distance left on the leg is further along
                b.leg_remaining()
                    .partial_cmp(&a.leg_remaining())
                    .unwrap_or(Ordering::Equal)
            }),
            AimStrategy::Strongest => a.health.cmp(&b.health),
            AimStrategy::Weakest => b.health.cmp(&a.health),
        };
        primary.then_with(|| b.spawn_seq.cmp(&a.spawn_seq))
    }
}

/// A placed tower.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Tower {
    /// Stable index
    pub index: TowerIndex,
    /// Config name
    pub name: String,
    /// Placement position
    pub position: Point,
    /// Purchase price
    pub price: u32,
    /// Damage type
    pub attack_type: AttackType,
    /// Damage per hit
    pub damage: u32,
    /// Targeting radius
    pub radius: f32,
    /// Attacks per 20 seconds at the baseline tick rate
    pub speed_attack: u32,
    /// Projectile speed
    pub projectile_speed: f32,
    /// Upgrade ladder
    pub upgrades: Vec<UpgradeConfig>,
    /// Tiers bought so far
    pub upgrades_bought: usize,
    /// Frames until the next shot is allowed
    pub cooldown: u32,
    /// Current aim strategy
    pub aim: AimStrategy,
    /// Current target, if any
    pub target: Option<EnemyId>,
    /// Switched on by the player
    pub turned_on: bool,
    /// Sold (terminal)
    pub sold: bool,
}

impl Tower {
    /// Build a tower from its config. Placement checks happen in the map.
    pub fn new(index: TowerIndex, config: &TowerConfig, position: Point) -> Self {
        Self {
            index,
            name: config.name.clone(),
            position,
            price: config.price,
            attack_type: config.attack_type,
            damage: config.initial_damage,
            radius: config.initial_radius,
            speed_attack: config.initial_speed_attack,
            projectile_speed: config.projectile_speed,
            upgrades: config.upgrades.clone(),
            upgrades_bought: 0,
            cooldown: 0,
            aim: AimStrategy::First,
            target: None,
            turned_on: true,
            sold: false,
        }
    }

    /// True if the tower takes part in the simulation this frame.
    #[inline]
    pub fn is_active(&self) -> bool {
        !self.sold && self.turned_on
    }

    /// Count the cooldown down, flooring at zero.
    pub fn cool_down(&mut self) {
        if self.sold {
            return;
        }
        self.cooldown = self.cooldown.saturating_sub(1);
    }

    /// Check whether an enemy can be targeted (inclusive radius).
    #[inline]
    pub fn in_range(&self, enemy: &Enemy) -> bool {
        enemy.is_alive()
            && self.position.distance_squared(enemy.position) <= self.radius * self.radius
    }

    /// Pick a target among live enemies in range, or clear it.
    pub fn take_aim(&mut self, enemies: &SlotMap<EnemyId, Enemy>) {
        let aim = self.aim;
        self.target = enemies
            .iter()
            .filter(|(_, enemy)| self.in_range(enemy))
            .max_by(|(_, a), (_, b)| aim.rank(a, b))
            .map(|(id, _)| id);
    }

    /// Fire at the current target if the cooldown allows.
    ///
    /// A target handle that no longer resolves counts as no target.
    pub fn launch(
        &mut self,
        enemies: &SlotMap<EnemyId, Enemy>,
        baseline_tps: u32,
    ) -> Option<Projectile> {
        if self.sold || self.cooldown != 0 {
            return None;
        }

        let target_id = self.target?;
        let target = match enemies.get(target_id) {
            Some(enemy) => enemy,
            None => {
                self.target = None;
                return None;
            }
        };

        // N shots per 20 seconds at the baseline rate, regardless of speed-up
        self.cooldown = (20 * baseline_tps) / self.speed_attack.max(1);

        Some(Projectile::launch(
            self.position,
            target.position,
            self.projectile_speed,
            self.damage,
            self.attack_type,
            target_id,
            self.index,
        ))
    }

    /// The next upgrade tier, if any remain.
    pub fn next_upgrade(&self) -> Option<&UpgradeConfig> {
        self.upgrades.get(self.upgrades_bought)
    }

    /// Apply the next upgrade tier and return its price.
    ///
    /// Gating and affordability are the caller's checks.
    pub fn apply_upgrade(&mut self) -> Option<u32> {
        let upgrade = self.upgrades.get(self.upgrades_bought)?.clone();

        self.speed_attack = self.speed_attack.saturating_add_signed(upgrade.delta_speed_attack).max(1);
        self.damage = self.damage.saturating_add_signed(upgrade.delta_damage);
        self.radius = (self.radius + upgrade.delta_radius).max(0.0);
        self.upgrades_bought += 1;

        Some(upgrade.price)
    }

    /// Base price plus every upgrade bought.
    pub fn invested(&self) -> u32 {
        self.upgrades[..self.upgrades_bought]
            .iter()
            .fold(self.price, |total, u| total.saturating_add(u.price))
    }

    /// Money returned when selling, rounded down.
    pub fn sell_value(&self, refund_percent: u32) -> u32 {
        ((self.invested() as u64 * refund_percent as u64) / 100) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::Path;
    use crate::game::config::Catalog;

    fn archer_at(x: f32, y: f32) -> Tower {
        let catalog = Catalog::demo();
        Tower::new(TowerIndex(0), &catalog.towers["archer"], Point::new(x, y))
    }

    fn spawn(
        enemies: &mut SlotMap<EnemyId, Enemy>,
        seq: u32,
        at: Point,
        health: u32,
    ) -> EnemyId {
        let catalog = Catalog::demo();
        let path = Path::new(vec![Point::ZERO, Point::new(1000.0, 0.0)]);
        let mut enemy = Enemy::spawn(&catalog.enemies["brute"], &path, seq);
        enemy.position = at;
        enemy.health = health;
        enemy.current_waypoint = 0;
        enemies.insert(enemy)
    }

    #[test]
    fn test_radius_boundary_is_inclusive() {
        let mut tower = archer_at(0.0, 0.0);
        assert_eq!(tower.radius, 200.0);

        let mut enemies = SlotMap::with_key();
        let edge = spawn(&mut enemies, 0, Point::new(200.0, 0.0), 10);
        tower.take_aim(&enemies);
        assert_eq!(tower.target, Some(edge));

        enemies[edge].position = Point::new(201.0, 0.0);
        tower.take_aim(&enemies);
        assert_eq!(tower.target, None);
    }

    #[test]
    fn test_dead_enemies_are_ignored() {
        let mut tower = archer_at(0.0, 0.0);
        let mut enemies = SlotMap::with_key();
        let id = spawn(&mut enemies, 0, Point::new(10.0, 0.0), 10);
        enemies[id].dead = true;
        tower.take_aim(&enemies);
        assert_eq!(tower.target, None);
    }

    #[test]
    fn test_strategies() {
        let mut tower = archer_at(0.0, 0.0);
        let mut enemies = SlotMap::with_key();
        let weak = spawn(&mut enemies, 0, Point::new(10.0, 0.0), 5);
        let strong = spawn(&mut enemies, 1, Point::new(20.0, 0.0), 50);
        let ahead = spawn(&mut enemies, 2, Point::new(30.0, 0.0), 20);
        enemies[ahead].current_waypoint = 1;

        tower.aim = AimStrategy::First;
        tower.take_aim(&enemies);
        assert_eq!(tower.target, Some(ahead));

        tower.aim = AimStrategy::Strongest;
        tower.take_aim(&enemies);
        assert_eq!(tower.target, Some(strong));

        tower.aim = AimStrategy::Weakest;
        tower.take_aim(&enemies);
        assert_eq!(tower.target, Some(weak));
    }

    #[test]
    fn test_first_prefers_shorter_remaining_leg() {
        let mut tower = archer_at(0.0, 0.0);
        let mut enemies = SlotMap::with_key();
        let behind = spawn(&mut enemies, 0, Point::new(10.0, 0.0), 5);
        let front = spawn(&mut enemies, 1, Point::new(20.0, 0.0), 5);
        enemies[behind].frames_to_next_waypoint = 90;
        enemies[front].frames_to_next_waypoint = 40;

        tower.take_aim(&enemies);
        assert_eq!(tower.target, Some(front));
    }

    #[test]
    fn test_ties_go_to_earliest_spawn() {
        let mut tower = archer_at(0.0, 0.0);
        let mut enemies = SlotMap::with_key();
        let later = spawn(&mut enemies, 7, Point::new(10.0, 0.0), 5);
        let earlier = spawn(&mut enemies, 3, Point::new(20.0, 0.0), 5);
        assert_ne!(later, earlier);

        for aim in [AimStrategy::First, AimStrategy::Strongest, AimStrategy::Weakest] {
            tower.aim = aim;
            tower.take_aim(&enemies);
            assert_eq!(tower.target, Some(earlier), "{:?}", aim);
        }
    }

    #[test]
    fn test_launch_respects_cooldown_and_target() {
        let mut tower = archer_at(0.0, 0.0);
        let mut enemies = SlotMap::with_key();

        // No target
        assert!(tower.launch(&enemies, 60).is_none());
        assert_eq!(tower.cooldown, 0);

        let id = spawn(&mut enemies, 0, Point::new(60.0, 0.0), 10);
        tower.take_aim(&enemies);
        let shot = tower.launch(&enemies, 60).unwrap();
        assert_eq!(shot.target, id);
        assert_eq!(shot.ttl, 5);
        // 20 * 60 / 20
        assert_eq!(tower.cooldown, 60);

        // Cooling down
        assert!(tower.launch(&enemies, 60).is_none());
        for _ in 0..60 {
            tower.cool_down();
        }
        assert_eq!(tower.cooldown, 0);
        assert!(tower.launch(&enemies, 60).is_some());
    }

    #[test]
    fn test_stale_target_degrades_to_none() {
        let mut tower = archer_at(0.0, 0.0);
        let mut enemies = SlotMap::with_key();
        spawn(&mut enemies, 0, Point::new(60.0, 0.0), 10);
        tower.take_aim(&enemies);
        assert!(tower.target.is_some());

        enemies.clear();
        assert!(tower.launch(&enemies, 60).is_none());
        assert_eq!(tower.target, None);
        assert_eq!(tower.cooldown, 0);
    }

    #[test]
    fn test_sold_tower_never_fires() {
        let mut tower = archer_at(0.0, 0.0);
        let mut enemies = SlotMap::with_key();
        spawn(&mut enemies, 0, Point::new(60.0, 0.0), 10);
        tower.take_aim(&enemies);
        tower.sold = true;
        assert!(!tower.is_active());
        assert!(tower.launch(&enemies, 60).is_none());
    }

    #[test]
    fn test_upgrade_ladder_and_sell_value() {
        let mut tower = archer_at(0.0, 0.0);
        assert_eq!(tower.sell_value(70), 70);

        assert_eq!(tower.next_upgrade().map(|u| u.price), Some(50));
        assert_eq!(tower.apply_upgrade(), Some(50));
        assert_eq!(tower.damage, 6);
        assert_eq!(tower.speed_attack, 30);
        assert_eq!(tower.radius, 225.0);

        // (100 + 50) * 70% = 105
        assert_eq!(tower.invested(), 150);
        assert_eq!(tower.sell_value(70), 105);

        assert_eq!(tower.apply_upgrade(), Some(120));
        assert_eq!(tower.next_upgrade(), None);
        assert_eq!(tower.apply_upgrade(), None);
        assert_eq!(tower.upgrades_bought, 2);
    }
}
