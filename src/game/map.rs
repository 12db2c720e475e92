//! Map
//!
//! Owns the live collections of one match: the enemy arena, the placed
//! towers and the projectiles in flight, plus the path they share.

use std::collections::BTreeMap;
use slotmap::SlotMap;

use crate::core::geometry::{path_contains, Path, Point};
use crate::core::hash::StateHasher;
use crate::game::action::ActionRejected;
use crate::game::config::{EnemyConfig, TowerConfig};
use crate::game::enemy::{Advance, Enemy, EnemyId};
use crate::game::projectile::{Hit, Projectile};
use crate::game::tower::{Tower, TowerIndex};

/// What happened on the map during one update.
#[derive(Clone, Debug, Default)]
pub struct MapUpdate {
    /// Enemies that died from damage this frame
    pub killed: Vec<EnemyId>,
    /// Enemies that reached the end of the path this frame
    pub leaked: Vec<EnemyId>,
    /// Towers that fired this frame
    pub launched: Vec<TowerIndex>,
    /// Projectiles that resolved against a live arena entry
    pub hits: Vec<Hit>,
}

/// The board.
#[derive(Clone, Debug)]
pub struct Map {
    /// Enemy path
    pub path: Path,
    /// Corridor width towers may not be placed in
    pub path_width: f32,
    /// Towers must be placed left of this x coordinate
    pub playable_width: f32,
    /// Enemy arena, cleared when a wave ends
    pub enemies: SlotMap<EnemyId, Enemy>,
    /// Towers by stable index, sold ones included
    pub towers: BTreeMap<TowerIndex, Tower>,
    /// Projectiles in flight
    pub projectiles: Vec<Projectile>,
    next_tower_index: u32,
    next_spawn_seq: u32,
}

impl Map {
    /// Create an empty map over `path`.
    pub fn new(path: Path, path_width: f32, playable_width: f32) -> Self {
        Self {
            path,
            path_width,
            playable_width,
            enemies: SlotMap::with_key(),
            towers: BTreeMap::new(),
            projectiles: Vec::new(),
            next_tower_index: 0,
            next_spawn_seq: 0,
        }
    }

    // =========================================================================
    // Placement
    // =========================================================================

    /// Check a tower position and convert it to map space.
    pub fn check_placement(&self, x: i32, y: i32) -> Result<Point, ActionRejected> {
        if x < 0 || x as f32 >= self.playable_width {
            return Err(ActionRejected::OutsidePlayableArea { x, y });
        }
        let position = Point::from_ints(x, y);
        if path_contains(position, &self.path, self.path_width) {
            return Err(ActionRejected::OnPath { x, y });
        }
        Ok(position)
    }

    /// Place a tower and hand out the next index.
    pub fn add_tower(&mut self, config: &TowerConfig, position: Point) -> TowerIndex {
        let index = TowerIndex(self.next_tower_index);
        self.next_tower_index += 1;
        self.towers.insert(index, Tower::new(index, config, position));
        index
    }

    /// Look up a tower that can still be acted on.
    pub fn tower_mut(&mut self, index: TowerIndex) -> Result<&mut Tower, ActionRejected> {
        match self.towers.get_mut(&index) {
            Some(tower) if tower.sold => Err(ActionRejected::TowerSold(index)),
            Some(tower) => Ok(tower),
            None => Err(ActionRejected::NoSuchTower(index)),
        }
    }

    // =========================================================================
    // Enemies
    // =========================================================================

    /// Spawn an enemy at the path start.
    pub fn spawn(&mut self, config: &EnemyConfig) -> EnemyId {
        let seq = self.next_spawn_seq;
        self.next_spawn_seq += 1;
        self.enemies.insert(Enemy::spawn(config, &self.path, seq))
    }

    /// True if any enemy in the arena is still alive.
    pub fn has_alive_enemies(&self) -> bool {
        self.enemies.values().any(Enemy::is_alive)
    }

    /// Drop every enemy and projectile. Outstanding enemy handles go stale.
    pub fn clear_wave(&mut self) {
        self.enemies.clear();
        self.projectiles.clear();
        for tower in self.towers.values_mut() {
            tower.target = None;
        }
    }

    // =========================================================================
    // Update
    // =========================================================================

    /// Advance the board one frame: enemies, then towers, then projectiles.
    pub fn update(&mut self, baseline_tps: u32) -> MapUpdate {
        let mut result = MapUpdate::default();

        for (id, enemy) in self.enemies.iter_mut() {
            match enemy.advance(&self.path) {
                Advance::Killed => result.killed.push(id),
                Advance::ReachedEnd => result.leaked.push(id),
                Advance::Idle | Advance::Initialized | Advance::Moved => {}
            }
        }

        for tower in self.towers.values_mut() {
            if !tower.is_active() {
                continue;
            }
            tower.cool_down();
            tower.take_aim(&self.enemies);
            if let Some(projectile) = tower.launch(&self.enemies, baseline_tps) {
                result.launched.push(tower.index);
                self.projectiles.push(projectile);
            }
        }

        for projectile in self.projectiles.iter_mut() {
            if let Some(hit) = projectile.update(&mut self.enemies) {
                result.hits.push(hit);
            }
        }
        self.projectiles.retain(|p| !p.dead);

        result
    }

    /// Feed every simulated field into the state hash.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u32(self.next_tower_index);
        hasher.update_u32(self.next_spawn_seq);

        hasher.update_u32(self.towers.len() as u32);
        for tower in self.towers.values() {
            hasher.update_u32(tower.index.0);
            hasher.update_str(&tower.name);
            hasher.update_point(tower.position);
            hasher.update_u32(tower.damage);
            hasher.update_f32(tower.radius);
            hasher.update_u32(tower.speed_attack);
            hasher.update_u32(tower.upgrades_bought as u32);
            hasher.update_u32(tower.cooldown);
            hasher.update_u8(tower.aim.as_u8());
            let target_seq = tower
                .target
                .and_then(|id| self.enemies.get(id))
                .map(|e| e.spawn_seq as i32)
                .unwrap_or(-1);
            hasher.update_i32(target_seq);
            hasher.update_bool(tower.turned_on);
            hasher.update_bool(tower.sold);
        }

        // Arena order is not part of the state; hash by spawn order.
        let mut enemies: Vec<&Enemy> = self.enemies.values().collect();
        enemies.sort_by_key(|e| e.spawn_seq);
        hasher.update_u32(enemies.len() as u32);
        for enemy in enemies {
            hasher.update_u32(enemy.spawn_seq);
            hasher.update_str(&enemy.name);
            hasher.update_u32(enemy.health);
            hasher.update_point(enemy.position);
            hasher.update_point(enemy.velocity);
            hasher.update_i32(enemy.current_waypoint);
            hasher.update_u32(enemy.frames_to_next_waypoint);
            hasher.update_u32(enemy.money_award);
            hasher.update_u32(enemy.pending_damage_to_player);
            hasher.update_bool(enemy.dead);
            hasher.update_bool(enemy.reached_end);
        }

        hasher.update_u32(self.projectiles.len() as u32);
        for projectile in &self.projectiles {
            hasher.update_point(projectile.position);
            hasher.update_point(projectile.velocity);
            hasher.update_u32(projectile.ttl);
            hasher.update_u32(projectile.damage);
            hasher.update_u32(projectile.attack_type.0);
            hasher.update_u32(projectile.source.0);
            let target_seq = self
                .enemies
                .get(projectile.target)
                .map(|e| e.spawn_seq as i32)
                .unwrap_or(-1);
            hasher.update_i32(target_seq);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::config::Catalog;

    fn demo_map() -> (Catalog, Map) {
        let catalog = Catalog::demo();
        let rules = &catalog.rules;
        let map = Map::new(
            catalog.maps["meadow"].path.clone(),
            rules.path_width,
            rules.playable_width,
        );
        (catalog, map)
    }

    #[test]
    fn test_placement_rules() {
        let (_, map) = demo_map();
        assert!(map.check_placement(200, 400).is_ok());
        assert_eq!(
            map.check_placement(200, 540),
            Err(ActionRejected::OnPath { x: 200, y: 540 })
        );
        // Circular-ish cap around the corner at (400, 540)
        assert!(map.check_placement(420, 560).is_err());
        assert_eq!(
            map.check_placement(1500, 100),
            Err(ActionRejected::OutsidePlayableArea { x: 1500, y: 100 })
        );
        assert!(map.check_placement(-1, 100).is_err());
    }

    #[test]
    fn test_tower_indices_are_stable() {
        let (catalog, mut map) = demo_map();
        let archer = &catalog.towers["archer"];
        let a = map.add_tower(archer, Point::new(100.0, 100.0));
        let b = map.add_tower(archer, Point::new(200.0, 100.0));
        assert_eq!((a, b), (TowerIndex(0), TowerIndex(1)));

        map.tower_mut(a).unwrap().sold = true;
        assert_eq!(map.tower_mut(a).unwrap_err(), ActionRejected::TowerSold(a));

        // Selling never shifts later indices
        let c = map.add_tower(archer, Point::new(300.0, 100.0));
        assert_eq!(c, TowerIndex(2));
        assert_eq!(map.tower_mut(b).unwrap().index, b);
        assert_eq!(
            map.tower_mut(TowerIndex(9)).unwrap_err(),
            ActionRejected::NoSuchTower(TowerIndex(9))
        );
    }

    #[test]
    fn test_tower_shoots_enemy_in_range() {
        let (catalog, mut map) = demo_map();
        // 60 units below the first leg
        let index = map.add_tower(&catalog.towers["archer"], Point::new(100.0, 600.0));
        let id = map.spawn(&catalog.enemies["grunt"]);

        // Frame 1: the enemy initializes at (-32, 540), 145 units away
        let first = map.update(60);
        assert_eq!(first.launched, vec![index]);
        assert_eq!(map.projectiles.len(), 1);
        assert_eq!(map.towers[&index].cooldown, 60);

        let mut landed = false;
        for _ in 0..20 {
            let update = map.update(60);
            if !update.hits.is_empty() {
                assert_eq!(update.hits[0], Hit { target: id, damage: 4 });
                landed = true;
                break;
            }
        }
        assert!(landed);
        assert_eq!(map.enemies[id].health, 14);
        assert!(map.projectiles.is_empty(), "resolved projectiles are pruned");
    }

    #[test]
    fn test_turned_off_and_sold_towers_idle() {
        let (catalog, mut map) = demo_map();
        let off = map.add_tower(&catalog.towers["archer"], Point::new(100.0, 600.0));
        let sold = map.add_tower(&catalog.towers["archer"], Point::new(120.0, 600.0));
        map.towers.get_mut(&off).unwrap().turned_on = false;
        map.towers.get_mut(&sold).unwrap().sold = true;
        map.spawn(&catalog.enemies["grunt"]);

        for _ in 0..30 {
            assert!(map.update(60).launched.is_empty());
        }
        assert!(map.projectiles.is_empty());
    }

    #[test]
    fn test_clear_wave_invalidates_handles() {
        let (catalog, mut map) = demo_map();
        let index = map.add_tower(&catalog.towers["archer"], Point::new(100.0, 600.0));
        let id = map.spawn(&catalog.enemies["grunt"]);
        map.update(60);
        assert!(map.has_alive_enemies());

        map.clear_wave();
        assert!(!map.has_alive_enemies());
        assert!(map.enemies.get(id).is_none());
        assert!(map.projectiles.is_empty());
        assert_eq!(map.towers[&index].target, None);

        // Reused slots get fresh handles
        let next = map.spawn(&catalog.enemies["grunt"]);
        assert_ne!(next, id);
        assert_eq!(map.enemies[next].spawn_seq, 1);
    }

    #[test]
    fn test_killed_and_leaked_reporting() {
        let (catalog, mut map) = demo_map();
        let id = map.spawn(&catalog.enemies["runner"]);
        map.update(60);
        map.enemies[id].take_damage(100);
        let update = map.update(60);
        assert_eq!(update.killed, vec![id]);
        assert!(update.leaked.is_empty());
        assert!(!map.has_alive_enemies());
    }
}
