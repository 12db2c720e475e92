//! Match State
//!
//! Complete state of one tower-defense match plus the player action surface.
//! All state here is deterministic: frame counters instead of clocks,
//! BTreeMap and spawn order instead of hash order.

use std::sync::Arc;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use tracing::{debug, info, warn};

use crate::core::geometry::Point;
use crate::core::hash::{compute_state_hash, StateHash};
use crate::game::action::{ActionRejected, PlayerAction};
use crate::game::config::{Catalog, ConfigError, PlayerProfile};
use crate::game::events::{GameEvent, GameEventData};
use crate::game::map::Map;
use crate::game::tower::{AimStrategy, TowerIndex};
use crate::game::wave::{game_rule, GameRule};
use crate::replay::watcher::Watcher;

// =============================================================================
// PLAYER
// =============================================================================

/// The player's resources on the current map.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlayerMapState {
    /// Remaining health
    pub health: u32,
    /// Money available for towers and upgrades
    pub money: u32,
}

impl PlayerMapState {
    /// True once health has reached zero.
    #[inline]
    pub fn is_dead(&self) -> bool {
        self.health == 0
    }
}

// =============================================================================
// MATCH PHASE
// =============================================================================

/// How a match ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    /// Every wave cleared
    Win,
    /// Player health reached zero
    Loss,
    /// Stopped by the player or the host
    Abandoned,
}

impl Outcome {
    fn as_u8(self) -> u8 {
        match self {
            Outcome::Win => 1,
            Outcome::Loss => 2,
            Outcome::Abandoned => 3,
        }
    }
}

/// Current phase of the match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[derive(Default)]
pub enum MatchPhase {
    /// Waiting for the player to release the next wave
    #[default]
    NextWaveReady,
    /// A wave is in progress
    Running,
    /// Match over, no more actions accepted
    Ended(Outcome),
}

impl MatchPhase {
    fn as_u8(self) -> u8 {
        match self {
            MatchPhase::NextWaveReady => 0,
            MatchPhase::Running => 1,
            MatchPhase::Ended(outcome) => 0x10 | outcome.as_u8(),
        }
    }
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Read-only view of an enemy for renderers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnemyView {
    /// Spawn order within the match
    pub spawn_seq: u32,
    /// Catalog name
    pub name: String,
    /// Current position
    pub position: Point,
    /// Remaining health
    pub health: u32,
    /// Health at spawn
    pub max_health: u32,
}

/// Read-only view of a tower for renderers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TowerView {
    /// Index used by tower actions
    pub index: TowerIndex,
    /// Catalog name
    pub name: String,
    /// Placement
    pub position: Point,
    /// Current attack radius
    pub radius: f32,
    /// Targeting strategy
    pub aim: AimStrategy,
    /// False while switched off
    pub turned_on: bool,
    /// Upgrades applied so far
    pub upgrades_bought: usize,
    /// Frames until the next shot
    pub cooldown: u32,
}

/// Everything a renderer or status line needs for one frame.
///
/// Dead enemies, sold towers and resolved projectiles are left out.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchSnapshot {
    /// Level being played
    pub level_name: String,
    /// Frames simulated so far
    pub frame: u32,
    /// Current phase
    pub phase: MatchPhase,
    /// Zero-based index of the current (or last finished) wave
    pub current_wave: Option<usize>,
    /// Waves in the level
    pub wave_count: usize,
    /// Health and money
    pub player: PlayerMapState,
    /// Living enemies in spawn order
    pub enemies: Vec<EnemyView>,
    /// Towers still standing
    pub towers: Vec<TowerView>,
    /// Projectiles in flight
    pub projectiles: Vec<Point>,
    /// True once the match is over
    pub ended: bool,
}

// =============================================================================
// MATCH STATE
// =============================================================================

/// Complete state of a match.
#[derive(Clone, Debug)]
pub struct MatchState {
    /// Level being played
    pub level_name: String,

    /// Frames simulated so far
    pub frame: u32,

    /// Current match phase
    pub phase: MatchPhase,

    /// Index of the current wave, `None` before the first one starts
    pub current_wave: Option<usize>,

    /// Player health and money
    pub player: PlayerMapState,

    /// Board with enemies, towers and projectiles
    pub map: Map,

    /// Waves of the level
    pub rule: GameRule,

    /// Content the match was built from
    catalog: Arc<Catalog>,

    /// Upgrade and tower gating. `None` disables gating (replay).
    profile: Option<PlayerProfile>,

    /// Action log being recorded, if any
    watcher: Option<Watcher>,

    /// Events generated since the last tick
    pub pending_events: Vec<GameEvent>,
}

impl MatchState {
    /// Start a recorded match on `level` for a player with `profile`.
    pub fn new(
        catalog: Arc<Catalog>,
        level: &str,
        profile: &PlayerProfile,
        started_at: DateTime<Utc>,
    ) -> Result<Self, ConfigError> {
        let player = catalog.rules.starting_state;
        let watcher = Watcher::new(
            level.to_string(),
            started_at,
            player,
            catalog.rules.watcher_capacity,
        );
        Self::build(catalog, level, player, Some(profile.clone()), Some(watcher))
    }

    /// Rebuild the starting state a log was recorded from.
    ///
    /// Nothing is gated and nothing is recorded.
    pub fn for_replay(catalog: Arc<Catalog>, watcher: &Watcher) -> Result<Self, ConfigError> {
        Self::build(catalog, &watcher.name, watcher.init_player_map_state, None, None)
    }

    fn build(
        catalog: Arc<Catalog>,
        level: &str,
        player: PlayerMapState,
        profile: Option<PlayerProfile>,
        watcher: Option<Watcher>,
    ) -> Result<Self, ConfigError> {
        let level_config = catalog.level(level)?;
        let map_config = catalog
            .maps
            .get(&level_config.map_name)
            .ok_or_else(|| ConfigError::UnknownMap {
                level: level.to_string(),
                map: level_config.map_name.clone(),
            })?;

        let map = Map::new(
            map_config.path.clone(),
            catalog.rules.path_width,
            catalog.rules.playable_width,
        );
        let rule = game_rule(level_config);

        debug!(level_name = level, waves = rule.len(), "match created");

        Ok(Self {
            level_name: level.to_string(),
            frame: 0,
            phase: MatchPhase::NextWaveReady,
            current_wave: None,
            player,
            map,
            rule,
            catalog,
            profile,
            watcher,
            pending_events: Vec::new(),
        })
    }

    /// Content the match was built from.
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Check if match has ended.
    pub fn is_ended(&self) -> bool {
        matches!(self.phase, MatchPhase::Ended(_))
    }

    /// Outcome, once ended.
    pub fn outcome(&self) -> Option<Outcome> {
        match self.phase {
            MatchPhase::Ended(outcome) => Some(outcome),
            _ => None,
        }
    }

    /// Action log recorded so far.
    pub fn watcher(&self) -> Option<&Watcher> {
        self.watcher.as_ref()
    }

    /// Take the action log out of the match (for persisting).
    pub fn take_watcher(&mut self) -> Option<Watcher> {
        self.watcher.take()
    }

    fn is_unlocked(&self, open_level: Option<&str>) -> bool {
        self.profile
            .as_ref()
            .map_or(true, |profile| profile.is_unlocked(open_level))
    }

    // =========================================================================
    // Actions
    // =========================================================================

    /// Validate and apply a player action at the current frame.
    ///
    /// Accepted actions are recorded; rejected ones change nothing.
    pub fn apply(&mut self, action: PlayerAction) -> Result<(), ActionRejected> {
        if self.is_ended() {
            return Err(ActionRejected::MatchEnded);
        }

        match &action {
            PlayerAction::PutTower { name, x, y } => self.put_tower(name, *x, *y)?,
            PlayerAction::SellTower { index } => self.sell_tower(*index)?,
            PlayerAction::UpgradeTower { index } => self.upgrade_tower(*index)?,
            PlayerAction::TurnOn { index } => self.set_turned_on(*index, true)?,
            PlayerAction::TurnOff { index } => self.set_turned_on(*index, false)?,
            PlayerAction::TuneFirst { index } => self.tune(*index, AimStrategy::First)?,
            PlayerAction::TuneStrong { index } => self.tune(*index, AimStrategy::Strongest)?,
            PlayerAction::TuneWeak { index } => self.tune(*index, AimStrategy::Weakest)?,
            PlayerAction::StartWave => self.start_wave()?,
            PlayerAction::Stop => {
                // Ending appends the terminal record itself
                self.end(Outcome::Abandoned);
                return Ok(());
            }
        }

        self.record(action);
        Ok(())
    }

    fn record(&mut self, action: PlayerAction) {
        let frame = self.frame;
        if let Some(watcher) = self.watcher.as_mut() {
            if let Err(err) = watcher.append(frame, action) {
                warn!(%err, "action not recorded");
            }
        }
    }

    fn put_tower(&mut self, name: &str, x: i32, y: i32) -> Result<(), ActionRejected> {
        let catalog = Arc::clone(&self.catalog);
        let config = catalog
            .towers
            .get(name)
            .ok_or_else(|| ActionRejected::UnknownTower(name.to_string()))?;

        if !self.is_unlocked(config.open_level.as_deref()) {
            return Err(ActionRejected::TowerLocked(name.to_string()));
        }
        if self.player.money < config.price {
            return Err(ActionRejected::InsufficientFunds {
                needed: config.price,
                available: self.player.money,
            });
        }
        let position = self.map.check_placement(x, y)?;

        self.player.money -= config.price;
        let index = self.map.add_tower(config, position);
        self.push_event(GameEvent::new(
            self.frame,
            GameEventData::TowerPlaced { index, name: name.to_string(), x, y },
        ));
        Ok(())
    }

    fn sell_tower(&mut self, index: TowerIndex) -> Result<(), ActionRejected> {
        let percent = self.catalog.rules.sell_refund_percent;
        let tower = self.map.tower_mut(index)?;

        let refund = tower.sell_value(percent);
        tower.sold = true;
        tower.target = None;

        self.player.money = self.player.money.saturating_add(refund);
        self.push_event(GameEvent::new(self.frame, GameEventData::TowerSold { index, refund }));
        Ok(())
    }

    fn upgrade_tower(&mut self, index: TowerIndex) -> Result<(), ActionRejected> {
        let money = self.player.money;
        let (price, open_level) = {
            let tower = self.map.tower_mut(index)?;
            let upgrade = tower
                .next_upgrade()
                .ok_or(ActionRejected::UpgradesExhausted(index))?;
            (upgrade.price, upgrade.open_level.clone())
        };

        if !self.is_unlocked(open_level.as_deref()) {
            return Err(ActionRejected::UpgradeLocked(index));
        }
        if money < price {
            return Err(ActionRejected::InsufficientFunds { needed: price, available: money });
        }

        let tower = self.map.tower_mut(index)?;
        tower.apply_upgrade();
        let tier = tower.upgrades_bought;

        self.player.money -= price;
        self.push_event(GameEvent::new(
            self.frame,
            GameEventData::TowerUpgraded { index, tier, price },
        ));
        Ok(())
    }

    fn set_turned_on(&mut self, index: TowerIndex, turned_on: bool) -> Result<(), ActionRejected> {
        self.map.tower_mut(index)?.turned_on = turned_on;
        self.push_event(GameEvent::new(
            self.frame,
            GameEventData::TowerToggled { index, turned_on },
        ));
        Ok(())
    }

    fn tune(&mut self, index: TowerIndex, aim: AimStrategy) -> Result<(), ActionRejected> {
        self.map.tower_mut(index)?.aim = aim;
        self.push_event(GameEvent::new(self.frame, GameEventData::TowerTuned { index, aim }));
        Ok(())
    }

    fn start_wave(&mut self) -> Result<(), ActionRejected> {
        if self.phase == MatchPhase::Running {
            return Err(ActionRejected::WaveRunning);
        }
        let next = self.current_wave.map_or(0, |wave| wave + 1);
        if next >= self.rule.len() {
            return Err(ActionRejected::NoNextWave);
        }

        self.current_wave = Some(next);
        self.phase = MatchPhase::Running;
        info!(level_name = %self.level_name, wave = next + 1, frame = self.frame, "wave started");
        self.push_event(GameEvent::new(self.frame, GameEventData::WaveStarted { wave: next }));
        Ok(())
    }

    /// Stop the match without a result. Returns false if it had already ended.
    pub fn abandon(&mut self) -> bool {
        if self.is_ended() {
            return false;
        }
        self.end(Outcome::Abandoned);
        true
    }

    /// Transition to `Ended` and close the action log.
    pub(crate) fn end(&mut self, outcome: Outcome) {
        if self.is_ended() {
            return;
        }
        self.phase = MatchPhase::Ended(outcome);

        let frame = self.frame;
        if let Some(watcher) = self.watcher.as_mut() {
            if let Err(err) = watcher.append(frame, PlayerAction::Stop) {
                warn!(%err, "stop record not appended");
            }
        }

        info!(
            level_name = %self.level_name,
            ?outcome,
            frame,
            health = self.player.health,
            money = self.player.money,
            "match ended"
        );
        self.push_event(GameEvent::match_ended(frame, outcome));
    }

    // =========================================================================
    // Views
    // =========================================================================

    /// Number of waves in the level.
    pub fn wave_count(&self) -> usize {
        self.rule.len()
    }

    /// True if the wave in progress is the level's last.
    pub fn is_last_wave(&self) -> bool {
        self.current_wave.map_or(false, |wave| wave + 1 == self.rule.len())
    }

    /// Read-only view for renderers and the status line.
    pub fn snapshot(&self) -> MatchSnapshot {
        let mut enemies: Vec<EnemyView> = self
            .map
            .enemies
            .values()
            .filter(|e| e.is_alive())
            .map(|e| EnemyView {
                spawn_seq: e.spawn_seq,
                name: e.name.clone(),
                position: e.position,
                health: e.health,
                max_health: e.max_health,
            })
            .collect();
        enemies.sort_by_key(|e| e.spawn_seq);

        let towers = self
            .map
            .towers
            .values()
            .filter(|t| !t.sold)
            .map(|t| TowerView {
                index: t.index,
                name: t.name.clone(),
                position: t.position,
                radius: t.radius,
                aim: t.aim,
                turned_on: t.turned_on,
                upgrades_bought: t.upgrades_bought,
                cooldown: t.cooldown,
            })
            .collect();

        MatchSnapshot {
            level_name: self.level_name.clone(),
            frame: self.frame,
            phase: self.phase,
            current_wave: self.current_wave,
            wave_count: self.rule.len(),
            player: self.player,
            enemies,
            towers,
            projectiles: self.map.projectiles.iter().map(|p| p.position).collect(),
            ended: self.is_ended(),
        }
    }

    /// Compute hash of current state for verification.
    pub fn compute_hash(&self) -> StateHash {
        compute_state_hash(self.frame, |hasher| {
            hasher.update_u8(self.phase.as_u8());
            hasher.update_i32(self.current_wave.map_or(-1, |wave| wave as i32));
            hasher.update_u32(self.player.health);
            hasher.update_u32(self.player.money);

            self.map.hash_into(hasher);

            // Wave clocks and spawn counts
            for wave in &self.rule {
                hasher.update_u32(wave.time);
                for swarm in &wave.swarms {
                    hasher.update_u32(swarm.calls);
                }
            }
        })
    }

    /// Take pending events (consumes them).
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Push a game event.
    pub fn push_event(&mut self, event: GameEvent) {
        self.pending_events.push(event);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn demo_match() -> MatchState {
        MatchState::new(
            Arc::new(Catalog::demo()),
            "meadow",
            &PlayerProfile::default(),
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        )
        .unwrap()
    }

    fn put(state: &mut MatchState, name: &str, x: i32, y: i32) -> Result<(), ActionRejected> {
        state.apply(PlayerAction::PutTower { name: name.into(), x, y })
    }

    #[test]
    fn test_new_match_starts_idle() {
        let state = demo_match();
        assert_eq!(state.frame, 0);
        assert_eq!(state.phase, MatchPhase::NextWaveReady);
        assert_eq!(state.current_wave, None);
        assert_eq!(state.player, PlayerMapState { health: 100, money: 650 });
        assert_eq!(state.wave_count(), 3);
        assert!(state.watcher().unwrap().actions.is_empty());
    }

    #[test]
    fn test_unknown_level_fails_fast() {
        let result = MatchState::new(
            Arc::new(Catalog::demo()),
            "swamp",
            &PlayerProfile::default(),
            Utc::now(),
        );
        assert!(matches!(result, Err(ConfigError::UnknownLevel(_))));
    }

    #[test]
    fn test_put_tower_records_action() {
        let mut state = demo_match();
        put(&mut state, "archer", 200, 400).unwrap();

        assert_eq!(state.player.money, 550);
        assert_eq!(state.map.towers.len(), 1);

        let log = &state.watcher().unwrap().actions;
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].frame, 0);
        assert_eq!(
            log[0].action,
            PlayerAction::PutTower { name: "archer".into(), x: 200, y: 400 }
        );
    }

    #[test]
    fn test_unaffordable_tower_is_rejected_silently() {
        let mut state = demo_match();
        // The cannon is gated too; lift the gate to isolate the funds check
        state.profile = None;
        let before = state.compute_hash();

        let err = put(&mut state, "cannon", 200, 400).unwrap_err();
        assert_eq!(err, ActionRejected::InsufficientFunds { needed: 700, available: 650 });
        assert_eq!(state.player.money, 650);
        assert!(state.map.towers.is_empty());
        assert!(state.watcher().unwrap().actions.is_empty());
        assert_eq!(state.compute_hash(), before);
    }

    #[test]
    fn test_illegal_placements() {
        let mut state = demo_match();
        assert_eq!(
            put(&mut state, "archer", 200, 540),
            Err(ActionRejected::OnPath { x: 200, y: 540 })
        );
        assert_eq!(
            put(&mut state, "archer", 1600, 100),
            Err(ActionRejected::OutsidePlayableArea { x: 1600, y: 100 })
        );
        assert_eq!(
            put(&mut state, "ballista", 200, 400),
            Err(ActionRejected::UnknownTower("ballista".into()))
        );
        assert_eq!(
            put(&mut state, "cannon", 200, 400),
            Err(ActionRejected::TowerLocked("cannon".into()))
        );
        assert_eq!(state.player.money, 650);
        assert!(state.watcher().unwrap().actions.is_empty());
    }

    #[test]
    fn test_sell_refunds_seventy_percent_of_investment() {
        let mut state = demo_match();
        put(&mut state, "archer", 200, 400).unwrap();
        let index = TowerIndex(0);
        state.apply(PlayerAction::UpgradeTower { index }).unwrap();
        assert_eq!(state.player.money, 500);

        state.apply(PlayerAction::SellTower { index }).unwrap();
        assert_eq!(state.player.money, 605);
        assert!(state.map.towers[&index].sold);

        // Sold towers cannot be acted on again
        assert_eq!(
            state.apply(PlayerAction::SellTower { index }),
            Err(ActionRejected::TowerSold(index))
        );
        assert_eq!(
            state.apply(PlayerAction::TuneWeak { index }),
            Err(ActionRejected::TowerSold(index))
        );
        assert_eq!(state.player.money, 605);
    }

    #[test]
    fn test_upgrade_gating() {
        let mut state = demo_match();
        put(&mut state, "archer", 200, 400).unwrap();
        let index = TowerIndex(0);

        state.apply(PlayerAction::UpgradeTower { index }).unwrap();
        // Second tier opens after winning "meadow"
        assert_eq!(
            state.apply(PlayerAction::UpgradeTower { index }),
            Err(ActionRejected::UpgradeLocked(index))
        );

        let mut profile = PlayerProfile::default();
        profile.record_win("meadow");
        state.profile = Some(profile);
        state.apply(PlayerAction::UpgradeTower { index }).unwrap();
        assert_eq!(
            state.apply(PlayerAction::UpgradeTower { index }),
            Err(ActionRejected::UpgradesExhausted(index))
        );
        assert_eq!(state.player.money, 650 - 100 - 50 - 120);
    }

    #[test]
    fn test_tune_and_toggle() {
        let mut state = demo_match();
        put(&mut state, "archer", 200, 400).unwrap();
        let index = TowerIndex(0);

        state.apply(PlayerAction::TuneStrong { index }).unwrap();
        assert_eq!(state.map.towers[&index].aim, AimStrategy::Strongest);
        state.apply(PlayerAction::TurnOff { index }).unwrap();
        assert!(!state.map.towers[&index].turned_on);
        state.apply(PlayerAction::TurnOn { index }).unwrap();
        assert!(state.map.towers[&index].turned_on);

        assert_eq!(
            state.apply(PlayerAction::TurnOn { index: TowerIndex(3) }),
            Err(ActionRejected::NoSuchTower(TowerIndex(3)))
        );
        assert_eq!(state.watcher().unwrap().actions.len(), 4);
    }

    #[test]
    fn test_start_wave_transitions() {
        let mut state = demo_match();
        state.apply(PlayerAction::StartWave).unwrap();
        assert_eq!(state.phase, MatchPhase::Running);
        assert_eq!(state.current_wave, Some(0));
        assert_eq!(state.apply(PlayerAction::StartWave), Err(ActionRejected::WaveRunning));
    }

    #[test]
    fn test_stop_ends_and_closes_log() {
        let mut state = demo_match();
        state.apply(PlayerAction::Stop).unwrap();
        assert_eq!(state.phase, MatchPhase::Ended(Outcome::Abandoned));
        assert_eq!(
            state.apply(PlayerAction::StartWave),
            Err(ActionRejected::MatchEnded)
        );
        assert!(!state.abandon());

        let log = &state.watcher().unwrap().actions;
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].action, PlayerAction::Stop);
    }

    #[test]
    fn test_snapshot_hides_sold_towers() {
        let mut state = demo_match();
        put(&mut state, "archer", 200, 400).unwrap();
        put(&mut state, "archer", 300, 400).unwrap();
        state.apply(PlayerAction::SellTower { index: TowerIndex(0) }).unwrap();

        let snapshot = state.snapshot();
        assert_eq!(snapshot.towers.len(), 1);
        assert_eq!(snapshot.towers[0].index, TowerIndex(1));
        assert!(!snapshot.ended);
        assert_eq!(snapshot.wave_count, 3);
    }

    #[test]
    fn test_hash_tracks_state() {
        let a = demo_match();
        let mut b = demo_match();
        assert_eq!(a.compute_hash(), b.compute_hash());

        put(&mut b, "archer", 200, 400).unwrap();
        assert_ne!(a.compute_hash(), b.compute_hash());
    }
}
