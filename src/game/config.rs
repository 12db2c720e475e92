//! Game Configuration
//!
//! Immutable value objects describing enemies, towers, maps and levels, plus
//! the loader that reads them from JSON and rejects bad data before a match
//! starts. The simulation assumes everything in a validated [`Catalog`]
//! resolves.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path as FsPath, PathBuf};

use serde::{Serialize, Deserialize};
use tracing::{debug, info};

use crate::core::geometry::{Path, Point};
use crate::game::state::PlayerMapState;

// =============================================================================
// ATTACK TYPES
// =============================================================================

/// Damage type of a tower's projectiles. Enemies resist or suffer per type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttackType(pub u32);

impl AttackType {
    /// Plain physical damage
    pub const PHYSICAL: Self = Self(0);
    /// Magic damage
    pub const MAGIC: Self = Self(1);
    /// Fire damage
    pub const FIRE: Self = Self(2);
}

/// Damage reduction against one attack type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Strength {
    /// Attack type resisted
    #[serde(rename = "type")]
    pub attack_type: AttackType,
    /// Damage subtracted per hit
    pub dec_dmg: u32,
}

/// Damage amplification against one attack type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Weakness {
    /// Attack type amplified
    #[serde(rename = "type")]
    pub attack_type: AttackType,
    /// Damage added per hit
    pub inc_dmg: u32,
}

// =============================================================================
// ENTITY CONFIGS
// =============================================================================

/// Enemy type definition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnemyConfig {
    /// Unique enemy name
    pub name: String,
    /// Health at spawn
    pub max_health: u32,
    /// Damage dealt to the player on reaching the end of the path
    pub damage: u32,
    /// Speed in map units per frame
    pub vrms: f32,
    /// Money paid when killed by a tower
    pub money_award: u32,
    /// Resistances
    #[serde(default)]
    pub strengths: Vec<Strength>,
    /// Vulnerabilities
    #[serde(default)]
    pub weaknesses: Vec<Weakness>,
}

impl EnemyConfig {
    /// Collapse strengths and weaknesses into one signed delta per attack type.
    ///
    /// A weakness takes precedence over a strength for the same type.
    pub fn resistances(&self) -> BTreeMap<AttackType, i32> {
        let mut table = BTreeMap::new();
        for weakness in &self.weaknesses {
            table.entry(weakness.attack_type).or_insert(weakness.inc_dmg as i32);
        }
        for strength in &self.strengths {
            table.entry(strength.attack_type).or_insert(-(strength.dec_dmg as i32));
        }
        table
    }
}

/// One tier of a tower's upgrade ladder.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpgradeConfig {
    /// Cost of this tier
    pub price: u32,
    /// Change to damage per hit
    #[serde(default)]
    pub delta_damage: i32,
    /// Change to attack speed
    #[serde(default)]
    pub delta_speed_attack: i32,
    /// Change to radius
    #[serde(default)]
    pub delta_radius: f32,
    /// Level that must be completed before this tier can be bought
    #[serde(default)]
    pub open_level: Option<String>,
}

/// Cosmetic projectile description, kept for renderers.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct ProjectileConfig {
    /// Sprite or colour name
    pub name: String,
}

/// Tower type definition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TowerConfig {
    /// Unique tower name
    pub name: String,
    /// Purchase price
    pub price: u32,
    /// Damage type of its projectiles
    #[serde(rename = "type")]
    pub attack_type: AttackType,
    /// Damage per hit before upgrades
    pub initial_damage: u32,
    /// Targeting radius before upgrades
    pub initial_radius: f32,
    /// Attacks per 20 seconds at the baseline tick rate
    pub initial_speed_attack: u32,
    /// Projectile speed in map units per frame
    #[serde(rename = "init_projectile_speed")]
    pub projectile_speed: f32,
    /// Projectile appearance
    #[serde(default)]
    pub projectile_config: ProjectileConfig,
    /// Upgrade ladder, bought in order
    #[serde(default)]
    pub upgrades: Vec<UpgradeConfig>,
    /// Level that must be completed before this tower can be bought
    #[serde(default)]
    pub open_level: Option<String>,
}

/// Map definition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MapConfig {
    /// Unique map name
    pub name: String,
    /// Background colour or image reference, opaque to the simulation
    #[serde(default)]
    pub background_color: String,
    /// Enemy path
    pub path: Path,
}

/// One spawn schedule inside a wave.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwarmConfig {
    /// Enemy type to spawn
    pub enemy_name: String,
    /// Wave-local frame of the first spawn
    pub timeout: u32,
    /// Frames between spawns
    pub interval: u32,
    /// Number of spawns
    pub max_calls: u32,
}

/// One wave of a level.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WaveConfig {
    /// Concurrent spawn schedules
    pub swarms: Vec<SwarmConfig>,
}

/// Level definition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LevelConfig {
    /// Unique level name
    pub level_name: String,
    /// Map the level is played on
    pub map_name: String,
    /// Waves in order
    pub game_rule: Vec<WaveConfig>,
}

// =============================================================================
// MATCH RULES
// =============================================================================

/// Match-wide constants.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchRules {
    /// Player health and money at the start of a match
    pub starting_state: PlayerMapState,
    /// Towers must be placed left of this x coordinate (the rest is side panel)
    pub playable_width: f32,
    /// Width of the path corridor towers may not be placed in
    pub path_width: f32,
    /// Tick rate that attack speeds are defined against
    pub baseline_tps: u32,
    /// Tick rate when the player speeds the game up
    pub fast_tps: u32,
    /// Initial capacity of the action log
    pub watcher_capacity: usize,
    /// Share of the invested price returned when selling
    pub sell_refund_percent: u32,
}

impl Default for MatchRules {
    fn default() -> Self {
        Self {
            starting_state: PlayerMapState { health: 100, money: 650 },
            playable_width: 1500.0, // 1920 wide screen minus the side panel
            path_width: 64.0,
            baseline_tps: 60,
            fast_tps: 180,          // 3x speed-up
            watcher_capacity: 2500,
            sell_refund_percent: 70,
        }
    }
}

// =============================================================================
// PLAYER PROFILE
// =============================================================================

/// Persistent player progress across matches.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlayerProfile {
    /// Levels the player has won
    pub completed_levels: BTreeSet<String>,
}

impl PlayerProfile {
    /// Check whether content gated behind `open_level` is available.
    pub fn is_unlocked(&self, open_level: Option<&str>) -> bool {
        match open_level {
            None => true,
            Some(level) => self.completed_levels.contains(level),
        }
    }

    /// Record a won level. Returns true if it was newly completed.
    pub fn record_win(&mut self, level_name: &str) -> bool {
        self.completed_levels.insert(level_name.to_string())
    }

    /// Load saved progress. A missing file is a fresh profile.
    pub fn load(path: impl AsRef<FsPath>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text).map_err(|source| ConfigError::Json {
                what: path.display().to_string(),
                source,
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("No profile at {}, starting fresh", path.display());
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Write progress as JSON, replacing any previous file.
    pub fn save(&self, path: impl AsRef<FsPath>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Json {
            what: "player profile".to_string(),
            source,
        })?;
        fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Configuration errors. Raised before a match starts.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Config file is not valid JSON for its type.
    #[error("Failed to parse {what}: {source}")]
    Json {
        /// What was being parsed
        what: String,
        /// Underlying error
        source: serde_json::Error,
    },

    /// Two definitions share a name.
    #[error("Duplicate {kind} '{name}'")]
    Duplicate {
        /// Entity kind
        kind: &'static str,
        /// Offending name
        name: String,
    },

    /// A level references a map that does not exist.
    #[error("Level '{level}' references unknown map '{map}'")]
    UnknownMap {
        /// Level name
        level: String,
        /// Missing map
        map: String,
    },

    /// A level references an enemy that does not exist.
    #[error("Level '{level}' references unknown enemy '{enemy}'")]
    UnknownEnemy {
        /// Level name
        level: String,
        /// Missing enemy
        enemy: String,
    },

    /// A requested level does not exist.
    #[error("Unknown level '{0}'")]
    UnknownLevel(String),

    /// A map path has fewer than two points.
    #[error("Map '{map}' path has {len} points, need at least 2")]
    PathTooShort {
        /// Map name
        map: String,
        /// Number of points
        len: usize,
    },

    /// An enemy definition is unusable.
    #[error("Enemy '{name}': {reason}")]
    InvalidEnemy {
        /// Enemy name
        name: String,
        /// What is wrong
        reason: String,
    },

    /// A tower definition is unusable.
    #[error("Tower '{name}': {reason}")]
    InvalidTower {
        /// Tower name
        name: String,
        /// What is wrong
        reason: String,
    },

    /// A level has no waves, so its match could never end.
    #[error("Level '{0}' has no waves")]
    NoWaves(String),

    /// A swarm would divide by zero.
    #[error("Level '{level}' wave {wave}: swarm of '{enemy}' has zero interval")]
    ZeroInterval {
        /// Level name
        level: String,
        /// Wave number (0-based)
        wave: usize,
        /// Swarm enemy
        enemy: String,
    },

    /// Match rules are unusable.
    #[error("Invalid match rules: {0}")]
    InvalidRules(String),
}

// =============================================================================
// CATALOG
// =============================================================================

/// On-disk shape of a single-document catalog.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CatalogDocument {
    /// Match rules (defaults when absent)
    #[serde(default)]
    pub rules: MatchRules,
    /// Enemy definitions
    #[serde(default)]
    pub enemies: Vec<EnemyConfig>,
    /// Tower definitions
    #[serde(default)]
    pub towers: Vec<TowerConfig>,
    /// Map definitions
    #[serde(default)]
    pub maps: Vec<MapConfig>,
    /// Level definitions
    #[serde(default)]
    pub levels: Vec<LevelConfig>,
}

/// Every definition a match can reference, keyed by name.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Catalog {
    /// Match-wide constants
    pub rules: MatchRules,
    /// Enemies by name
    pub enemies: BTreeMap<String, EnemyConfig>,
    /// Towers by name
    pub towers: BTreeMap<String, TowerConfig>,
    /// Maps by name
    pub maps: BTreeMap<String, MapConfig>,
    /// Levels by name
    pub levels: BTreeMap<String, LevelConfig>,
}

fn index_by_name<T>(
    kind: &'static str,
    items: Vec<T>,
    name: impl Fn(&T) -> &str,
) -> Result<BTreeMap<String, T>, ConfigError> {
    let mut map = BTreeMap::new();
    for item in items {
        let key = name(&item).to_string();
        if map.contains_key(&key) {
            return Err(ConfigError::Duplicate { kind, name: key });
        }
        map.insert(key, item);
    }
    Ok(map)
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &FsPath) -> Result<T, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ConfigError::Json {
        what: path.display().to_string(),
        source,
    })
}

impl Catalog {
    /// Build and validate a catalog from a parsed document.
    pub fn from_document(doc: CatalogDocument) -> Result<Self, ConfigError> {
        let catalog = Self {
            rules: doc.rules,
            enemies: index_by_name("enemy", doc.enemies, |e| e.name.as_str())?,
            towers: index_by_name("tower", doc.towers, |t| t.name.as_str())?,
            maps: index_by_name("map", doc.maps, |m| m.name.as_str())?,
            levels: index_by_name("level", doc.levels, |l| l.level_name.as_str())?,
        };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Parse and validate a single JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let doc: CatalogDocument = serde_json::from_str(json).map_err(|source| ConfigError::Json {
            what: "catalog".to_string(),
            source,
        })?;
        Self::from_document(doc)
    }

    /// Load a catalog from a directory of JSON files.
    ///
    /// Expects `enemies.json`, `towers.json`, `maps.json` and `levels.json`,
    /// each holding an array. `rules.json` is optional.
    pub fn load_dir(dir: impl AsRef<FsPath>) -> Result<Self, ConfigError> {
        let dir = dir.as_ref();
        let rules_path = dir.join("rules.json");
        let rules = if rules_path.exists() {
            read_json(&rules_path)?
        } else {
            MatchRules::default()
        };

        let doc = CatalogDocument {
            rules,
            enemies: read_json(&dir.join("enemies.json"))?,
            towers: read_json(&dir.join("towers.json"))?,
            maps: read_json(&dir.join("maps.json"))?,
            levels: read_json(&dir.join("levels.json"))?,
        };

        let catalog = Self::from_document(doc)?;
        info!(
            "Loaded catalog from {}: {} enemies, {} towers, {} maps, {} levels",
            dir.display(),
            catalog.enemies.len(),
            catalog.towers.len(),
            catalog.maps.len(),
            catalog.levels.len(),
        );
        Ok(catalog)
    }

    /// Check every cross-reference and numeric constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let rules = &self.rules;
        if rules.baseline_tps == 0 || rules.fast_tps == 0 {
            return Err(ConfigError::InvalidRules("tick rates must be positive".into()));
        }
        if !(rules.path_width > 0.0) || !(rules.playable_width > 0.0) {
            return Err(ConfigError::InvalidRules("widths must be positive".into()));
        }
        if rules.sell_refund_percent > 100 {
            return Err(ConfigError::InvalidRules("refund above 100%".into()));
        }

        for enemy in self.enemies.values() {
            if !(enemy.vrms > 0.0) || !enemy.vrms.is_finite() {
                return Err(ConfigError::InvalidEnemy {
                    name: enemy.name.clone(),
                    reason: format!("speed {} must be positive", enemy.vrms),
                });
            }
            if enemy.max_health == 0 {
                return Err(ConfigError::InvalidEnemy {
                    name: enemy.name.clone(),
                    reason: "max health must be positive".into(),
                });
            }
        }

        for tower in self.towers.values() {
            validate_tower(tower)?;
        }

        for map in self.maps.values() {
            if map.path.len() < 2 {
                return Err(ConfigError::PathTooShort {
                    map: map.name.clone(),
                    len: map.path.len(),
                });
            }
        }

        for level in self.levels.values() {
            if !self.maps.contains_key(&level.map_name) {
                return Err(ConfigError::UnknownMap {
                    level: level.level_name.clone(),
                    map: level.map_name.clone(),
                });
            }
            if level.game_rule.is_empty() {
                return Err(ConfigError::NoWaves(level.level_name.clone()));
            }
            for (wave_index, wave) in level.game_rule.iter().enumerate() {
                for swarm in &wave.swarms {
                    if !self.enemies.contains_key(&swarm.enemy_name) {
                        return Err(ConfigError::UnknownEnemy {
                            level: level.level_name.clone(),
                            enemy: swarm.enemy_name.clone(),
                        });
                    }
                    if swarm.interval == 0 {
                        return Err(ConfigError::ZeroInterval {
                            level: level.level_name.clone(),
                            wave: wave_index,
                            enemy: swarm.enemy_name.clone(),
                        });
                    }
                }
            }
        }

        debug!("Catalog validated");
        Ok(())
    }

    /// Look up a level.
    pub fn level(&self, name: &str) -> Result<&LevelConfig, ConfigError> {
        self.levels
            .get(name)
            .ok_or_else(|| ConfigError::UnknownLevel(name.to_string()))
    }

    /// Tower types available to a profile.
    pub fn purchasable_towers<'a>(
        &'a self,
        profile: &'a PlayerProfile,
    ) -> impl Iterator<Item = &'a TowerConfig> + 'a {
        self.towers
            .values()
            .filter(move |t| profile.is_unlocked(t.open_level.as_deref()))
    }

    /// Built-in content used by the demo binary, benches and tests.
    pub fn demo() -> Self {
        let enemies = [
            EnemyConfig {
                name: "grunt".into(),
                max_health: 18,
                damage: 10,
                vrms: 1.0,
                money_award: 15,
                strengths: Vec::new(),
                weaknesses: vec![Weakness { attack_type: AttackType::FIRE, inc_dmg: 2 }],
            },
            EnemyConfig {
                name: "runner".into(),
                max_health: 10,
                damage: 5,
                vrms: 2.0,
                money_award: 10,
                strengths: vec![Strength { attack_type: AttackType::MAGIC, dec_dmg: 1 }],
                weaknesses: Vec::new(),
            },
            EnemyConfig {
                name: "brute".into(),
                max_health: 60,
                damage: 25,
                vrms: 0.75,
                money_award: 40,
                strengths: vec![Strength { attack_type: AttackType::PHYSICAL, dec_dmg: 2 }],
                weaknesses: vec![Weakness { attack_type: AttackType::MAGIC, inc_dmg: 4 }],
            },
        ];

        let towers = [
            TowerConfig {
                name: "archer".into(),
                price: 100,
                attack_type: AttackType::PHYSICAL,
                initial_damage: 4,
                initial_radius: 200.0,
                initial_speed_attack: 20, // cooldown 60 frames
                projectile_speed: 12.0,
                projectile_config: ProjectileConfig { name: "#c8a050".into() },
                upgrades: vec![
                    UpgradeConfig {
                        price: 50,
                        delta_damage: 2,
                        delta_speed_attack: 10,
                        delta_radius: 25.0,
                        open_level: None,
                    },
                    UpgradeConfig {
                        price: 120,
                        delta_damage: 3,
                        delta_speed_attack: 10,
                        delta_radius: 25.0,
                        open_level: Some("meadow".into()),
                    },
                ],
                open_level: None,
            },
            TowerConfig {
                name: "mage".into(),
                price: 250,
                attack_type: AttackType::MAGIC,
                initial_damage: 8,
                initial_radius: 160.0,
                initial_speed_attack: 12, // cooldown 100 frames
                projectile_speed: 10.0,
                projectile_config: ProjectileConfig { name: "#7050c8".into() },
                upgrades: vec![UpgradeConfig {
                    price: 150,
                    delta_damage: 6,
                    delta_speed_attack: 4,
                    delta_radius: 20.0,
                    open_level: None,
                }],
                open_level: None,
            },
            TowerConfig {
                name: "cannon".into(),
                price: 700,
                attack_type: AttackType::FIRE,
                initial_damage: 30,
                initial_radius: 240.0,
                initial_speed_attack: 6, // cooldown 200 frames
                projectile_speed: 8.0,
                projectile_config: ProjectileConfig { name: "#d04020".into() },
                upgrades: Vec::new(),
                open_level: Some("meadow".into()),
            },
        ];

        let map = MapConfig {
            name: "meadow".into(),
            background_color: "#7cba5d".into(),
            path: Path::new(vec![
                Point::new(-32.0, 540.0),
                Point::new(400.0, 540.0),
                Point::new(400.0, 200.0),
                Point::new(1000.0, 200.0),
                Point::new(1000.0, 800.0),
                Point::new(1532.0, 800.0),
            ]),
        };

        let swarm = |enemy: &str, timeout, interval, max_calls| SwarmConfig {
            enemy_name: enemy.into(),
            timeout,
            interval,
            max_calls,
        };

        let level = LevelConfig {
            level_name: "meadow".into(),
            map_name: "meadow".into(),
            game_rule: vec![
                WaveConfig { swarms: vec![swarm("grunt", 0, 45, 8)] },
                WaveConfig {
                    swarms: vec![swarm("grunt", 0, 30, 10), swarm("runner", 120, 20, 8)],
                },
                WaveConfig {
                    swarms: vec![swarm("brute", 0, 120, 3), swarm("runner", 60, 25, 12)],
                },
            ],
        };

        Self {
            rules: MatchRules::default(),
            enemies: enemies.into_iter().map(|e| (e.name.clone(), e)).collect(),
            towers: towers.into_iter().map(|t| (t.name.clone(), t)).collect(),
            maps: BTreeMap::from([(map.name.clone(), map)]),
            levels: BTreeMap::from([(level.level_name.clone(), level)]),
        }
    }
}

fn validate_tower(tower: &TowerConfig) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidTower {
        name: tower.name.clone(),
        reason,
    };

    if !(tower.projectile_speed > 0.0) || !tower.projectile_speed.is_finite() {
        return Err(invalid(format!("projectile speed {} must be positive", tower.projectile_speed)));
    }
    if !(tower.initial_radius >= 0.0) {
        return Err(invalid(format!("radius {} must not be negative", tower.initial_radius)));
    }

    // Attack speed divides the cooldown, so it must stay positive at every tier.
    let mut speed = tower.initial_speed_attack as i64;
    if speed <= 0 {
        return Err(invalid("attack speed must be positive".into()));
    }
    for (tier, upgrade) in tower.upgrades.iter().enumerate() {
        speed += upgrade.delta_speed_attack as i64;
        if speed <= 0 {
            return Err(invalid(format!("attack speed reaches {} at upgrade {}", speed, tier + 1)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_catalog_is_valid() {
        let catalog = Catalog::demo();
        catalog.validate().unwrap();
        assert!(catalog.level("meadow").is_ok());
        assert_eq!(catalog.towers["cannon"].price, 700);
    }

    #[test]
    fn test_resistance_table() {
        let catalog = Catalog::demo();
        let brute = catalog.enemies["brute"].resistances();
        assert_eq!(brute.get(&AttackType::PHYSICAL), Some(&-2));
        assert_eq!(brute.get(&AttackType::MAGIC), Some(&4));
        assert_eq!(brute.get(&AttackType::FIRE), None);
    }

    #[test]
    fn test_weakness_wins_over_strength() {
        let enemy = EnemyConfig {
            name: "odd".into(),
            max_health: 1,
            damage: 1,
            vrms: 1.0,
            money_award: 0,
            strengths: vec![Strength { attack_type: AttackType::FIRE, dec_dmg: 3 }],
            weaknesses: vec![Weakness { attack_type: AttackType::FIRE, inc_dmg: 1 }],
        };
        assert_eq!(enemy.resistances().get(&AttackType::FIRE), Some(&1));
    }

    #[test]
    fn test_json_roundtrip_through_document() {
        let catalog = Catalog::demo();
        let doc = CatalogDocument {
            rules: catalog.rules.clone(),
            enemies: catalog.enemies.values().cloned().collect(),
            towers: catalog.towers.values().cloned().collect(),
            maps: catalog.maps.values().cloned().collect(),
            levels: catalog.levels.values().cloned().collect(),
        };
        let json = serde_json::to_string(&doc).unwrap();
        let parsed = Catalog::from_json_str(&json).unwrap();
        assert_eq!(parsed, catalog);
    }

    #[test]
    fn test_unknown_enemy_fails_fast() {
        let mut catalog = Catalog::demo();
        catalog.enemies.remove("runner");
        let err = catalog.validate().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownEnemy { ref enemy, .. } if enemy == "runner"));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut catalog = Catalog::demo();
        if let Some(level) = catalog.levels.get_mut("meadow") {
            level.game_rule[0].swarms[0].interval = 0;
        }
        assert!(matches!(catalog.validate(), Err(ConfigError::ZeroInterval { wave: 0, .. })));
    }

    #[test]
    fn test_level_without_waves_rejected() {
        let mut catalog = Catalog::demo();
        if let Some(level) = catalog.levels.get_mut("meadow") {
            level.game_rule.clear();
        }
        assert!(matches!(catalog.validate(), Err(ConfigError::NoWaves(ref level)) if level == "meadow"));

        let doc = CatalogDocument {
            rules: catalog.rules.clone(),
            enemies: catalog.enemies.values().cloned().collect(),
            towers: catalog.towers.values().cloned().collect(),
            maps: catalog.maps.values().cloned().collect(),
            levels: catalog.levels.values().cloned().collect(),
        };
        assert!(matches!(Catalog::from_document(doc), Err(ConfigError::NoWaves(_))));
    }

    #[test]
    fn test_attack_speed_must_stay_positive() {
        let mut catalog = Catalog::demo();
        if let Some(tower) = catalog.towers.get_mut("mage") {
            tower.upgrades[0].delta_speed_attack = -12;
        }
        assert!(matches!(catalog.validate(), Err(ConfigError::InvalidTower { .. })));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let catalog = Catalog::demo();
        let grunt = catalog.enemies["grunt"].clone();
        let doc = CatalogDocument {
            enemies: vec![grunt.clone(), grunt],
            ..Default::default()
        };
        assert!(matches!(
            Catalog::from_document(doc),
            Err(ConfigError::Duplicate { kind: "enemy", .. })
        ));
    }

    #[test]
    fn test_short_path_rejected() {
        let mut catalog = Catalog::demo();
        if let Some(map) = catalog.maps.get_mut("meadow") {
            map.path = Path::new(vec![Point::ZERO]);
        }
        assert!(matches!(catalog.validate(), Err(ConfigError::PathTooShort { len: 1, .. })));
    }

    #[test]
    fn test_load_dir() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::demo();
        let write = |name: &str, json: String| fs::write(dir.path().join(name), json).unwrap();
        write("enemies.json", serde_json::to_string(&catalog.enemies.values().collect::<Vec<_>>()).unwrap());
        write("towers.json", serde_json::to_string(&catalog.towers.values().collect::<Vec<_>>()).unwrap());
        write("maps.json", serde_json::to_string(&catalog.maps.values().collect::<Vec<_>>()).unwrap());
        write("levels.json", serde_json::to_string(&catalog.levels.values().collect::<Vec<_>>()).unwrap());

        let loaded = Catalog::load_dir(dir.path()).unwrap();
        assert_eq!(loaded, catalog);
    }

    #[test]
    fn test_missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = Catalog::load_dir(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_profile_gating() {
        let catalog = Catalog::demo();
        let mut profile = PlayerProfile::default();
        let names: Vec<_> = catalog.purchasable_towers(&profile).map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["archer", "mage"]);

        assert!(profile.record_win("meadow"));
        assert!(!profile.record_win("meadow"));
        assert_eq!(catalog.purchasable_towers(&profile).count(), 3);
    }

    #[test]
    fn test_profile_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");

        let fresh = PlayerProfile::load(&path).unwrap();
        assert_eq!(fresh, PlayerProfile::default());

        let mut profile = fresh;
        profile.record_win("meadow");
        profile.save(&path).unwrap();

        let loaded = PlayerProfile::load(&path).unwrap();
        assert_eq!(loaded, profile);
        assert!(loaded.is_unlocked(Some("meadow")));
    }

    #[test]
    fn test_corrupt_profile_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(PlayerProfile::load(&path), Err(ConfigError::Json { .. })));
    }
}
