//! Projectile behavior composition
//!
//! Special projectile capabilities (piercing, chain lightning, ricochet,
//! explosive, homing) are separate `BehaviorUnit` objects held by the
//! projectile's `BehaviorComposer`. A projectile "has piercing" only in the
//! sense that its composer holds a piercing unit; the projectile body carries
//! no capability flags.
//!
//! Configs deserialize from JSON with every field optional:
//!
//! ```json
//! { "type": "chain", "max_chains": 3, "range": 150.0, "damage_fraction": 0.5 }
//! ```

pub mod chain;
pub mod composer;
pub mod explosive;
pub mod homing;
pub mod piercing;
pub mod ricochet;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::game::state::EntityId;
use crate::game::systems::projectile::ProjectileBody;
use crate::game::world::CombatWorld;
use crate::util::vec2::Vec2;

pub use chain::{ChainBehavior, ChainConfig};
pub use composer::BehaviorComposer;
pub use explosive::{ExplosiveBehavior, ExplosiveConfig};
pub use homing::{HomingBehavior, HomingConfig};
pub use piercing::{PiercingBehavior, PiercingConfig};
pub use ricochet::{RicochetBehavior, RicochetConfig};

/// Snapshot handed to `on_death` hooks, taken before any unit runs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeathContext {
    /// Where the projectile was when it died
    pub position: Vec2,
    /// Enemy hit on this death, `None` for expiry or off-screen
    pub target: Option<EntityId>,
}

/// A pluggable projectile capability.
///
/// Units must not depend on sibling units or on dispatch order. Any state a
/// unit needs (pierce counters, visited sets) lives inside the unit.
pub trait BehaviorUnit: fmt::Debug + Send + Sync {
    /// Stable type tag (`"piercing"`, `"chain"`, ...)
    fn type_tag(&self) -> &'static str;

    /// Display priority for renderers; higher wins, ties go to insertion order
    fn priority(&self) -> u8 {
        0
    }

    /// Called every tick the projectile is alive
    fn update(&mut self, _body: &mut ProjectileBody, _dt: f32, _world: &dyn CombatWorld) {}

    /// Called when the projectile overlaps `target`. `false` rejects the hit.
    fn on_hit(
        &mut self,
        _body: &ProjectileBody,
        _target: EntityId,
        _world: &mut dyn CombatWorld,
    ) -> bool {
        true
    }

    /// Called after hit damage is applied. `true` keeps the projectile alive.
    fn prevents_death(
        &mut self,
        _body: &ProjectileBody,
        _target: EntityId,
        _world: &mut dyn CombatWorld,
    ) -> bool {
        false
    }

    /// Last-chance hook before removal. `true` revives the projectile.
    fn on_death(
        &mut self,
        _body: &mut ProjectileBody,
        _death: &DeathContext,
        _world: &mut dyn CombatWorld,
    ) -> bool {
        false
    }

    /// Current configuration, for built-in units
    fn config(&self) -> Option<BehaviorConfig> {
        None
    }

    /// Same configuration, fresh per-projectile state
    fn fresh(&self) -> Box<dyn BehaviorUnit>;
}

/// Built-in behavior types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BehaviorKind {
    Piercing,
    Chain,
    Ricochet,
    Explosive,
    Homing,
}

impl BehaviorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BehaviorKind::Piercing => "piercing",
            BehaviorKind::Chain => "chain",
            BehaviorKind::Ricochet => "ricochet",
            BehaviorKind::Explosive => "explosive",
            BehaviorKind::Homing => "homing",
        }
    }
}

impl fmt::Display for BehaviorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BehaviorKind {
    type Err = BehaviorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "piercing" => Ok(BehaviorKind::Piercing),
            "chain" => Ok(BehaviorKind::Chain),
            "ricochet" => Ok(BehaviorKind::Ricochet),
            "explosive" => Ok(BehaviorKind::Explosive),
            "homing" => Ok(BehaviorKind::Homing),
            other => Err(BehaviorError::UnknownType(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BehaviorError {
    #[error("Unknown behavior type: {0}")]
    UnknownType(String),
    #[error("Invalid {kind} config: {source}")]
    InvalidConfig {
        kind: BehaviorKind,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid loadout: {0}")]
    InvalidLoadout(#[source] serde_json::Error),
}

/// Configuration for a built-in behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BehaviorConfig {
    Piercing(PiercingConfig),
    Chain(ChainConfig),
    Ricochet(RicochetConfig),
    Explosive(ExplosiveConfig),
    Homing(HomingConfig),
}

impl BehaviorConfig {
    pub fn kind(&self) -> BehaviorKind {
        match self {
            BehaviorConfig::Piercing(_) => BehaviorKind::Piercing,
            BehaviorConfig::Chain(_) => BehaviorKind::Chain,
            BehaviorConfig::Ricochet(_) => BehaviorKind::Ricochet,
            BehaviorConfig::Explosive(_) => BehaviorKind::Explosive,
            BehaviorConfig::Homing(_) => BehaviorKind::Homing,
        }
    }

    /// Parse a type tag plus parameter object. `null` parameters mean defaults.
    pub fn from_parts(tag: &str, params: serde_json::Value) -> Result<Self, BehaviorError> {
        let kind: BehaviorKind = tag.parse()?;
        let params = if params.is_null() {
            serde_json::Value::Object(Default::default())
        } else {
            params
        };
        let invalid = |source| BehaviorError::InvalidConfig { kind, source };
        Ok(match kind {
            BehaviorKind::Piercing => Self::Piercing(serde_json::from_value(params).map_err(invalid)?),
            BehaviorKind::Chain => Self::Chain(serde_json::from_value(params).map_err(invalid)?),
            BehaviorKind::Ricochet => Self::Ricochet(serde_json::from_value(params).map_err(invalid)?),
            BehaviorKind::Explosive => Self::Explosive(serde_json::from_value(params).map_err(invalid)?),
            BehaviorKind::Homing => Self::Homing(serde_json::from_value(params).map_err(invalid)?),
        })
    }

    /// Parse a JSON array of tagged configs (a weapon loadout)
    pub fn parse_loadout(json: &str) -> Result<Vec<Self>, BehaviorError> {
        serde_json::from_str(json).map_err(BehaviorError::InvalidLoadout)
    }

    /// Build the unit for this config
    pub fn build(&self) -> Box<dyn BehaviorUnit> {
        match self {
            BehaviorConfig::Piercing(c) => Box::new(PiercingBehavior::new(c.clone())),
            BehaviorConfig::Chain(c) => Box::new(ChainBehavior::new(c.clone())),
            BehaviorConfig::Ricochet(c) => Box::new(RicochetBehavior::new(c.clone())),
            BehaviorConfig::Explosive(c) => Box::new(ExplosiveBehavior::new(c.clone())),
            BehaviorConfig::Homing(c) => Box::new(HomingBehavior::new(c.clone())),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! In-memory `CombatWorld` for behavior tests

    use super::*;
    use crate::game::events::GameEvent;
    use crate::game::world::{sort_by_distance, EnemySnapshot};
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    pub struct MockEnemy {
        pub id: EntityId,
        pub position: Vec2,
        pub health: f32,
    }

    #[derive(Default)]
    pub struct MockWorld {
        pub enemies: Vec<MockEnemy>,
        /// (enemy id, damage) in application order
        pub damage_log: Vec<(EntityId, f32)>,
        pub events: Mutex<Vec<GameEvent>>,
    }

    impl MockWorld {
        pub fn with_enemies(positions: &[(EntityId, f32, f32)]) -> Self {
            Self {
                enemies: positions
                    .iter()
                    .map(|&(id, x, y)| MockEnemy { id, position: Vec2::new(x, y), health: 100.0 })
                    .collect(),
                ..Default::default()
            }
        }

        pub fn damage_to(&self, id: EntityId) -> f32 {
            self.damage_log.iter().filter(|(i, _)| *i == id).map(|(_, d)| d).sum()
        }

        pub fn kill(&mut self, id: EntityId) {
            if let Some(e) = self.enemies.iter_mut().find(|e| e.id == id) {
                e.health = 0.0;
            }
        }
    }

    impl CombatWorld for MockWorld {
        fn enemy_position(&self, id: EntityId) -> Option<Vec2> {
            self.enemies.iter().find(|e| e.id == id && e.health > 0.0).map(|e| e.position)
        }

        fn enemies_within(&self, center: Vec2, radius: f32) -> Vec<EnemySnapshot> {
            let mut found: Vec<_> = self
                .enemies
                .iter()
                .filter(|e| e.health > 0.0 && e.position.distance_to(center) <= radius)
                .map(|e| EnemySnapshot { id: e.id, position: e.position, radius: 10.0 })
                .collect();
            sort_by_distance(center, &mut found);
            found
        }

        fn damage_enemy(&mut self, id: EntityId, amount: f32) -> bool {
            self.damage_log.push((id, amount));
            match self.enemies.iter_mut().find(|e| e.id == id && e.health > 0.0) {
                Some(e) => {
                    e.health -= amount;
                    e.health <= 0.0
                }
                None => false,
            }
        }

        fn emit(&self, event: GameEvent) {
            self.events.lock().unwrap().push(event);
        }
    }
}
