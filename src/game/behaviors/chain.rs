use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use super::{BehaviorConfig, BehaviorUnit};
use crate::game::events::GameEvent;
use crate::game::state::EntityId;
use crate::game::systems::projectile::ProjectileBody;
use crate::game::world::CombatWorld;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Extra enemies struck per hit
    pub max_chains: u32,
    /// Search radius around the struck enemy
    pub range: f32,
    /// Fraction of the projectile's damage dealt to each chained enemy
    pub damage_fraction: f32,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            max_chains: 0,
            range: 120.0,
            damage_fraction: 0.5,
        }
    }
}

/// Chain lightning: each hit arcs to the nearest enemies not yet struck by
/// this projectile.
#[derive(Debug)]
pub struct ChainBehavior {
    config: ChainConfig,
    visited: FxHashSet<EntityId>,
}

impl ChainBehavior {
    pub fn new(config: ChainConfig) -> Self {
        Self {
            config,
            visited: FxHashSet::default(),
        }
    }

    pub fn visited(&self) -> &FxHashSet<EntityId> {
        &self.visited
    }
}

impl BehaviorUnit for ChainBehavior {
    fn type_tag(&self) -> &'static str {
        "chain"
    }

    fn priority(&self) -> u8 {
        4
    }

    fn on_hit(&mut self, body: &ProjectileBody, target: EntityId, world: &mut dyn CombatWorld) -> bool {
        self.visited.insert(target);

        let max = self.config.max_chains as usize;
        if max == 0 || self.config.range <= 0.0 {
            return true;
        }

        let origin = world.enemy_position(target).unwrap_or(body.position);
        let damage = body.damage * self.config.damage_fraction.max(0.0);

        // Already sorted by distance from the struck enemy
        let jumps: Vec<_> = world
            .enemies_within(origin, self.config.range)
            .into_iter()
            .filter(|e| !self.visited.contains(&e.id))
            .take(max)
            .collect();

        for enemy in jumps {
            self.visited.insert(enemy.id);
            world.damage_enemy(enemy.id, damage);
            world.emit(GameEvent::ChainArc {
                from: origin,
                to: enemy.position,
                target_id: enemy.id,
            });
        }

        true
    }

    fn config(&self) -> Option<BehaviorConfig> {
        Some(BehaviorConfig::Chain(self.config.clone()))
    }

    fn fresh(&self) -> Box<dyn BehaviorUnit> {
        Box::new(Self::new(self.config.clone()))
    }
}
