use serde::{Deserialize, Serialize};

use super::{BehaviorConfig, BehaviorUnit, DeathContext};
use crate::game::events::GameEvent;
use crate::game::systems::projectile::ProjectileBody;
use crate::game::world::CombatWorld;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplosiveConfig {
    pub radius: f32,
    pub damage_fraction: f32,
    /// Scale damage linearly from full at the center to zero at the edge
    pub falloff: bool,
}

impl Default for ExplosiveConfig {
    fn default() -> Self {
        Self {
            radius: 60.0,
            damage_fraction: 0.5,
            falloff: false,
        }
    }
}

/// Area damage on every death of the projectile
#[derive(Debug)]
pub struct ExplosiveBehavior {
    config: ExplosiveConfig,
}

impl ExplosiveBehavior {
    pub fn new(config: ExplosiveConfig) -> Self {
        Self { config }
    }

    fn damage_at(&self, base: f32, distance: f32) -> f32 {
        let flat = base * self.config.damage_fraction.max(0.0);
        if self.config.falloff && self.config.radius > 0.0 {
            flat * (1.0 - distance / self.config.radius).clamp(0.0, 1.0)
        } else {
            flat
        }
    }
}

impl BehaviorUnit for ExplosiveBehavior {
    fn type_tag(&self) -> &'static str {
        "explosive"
    }

    fn priority(&self) -> u8 {
        5
    }

    fn on_death(
        &mut self,
        body: &mut ProjectileBody,
        death: &DeathContext,
        world: &mut dyn CombatWorld,
    ) -> bool {
        if self.config.radius <= 0.0 {
            return false;
        }

        for enemy in world.enemies_within(death.position, self.config.radius) {
            let damage = self.damage_at(body.damage, enemy.position.distance_to(death.position));
            if damage > 0.0 {
                world.damage_enemy(enemy.id, damage);
            }
        }

        world.emit(GameEvent::Explosion {
            position: death.position,
            radius: self.config.radius,
        });
        false
    }

    fn config(&self) -> Option<BehaviorConfig> {
        Some(BehaviorConfig::Explosive(self.config.clone()))
    }

    fn fresh(&self) -> Box<dyn BehaviorUnit> {
        Box::new(Self::new(self.config.clone()))
    }
}
