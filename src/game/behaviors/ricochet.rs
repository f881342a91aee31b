use serde::{Deserialize, Serialize};

use super::{BehaviorConfig, BehaviorUnit, DeathContext};
use crate::game::events::GameEvent;
use crate::game::systems::projectile::ProjectileBody;
use crate::game::world::CombatWorld;
use crate::util::vec2::Vec2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RicochetConfig {
    pub bounces: u32,
    pub search_radius: f32,
}

impl Default for RicochetConfig {
    fn default() -> Self {
        Self {
            bounces: 0,
            search_radius: 200.0,
        }
    }
}

/// Redirects a dying projectile toward the next nearest enemy
#[derive(Debug)]
pub struct RicochetBehavior {
    config: RicochetConfig,
    remaining: u32,
}

impl RicochetBehavior {
    pub fn new(config: RicochetConfig) -> Self {
        Self {
            remaining: config.bounces,
            config,
        }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }
}

impl BehaviorUnit for RicochetBehavior {
    fn type_tag(&self) -> &'static str {
        "ricochet"
    }

    fn priority(&self) -> u8 {
        2
    }

    fn on_death(
        &mut self,
        body: &mut ProjectileBody,
        death: &DeathContext,
        world: &mut dyn CombatWorld,
    ) -> bool {
        if self.remaining == 0 {
            return false;
        }

        let exclude: &[_] = match &death.target {
            Some(id) => std::slice::from_ref(id),
            None => &[],
        };
        // Nearest candidate with a usable heading; one sitting on the death
        // point gives no direction
        let Some((next, direction)) = world
            .enemies_within(death.position, self.config.search_radius)
            .into_iter()
            .filter(|e| !exclude.contains(&e.id))
            .map(|e| (e, death.position.direction_to(e.position)))
            .find(|(_, direction)| *direction != Vec2::ZERO)
        else {
            return false;
        };

        body.velocity = direction * body.velocity.length();
        body.lifetime = body.max_lifetime;
        self.remaining -= 1;

        world.emit(GameEvent::Ricochet {
            projectile_id: body.id,
            target_id: next.id,
        });
        true
    }

    fn config(&self) -> Option<BehaviorConfig> {
        Some(BehaviorConfig::Ricochet(self.config.clone()))
    }

    fn fresh(&self) -> Box<dyn BehaviorUnit> {
        Box::new(Self::new(self.config.clone()))
    }
}
