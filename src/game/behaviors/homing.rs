use serde::{Deserialize, Serialize};

use super::{BehaviorConfig, BehaviorUnit};
use crate::game::systems::projectile::ProjectileBody;
use crate::game::world::CombatWorld;
use crate::util::vec2::Vec2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HomingConfig {
    /// Acquisition radius
    pub radius: f32,
    /// Max turn in radians per second
    pub turn_rate: f32,
}

impl Default for HomingConfig {
    fn default() -> Self {
        Self {
            radius: 250.0,
            turn_rate: 3.0,
        }
    }
}

#[derive(Debug)]
pub struct HomingBehavior {
    config: HomingConfig,
}

impl HomingBehavior {
    pub fn new(config: HomingConfig) -> Self {
        Self { config }
    }
}

impl BehaviorUnit for HomingBehavior {
    fn type_tag(&self) -> &'static str {
        "homing"
    }

    fn priority(&self) -> u8 {
        3
    }

    fn update(&mut self, body: &mut ProjectileBody, dt: f32, world: &dyn CombatWorld) {
        let speed = body.velocity.length();
        if speed <= f32::EPSILON || self.config.turn_rate <= 0.0 {
            return;
        }
        let Some(target) = world.nearest_enemy(body.position, self.config.radius, &[]) else {
            return;
        };

        let desired = body.position.direction_to(target.position);
        if desired == Vec2::ZERO {
            return;
        }

        let max_turn = self.config.turn_rate * dt;
        let turn = body.velocity.angle_to(desired).clamp(-max_turn, max_turn);
        // Rebuild from the angle so speed never drifts
        body.velocity = Vec2::from_angle(body.velocity.angle() + turn) * speed;
    }

    fn config(&self) -> Option<BehaviorConfig> {
        Some(BehaviorConfig::Homing(self.config.clone()))
    }

    fn fresh(&self) -> Box<dyn BehaviorUnit> {
        Box::new(Self::new(self.config.clone()))
    }
}
