use serde::{Deserialize, Serialize};

use super::{BehaviorConfig, BehaviorUnit};
use crate::game::state::EntityId;
use crate::game::systems::projectile::ProjectileBody;
use crate::game::world::CombatWorld;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PiercingConfig {
    /// Hits the projectile survives before dying on the next one
    pub count: u32,
}

/// Keeps the projectile alive through `count` hits
#[derive(Debug)]
pub struct PiercingBehavior {
    config: PiercingConfig,
    remaining: u32,
}

impl PiercingBehavior {
    pub fn new(config: PiercingConfig) -> Self {
        Self {
            remaining: config.count,
            config,
        }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }
}

impl BehaviorUnit for PiercingBehavior {
    fn type_tag(&self) -> &'static str {
        "piercing"
    }

    fn priority(&self) -> u8 {
        1
    }

    fn prevents_death(
        &mut self,
        _body: &ProjectileBody,
        _target: EntityId,
        _world: &mut dyn CombatWorld,
    ) -> bool {
        if self.remaining > 0 {
            self.remaining -= 1;
            true
        } else {
            false
        }
    }

    fn config(&self) -> Option<BehaviorConfig> {
        Some(BehaviorConfig::Piercing(self.config.clone()))
    }

    fn fresh(&self) -> Box<dyn BehaviorUnit> {
        Box::new(Self::new(self.config.clone()))
    }
}
