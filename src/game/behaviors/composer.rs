//! Per-projectile behavior list and hook dispatch

use smallvec::SmallVec;

use super::{BehaviorConfig, BehaviorError, BehaviorUnit, DeathContext};
use crate::game::state::EntityId;
use crate::game::systems::projectile::ProjectileBody;
use crate::game::world::CombatWorld;

#[derive(Debug)]
struct BehaviorSlot {
    unit: Box<dyn BehaviorUnit>,
    enabled: bool,
}

/// Ordered set of behavior units, at most one per type tag.
///
/// Hooks run over enabled units in insertion order. Result aggregation never
/// short-circuits, so every unit sees every event.
#[derive(Debug, Default)]
pub struct BehaviorComposer {
    slots: SmallVec<[BehaviorSlot; 4]>,
}

impl BehaviorComposer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a composer from a loadout, later entries replacing earlier ones
    pub fn from_configs<'a, I>(configs: I) -> Self
    where
        I: IntoIterator<Item = &'a BehaviorConfig>,
    {
        let mut composer = Self::new();
        for config in configs {
            composer.add_behavior(config);
        }
        composer
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Add a built-in behavior. An existing unit with the same tag is replaced
    /// in place, keeping its position and enabled flag.
    pub fn add_behavior(&mut self, config: &BehaviorConfig) {
        self.add_unit(config.build());
    }

    /// Parse `params` for `tag` and add the result
    pub fn add_behavior_json(
        &mut self,
        tag: &str,
        params: serde_json::Value,
    ) -> Result<(), BehaviorError> {
        let config = BehaviorConfig::from_parts(tag, params)?;
        self.add_behavior(&config);
        Ok(())
    }

    /// Add an arbitrary unit, replacing any unit with the same tag
    pub fn add_unit(&mut self, unit: Box<dyn BehaviorUnit>) {
        match self.slot_mut(unit.type_tag()) {
            Some(slot) => slot.unit = unit,
            None => self.slots.push(BehaviorSlot { unit, enabled: true }),
        }
    }

    pub fn has_behavior(&self, tag: &str) -> bool {
        self.slot(tag).is_some()
    }

    pub fn behavior_config(&self, tag: &str) -> Option<BehaviorConfig> {
        self.slot(tag).and_then(|s| s.unit.config())
    }

    /// Remove the unit with `tag`. Returns false if absent.
    pub fn remove_behavior(&mut self, tag: &str) -> bool {
        match self.slots.iter().position(|s| s.unit.type_tag() == tag) {
            Some(index) => {
                self.slots.remove(index);
                true
            }
            None => false,
        }
    }

    /// Enable or disable without removing. Returns false if absent.
    pub fn set_enabled(&mut self, tag: &str, enabled: bool) -> bool {
        match self.slot_mut(tag) {
            Some(slot) => {
                slot.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn is_enabled(&self, tag: &str) -> bool {
        self.slot(tag).map_or(false, |s| s.enabled)
    }

    /// Tag of the highest-priority enabled unit; ties go to the earliest added
    pub fn display_type(&self) -> Option<&'static str> {
        let mut best: Option<&BehaviorSlot> = None;
        for slot in self.enabled() {
            if best.map_or(true, |b| slot.unit.priority() > b.unit.priority()) {
                best = Some(slot);
            }
        }
        best.map(|s| s.unit.type_tag())
    }

    /// Same units with fresh per-projectile state, for child projectiles
    pub fn inherit(&self) -> Self {
        Self {
            slots: self
                .slots
                .iter()
                .map(|s| BehaviorSlot {
                    unit: s.unit.fresh(),
                    enabled: s.enabled,
                })
                .collect(),
        }
    }

    /// Configs of every built-in unit, in insertion order
    pub fn configs(&self) -> Vec<BehaviorConfig> {
        self.slots.iter().filter_map(|s| s.unit.config()).collect()
    }

    pub fn update(&mut self, body: &mut ProjectileBody, dt: f32, world: &dyn CombatWorld) {
        for slot in self.enabled_mut() {
            slot.unit.update(body, dt, world);
        }
    }

    /// `true` if no enabled unit exists or any unit accepts the hit
    pub fn on_hit(
        &mut self,
        body: &ProjectileBody,
        target: EntityId,
        world: &mut dyn CombatWorld,
    ) -> bool {
        let mut any_enabled = false;
        let mut accepted = false;
        for slot in self.enabled_mut() {
            any_enabled = true;
            accepted |= slot.unit.on_hit(body, target, world);
        }
        !any_enabled || accepted
    }

    pub fn prevents_death(
        &mut self,
        body: &ProjectileBody,
        target: EntityId,
        world: &mut dyn CombatWorld,
    ) -> bool {
        let mut prevented = false;
        for slot in self.enabled_mut() {
            prevented |= slot.unit.prevents_death(body, target, world);
        }
        prevented
    }

    pub fn on_death(
        &mut self,
        body: &mut ProjectileBody,
        death: &DeathContext,
        world: &mut dyn CombatWorld,
    ) -> bool {
        let mut revived = false;
        for slot in self.enabled_mut() {
            revived |= slot.unit.on_death(body, death, world);
        }
        revived
    }

    fn slot(&self, tag: &str) -> Option<&BehaviorSlot> {
        self.slots.iter().find(|s| s.unit.type_tag() == tag)
    }

    fn slot_mut(&mut self, tag: &str) -> Option<&mut BehaviorSlot> {
        self.slots.iter_mut().find(|s| s.unit.type_tag() == tag)
    }

    fn enabled(&self) -> impl Iterator<Item = &BehaviorSlot> {
        self.slots.iter().filter(|s| s.enabled)
    }

    fn enabled_mut(&mut self) -> impl Iterator<Item = &mut BehaviorSlot> {
        self.slots.iter_mut().filter(|s| s.enabled)
    }
}
