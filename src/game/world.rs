//! Query surfaces the decision core consumes
//!
//! The AI and behavior code only see the world through these traits, so any
//! entity store or spatial index can back them. `GameState` is the in-crate
//! implementation.

use crate::game::events::GameEvent;
use crate::game::state::{EnemyKind, EntityId, PlayerId};
use crate::util::vec2::Vec2;

/// Read-only view used by AI controllers during the decision pass
pub trait AiWorld {
    /// Target exists and is alive
    fn is_target_valid(&self, id: PlayerId) -> bool;

    /// Position of a valid target, `None` if dead or gone
    fn target_position(&self, id: PlayerId) -> Option<Vec2>;

    /// Nearest valid target within `max_radius` of `position`
    fn find_nearest_target(&self, position: Vec2, max_radius: f32) -> Option<PlayerId>;

    /// Visit live enemies of `kind` whose cells overlap the query circle.
    /// Callers filter by exact distance.
    fn for_each_nearby(
        &self,
        kind: EnemyKind,
        position: Vec2,
        radius: f32,
        visit: &mut dyn FnMut(EntityId, Vec2),
    );
}

/// Live enemy as seen by projectile behaviors
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnemySnapshot {
    pub id: EntityId,
    pub position: Vec2,
    pub radius: f32,
}

/// Mutable surface used by projectiles and their behaviors
pub trait CombatWorld {
    /// Position of a live enemy
    fn enemy_position(&self, id: EntityId) -> Option<Vec2>;

    /// Live enemies whose centers lie within `radius` of `center`,
    /// sorted by ascending distance (ties by id)
    fn enemies_within(&self, center: Vec2, radius: f32) -> Vec<EnemySnapshot>;

    /// Apply damage; returns true if this killed the enemy
    fn damage_enemy(&mut self, id: EntityId, amount: f32) -> bool;

    /// Fire-and-forget presentation event
    fn emit(&self, event: GameEvent);

    /// Nearest live enemy within `radius`, skipping `exclude`
    fn nearest_enemy(
        &self,
        position: Vec2,
        radius: f32,
        exclude: &[EntityId],
    ) -> Option<EnemySnapshot> {
        self.enemies_within(position, radius)
            .into_iter()
            .find(|e| !exclude.contains(&e.id))
    }
}

/// Sort snapshots by distance from `center`, ties broken by id
pub fn sort_by_distance(center: Vec2, enemies: &mut [EnemySnapshot]) {
    enemies.sort_by(|a, b| {
        a.position
            .distance_sq_to(center)
            .partial_cmp(&b.position.distance_sq_to(center))
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.id.cmp(&b.id))
    });
}
