//! Projectile bodies, hit resolution and per-tick stepping
//!
//! A projectile is a plain body plus the `BehaviorComposer` it owns. All
//! special capabilities come from the composer; this module only moves
//! bodies, detects overlaps and routes hit and death events through it.

use rustc_hash::FxHashSet;
use tracing::warn;

use crate::game::behaviors::{BehaviorComposer, DeathContext};
use crate::game::constants::{projectile as consts, sim};
use crate::game::state::{EntityId, GameState};
use crate::game::world::CombatWorld;
use crate::metrics::SimMetrics;
use crate::util::vec2::Vec2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Faction {
    /// Fired by players, collides with enemies
    #[default]
    Player,
    /// Fired by enemies, collides with players
    Enemy,
}

/// Shared projectile state that behavior units read and modify
#[derive(Debug, Clone, Default)]
pub struct ProjectileBody {
    pub id: EntityId,
    pub faction: Faction,
    pub position: Vec2,
    pub velocity: Vec2,
    pub radius: f32,
    pub damage: f32,
    /// Seconds left before expiry
    pub lifetime: f32,
    /// Lifetime at spawn; ricochets reset to this
    pub max_lifetime: f32,
    pub dead: bool,
}

/// Result of routing one overlap through the composer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitOutcome {
    /// Vetoed by behaviors or already hit
    Rejected,
    /// Damage applied and a behavior kept the projectile alive
    Pierced,
    /// Damage applied, projectile died, then a behavior revived it
    Revived,
    /// Damage applied and the projectile is dead
    Died,
}

impl HitOutcome {
    pub fn applied_damage(&self) -> bool {
        !matches!(self, HitOutcome::Rejected)
    }
}

#[derive(Debug)]
pub struct Projectile {
    pub body: ProjectileBody,
    pub behaviors: BehaviorComposer,
    /// Enemies this projectile already damaged; never hit twice
    hit_ids: FxHashSet<EntityId>,
}

impl Projectile {
    pub fn new(body: ProjectileBody, behaviors: BehaviorComposer) -> Self {
        Self {
            body,
            behaviors,
            hit_ids: FxHashSet::default(),
        }
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        !self.body.dead
    }

    pub fn has_hit(&self, target: EntityId) -> bool {
        self.hit_ids.contains(&target)
    }

    /// Handle an overlap with `target`: on_hit veto, damage, then death or pierce.
    /// Targets killed earlier in the same pass are rejected without hooks.
    pub fn resolve_hit(&mut self, target: EntityId, world: &mut dyn CombatWorld) -> HitOutcome {
        if self.body.dead || self.hit_ids.contains(&target) || world.enemy_position(target).is_none() {
            return HitOutcome::Rejected;
        }
        if !self.behaviors.on_hit(&self.body, target, world) {
            return HitOutcome::Rejected;
        }

        self.hit_ids.insert(target);
        world.damage_enemy(target, self.body.damage);

        if self.behaviors.prevents_death(&self.body, target, world) {
            return HitOutcome::Pierced;
        }
        if self.die(Some(target), world) {
            HitOutcome::Revived
        } else {
            HitOutcome::Died
        }
    }

    /// Run death hooks. Returns true if a behavior revived the projectile.
    pub fn die(&mut self, target: Option<EntityId>, world: &mut dyn CombatWorld) -> bool {
        let death = DeathContext {
            position: self.body.position,
            target,
        };
        if self.behaviors.on_death(&mut self.body, &death, world) {
            // Earlier victims become valid again; the one just hit does not
            self.hit_ids.retain(|id| Some(*id) == target);
            self.body.dead = false;
            true
        } else {
            self.body.dead = true;
            false
        }
    }

    /// Remove without running hooks
    pub fn discard(&mut self) {
        self.body.dead = true;
    }
}

/// Spawn request queued on the arena by AI attacks or the driver
#[derive(Debug)]
pub struct ProjectileSpawn {
    pub faction: Faction,
    pub position: Vec2,
    pub velocity: Vec2,
    pub damage: f32,
    pub radius: f32,
    pub lifetime: f32,
    pub behaviors: BehaviorComposer,
}

impl ProjectileSpawn {
    /// Plain enemy shot with no behaviors
    pub fn enemy_shot(position: Vec2, direction: Vec2, speed: f32, damage: f32) -> Self {
        Self {
            faction: Faction::Enemy,
            position,
            velocity: direction.normalize() * speed,
            damage,
            radius: consts::RADIUS,
            lifetime: consts::LIFETIME,
            behaviors: BehaviorComposer::new(),
        }
    }

    pub fn into_projectile(self, id: EntityId) -> Projectile {
        Projectile::new(
            ProjectileBody {
                id,
                faction: self.faction,
                position: self.position,
                velocity: self.velocity,
                radius: self.radius,
                damage: self.damage,
                lifetime: self.lifetime,
                max_lifetime: self.lifetime,
                dead: false,
            },
            self.behaviors,
        )
    }
}

/// Per-tick counters from one projectile pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProjectileStepStats {
    pub hits: u64,
    pub revived: u64,
    pub sanitized: u64,
    pub removed: u64,
}

/// Update behaviors, move, collide and expire every projectile.
/// Dead projectiles are dropped at the end of the pass.
pub fn step_projectiles(
    projectiles: &mut Vec<Projectile>,
    state: &mut GameState,
    dt: f32,
    metrics: &SimMetrics,
) -> ProjectileStepStats {
    let mut stats = ProjectileStepStats::default();

    for projectile in projectiles.iter_mut() {
        if projectile.body.dead {
            continue;
        }

        projectile.behaviors.update(&mut projectile.body, dt, &*state);

        let body = &mut projectile.body;
        body.position += body.velocity * dt;
        body.lifetime -= dt;

        if !body.position.is_finite() || !body.velocity.is_finite() {
            warn!(
                projectile = body.id,
                position = ?body.position,
                velocity = ?body.velocity,
                "Removing projectile with non-finite motion"
            );
            projectile.discard();
            stats.sanitized += 1;
            continue;
        }

        match projectile.body.faction {
            Faction::Player => collide_with_enemies(projectile, state, &mut stats),
            Faction::Enemy => collide_with_players(projectile, state, &mut stats),
        }

        if projectile.is_alive()
            && (projectile.body.lifetime <= 0.0
                || !state.in_bounds(projectile.body.position, sim::OFFSCREEN_MARGIN))
            && projectile.die(None, state)
        {
            stats.revived += 1;
        }
    }

    let before = projectiles.len();
    projectiles.retain(Projectile::is_alive);
    stats.removed = (before - projectiles.len()) as u64;

    SimMetrics::add(&metrics.projectile_hits, stats.hits);
    SimMetrics::add(&metrics.projectiles_revived, stats.revived);
    SimMetrics::add(&metrics.sanitized_projectiles, stats.sanitized);

    stats
}

fn collide_with_enemies(projectile: &mut Projectile, state: &mut GameState, stats: &mut ProjectileStepStats) {
    let reach = projectile.body.radius + consts::MAX_ENEMY_RADIUS;
    let candidates = state.enemies_within(projectile.body.position, reach);

    for enemy in candidates {
        let touch = projectile.body.radius + enemy.radius;
        if enemy.position.distance_sq_to(projectile.body.position) > touch * touch {
            continue;
        }
        let outcome = projectile.resolve_hit(enemy.id, state);
        if outcome.applied_damage() {
            stats.hits += 1;
        }
        match outcome {
            HitOutcome::Rejected | HitOutcome::Pierced => {}
            HitOutcome::Revived => {
                stats.revived += 1;
                break;
            }
            HitOutcome::Died => break,
        }
    }
}

fn collide_with_players(projectile: &mut Projectile, state: &mut GameState, stats: &mut ProjectileStepStats) {
    let touch = projectile.body.radius + consts::PLAYER_HIT_RADIUS;
    let position = projectile.body.position;
    let hit = state
        .players
        .values()
        .filter(|p| p.alive && p.position.distance_sq_to(position) <= touch * touch)
        .min_by(|a, b| {
            a.position
                .distance_sq_to(position)
                .partial_cmp(&b.position.distance_sq_to(position))
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.id.cmp(&b.id))
        })
        .map(|p| p.id);

    if let Some(player_id) = hit {
        state.damage_player(player_id, projectile.body.damage);
        stats.hits += 1;
        if projectile.die(None, state) {
            stats.revived += 1;
        }
    }
}
