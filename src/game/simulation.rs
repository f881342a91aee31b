//! Reference tick driver
//!
//! Order per tick: grid rebuild, AI decide (optionally on the rayon pool),
//! AI apply, enemy integration, player fire, projectile step, spawn and
//! despawn bookkeeping, metrics.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::config::SimConfig;
use crate::game::behaviors::composer::BehaviorComposer;
use crate::game::constants::projectile as consts;
use crate::game::events::EventSink;
use crate::game::state::{AttackClass, EnemyKind, EntityId, GameState, PlayerId};
use crate::game::systems::ai::{AiDecision, AiManager, ContactStrike};
use crate::game::systems::projectile::{step_projectiles, Faction, Projectile, ProjectileSpawn};
use crate::game::world::CombatWorld;
use crate::metrics::SimMetrics;
use crate::util::vec2::Vec2;

/// Players auto-target enemies within this distance
const PLAYER_TARGET_RANGE: f32 = 600.0;

/// Boss pattern names, two per phase
const BOSS_PATTERNS: [&str; 8] = [
    "aimed_burst",
    "slow_spread",
    "ring",
    "double_spread",
    "spiral",
    "cross_ring",
    "bullet_hell",
    "death_spiral",
];

/// Kinds rolled for regular spawns
const SPAWN_KINDS: [EnemyKind; 6] = [
    EnemyKind::Basic,
    EnemyKind::Fast,
    EnemyKind::Tank,
    EnemyKind::Ranged,
    EnemyKind::Dasher,
    EnemyKind::Exploder,
];

/// What happened during one tick
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickSummary {
    pub tick: u64,
    pub decisions: u64,
    pub attacks: u64,
    pub phase_changes: u64,
    pub projectiles_spawned: u64,
    pub projectile_hits: u64,
    pub enemies_killed: u64,
}

pub struct Simulation {
    state: GameState,
    projectiles: Vec<Projectile>,
    ai: AiManager,
    rng: StdRng,
    config: SimConfig,
    metrics: Arc<SimMetrics>,
    fire_timer: f32,
}

impl Simulation {
    pub fn new(config: SimConfig, events: EventSink) -> Self {
        Self::with_metrics(config, events, Arc::new(SimMetrics::new()))
    }

    pub fn with_metrics(config: SimConfig, events: EventSink, metrics: Arc<SimMetrics>) -> Self {
        let world_size = Vec2::new(config.world_width, config.world_height);
        Self {
            state: GameState::new(world_size, events),
            projectiles: Vec::new(),
            ai: AiManager::with_tunings(config.tunings.clone()),
            rng: StdRng::seed_from_u64(config.seed),
            config,
            metrics,
            fire_timer: 0.0,
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut GameState {
        &mut self.state
    }

    pub fn ai(&self) -> &AiManager {
        &self.ai
    }

    pub fn ai_mut(&mut self) -> &mut AiManager {
        &mut self.ai
    }

    pub fn projectiles(&self) -> &[Projectile] {
        &self.projectiles
    }

    pub fn metrics(&self) -> &Arc<SimMetrics> {
        &self.metrics
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Players in the middle of the world, enemies scattered around them and
    /// an optional boss at the top edge
    pub fn populate(&mut self) {
        let center = self.state.world_size * 0.5;
        for i in 0..self.config.player_count {
            let offset = Vec2::from_angle(i as f32 * std::f32::consts::TAU / self.config.player_count as f32);
            let spread = if self.config.player_count > 1 { 60.0 } else { 0.0 };
            self.state.add_player(center + offset * spread);
        }

        for _ in 0..self.config.enemy_count {
            let kind = SPAWN_KINDS[self.rng.gen_range(0..SPAWN_KINDS.len())];
            let position = Vec2::new(
                self.rng.gen_range(0.0..self.config.world_width),
                self.rng.gen_range(0.0..self.config.world_height),
            );
            self.spawn_enemy(kind, position);
        }

        if self.config.spawn_boss {
            let position = Vec2::new(center.x, self.config.world_height * 0.1);
            self.spawn_boss(position, BOSS_PATTERNS.iter().map(|s| s.to_string()).collect());
        }
    }

    pub fn add_player(&mut self, position: Vec2) -> PlayerId {
        self.state.add_player(position)
    }

    /// Spawn an enemy and give it a controller. Melee kinds get a contact
    /// strike; everything else fires plain shots.
    pub fn spawn_enemy(&mut self, kind: EnemyKind, position: Vec2) -> EntityId {
        let id = self.state.spawn_enemy(kind, position);
        self.register(id);
        id
    }

    pub fn spawn_boss(&mut self, position: Vec2, attack_patterns: Vec<String>) -> EntityId {
        let id = self.state.spawn_boss(position, attack_patterns);
        self.register(id);
        id
    }

    fn register(&mut self, id: EntityId) {
        let seed = self.rng.gen::<u64>();
        let Some(enemy) = self.state.get_enemy(id) else {
            return;
        };
        let melee = enemy.attack_class == AttackClass::Melee;
        self.ai.register(enemy, seed);
        if melee {
            self.ai.set_abilities(id, Box::new(ContactStrike::default()));
        }
    }

    /// Queue a projectile for the next bookkeeping step
    pub fn queue_projectile(&mut self, spawn: ProjectileSpawn) {
        self.state.queue_projectile(spawn);
    }

    /// Materialize a projectile immediately
    pub fn spawn_projectile(&mut self, spawn: ProjectileSpawn) -> EntityId {
        let id = self.state.next_entity_id();
        self.projectiles.push(spawn.into_projectile(id));
        self.metrics.projectiles_spawned.fetch_add(1, Ordering::Relaxed);
        id
    }

    /// Fire a player projectile carrying the configured loadout
    pub fn fire_player_projectile(&mut self, player: PlayerId, direction: Vec2) -> Option<EntityId> {
        let origin = self.state.get_player(player).filter(|p| p.alive)?.position;
        let direction = direction.normalize();
        if direction == Vec2::ZERO {
            return None;
        }
        let spawn = ProjectileSpawn {
            faction: Faction::Player,
            position: origin,
            velocity: direction * consts::PLAYER_SPEED,
            damage: consts::PLAYER_DAMAGE,
            radius: consts::RADIUS,
            lifetime: consts::LIFETIME,
            behaviors: BehaviorComposer::from_configs(&self.config.loadout),
        };
        Some(self.spawn_projectile(spawn))
    }

    /// Run the decision pass over the current state without applying it
    pub fn decide(&mut self, dt: f32) -> Vec<(EntityId, AiDecision)> {
        self.ai.decide(&self.state, dt, self.config.parallel_ai)
    }

    /// Advance the simulation by `dt` seconds
    pub fn tick(&mut self, dt: f32) -> TickSummary {
        let start = Instant::now();
        self.state.tick += 1;
        let mut summary = TickSummary {
            tick: self.state.tick,
            ..TickSummary::default()
        };

        // AI reads the pre-tick snapshot; every write happens in apply
        self.state.rebuild_grid();
        let decisions = self.decide(dt);
        summary.decisions = decisions.len() as u64;
        SimMetrics::add(&self.metrics.ai_decisions, summary.decisions);
        let applied = self.ai.apply(decisions, &mut self.state, &self.metrics);
        summary.attacks = applied.attacks;
        summary.phase_changes = applied.phase_changes;

        self.state.integrate_enemies(dt);
        self.state.rebuild_grid();

        if self.config.player_autofire {
            summary.projectiles_spawned += self.autofire(dt);
        }

        let stepped = step_projectiles(&mut self.projectiles, &mut self.state, dt, &self.metrics);
        summary.projectile_hits = stepped.hits;

        for spawn in self.state.take_pending_projectiles() {
            self.spawn_projectile(spawn);
            summary.projectiles_spawned += 1;
        }

        let dead = self.state.remove_dead_enemies();
        for id in &dead {
            self.ai.unregister(*id);
        }
        summary.enemies_killed = dead.len() as u64;
        SimMetrics::add(&self.metrics.enemies_killed, summary.enemies_killed);

        self.update_gauges();
        self.metrics.record_tick_time(start.elapsed());

        if summary.phase_changes > 0 || summary.enemies_killed > 0 {
            debug!(
                tick = summary.tick,
                killed = summary.enemies_killed,
                phase_changes = summary.phase_changes,
                "Tick events"
            );
        }

        summary
    }

    /// Fire at the nearest enemy from every live player once per interval
    fn autofire(&mut self, dt: f32) -> u64 {
        self.fire_timer += dt;
        if self.fire_timer < consts::PLAYER_FIRE_INTERVAL {
            return 0;
        }
        self.fire_timer = 0.0;

        let mut shooters: Vec<(PlayerId, Vec2)> = self
            .state
            .players
            .values()
            .filter(|p| p.alive)
            .map(|p| (p.id, p.position))
            .collect();
        shooters.sort_unstable_by_key(|(id, _)| *id);

        let mut fired = 0;
        for (player, position) in shooters {
            let Some(target) = self.state.nearest_enemy(position, PLAYER_TARGET_RANGE, &[]) else {
                continue;
            };
            if self
                .fire_player_projectile(player, position.direction_to(target.position))
                .is_some()
            {
                fired += 1;
            }
        }
        fired
    }

    fn update_gauges(&self) {
        let (alive, bosses) = self
            .state
            .enemies
            .values()
            .filter(|e| e.is_alive())
            .fold((0u64, 0u64), |(a, b), e| (a + 1, b + e.is_boss as u64));
        let players = self.state.players.values().filter(|p| p.alive).count() as u64;

        self.metrics.enemies_alive.store(alive, Ordering::Relaxed);
        self.metrics.bosses_alive.store(bosses, Ordering::Relaxed);
        self.metrics.players_alive.store(players, Ordering::Relaxed);
        self.metrics
            .projectiles_alive
            .store(self.projectiles.len() as u64, Ordering::Relaxed);
    }
}
