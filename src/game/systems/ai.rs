//! Enemy AI controllers
//!
//! One `AiController` per enemy drives a five-state machine
//! (idle, pursuing, attacking, retreating, special). Controllers only read the
//! world, so the manager can run every decision in parallel against the
//! pre-tick snapshot and then apply the results sequentially in id order.

use hashbrown::HashMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;
use tracing::{debug, trace, warn};

use crate::game::constants::{ai::*, boss as boss_consts, range};
use crate::game::events::GameEvent;
use crate::game::state::{Enemy, EnemyKind, EntityId, GameState, PlayerId};
use crate::game::systems::avoidance::AvoidanceSolver;
use crate::game::systems::boss::BossPhaseManager;
use crate::game::systems::projectile::ProjectileSpawn;
use crate::game::systems::tuning::{AiTuning, TuningTable};
use crate::game::world::AiWorld;
use crate::metrics::SimMetrics;
use crate::util::vec2::Vec2;

/// AI state machine states
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiState {
    #[default]
    Idle,
    Pursuing,
    Attacking,
    Retreating,
    Special,
}

/// An attack the controller decided to make this tick
#[derive(Debug, Clone, PartialEq)]
pub struct AttackRequest {
    pub enemy: EntityId,
    pub origin: Vec2,
    pub target: PlayerId,
    pub target_position: Vec2,
    /// Unit vector toward the target (zero if coincident)
    pub direction: Vec2,
    /// Boss attack pattern picked for this attack
    pub pattern_index: Option<usize>,
    pub damage: f32,
    pub projectile_speed: f32,
}

/// A special move started this tick
#[derive(Debug, Clone, PartialEq)]
pub struct SpecialRequest {
    pub enemy: EntityId,
    pub target: PlayerId,
    pub target_position: Vec2,
}

/// Output of one controller update, applied to the world afterwards
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AiDecision {
    pub movement: Vec2,
    pub attack: Option<AttackRequest>,
    pub special: Option<SpecialRequest>,
    /// Boss phases entered this tick, in order
    pub phase_changes: SmallVec<[u8; 3]>,
    pub state: AiState,
}

/// Executes attacks and special moves for an enemy.
///
/// Enemies without abilities fall back to a plain projectile.
pub trait EnemyAbilities: fmt::Debug + Send {
    fn perform_attack(&mut self, state: &mut GameState, request: &AttackRequest);

    fn begin_special(&mut self, _state: &mut GameState, _request: &SpecialRequest) {}
}

/// Melee abilities: damage the target directly if it is still within reach
#[derive(Debug, Clone)]
pub struct ContactStrike {
    pub reach: f32,
}

impl Default for ContactStrike {
    fn default() -> Self {
        Self {
            reach: range::MELEE * ATTACK_EXIT_RANGE_FACTOR,
        }
    }
}

impl EnemyAbilities for ContactStrike {
    fn perform_attack(&mut self, state: &mut GameState, request: &AttackRequest) {
        let Some(position) = state.target_position(request.target) else {
            return;
        };
        if position.distance_to(request.origin) <= self.reach {
            state.damage_player(request.target, request.damage);
        }
    }
}

/// Per-enemy finite-state AI
#[derive(Debug, Clone)]
pub struct AiController {
    id: EntityId,
    kind: EnemyKind,
    state: AiState,
    /// Seconds since the last transition
    state_timer: f32,
    target: Option<PlayerId>,
    target_update_timer: f32,
    target_update_interval: f32,
    attack_timer: f32,
    attack_cooldown: f32,
    time_since_attack: f32,
    wander_heading: Vec2,
    last_direction: Vec2,
    has_retreated: bool,
    avoidance: AvoidanceSolver,
    boss: Option<BossPhaseManager>,
    tuning: AiTuning,
    rng: StdRng,
}

impl AiController {
    /// Timers start at random points inside their tuned ranges so enemies
    /// spawned together do not all re-target on the same tick.
    pub fn new(enemy: &Enemy, tuning: AiTuning, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);

        let target_update_interval = if tuning.target_update_max > tuning.target_update_min {
            rng.gen_range(tuning.target_update_min..tuning.target_update_max)
        } else {
            tuning.target_update_min
        };
        let target_update_timer = rng.gen_range(0.0..target_update_interval.max(f32::EPSILON));
        let attack_cooldown = tuning.attack_cooldown * (1.0 + rng.gen_range(-COOLDOWN_JITTER..=COOLDOWN_JITTER));
        let attack_timer = rng.gen_range(0.0..attack_cooldown.max(f32::EPSILON));
        let avoidance = AvoidanceSolver::new(
            tuning.separation_radius,
            (tuning.avoidance_interval_min, tuning.avoidance_interval_max),
            &mut rng,
        );

        Self {
            id: enemy.id,
            kind: enemy.kind,
            state: AiState::Idle,
            state_timer: 0.0,
            target: None,
            target_update_timer,
            target_update_interval,
            attack_timer,
            attack_cooldown,
            time_since_attack: 0.0,
            wander_heading: Vec2::ZERO,
            last_direction: Vec2::ZERO,
            has_retreated: false,
            avoidance,
            boss: enemy.is_boss.then(BossPhaseManager::new),
            tuning,
            rng,
        }
    }

    /// Swap the default phase table for a boss
    pub fn with_boss_phases(mut self, boss: BossPhaseManager) -> Self {
        if self.boss.is_some() {
            self.boss = Some(boss);
        }
        self
    }

    #[inline]
    pub fn id(&self) -> EntityId {
        self.id
    }

    #[inline]
    pub fn state(&self) -> AiState {
        self.state
    }

    pub fn state_timer(&self) -> f32 {
        self.state_timer
    }

    pub fn target(&self) -> Option<PlayerId> {
        self.target
    }

    pub fn attack_timer(&self) -> f32 {
        self.attack_timer
    }

    pub fn attack_cooldown(&self) -> f32 {
        self.attack_cooldown
    }

    pub fn target_update_interval(&self) -> f32 {
        self.target_update_interval
    }

    pub fn tuning(&self) -> &AiTuning {
        &self.tuning
    }

    pub fn boss(&self) -> Option<&BossPhaseManager> {
        self.boss.as_ref()
    }

    /// Boss phase, 1 for non-bosses
    pub fn phase(&self) -> u8 {
        self.boss.as_ref().map_or(1, BossPhaseManager::phase)
    }

    /// Drop the current target. Re-acquisition waits a full interval.
    pub fn clear_target(&mut self) {
        self.target = None;
        self.target_update_timer = 0.0;
    }

    /// Force a target, bypassing the re-acquisition cadence
    pub fn set_target(&mut self, target: PlayerId) {
        self.target = Some(target);
        self.target_update_timer = 0.0;
    }

    /// Break off and back away from the target
    pub fn retreat(&mut self) {
        self.has_retreated = true;
        self.transition(AiState::Retreating);
    }

    /// Fall back to idle after a fault
    pub fn reset_to_idle(&mut self) {
        self.last_direction = Vec2::ZERO;
        self.transition(AiState::Idle);
    }

    fn transition(&mut self, next: AiState) {
        if next != self.state {
            trace!(enemy = self.id, from = ?self.state, to = ?next, "AI transition");
            self.state = next;
        }
        self.state_timer = 0.0;
    }

    fn is_aggressive(&self) -> bool {
        self.tuning.aggressive || self.boss.as_ref().map_or(false, BossPhaseManager::is_aggressive)
    }

    fn specials_enabled(&self) -> bool {
        self.tuning.special_eligible || self.boss.as_ref().map_or(false, BossPhaseManager::specials_unlocked)
    }

    /// Advance timers and run one tick of the state machine
    pub fn update<W: AiWorld + ?Sized>(&mut self, dt: f32, enemy: &Enemy, world: &W) -> AiDecision {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        self.state_timer += dt;
        self.attack_timer += dt;
        self.time_since_attack += dt;
        self.target_update_timer += dt;

        let mut decision = AiDecision::default();

        if let Some(boss) = self.boss.as_mut() {
            if let Some(entered) = boss.check_phase(enemy.health_ratio()) {
                for phase in entered {
                    self.attack_cooldown *= boss.cooldown_factor(phase);
                    debug!(enemy = self.id, phase, cooldown = self.attack_cooldown, "Boss phase change");
                    decision.phase_changes.push(phase);
                }
            }
        }

        // Target validity every tick, re-acquisition on the slower cadence
        if let Some(target) = self.target {
            if !world.is_target_valid(target) {
                self.target = None;
            }
        }
        if self.target_update_timer >= self.target_update_interval {
            self.target_update_timer = 0.0;
            self.target = world.find_nearest_target(enemy.position, self.tuning.max_target_distance);
        }

        let target_position = self.target.and_then(|t| world.target_position(t));
        if target_position.is_none() {
            self.target = None;
        }

        if let Some(ratio) = self.tuning.retreat_health_ratio {
            let engaged = matches!(self.state, AiState::Pursuing | AiState::Attacking);
            if engaged && !self.has_retreated && target_position.is_some() && enemy.health_ratio() <= ratio {
                self.retreat();
            }
        }

        let direction = self.run_state(dt, enemy, target_position, &mut decision);
        self.last_direction = direction;

        // A special holds position; separation would turn the hold into a drift
        decision.movement = if self.state == AiState::Special {
            direction
        } else {
            self.avoidance
                .apply(dt, self.id, self.kind, enemy.position, direction, world)
        };
        decision.state = self.state;
        decision
    }

    fn run_state(
        &mut self,
        dt: f32,
        enemy: &Enemy,
        target_position: Option<Vec2>,
        decision: &mut AiDecision,
    ) -> Vec2 {
        let to_target = target_position.map(|p| (enemy.position.direction_to(p), enemy.position.distance_to(p)));

        match self.state {
            AiState::Idle => {
                if let Some((dir, distance)) = to_target {
                    let in_aggro = self.tuning.aggro_radius > 0.0 && distance <= self.tuning.aggro_radius;
                    if self.is_aggressive() || in_aggro {
                        self.transition(AiState::Pursuing);
                        return self.pursuit_direction(dt, distance, dir);
                    }
                }
                if self.state_timer >= WANDER_INTERVAL || self.wander_heading == Vec2::ZERO {
                    self.state_timer = 0.0;
                    self.wander_heading = Vec2::from_angle(self.rng.gen_range(0.0..std::f32::consts::TAU));
                }
                self.wander_heading * WANDER_SPEED
            }

            AiState::Pursuing => {
                let Some((dir, distance)) = to_target else {
                    self.transition(AiState::Idle);
                    return Vec2::ZERO;
                };

                if distance <= self.tuning.attack_range {
                    self.transition(AiState::Attacking);
                    return self.attack_positioning(distance, dir);
                }

                let special_window = (SPECIAL_MIN_DISTANCE..=SPECIAL_MAX_DISTANCE).contains(&distance)
                    && self.time_since_attack > SPECIAL_MIN_IDLE_TIME
                    && self.specials_enabled();
                if special_window && self.rng.gen::<f32>() < SPECIAL_CHANCE {
                    if let (Some(target), Some(target_position)) = (self.target, target_position) {
                        self.time_since_attack = 0.0;
                        self.transition(AiState::Special);
                        decision.special = Some(SpecialRequest {
                            enemy: self.id,
                            target,
                            target_position,
                        });
                        return Vec2::ZERO;
                    }
                }

                self.pursuit_direction(dt, distance, dir)
            }

            AiState::Attacking => {
                let Some((dir, distance)) = to_target else {
                    self.transition(AiState::Idle);
                    return Vec2::ZERO;
                };

                if distance > self.tuning.attack_range * ATTACK_EXIT_RANGE_FACTOR {
                    self.transition(AiState::Pursuing);
                    return self.pursuit_direction(dt, distance, dir);
                }

                let movement = self.attack_positioning(distance, dir);

                if self.attack_timer >= self.attack_cooldown {
                    self.attack_timer = 0.0;
                    self.time_since_attack = 0.0;
                    if let (Some(target), Some(target_position)) = (self.target, target_position) {
                        let pattern_index = match self.boss.as_mut() {
                            Some(boss) => boss.select_attack_pattern(enemy.attack_patterns.len(), &mut self.rng),
                            None => None,
                        };
                        decision.attack = Some(AttackRequest {
                            enemy: self.id,
                            origin: enemy.position,
                            target,
                            target_position,
                            direction: dir,
                            pattern_index,
                            damage: enemy.damage,
                            projectile_speed: enemy.projectile_speed,
                        });
                    }
                }

                movement
            }

            AiState::Retreating => {
                let away = to_target.map_or(Vec2::ZERO, |(dir, _)| -dir);
                if self.state_timer >= RETREAT_DURATION {
                    self.transition(AiState::Pursuing);
                }
                away
            }

            AiState::Special => {
                if self.state_timer >= SPECIAL_DURATION {
                    self.transition(AiState::Pursuing);
                }
                Vec2::ZERO
            }
        }
    }

    fn pursuit_direction(&mut self, dt: f32, distance: f32, dir: Vec2) -> Vec2 {
        match self.boss.as_mut() {
            Some(boss) => boss.movement_bias(dt, distance, dir, &mut self.rng),
            None => dir,
        }
    }

    /// Hold around the optimal distance with a dead band to avoid jitter
    fn attack_positioning(&self, distance: f32, dir: Vec2) -> Vec2 {
        let optimal = self.tuning.attack_range * OPTIMAL_DISTANCE_FACTOR;
        let band = optimal * HYSTERESIS_BAND;
        if distance < optimal - band {
            -dir * BACK_AWAY_SCALE
        } else if distance > optimal + band {
            dir * CLOSE_IN_SCALE
        } else {
            self.last_direction * IN_BAND_DAMPING
        }
    }
}

/// Counters from one apply pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ApplyStats {
    pub attacks: u64,
    pub specials: u64,
    pub phase_changes: u64,
    pub sanitized: u64,
}

/// Owns every controller and the optional abilities per enemy
#[derive(Debug, Default)]
pub struct AiManager {
    controllers: HashMap<EntityId, AiController>,
    abilities: HashMap<EntityId, Box<dyn EnemyAbilities>>,
    tunings: TuningTable,
}

impl AiManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tunings(tunings: TuningTable) -> Self {
        Self {
            tunings,
            ..Self::default()
        }
    }

    pub fn tunings(&self) -> &TuningTable {
        &self.tunings
    }

    /// Create a controller for `enemy` from the kind's tuning
    pub fn register(&mut self, enemy: &Enemy, seed: u64) {
        let tuning = self.tunings.get(enemy.kind);
        self.register_controller(AiController::new(enemy, tuning, seed));
    }

    pub fn register_controller(&mut self, controller: AiController) {
        self.controllers.insert(controller.id(), controller);
    }

    pub fn set_abilities(&mut self, id: EntityId, abilities: Box<dyn EnemyAbilities>) {
        self.abilities.insert(id, abilities);
    }

    pub fn unregister(&mut self, id: EntityId) {
        self.controllers.remove(&id);
        self.abilities.remove(&id);
    }

    pub fn get(&self, id: EntityId) -> Option<&AiController> {
        self.controllers.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut AiController> {
        self.controllers.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }

    /// Run every live enemy's controller against the current state.
    ///
    /// Decisions only read `state`, so running them in parallel gives the same
    /// result as running them in order. The result is sorted by enemy id.
    pub fn decide(&mut self, state: &GameState, dt: f32, parallel: bool) -> Vec<(EntityId, AiDecision)> {
        let step = |(&id, controller): (&EntityId, &mut AiController)| {
            let enemy = state.enemies.get(&id).filter(|e| e.is_alive())?;
            Some((id, controller.update(dt, enemy, state)))
        };

        let mut decisions: Vec<(EntityId, AiDecision)> = if parallel {
            self.controllers.par_iter_mut().filter_map(step).collect()
        } else {
            self.controllers.iter_mut().filter_map(step).collect()
        };
        decisions.sort_unstable_by_key(|(id, _)| *id);
        decisions
    }

    /// Write decisions back to the world: movement, presentation events,
    /// specials and attacks.
    pub fn apply(
        &mut self,
        decisions: Vec<(EntityId, AiDecision)>,
        state: &mut GameState,
        metrics: &SimMetrics,
    ) -> ApplyStats {
        let mut stats = ApplyStats::default();

        for (id, decision) in decisions {
            let Some(enemy) = state.get_enemy_mut(id) else {
                continue;
            };

            if decision.movement.is_finite() {
                enemy.movement = decision.movement;
            } else {
                warn!(enemy = id, movement = ?decision.movement, "Zeroing non-finite AI movement");
                enemy.movement = Vec2::ZERO;
                if let Some(controller) = self.controllers.get_mut(&id) {
                    controller.reset_to_idle();
                }
                stats.sanitized += 1;
            }
            let position = enemy.position;

            for &phase in &decision.phase_changes {
                stats.phase_changes += 1;
                state.events().emit(GameEvent::PhaseChanged { enemy_id: id, phase });
                state.events().emit(GameEvent::FloatingText {
                    text: format!("PHASE {phase}"),
                    position,
                    color: boss_consts::PHASE_TEXT_COLOR,
                    size: boss_consts::PHASE_TEXT_SIZE,
                });
                state.events().emit(GameEvent::ScreenShake {
                    intensity: boss_consts::PHASE_SHAKE_INTENSITY,
                    duration: boss_consts::PHASE_SHAKE_DURATION,
                });
            }

            if let Some(special) = &decision.special {
                stats.specials += 1;
                state.events().emit(GameEvent::SpecialStarted {
                    enemy_id: id,
                    target_id: special.target,
                });
                if let Some(abilities) = self.abilities.get_mut(&id) {
                    abilities.begin_special(state, special);
                }
            }

            if let Some(attack) = &decision.attack {
                stats.attacks += 1;
                match self.abilities.get_mut(&id) {
                    Some(abilities) => abilities.perform_attack(state, attack),
                    None => state.queue_projectile(ProjectileSpawn::enemy_shot(
                        attack.origin,
                        attack.direction,
                        attack.projectile_speed,
                        attack.damage,
                    )),
                }
            }
        }

        SimMetrics::add(&metrics.attacks_dispatched, stats.attacks);
        SimMetrics::add(&metrics.specials_started, stats.specials);
        SimMetrics::add(&metrics.phase_changes, stats.phase_changes);
        SimMetrics::add(&metrics.sanitized_movements, stats.sanitized);

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::events::EventSink;

    const DT: f32 = 1.0 / 60.0;

    fn controller_for(state: &GameState, id: EntityId, seed: u64) -> AiController {
        let enemy = state.get_enemy(id).unwrap();
        AiController::new(enemy, AiTuning::for_kind(enemy.kind), seed)
    }

    fn tick(controller: &mut AiController, state: &mut GameState, id: EntityId) -> AiDecision {
        state.rebuild_grid();
        let enemy = state.get_enemy(id).unwrap().clone();
        controller.update(DT, &enemy, state)
    }

    #[test]
    fn test_scenario_pursue_attack_fire_then_idle() {
        let mut state = GameState::default();
        let player = state.add_player(Vec2::new(1000.0, 1000.0));
        let enemy = state.spawn_enemy(EnemyKind::Basic, Vec2::new(1500.0, 1000.0));
        let mut ai = controller_for(&state, enemy, 42);
        assert_eq!(ai.tuning().max_target_distance, 800.0);
        assert_eq!(ai.tuning().attack_range, 50.0);

        // Acquire within one re-target interval
        let mut ticks = 0;
        while ai.state() != AiState::Pursuing {
            tick(&mut ai, &mut state, enemy);
            ticks += 1;
            assert!(ticks < 60, "never acquired a target");
        }
        assert_eq!(ai.target(), Some(player));

        state.get_enemy_mut(enemy).unwrap().position = Vec2::new(1040.0, 1000.0);
        tick(&mut ai, &mut state, enemy);
        assert_eq!(ai.state(), AiState::Attacking);

        // Fires exactly when the timer crosses the cooldown
        let mut fired = None;
        for _ in 0..200 {
            let before = ai.attack_timer() + DT;
            let decision = tick(&mut ai, &mut state, enemy);
            if let Some(attack) = decision.attack {
                assert!(before >= ai.attack_cooldown());
                assert_eq!(ai.attack_timer(), 0.0);
                fired = Some(attack);
                break;
            }
            assert!(before < ai.attack_cooldown());
        }
        let attack = fired.expect("attack never fired");
        assert_eq!(attack.target, player);
        assert!(attack.direction.approx_eq(Vec2::new(-1.0, 0.0), 1e-5));

        ai.clear_target();
        let decision = tick(&mut ai, &mut state, enemy);
        assert_eq!(ai.state(), AiState::Idle);
        assert_eq!(decision.state, AiState::Idle);
    }

    #[test]
    fn test_target_update_timers_are_desynchronized() {
        let state = {
            let mut s = GameState::default();
            s.spawn_enemy(EnemyKind::Fast, Vec2::ZERO);
            s
        };
        let enemy = state.enemies.values().next().unwrap();
        let intervals: Vec<f32> = (0..100)
            .map(|seed| AiController::new(enemy, AiTuning::for_kind(EnemyKind::Fast), seed).target_update_interval())
            .collect();

        let min = intervals.iter().copied().fold(f32::MAX, f32::min);
        let max = intervals.iter().copied().fold(f32::MIN, f32::max);
        assert!(min >= TARGET_UPDATE_MIN && max < TARGET_UPDATE_MAX);
        assert!(min < 0.45, "min {min}");
        assert!(max > 0.65, "max {max}");

        let mut distinct = intervals.clone();
        distinct.sort_by(|a, b| a.partial_cmp(b).unwrap());
        distinct.dedup();
        assert!(distinct.len() > 90);
    }

    #[test]
    fn test_special_always_exits() {
        let mut state = GameState::default();
        let enemy = state.spawn_enemy(EnemyKind::Dasher, Vec2::ZERO);
        let mut ai = controller_for(&state, enemy, 1);
        ai.transition(AiState::Special);

        let mut elapsed = 0.0;
        while ai.state() == AiState::Special {
            tick(&mut ai, &mut state, enemy);
            elapsed += DT;
            assert!(elapsed <= SPECIAL_DURATION + 2.0 * DT);
        }
        // No target: special -> pursuing -> idle
        tick(&mut ai, &mut state, enemy);
        assert_eq!(ai.state(), AiState::Idle);
    }

    #[test]
    fn test_every_state_has_an_exit_without_target() {
        for start in [
            AiState::Idle,
            AiState::Pursuing,
            AiState::Attacking,
            AiState::Retreating,
            AiState::Special,
        ] {
            let mut state = GameState::default();
            let enemy = state.spawn_enemy(EnemyKind::Basic, Vec2::new(50.0, 50.0));
            let mut ai = controller_for(&state, enemy, 7);
            ai.transition(start);

            for _ in 0..200 {
                tick(&mut ai, &mut state, enemy);
            }
            assert_eq!(ai.state(), AiState::Idle, "stuck after starting in {start:?}");
        }
    }

    #[test]
    fn test_idle_wanders_without_target() {
        let mut state = GameState::default();
        let enemy = state.spawn_enemy(EnemyKind::Basic, Vec2::new(50.0, 50.0));
        let mut ai = controller_for(&state, enemy, 3);

        let decision = tick(&mut ai, &mut state, enemy);
        assert_eq!(decision.state, AiState::Idle);
        assert!((decision.movement.length() - WANDER_SPEED).abs() < 1e-4);
    }

    #[test]
    fn test_wander_heading_holds_until_interval() {
        let mut state = GameState::default();
        let enemy = state.spawn_enemy(EnemyKind::Basic, Vec2::new(50.0, 50.0));
        let mut ai = controller_for(&state, enemy, 21);

        tick(&mut ai, &mut state, enemy);
        let first = ai.wander_heading;
        assert_ne!(first, Vec2::ZERO);

        let mut elapsed = 0.0;
        while ai.wander_heading == first {
            let d = tick(&mut ai, &mut state, enemy);
            elapsed += DT;
            assert_eq!(d.state, AiState::Idle);
            assert!(elapsed <= WANDER_INTERVAL + 2.0 * DT, "heading never re-rolled");
        }
        assert!(elapsed >= WANDER_INTERVAL - DT, "re-rolled early at {elapsed}");
        assert!((ai.wander_heading.length() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_special_starts_only_in_window_after_idle_time() {
        let mut state = GameState::default();
        let player = state.add_player(Vec2::new(1200.0, 1000.0));
        let near = state.spawn_enemy(EnemyKind::Dasher, Vec2::new(1000.0, 1000.0));
        let far = state.spawn_enemy(EnemyKind::Dasher, Vec2::new(1000.0, 1400.0));
        let ineligible = state.spawn_enemy(EnemyKind::Basic, Vec2::new(1200.0, 800.0));
        let mut near_ai = controller_for(&state, near, 31);
        let mut far_ai = controller_for(&state, far, 32);
        let mut basic_ai = controller_for(&state, ineligible, 33);

        let mut started = 0;
        for _ in 0..(6.0 / DT) as usize {
            let since = near_ai.time_since_attack + DT;
            let d = tick(&mut near_ai, &mut state, near);
            if let Some(request) = &d.special {
                assert!(since > SPECIAL_MIN_IDLE_TIME, "special after only {since}s");
                assert_eq!(d.state, AiState::Special);
                assert_eq!(request.enemy, near);
                assert_eq!(request.target, player);
                assert_eq!(request.target_position, Vec2::new(1200.0, 1000.0));
                started += 1;
            }

            for (ai, id) in [(&mut far_ai, far), (&mut basic_ai, ineligible)] {
                let d = tick(ai, &mut state, id);
                assert!(d.special.is_none());
                assert_ne!(d.state, AiState::Special);
            }
        }
        assert!(started > 0);
        assert_eq!(far_ai.state(), AiState::Pursuing);
    }

    #[test]
    fn test_boss_waits_for_aggro_until_phase_two() {
        let mut state = GameState::default();
        state.add_player(Vec2::new(1000.0, 1000.0));
        let boss = state.spawn_boss(Vec2::new(1900.0, 1000.0), Vec::new());
        let mut ai = controller_for(&state, boss, 41);

        for _ in 0..60 {
            tick(&mut ai, &mut state, boss);
        }
        assert!(ai.target().is_some());
        assert_eq!(ai.state(), AiState::Idle);

        state.get_enemy_mut(boss).unwrap().apply_damage(2000.0 * 0.4);
        let d = tick(&mut ai, &mut state, boss);
        assert_eq!(d.phase_changes.as_slice(), &[2]);
        assert_eq!(ai.state(), AiState::Pursuing);
    }

    #[test]
    fn test_boss_specials_unlock_in_phase_three() {
        let mut state = GameState::default();
        state.add_player(Vec2::new(1000.0, 1000.0));
        let boss = state.spawn_boss(Vec2::new(1200.0, 1000.0), Vec::new());
        let mut ai = controller_for(&state, boss, 43);

        state.get_enemy_mut(boss).unwrap().apply_damage(2000.0 * 0.4);
        for _ in 0..(5.0 / DT) as usize {
            let d = tick(&mut ai, &mut state, boss);
            assert!(d.special.is_none());
        }
        assert_eq!(ai.phase(), 2);

        state.get_enemy_mut(boss).unwrap().apply_damage(2000.0 * 0.3);
        let mut started = false;
        for _ in 0..(2.0 / DT) as usize {
            if tick(&mut ai, &mut state, boss).special.is_some() {
                started = true;
                break;
            }
        }
        assert_eq!(ai.phase(), 3);
        assert!(started);
    }

    #[test]
    fn test_special_holds_position_despite_neighbors() {
        let mut state = GameState::default();
        let enemy = state.spawn_enemy(EnemyKind::Dasher, Vec2::new(500.0, 500.0));
        state.spawn_enemy(EnemyKind::Dasher, Vec2::new(505.0, 500.0));
        let mut ai = controller_for(&state, enemy, 51);

        for _ in 0..20 {
            tick(&mut ai, &mut state, enemy);
        }
        assert_ne!(ai.avoidance.repulsion(), Vec2::ZERO);

        ai.transition(AiState::Special);
        let d = tick(&mut ai, &mut state, enemy);
        assert_eq!(d.state, AiState::Special);
        assert_eq!(d.movement, Vec2::ZERO);
    }

    #[test]
    fn test_non_aggressive_waits_for_aggro_radius() {
        let mut state = GameState::default();
        state.add_player(Vec2::new(1000.0, 1000.0));
        let enemy = state.spawn_enemy(EnemyKind::Ranged, Vec2::new(1700.0, 1000.0));
        let mut ai = controller_for(&state, enemy, 5);

        for _ in 0..60 {
            tick(&mut ai, &mut state, enemy);
        }
        assert!(ai.target().is_some());
        assert_eq!(ai.state(), AiState::Idle);

        state.get_enemy_mut(enemy).unwrap().position = Vec2::new(1400.0, 1000.0);
        tick(&mut ai, &mut state, enemy);
        assert_eq!(ai.state(), AiState::Pursuing);
    }

    #[test]
    fn test_attack_hysteresis_band() {
        let mut state = GameState::default();
        state.add_player(Vec2::new(1000.0, 1000.0));
        let enemy = state.spawn_enemy(EnemyKind::Ranged, Vec2::new(1200.0, 1000.0));
        let mut ai = controller_for(&state, enemy, 8);
        ai.set_target(*state.players.keys().next().unwrap());
        ai.transition(AiState::Attacking);
        ai.attack_timer = -100.0;

        // optimal 200, band 40: 100 away is too close
        state.get_enemy_mut(enemy).unwrap().position = Vec2::new(1100.0, 1000.0);
        let d = tick(&mut ai, &mut state, enemy);
        assert!(d.movement.approx_eq(Vec2::new(BACK_AWAY_SCALE, 0.0), 1e-5));

        // 260 away is too far but still inside 1.2x range
        state.get_enemy_mut(enemy).unwrap().position = Vec2::new(1260.0, 1000.0);
        let d = tick(&mut ai, &mut state, enemy);
        assert!(d.movement.approx_eq(Vec2::new(-CLOSE_IN_SCALE, 0.0), 1e-5));

        // Inside the band the previous direction decays
        state.get_enemy_mut(enemy).unwrap().position = Vec2::new(1200.0, 1000.0);
        let d = tick(&mut ai, &mut state, enemy);
        assert!(d.movement.approx_eq(Vec2::new(-CLOSE_IN_SCALE * IN_BAND_DAMPING, 0.0), 1e-5));
        let d = tick(&mut ai, &mut state, enemy);
        assert!(d.movement.approx_eq(Vec2::new(-CLOSE_IN_SCALE * IN_BAND_DAMPING * IN_BAND_DAMPING, 0.0), 1e-5));

        // Beyond 1.2x range goes back to pursuit
        state.get_enemy_mut(enemy).unwrap().position = Vec2::new(1400.0, 1000.0);
        tick(&mut ai, &mut state, enemy);
        assert_eq!(ai.state(), AiState::Pursuing);
    }

    #[test]
    fn test_retreat_once_on_low_health() {
        let mut state = GameState::default();
        state.add_player(Vec2::new(1000.0, 1000.0));
        let enemy = state.spawn_enemy(EnemyKind::Ranged, Vec2::new(1100.0, 1000.0));
        let mut ai = controller_for(&state, enemy, 2);
        ai.set_target(*state.players.keys().next().unwrap());
        ai.transition(AiState::Pursuing);

        state.get_enemy_mut(enemy).unwrap().apply_damage(20.0);
        let d = tick(&mut ai, &mut state, enemy);
        assert_eq!(ai.state(), AiState::Retreating);
        assert!(d.movement.x > 0.0, "moves away from the target");

        let mut elapsed = 0.0;
        while ai.state() == AiState::Retreating {
            tick(&mut ai, &mut state, enemy);
            elapsed += DT;
            assert!(elapsed <= RETREAT_DURATION + 2.0 * DT);
        }
        assert_ne!(ai.state(), AiState::Retreating);

        for _ in 0..120 {
            tick(&mut ai, &mut state, enemy);
            assert_ne!(ai.state(), AiState::Retreating);
        }
    }

    #[test]
    fn test_coincident_target_gives_no_nan() {
        let mut state = GameState::default();
        let player = state.add_player(Vec2::new(100.0, 100.0));
        let enemy = state.spawn_enemy(EnemyKind::Basic, Vec2::new(100.0, 100.0));
        let mut ai = controller_for(&state, enemy, 4);
        ai.set_target(player);

        for _ in 0..30 {
            let d = tick(&mut ai, &mut state, enemy);
            assert!(d.movement.is_finite());
        }
    }

    #[test]
    fn test_boss_phase_scales_cooldown_and_reports_each_phase() {
        let mut state = GameState::default();
        let boss = state.spawn_boss(Vec2::new(500.0, 500.0), vec!["a".into(), "b".into(), "c".into(), "d".into()]);
        let mut ai = controller_for(&state, boss, 9);
        let base = ai.attack_cooldown();

        state.get_enemy_mut(boss).unwrap().apply_damage(2000.0 * 0.9);
        let d = tick(&mut ai, &mut state, boss);
        assert_eq!(d.phase_changes.as_slice(), &[2, 3, 4]);
        assert_eq!(ai.phase(), 4);
        assert!((ai.attack_cooldown() - base * 0.8 * 0.75 * 0.6).abs() < 1e-5);

        state.get_enemy_mut(boss).unwrap().heal(2000.0);
        let d = tick(&mut ai, &mut state, boss);
        assert!(d.phase_changes.is_empty());
        assert_eq!(ai.phase(), 4);
    }

    #[test]
    fn test_manager_falls_back_to_projectile_and_emits_phase_events() {
        let (sink, rx) = EventSink::channel();
        let mut state = GameState::new(Vec2::new(2000.0, 2000.0), sink);
        let player = state.add_player(Vec2::new(500.0, 500.0));
        let ranged = state.spawn_enemy(EnemyKind::Ranged, Vec2::new(700.0, 500.0));
        let metrics = SimMetrics::new();

        let mut manager = AiManager::new();
        manager.register(state.get_enemy(ranged).unwrap(), 1);
        manager.get_mut(ranged).unwrap().set_target(player);
        manager.get_mut(ranged).unwrap().transition(AiState::Attacking);
        manager.get_mut(ranged).unwrap().attack_timer = 100.0;

        state.rebuild_grid();
        let decisions = manager.decide(&state, DT, false);
        let stats = manager.apply(decisions, &mut state, &metrics);
        assert_eq!(stats.attacks, 1);
        let shots = state.take_pending_projectiles();
        assert_eq!(shots.len(), 1);
        assert!(shots[0].velocity.x < 0.0);

        let decision = AiDecision {
            phase_changes: SmallVec::from_slice(&[2]),
            ..Default::default()
        };
        manager.apply(vec![(ranged, decision)], &mut state, &metrics);
        let events: Vec<_> = rx.try_iter().collect();
        assert!(events.contains(&GameEvent::PhaseChanged { enemy_id: ranged, phase: 2 }));
        assert!(events.iter().any(|e| matches!(e, GameEvent::ScreenShake { .. })));
        assert!(events.iter().any(|e| matches!(e, GameEvent::FloatingText { text, .. } if text == "PHASE 2")));
    }

    #[test]
    fn test_contact_strike_damages_in_reach() {
        let mut state = GameState::default();
        let player = state.add_player(Vec2::new(100.0, 100.0));
        let enemy = state.spawn_enemy(EnemyKind::Basic, Vec2::new(130.0, 100.0));
        let metrics = SimMetrics::new();

        let mut manager = AiManager::new();
        manager.register(state.get_enemy(enemy).unwrap(), 1);
        manager.set_abilities(enemy, Box::new(ContactStrike::default()));

        let attack = AttackRequest {
            enemy,
            origin: Vec2::new(130.0, 100.0),
            target: player,
            target_position: Vec2::new(100.0, 100.0),
            direction: Vec2::new(-1.0, 0.0),
            pattern_index: None,
            damage: 10.0,
            projectile_speed: 0.0,
        };
        let decision = AiDecision {
            attack: Some(attack),
            ..Default::default()
        };
        manager.apply(vec![(enemy, decision)], &mut state, &metrics);

        assert_eq!(state.get_player(player).unwrap().health, 90.0);
        assert!(state.take_pending_projectiles().is_empty());
    }

    #[test]
    fn test_non_finite_movement_is_sanitized() {
        let mut state = GameState::default();
        let enemy = state.spawn_enemy(EnemyKind::Basic, Vec2::ZERO);
        let metrics = SimMetrics::new();
        let mut manager = AiManager::new();
        manager.register(state.get_enemy(enemy).unwrap(), 1);
        manager.get_mut(enemy).unwrap().transition(AiState::Pursuing);

        let decision = AiDecision {
            movement: Vec2::new(f32::NAN, 1.0),
            ..Default::default()
        };
        let stats = manager.apply(vec![(enemy, decision)], &mut state, &metrics);

        assert_eq!(stats.sanitized, 1);
        assert_eq!(state.get_enemy(enemy).unwrap().movement, Vec2::ZERO);
        assert_eq!(manager.get(enemy).unwrap().state(), AiState::Idle);
    }

    #[test]
    fn test_parallel_and_sequential_decisions_match() {
        let mut state = GameState::default();
        state.add_player(Vec2::new(2000.0, 2000.0));
        let mut seq = AiManager::new();
        let mut par = AiManager::new();
        for i in 0..64u64 {
            let kind = EnemyKind::ALL[(i as usize) % EnemyKind::ALL.len()];
            let pos = Vec2::new(1800.0 + (i % 8) as f32 * 30.0, 1800.0 + (i / 8) as f32 * 30.0);
            let id = state.spawn_enemy(kind, pos);
            seq.register(state.get_enemy(id).unwrap(), 1000 + i);
            par.register(state.get_enemy(id).unwrap(), 1000 + i);
        }
        state.rebuild_grid();

        for _ in 0..30 {
            let a = seq.decide(&state, DT, false);
            let b = par.decide(&state, DT, true);
            assert_eq!(a.len(), 64);
            assert_eq!(a, b);
        }
    }
}
