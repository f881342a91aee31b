use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::constants::{range, sim};
use crate::game::events::{EventSink, GameEvent};
use crate::game::spatial::{SpatialEntry, SpatialGrid};
use crate::game::systems::projectile::ProjectileSpawn;
use crate::game::world::{sort_by_distance, AiWorld, CombatWorld, EnemySnapshot};
use crate::util::vec2::Vec2;

pub type PlayerId = Uuid;
pub type EntityId = u64;

/// Enemy archetypes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnemyKind {
    Basic,
    Fast,
    Tank,
    Ranged,
    Dasher,
    Exploder,
    Boss,
}

/// Attack range class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackClass {
    Melee,
    Ranged,
    Boss,
}

impl AttackClass {
    pub fn attack_range(&self) -> f32 {
        match self {
            AttackClass::Melee => range::MELEE,
            AttackClass::Ranged => range::RANGED,
            AttackClass::Boss => range::BOSS,
        }
    }
}

impl EnemyKind {
    pub const ALL: [EnemyKind; 7] = [
        EnemyKind::Basic,
        EnemyKind::Fast,
        EnemyKind::Tank,
        EnemyKind::Ranged,
        EnemyKind::Dasher,
        EnemyKind::Exploder,
        EnemyKind::Boss,
    ];

    pub fn max_health(&self) -> f32 {
        match self {
            Self::Basic => 30.0,
            Self::Fast => 15.0,
            Self::Tank => 150.0,
            Self::Ranged => 25.0,
            Self::Dasher => 40.0,
            Self::Exploder => 20.0,
            Self::Boss => 2000.0,
        }
    }

    pub fn speed(&self) -> f32 {
        match self {
            Self::Basic => 80.0,
            Self::Fast => 160.0,
            Self::Tank => 45.0,
            Self::Ranged => 70.0,
            Self::Dasher => 110.0,
            Self::Exploder => 120.0,
            Self::Boss => 60.0,
        }
    }

    pub fn radius(&self) -> f32 {
        match self {
            Self::Basic => 16.0,
            Self::Fast => 12.0,
            Self::Tank => 28.0,
            Self::Ranged => 14.0,
            Self::Dasher => 16.0,
            Self::Exploder => 14.0,
            Self::Boss => 48.0,
        }
    }

    pub fn damage(&self) -> f32 {
        match self {
            Self::Basic => 10.0,
            Self::Fast => 6.0,
            Self::Tank => 20.0,
            Self::Ranged => 8.0,
            Self::Dasher => 14.0,
            Self::Exploder => 30.0,
            Self::Boss => 25.0,
        }
    }

    pub fn attack_class(&self) -> AttackClass {
        match self {
            Self::Ranged => AttackClass::Ranged,
            Self::Boss => AttackClass::Boss,
            _ => AttackClass::Melee,
        }
    }

    /// Speed of the fallback projectile fired when no abilities are attached
    pub fn projectile_speed(&self) -> f32 {
        match self {
            Self::Ranged => 220.0,
            Self::Boss => 260.0,
            _ => 180.0,
        }
    }
}

/// Enemy entity. Owned by `GameState`; AI controllers refer to it by id.
#[derive(Debug, Clone)]
pub struct Enemy {
    pub id: EntityId,
    pub kind: EnemyKind,
    pub position: Vec2,
    pub radius: f32,
    pub speed: f32,
    /// Desired movement for this tick, written by the AI
    pub movement: Vec2,
    health: f32,
    max_health: f32,
    pub damage: f32,
    pub attack_class: AttackClass,
    pub is_boss: bool,
    pub projectile_speed: f32,
    /// Boss attack pattern names, bucketed by phase
    pub attack_patterns: Vec<String>,
    alive: bool,
}

impl Enemy {
    pub fn new(id: EntityId, kind: EnemyKind, position: Vec2) -> Self {
        Self {
            id,
            kind,
            position,
            radius: kind.radius(),
            speed: kind.speed(),
            movement: Vec2::ZERO,
            health: kind.max_health(),
            max_health: kind.max_health(),
            damage: kind.damage(),
            attack_class: kind.attack_class(),
            is_boss: kind == EnemyKind::Boss,
            projectile_speed: kind.projectile_speed(),
            attack_patterns: Vec::new(),
            alive: true,
        }
    }

    pub fn boss(id: EntityId, position: Vec2, attack_patterns: Vec<String>) -> Self {
        Self {
            attack_patterns,
            ..Self::new(id, EnemyKind::Boss, position)
        }
    }

    #[inline]
    pub fn health(&self) -> f32 {
        self.health
    }

    #[inline]
    pub fn max_health(&self) -> f32 {
        self.max_health
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn health_ratio(&self) -> f32 {
        if self.max_health > 0.0 {
            (self.health / self.max_health).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Apply damage. Returns true if this call killed the enemy.
    pub fn apply_damage(&mut self, amount: f32) -> bool {
        if !self.alive || !amount.is_finite() {
            return false;
        }
        self.health -= amount;
        if self.health <= 0.0 {
            self.health = 0.0;
            self.alive = false;
            return true;
        }
        false
    }

    /// Heal, clamped to max health. Dead enemies stay dead.
    pub fn heal(&mut self, amount: f32) {
        if self.alive && amount.is_finite() {
            self.health = (self.health + amount).min(self.max_health);
        }
    }
}

/// Player entity - the pursuit target for enemies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub position: Vec2,
    pub health: f32,
    pub max_health: f32,
    pub alive: bool,
}

impl Player {
    pub fn new(id: PlayerId, position: Vec2) -> Self {
        Self {
            id,
            position,
            health: 100.0,
            max_health: 100.0,
            alive: true,
        }
    }
}

/// Arena state shared by AI, projectiles and the tick driver
pub struct GameState {
    pub tick: u64,
    pub players: HashMap<PlayerId, Player>,
    pub enemies: HashMap<EntityId, Enemy>,
    pub world_size: Vec2,
    grid: SpatialGrid,
    pending_projectiles: Vec<ProjectileSpawn>,
    events: EventSink,
    next_entity_id: EntityId,
}

impl GameState {
    pub fn new(world_size: Vec2, events: EventSink) -> Self {
        Self {
            tick: 0,
            players: HashMap::new(),
            enemies: HashMap::new(),
            world_size,
            grid: SpatialGrid::default(),
            pending_projectiles: Vec::new(),
            events,
            next_entity_id: 1,
        }
    }

    /// Generate a new unique entity ID
    pub fn next_entity_id(&mut self) -> EntityId {
        let id = self.next_entity_id;
        self.next_entity_id += 1;
        id
    }

    pub fn events(&self) -> &EventSink {
        &self.events
    }

    pub fn add_player(&mut self, position: Vec2) -> PlayerId {
        let id = Uuid::new_v4();
        self.players.insert(id, Player::new(id, position));
        id
    }

    pub fn get_player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn get_player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    /// Spawn an enemy of `kind`; returns its id
    pub fn spawn_enemy(&mut self, kind: EnemyKind, position: Vec2) -> EntityId {
        let id = self.next_entity_id();
        self.enemies.insert(id, Enemy::new(id, kind, position));
        id
    }

    pub fn spawn_boss(&mut self, position: Vec2, attack_patterns: Vec<String>) -> EntityId {
        let id = self.next_entity_id();
        self.enemies.insert(id, Enemy::boss(id, position, attack_patterns));
        id
    }

    pub fn get_enemy(&self, id: EntityId) -> Option<&Enemy> {
        self.enemies.get(&id)
    }

    pub fn get_enemy_mut(&mut self, id: EntityId) -> Option<&mut Enemy> {
        self.enemies.get_mut(&id)
    }

    pub fn alive_enemy_count(&self) -> usize {
        self.enemies.values().filter(|e| e.is_alive()).count()
    }

    /// Rebuild the spatial grid from current live enemy positions
    pub fn rebuild_grid(&mut self) {
        self.grid.clear();
        for enemy in self.enemies.values().filter(|e| e.is_alive()) {
            self.grid.insert(SpatialEntry {
                id: enemy.id,
                kind: enemy.kind,
                position: enemy.position,
                radius: enemy.radius,
            });
        }
    }

    /// Move live enemies along their desired movement
    pub fn integrate_enemies(&mut self, dt: f32) {
        for enemy in self.enemies.values_mut().filter(|e| e.alive) {
            enemy.position += enemy.movement * (enemy.speed * dt);
        }
    }

    /// Remove dead enemies, returning their ids in ascending order
    pub fn remove_dead_enemies(&mut self) -> Vec<EntityId> {
        let mut dead: Vec<EntityId> = self
            .enemies
            .values()
            .filter(|e| !e.alive)
            .map(|e| e.id)
            .collect();
        dead.sort_unstable();
        for id in &dead {
            self.enemies.remove(id);
        }
        dead
    }

    /// Queue a projectile; the tick driver materializes it after the projectile pass
    pub fn queue_projectile(&mut self, spawn: ProjectileSpawn) {
        self.pending_projectiles.push(spawn);
    }

    pub fn take_pending_projectiles(&mut self) -> Vec<ProjectileSpawn> {
        std::mem::take(&mut self.pending_projectiles)
    }

    pub fn damage_player(&mut self, id: PlayerId, amount: f32) {
        if let Some(player) = self.players.get_mut(&id) {
            if !player.alive {
                return;
            }
            player.health -= amount;
            if player.health <= 0.0 {
                player.health = 0.0;
                player.alive = false;
            }
            self.events.emit(GameEvent::PlayerHit { player_id: id, damage: amount });
        }
    }

    /// True if `position` lies inside the world grown by `margin`
    pub fn in_bounds(&self, position: Vec2, margin: f32) -> bool {
        position.x >= -margin
            && position.y >= -margin
            && position.x <= self.world_size.x + margin
            && position.y <= self.world_size.y + margin
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new(
            Vec2::new(sim::WORLD_WIDTH, sim::WORLD_HEIGHT),
            EventSink::disabled(),
        )
    }
}

impl AiWorld for GameState {
    fn is_target_valid(&self, id: PlayerId) -> bool {
        self.players.get(&id).map_or(false, |p| p.alive)
    }

    fn target_position(&self, id: PlayerId) -> Option<Vec2> {
        self.players.get(&id).filter(|p| p.alive).map(|p| p.position)
    }

    fn find_nearest_target(&self, position: Vec2, max_radius: f32) -> Option<PlayerId> {
        let max_sq = max_radius * max_radius;
        self.players
            .values()
            .filter(|p| p.alive)
            .map(|p| (p.id, p.position.distance_sq_to(position)))
            .filter(|&(_, d)| d <= max_sq)
            .min_by(|a, b| {
                a.1.partial_cmp(&b.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.0.cmp(&b.0))
            })
            .map(|(id, _)| id)
    }

    fn for_each_nearby(
        &self,
        kind: EnemyKind,
        position: Vec2,
        radius: f32,
        visit: &mut dyn FnMut(EntityId, Vec2),
    ) {
        self.grid.for_each_in_radius(position, radius, |e| {
            if e.kind == kind {
                visit(e.id, e.position);
            }
        });
    }
}

impl CombatWorld for GameState {
    fn enemy_position(&self, id: EntityId) -> Option<Vec2> {
        self.enemies.get(&id).filter(|e| e.alive).map(|e| e.position)
    }

    fn enemies_within(&self, center: Vec2, radius: f32) -> Vec<EnemySnapshot> {
        let radius_sq = radius * radius;
        let mut found = Vec::new();
        self.grid.for_each_in_radius(center, radius, |entry| {
            if let Some(enemy) = self.enemies.get(&entry.id) {
                if enemy.alive && enemy.position.distance_sq_to(center) <= radius_sq {
                    found.push(EnemySnapshot {
                        id: enemy.id,
                        position: enemy.position,
                        radius: enemy.radius,
                    });
                }
            }
        });
        sort_by_distance(center, &mut found);
        found
    }

    fn damage_enemy(&mut self, id: EntityId, amount: f32) -> bool {
        let Some(enemy) = self.enemies.get_mut(&id) else {
            return false;
        };
        let killed = enemy.apply_damage(amount);
        if killed {
            let position = enemy.position;
            self.events.emit(GameEvent::EnemyKilled { enemy_id: id, position });
        }
        killed
    }

    fn emit(&self, event: GameEvent) {
        self.events.emit(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enemy_new_from_kind() {
        let enemy = Enemy::new(1, EnemyKind::Tank, Vec2::new(5.0, 5.0));
        assert_eq!(enemy.health(), 150.0);
        assert_eq!(enemy.max_health(), 150.0);
        assert_eq!(enemy.attack_class, AttackClass::Melee);
        assert!(!enemy.is_boss);
        assert!(Enemy::new(2, EnemyKind::Boss, Vec2::ZERO).is_boss);
    }

    #[test]
    fn test_heal_clamps_to_max() {
        let mut enemy = Enemy::new(1, EnemyKind::Basic, Vec2::ZERO);
        enemy.apply_damage(10.0);
        enemy.heal(1000.0);
        assert_eq!(enemy.health(), enemy.max_health());
    }

    #[test]
    fn test_lethal_damage_marks_dead_once() {
        let mut enemy = Enemy::new(1, EnemyKind::Fast, Vec2::ZERO);
        assert!(enemy.apply_damage(100.0));
        assert!(!enemy.is_alive());
        assert_eq!(enemy.health(), 0.0);
        assert!(!enemy.apply_damage(100.0));
        enemy.heal(10.0);
        assert!(!enemy.is_alive());
    }

    #[test]
    fn test_find_nearest_target_respects_radius_and_liveness() {
        let mut state = GameState::default();
        let near = state.add_player(Vec2::new(100.0, 0.0));
        let far = state.add_player(Vec2::new(500.0, 0.0));

        assert_eq!(state.find_nearest_target(Vec2::ZERO, 800.0), Some(near));
        state.get_player_mut(near).unwrap().alive = false;
        assert_eq!(state.find_nearest_target(Vec2::ZERO, 800.0), Some(far));
        assert_eq!(state.find_nearest_target(Vec2::ZERO, 400.0), None);
        assert!(!state.is_target_valid(near));
    }

    #[test]
    fn test_enemies_within_sorted_and_alive_only() {
        let mut state = GameState::default();
        let a = state.spawn_enemy(EnemyKind::Basic, Vec2::new(30.0, 0.0));
        let b = state.spawn_enemy(EnemyKind::Basic, Vec2::new(10.0, 0.0));
        let c = state.spawn_enemy(EnemyKind::Basic, Vec2::new(20.0, 0.0));
        state.rebuild_grid();
        state.damage_enemy(c, 1000.0);

        let ids: Vec<_> = state.enemies_within(Vec2::ZERO, 50.0).iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![b, a]);
    }

    #[test]
    fn test_damage_enemy_emits_kill_event() {
        let (sink, rx) = EventSink::channel();
        let mut state = GameState::new(Vec2::new(100.0, 100.0), sink);
        let id = state.spawn_enemy(EnemyKind::Fast, Vec2::new(1.0, 2.0));
        assert!(state.damage_enemy(id, 50.0));
        assert_eq!(
            rx.try_recv().unwrap(),
            GameEvent::EnemyKilled { enemy_id: id, position: Vec2::new(1.0, 2.0) }
        );
        assert_eq!(state.remove_dead_enemies(), vec![id]);
        assert!(state.get_enemy(id).is_none());
    }

    #[test]
    fn test_for_each_nearby_filters_kind() {
        let mut state = GameState::default();
        state.spawn_enemy(EnemyKind::Basic, Vec2::new(10.0, 10.0));
        state.spawn_enemy(EnemyKind::Tank, Vec2::new(12.0, 10.0));
        state.rebuild_grid();

        let mut seen = Vec::new();
        state.for_each_nearby(EnemyKind::Basic, Vec2::new(10.0, 10.0), 50.0, &mut |id, _| seen.push(id));
        assert_eq!(seen.len(), 1);
    }
}
