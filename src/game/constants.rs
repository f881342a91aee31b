/// Simulation timing constants
pub mod sim {
    /// Default tick rate in Hz
    pub const TICK_RATE: u32 = 60;
    /// Delta time per tick in seconds
    pub const DT: f32 = 1.0 / 60.0;
    /// Default world width (world units)
    pub const WORLD_WIDTH: f32 = 4096.0;
    /// Default world height (world units)
    pub const WORLD_HEIGHT: f32 = 4096.0;
    /// Projectiles further than this outside the world bounds are culled
    pub const OFFSCREEN_MARGIN: f32 = 200.0;
}

/// Enemy AI state machine constants
pub mod ai {
    /// Idle enemies pick a new wander heading this often (seconds)
    pub const WANDER_INTERVAL: f32 = 2.0;
    /// Movement scale applied to the wander heading
    pub const WANDER_SPEED: f32 = 0.3;
    /// Time spent retreating before resuming pursuit (seconds)
    pub const RETREAT_DURATION: f32 = 2.0;
    /// Special state always exits after this long, ability completion or not
    pub const SPECIAL_DURATION: f32 = 1.0;

    /// Attacking -> Pursuing once distance exceeds range * this
    pub const ATTACK_EXIT_RANGE_FACTOR: f32 = 1.2;
    /// Optimal standoff distance as a fraction of attack range
    pub const OPTIMAL_DISTANCE_FACTOR: f32 = 0.8;
    /// Hysteresis half-width as a fraction of the optimal distance
    pub const HYSTERESIS_BAND: f32 = 0.2;
    /// Back-away scale when closer than the band
    pub const BACK_AWAY_SCALE: f32 = 0.2;
    /// Close-in scale when further than the band
    pub const CLOSE_IN_SCALE: f32 = 0.15;
    /// Per-tick damping inside the band
    pub const IN_BAND_DAMPING: f32 = 0.8;

    /// Special ability distance window
    pub const SPECIAL_MIN_DISTANCE: f32 = 100.0;
    pub const SPECIAL_MAX_DISTANCE: f32 = 300.0;
    /// Minimum time since the last attack before a special can start (seconds)
    pub const SPECIAL_MIN_IDLE_TIME: f32 = 3.0;
    /// Per-tick probability of starting a special when eligible
    pub const SPECIAL_CHANCE: f32 = 0.3;

    /// Default target re-acquisition interval bounds (seconds)
    pub const TARGET_UPDATE_MIN: f32 = 0.4;
    pub const TARGET_UPDATE_MAX: f32 = 0.7;
    /// Default maximum pursuit distance
    pub const MAX_TARGET_DISTANCE: f32 = 800.0;
    /// Attack cooldowns are jittered by +/- this fraction at construction
    pub const COOLDOWN_JITTER: f32 = 0.1;
}

/// Attack range per attack class
pub mod range {
    pub const MELEE: f32 = 50.0;
    pub const RANGED: f32 = 250.0;
    pub const BOSS: f32 = 150.0;
}

/// Boss phase constants
pub mod boss {
    /// Descending health-ratio breakpoints for phases 2, 3 and 4
    pub const PHASE_THRESHOLDS: [f32; 3] = [0.7, 0.4, 0.15];
    /// Multiplicative cooldown factor applied on entering phases 2, 3 and 4
    pub const PHASE_COOLDOWN_FACTORS: [f32; 3] = [0.8, 0.75, 0.6];
    /// Attack patterns are split across this many phase buckets
    pub const PATTERN_PHASES: usize = 4;

    /// Phase 2 closes in harder beyond this distance
    pub const PHASE2_CHASE_DISTANCE: f32 = 150.0;
    pub const PHASE2_CHASE_SCALE: f32 = 1.25;
    /// Phase 3 erratic heading re-roll period (seconds)
    pub const PHASE3_ERRATIC_INTERVAL: f32 = 1.0;
    pub const PHASE3_ERRATIC_WEIGHT: f32 = 0.6;
    /// Phase 4 beeline scale
    pub const PHASE4_CHASE_SCALE: f32 = 1.5;

    /// Presentation parameters for phase-change notifications
    pub const PHASE_TEXT_SIZE: f32 = 32.0;
    pub const PHASE_TEXT_COLOR: [f32; 4] = [1.0, 0.3, 0.2, 1.0];
    pub const PHASE_SHAKE_INTENSITY: f32 = 8.0;
    pub const PHASE_SHAKE_DURATION: f32 = 0.5;
}

/// Separation / avoidance constants
pub mod avoidance {
    /// Maximum neighbors considered per recompute
    pub const MAX_NEIGHBORS: usize = 8;
    /// Weight of the repulsion vector when blended into the heading
    pub const BLEND_WEIGHT: f32 = 0.5;
    /// Recompute cadence bounds (seconds), randomized per enemy
    pub const INTERVAL_MIN: f32 = 0.08;
    pub const INTERVAL_MAX: f32 = 0.12;
}

/// Projectile defaults
pub mod projectile {
    pub const RADIUS: f32 = 6.0;
    pub const LIFETIME: f32 = 3.0;
    pub const PLAYER_SPEED: f32 = 420.0;
    pub const PLAYER_DAMAGE: f32 = 10.0;
    /// Collision radius of a player for enemy projectiles
    pub const PLAYER_HIT_RADIUS: f32 = 20.0;
    /// Largest enemy radius; pads hit queries so big enemies are not missed
    pub const MAX_ENEMY_RADIUS: f32 = 48.0;
    /// Player auto-fire interval in the demo driver
    pub const PLAYER_FIRE_INTERVAL: f32 = 0.25;
}
