use crate::game::behaviors::BehaviorConfig;
use crate::game::constants::sim;
use crate::game::systems::tuning::TuningTable;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("tick_rate must be 1-1000, got {0}")]
    TickRate(u32),
    #[error("world size must be positive and finite, got {width}x{height}")]
    WorldSize { width: f32, height: f32 },
    #[error("enemy_count must be at most {max}, got {count}")]
    EnemyCount { count: usize, max: usize },
    #[error("player_count must be at least 1")]
    NoPlayers,
}

/// Upper bound on spawned enemies for the demo driver
pub const MAX_ENEMIES: usize = 100_000;

/// Simulation configuration
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Seed for every RNG in the simulation
    pub seed: u64,
    pub tick_rate: u32,
    /// Compute AI decisions on the rayon pool
    pub parallel_ai: bool,
    pub world_width: f32,
    pub world_height: f32,
    pub player_count: usize,
    pub enemy_count: usize,
    pub spawn_boss: bool,
    /// Stop after this many seconds; 0 runs until interrupted
    pub duration_secs: u64,
    /// Players fire at the nearest enemy on a fixed interval
    pub player_autofire: bool,
    /// Behaviors attached to every player projectile
    pub loadout: Vec<BehaviorConfig>,
    pub tunings: TuningTable,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 0x5eed,
            tick_rate: sim::TICK_RATE,
            parallel_ai: true,
            world_width: sim::WORLD_WIDTH,
            world_height: sim::WORLD_HEIGHT,
            player_count: 1,
            enemy_count: 200,
            spawn_boss: true,
            duration_secs: 30,
            player_autofire: true,
            loadout: Vec::new(),
            tunings: TuningTable::default(),
        }
    }
}

impl SimConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from `lookup`, warning and keeping the default for any
    /// value that does not parse.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(seed) = lookup("SIM_SEED") {
            match seed.parse::<u64>() {
                Ok(parsed) => config.seed = parsed,
                Err(_) => tracing::warn!("Invalid SIM_SEED '{}', using default", seed),
            }
        }

        if let Some(rate) = lookup("SIM_TICK_RATE") {
            match rate.parse::<u32>() {
                Ok(parsed) if (1..=1000).contains(&parsed) => config.tick_rate = parsed,
                Ok(_) => tracing::warn!("SIM_TICK_RATE must be 1-1000, using default"),
                Err(_) => tracing::warn!("Invalid SIM_TICK_RATE '{}', using default", rate),
            }
        }

        if let Some(parallel) = lookup("SIM_PARALLEL_AI") {
            match parse_bool(&parallel) {
                Some(parsed) => config.parallel_ai = parsed,
                None => tracing::warn!("Invalid SIM_PARALLEL_AI '{}', using default", parallel),
            }
        }

        if let Some(size) = lookup("SIM_WORLD_SIZE") {
            match parse_size(&size) {
                Some((w, h)) => {
                    config.world_width = w;
                    config.world_height = h;
                }
                None => tracing::warn!("Invalid SIM_WORLD_SIZE '{}' (expected WxH), using default", size),
            }
        }

        if let Some(players) = lookup("SIM_PLAYERS") {
            match players.parse::<usize>() {
                Ok(parsed) if parsed > 0 => config.player_count = parsed,
                Ok(_) => tracing::warn!("SIM_PLAYERS must be > 0, using default"),
                Err(_) => tracing::warn!("Invalid SIM_PLAYERS '{}', using default", players),
            }
        }

        if let Some(enemies) = lookup("SIM_ENEMIES") {
            match enemies.parse::<usize>() {
                Ok(parsed) if parsed <= MAX_ENEMIES => config.enemy_count = parsed,
                Ok(_) => tracing::warn!("SIM_ENEMIES must be at most {}, using default", MAX_ENEMIES),
                Err(_) => tracing::warn!("Invalid SIM_ENEMIES '{}', using default", enemies),
            }
        }

        if let Some(boss) = lookup("SIM_BOSS") {
            match parse_bool(&boss) {
                Some(parsed) => config.spawn_boss = parsed,
                None => tracing::warn!("Invalid SIM_BOSS '{}', using default", boss),
            }
        }

        if let Some(duration) = lookup("SIM_DURATION_SECS") {
            match duration.parse::<u64>() {
                Ok(parsed) => config.duration_secs = parsed,
                Err(_) => tracing::warn!("Invalid SIM_DURATION_SECS '{}', using default", duration),
            }
        }

        if let Some(autofire) = lookup("SIM_AUTOFIRE") {
            match parse_bool(&autofire) {
                Some(parsed) => config.player_autofire = parsed,
                None => tracing::warn!("Invalid SIM_AUTOFIRE '{}', using default", autofire),
            }
        }

        if let Some(loadout) = lookup("SIM_LOADOUT") {
            match BehaviorConfig::parse_loadout(&loadout) {
                Ok(parsed) => config.loadout = parsed,
                Err(e) => tracing::warn!("{}, using empty loadout", e),
            }
        }

        if let Some(tuning) = lookup("SIM_TUNING") {
            match TuningTable::from_json(&tuning) {
                Ok(parsed) => config.tunings = parsed,
                Err(e) => tracing::warn!("{}, using default tunings", e),
            }
        }

        config
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_rate == 0 || self.tick_rate > 1000 {
            return Err(ConfigError::TickRate(self.tick_rate));
        }
        let size_ok = |v: f32| v.is_finite() && v > 0.0;
        if !size_ok(self.world_width) || !size_ok(self.world_height) {
            return Err(ConfigError::WorldSize {
                width: self.world_width,
                height: self.world_height,
            });
        }
        if self.enemy_count > MAX_ENEMIES {
            return Err(ConfigError::EnemyCount {
                count: self.enemy_count,
                max: MAX_ENEMIES,
            });
        }
        if self.player_count == 0 {
            return Err(ConfigError::NoPlayers);
        }
        Ok(())
    }

    pub fn dt(&self) -> f32 {
        1.0 / self.tick_rate.max(1) as f32
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_size(value: &str) -> Option<(f32, f32)> {
    let (w, h) = value.trim().split_once(['x', 'X'])?;
    let w = w.trim().parse::<f32>().ok()?;
    let h = h.trim().parse::<f32>().ok()?;
    (w.is_finite() && h.is_finite() && w > 0.0 && h > 0.0).then_some((w, h))
}
