//! Simulation metrics
//!
//! Counters and gauges updated by the tick driver, rendered as Prometheus
//! text or JSON for whoever hosts the simulation.

use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Samples kept for tick-time percentiles
const TICK_HISTORY_LEN: usize = 1000;

#[derive(Debug)]
pub struct SimMetrics {
    // Entity counts
    pub enemies_alive: AtomicU64,
    pub bosses_alive: AtomicU64,
    pub players_alive: AtomicU64,
    pub projectiles_alive: AtomicU64,

    // Tick timing (microseconds)
    pub tick_time_us: AtomicU64,
    pub tick_time_p95_us: AtomicU64,
    pub tick_time_p99_us: AtomicU64,
    pub tick_time_max_us: AtomicU64,
    pub tick_count: AtomicU64,

    // AI
    pub ai_decisions: AtomicU64,
    pub attacks_dispatched: AtomicU64,
    pub specials_started: AtomicU64,
    pub phase_changes: AtomicU64,

    // Projectiles
    pub projectiles_spawned: AtomicU64,
    pub projectile_hits: AtomicU64,
    pub projectiles_revived: AtomicU64,
    pub enemies_killed: AtomicU64,

    // Faults dropped by the driver instead of stalling the frame
    pub sanitized_movements: AtomicU64,
    pub sanitized_projectiles: AtomicU64,

    start_time: Instant,

    tick_history: RwLock<VecDeque<u64>>,
}

impl SimMetrics {
    pub fn new() -> Self {
        Self {
            enemies_alive: AtomicU64::new(0),
            bosses_alive: AtomicU64::new(0),
            players_alive: AtomicU64::new(0),
            projectiles_alive: AtomicU64::new(0),
            tick_time_us: AtomicU64::new(0),
            tick_time_p95_us: AtomicU64::new(0),
            tick_time_p99_us: AtomicU64::new(0),
            tick_time_max_us: AtomicU64::new(0),
            tick_count: AtomicU64::new(0),
            ai_decisions: AtomicU64::new(0),
            attacks_dispatched: AtomicU64::new(0),
            specials_started: AtomicU64::new(0),
            phase_changes: AtomicU64::new(0),
            projectiles_spawned: AtomicU64::new(0),
            projectile_hits: AtomicU64::new(0),
            projectiles_revived: AtomicU64::new(0),
            enemies_killed: AtomicU64::new(0),
            sanitized_movements: AtomicU64::new(0),
            sanitized_projectiles: AtomicU64::new(0),
            start_time: Instant::now(),
            tick_history: RwLock::new(VecDeque::with_capacity(TICK_HISTORY_LEN)),
        }
    }

    #[inline]
    pub fn add(counter: &AtomicU64, n: u64) {
        if n > 0 {
            counter.fetch_add(n, Ordering::Relaxed);
        }
    }

    /// Record a tick time and update percentiles
    pub fn record_tick_time(&self, duration: Duration) {
        let us = duration.as_micros() as u64;
        self.tick_time_us.store(us, Ordering::Relaxed);
        self.tick_count.fetch_add(1, Ordering::Relaxed);

        let mut history = self.tick_history.write();
        history.push_back(us);
        while history.len() > TICK_HISTORY_LEN {
            history.pop_front();
        }

        if history.len() >= 10 {
            let mut sorted: Vec<u64> = history.iter().copied().collect();
            sorted.sort_unstable();

            let p95_idx = (sorted.len() as f32 * 0.95) as usize;
            let p99_idx = (sorted.len() as f32 * 0.99) as usize;

            self.tick_time_p95_us.store(sorted[p95_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.tick_time_p99_us.store(sorted[p99_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.tick_time_max_us.store(sorted.last().copied().unwrap_or(0), Ordering::Relaxed);
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Prometheus text exposition
    pub fn to_prometheus(&self) -> String {
        let mut output = String::with_capacity(2048);

        macro_rules! metric {
            ($name:expr, $help:expr, $type:expr, $value:expr) => {
                output.push_str(&format!(
                    "# HELP {} {}\n# TYPE {} {}\n{} {}\n",
                    $name, $help, $name, $type, $name, $value
                ));
            };
        }

        metric!("horde_sim_enemies_alive", "Number of live enemies", "gauge",
            self.enemies_alive.load(Ordering::Relaxed));
        metric!("horde_sim_bosses_alive", "Number of live bosses", "gauge",
            self.bosses_alive.load(Ordering::Relaxed));
        metric!("horde_sim_players_alive", "Number of live players", "gauge",
            self.players_alive.load(Ordering::Relaxed));
        metric!("horde_sim_projectiles", "Number of active projectiles", "gauge",
            self.projectiles_alive.load(Ordering::Relaxed));

        metric!("horde_sim_tick_time_microseconds", "Current tick time in microseconds", "gauge",
            self.tick_time_us.load(Ordering::Relaxed));
        metric!("horde_sim_tick_time_p95_microseconds", "95th percentile tick time", "gauge",
            self.tick_time_p95_us.load(Ordering::Relaxed));
        metric!("horde_sim_tick_time_p99_microseconds", "99th percentile tick time", "gauge",
            self.tick_time_p99_us.load(Ordering::Relaxed));
        metric!("horde_sim_tick_time_max_microseconds", "Maximum tick time", "gauge",
            self.tick_time_max_us.load(Ordering::Relaxed));
        metric!("horde_sim_tick_count", "Total ticks processed", "counter",
            self.tick_count.load(Ordering::Relaxed));

        metric!("horde_sim_ai_decisions_total", "AI controller updates", "counter",
            self.ai_decisions.load(Ordering::Relaxed));
        metric!("horde_sim_attacks_total", "Enemy attacks dispatched", "counter",
            self.attacks_dispatched.load(Ordering::Relaxed));
        metric!("horde_sim_specials_total", "Enemy special moves started", "counter",
            self.specials_started.load(Ordering::Relaxed));
        metric!("horde_sim_boss_phase_changes_total", "Boss phase transitions", "counter",
            self.phase_changes.load(Ordering::Relaxed));

        metric!("horde_sim_projectiles_spawned_total", "Projectiles spawned", "counter",
            self.projectiles_spawned.load(Ordering::Relaxed));
        metric!("horde_sim_projectile_hits_total", "Projectile hits applied", "counter",
            self.projectile_hits.load(Ordering::Relaxed));
        metric!("horde_sim_projectiles_revived_total", "Projectile deaths averted by behaviors", "counter",
            self.projectiles_revived.load(Ordering::Relaxed));
        metric!("horde_sim_enemies_killed_total", "Enemies killed", "counter",
            self.enemies_killed.load(Ordering::Relaxed));

        metric!("horde_sim_sanitized_movements_total", "Non-finite enemy movements zeroed", "counter",
            self.sanitized_movements.load(Ordering::Relaxed));
        metric!("horde_sim_sanitized_projectiles_total", "Non-finite projectiles removed", "counter",
            self.sanitized_projectiles.load(Ordering::Relaxed));
        metric!("horde_sim_uptime_seconds", "Simulation uptime in seconds", "counter",
            self.uptime_seconds());

        output
    }

    /// JSON snapshot of the same values
    pub fn to_json(&self) -> serde_json::Value {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        serde_json::json!({
            "entities": {
                "enemies": load(&self.enemies_alive),
                "bosses": load(&self.bosses_alive),
                "players": load(&self.players_alive),
                "projectiles": load(&self.projectiles_alive),
            },
            "performance": {
                "tick_time_us": load(&self.tick_time_us),
                "tick_time_p95_us": load(&self.tick_time_p95_us),
                "tick_time_p99_us": load(&self.tick_time_p99_us),
                "tick_time_max_us": load(&self.tick_time_max_us),
                "tick_count": load(&self.tick_count),
            },
            "ai": {
                "decisions": load(&self.ai_decisions),
                "attacks": load(&self.attacks_dispatched),
                "specials": load(&self.specials_started),
                "phase_changes": load(&self.phase_changes),
            },
            "projectiles": {
                "spawned": load(&self.projectiles_spawned),
                "hits": load(&self.projectile_hits),
                "revived": load(&self.projectiles_revived),
                "kills": load(&self.enemies_killed),
            },
            "sanitized": {
                "movements": load(&self.sanitized_movements),
                "projectiles": load(&self.sanitized_projectiles),
            },
            "uptime_seconds": self.uptime_seconds(),
        })
    }
}

impl Default for SimMetrics {
    fn default() -> Self {
        Self::new()
    }
}
