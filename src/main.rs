use std::time::Duration;
use tokio::time::{interval, Instant};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use horde_sim::config::SimConfig;
use horde_sim::game::events::{EventSink, GameEvent};
use horde_sim::game::simulation::Simulation;

/// Seconds between periodic stats lines
const STATS_INTERVAL_SECS: u64 = 5;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!("Horde simulation v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = SimConfig::load_or_default();
    config.validate()?;
    info!(
        "Configuration loaded: seed={}, {} Hz, {} enemies, boss={}, parallel_ai={}, loadout={:?}",
        config.seed,
        config.tick_rate,
        config.enemy_count,
        config.spawn_boss,
        config.parallel_ai,
        config.loadout.iter().map(|b| b.kind().as_str()).collect::<Vec<_>>()
    );

    let (events, receiver) = EventSink::channel();
    let mut sim = Simulation::new(config, events);
    sim.populate();

    // Shutdown signal handler
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received");
    };

    tokio::select! {
        _ = run(&mut sim, &receiver) => {}
        _ = shutdown => {
            info!("Shutting down...");
        }
    }

    println!("{}", sim.metrics().to_prometheus());
    info!("Simulation stopped after {} ticks", sim.state().tick);

    Ok(())
}

/// Drive the simulation at the configured rate until the duration elapses
/// or every enemy is dead
async fn run(sim: &mut Simulation, receiver: &crossbeam_channel::Receiver<GameEvent>) {
    let tick_rate = sim.config().tick_rate;
    let dt = sim.config().dt();
    let duration = sim.config().duration_secs;

    let mut ticker = interval(Duration::from_secs_f32(dt));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    info!("Simulation loop started at {} Hz", tick_rate);
    let start = Instant::now();
    let mut tick_count: u64 = 0;

    loop {
        ticker.tick().await;
        tick_count += 1;

        let summary = sim.tick(dt);

        // Presentation collaborators would consume these; the demo only logs them
        for event in receiver.try_iter() {
            match event {
                GameEvent::PhaseChanged { enemy_id, phase } => {
                    info!("Boss {} entered phase {}", enemy_id, phase);
                }
                other => debug!("{:?}", other),
            }
        }

        if tick_count % (tick_rate as u64 * STATS_INTERVAL_SECS) == 0 {
            let metrics = sim.metrics();
            info!(
                "Sim: {}s, tick {}, {} enemies, {} projectiles | {} attacks, {} kills | tick p99 {}us",
                start.elapsed().as_secs(),
                summary.tick,
                sim.state().alive_enemy_count(),
                sim.projectiles().len(),
                metrics.attacks_dispatched.load(std::sync::atomic::Ordering::Relaxed),
                metrics.enemies_killed.load(std::sync::atomic::Ordering::Relaxed),
                metrics.tick_time_p99_us.load(std::sync::atomic::Ordering::Relaxed),
            );
        }

        if sim.state().alive_enemy_count() == 0 {
            info!("All enemies defeated at tick {}", summary.tick);
            break;
        }
        if duration > 0 && start.elapsed().as_secs() >= duration {
            info!("Duration of {}s reached", duration);
            break;
        }
    }
}
