//! Detonation engine demo
//!
//! Drives the decision engine against the in-memory sandbox: a creative actor
//! on a resistant floor and a wandering opponent that respawns whenever it
//! dies. Settings come from the environment (see `Config::from_env`).

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use detonation_engine::config::Config;
use detonation_engine::game::DecisionEngine;
use detonation_engine::net::ChannelSink;
use detonation_engine::sandbox::{SandboxServer, SandboxWorld};
use detonation_engine::util::time::SystemClock;
use detonation_engine::world::{ActorState, BlockKind, EntityId, EntityKind, Vec3, WorldView};

const ARENA_HALF_EXTENT: i32 = 12;
const ARENA_CENTER: Vec3 = Vec3::new(0.5, 1.0, 0.5);
/// Opponents roam within this many blocks of the actor
const WANDER_RADIUS: f64 = 4.0;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    init_tracing(&config.log_level);

    info!("Starting detonation engine demo");
    info!(
        profile = %config.profile,
        tick_ms = config.tick_ms,
        seed = config.demo_seed,
        "Configuration loaded"
    );

    let settings = config.settings.clone();

    let mut actor = ActorState::new(EntityId(1), ARENA_CENTER);
    actor.creative = true;
    let world = SandboxWorld::builder()
        .actor(actor)
        .floor(0, ARENA_HALF_EXTENT, BlockKind::Resistant)
        .build();

    let (sink, actions) = ChannelSink::channel();
    let mut server = SandboxServer::new(world, actions, config.demo_seed);
    let mut engine = DecisionEngine::new(sink, Arc::new(SystemClock::new()))?;

    server
        .spawn_player(ARENA_CENTER, 2.0, WANDER_RADIUS)
        .deliver(&mut engine, &settings);

    let mut ticker = interval(Duration::from_millis(config.tick_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let ticks_per_second = (1_000 / config.tick_ms).max(1);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let mut tick: u64 = 0;
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {}
        }
        tick += 1;

        let report = engine.tick(server.world(), &settings, config.tick_ms as i64);
        if let Some(dispatch) = &report.dispatched {
            debug!(tick, ?dispatch, "Dispatched");
        }

        for event in server.process() {
            event.deliver(&mut engine, &settings);
        }
        server.wander(ARENA_CENTER, WANDER_RADIUS);
        server.step();

        let opponent_alive = server
            .world()
            .entities()
            .iter()
            .any(|e| e.kind == EntityKind::Player);
        if !opponent_alive {
            server
                .spawn_player(ARENA_CENTER, 2.0, WANDER_RADIUS)
                .deliver(&mut engine, &settings);
        }

        if tick % ticks_per_second == 0 {
            info!(
                tick,
                kills = server.kills(),
                status = %engine.status(&settings),
                "Engine status"
            );
        }

        if config.demo_ticks > 0 && tick >= config.demo_ticks {
            break;
        }
    }

    engine.reset();
    info!(ticks = tick, kills = server.kills(), "Demo finished");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, stopping");
        }
        _ = terminate => {
            info!("Received terminate signal, stopping");
        }
    }
}
