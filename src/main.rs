//! rollsync demo
//!
//! Runs a seeded session through prediction, an injected authoritative
//! correction, replay recording with ghost playback, replay verification
//! and a batch throughput run.

use anyhow::{bail, Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use rollsync::{
    batch::{run_batch, BatchConfig},
    core::hash::short_hex,
    network::{LoopbackTransport, Message, NetSyncService},
    replay::{verify_replay, GhostStatus, ReplayManager},
    sim::{PhysicsConfig, PlatformerSim},
    sync::snapshot,
    InputToken, ReconciliationService, Simulation, SyncConfig, TICK_RATE, VERSION,
};

const DEMO_SEED: u64 = 12345;
const DEMO_TICKS: u64 = 600;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("failed to set tracing subscriber")?;

    let config = SyncConfig::from_env();
    info!("rollsync v{}", VERSION);
    info!("Tick Rate: {} Hz", TICK_RATE);
    info!(
        "Rollback capacity: {} ticks, checkpoint every {} ticks, check: {}",
        config.rollback_capacity, config.checkpoint_interval, config.divergence_check
    );

    demo_rollback(&config)?;
    demo_replay(&config)?;

    let report = run_batch(BatchConfig {
        rollback_capacity: config.rollback_capacity,
        ..BatchConfig::default()
    })
    .await?;
    info!(
        "Batch: {} steps in {:.2?} ({:.0} steps/sec)",
        report.total_steps, report.wall_time, report.steps_per_sec
    );

    Ok(())
}

/// Input script shared by every demo.
fn scripted_input(t: u64) -> Vec<InputToken> {
    match t % 90 {
        0 => vec![InputToken::Right, InputToken::Jump],
        1..=44 => vec![InputToken::Right],
        50 => vec![InputToken::Shoot],
        60 => vec![InputToken::Dash],
        65..=80 => vec![InputToken::Left],
        _ => vec![],
    }
}

/// Predict locally, ship a corrected snapshot over the loopback and roll back.
fn demo_rollback(config: &SyncConfig) -> Result<()> {
    info!("=== Prediction & Rollback ===");

    let mut service = ReconciliationService::new(
        PlatformerSim::new(DEMO_SEED),
        config.rollback_capacity,
        config.divergence_check,
    );
    let mut net = NetSyncService::new(LoopbackTransport::new());

    for t in 0..120 {
        let inputs = scripted_input(t);
        let tick = service.predict(&inputs)?;
        net.send_input(tick, &inputs)?;
    }

    // Pretend the server saw the player 5 units further right at tick 60.
    let Ok(frame) = service.buffer().get(60) else {
        bail!("tick 60 not buffered");
    };
    let mut authoritative = frame.snapshot.clone();
    if let Some(player) = authoritative.players.first_mut() {
        player.pos[0] += 5.0;
    }
    net.send_snapshot(&authoritative)?;

    for message in net.process_messages()? {
        if let Message::Snapshot(msg) = message {
            let snap = msg.snapshot()?;
            let outcome = service.on_authoritative_snapshot(&snap)?;
            info!("Authoritative tick {}: {:?}", msg.tick, outcome);
            net.send_ack(msg.tick)?;
        }
    }

    let world = service.sim().world();
    info!(
        "After rollback: tick {}, player at ({:.2}, {:.2})",
        world.tick, world.players[0].pos[0], world.players[0].pos[1]
    );

    // Same seed and inputs, with the correction applied at the same tick,
    // must land in the same state.
    let mut check = PlatformerSim::new(DEMO_SEED);
    for t in 0..60 {
        check.advance_one_tick(&scripted_input(t));
    }
    snapshot::restore(&mut check, &authoritative)?;
    for t in 60..120 {
        check.advance_one_tick(&scripted_input(t));
    }

    let expected = snapshot::capture(&check, false).checksum();
    let actual = snapshot::capture(service.sim(), false).checksum();
    info!("Resimulated: {}  Reference: {}", short_hex(&actual), short_hex(&expected));
    if expected != actual {
        bail!("DETERMINISM FAILURE: rollback result differs from reference");
    }
    info!("DETERMINISM VERIFIED: rollback matches reference");
    Ok(())
}

/// Record two runs, replay the best as a ghost and verify it.
fn demo_replay(config: &SyncConfig) -> Result<()> {
    info!("=== Replay & Ghost ===");

    let mut manager = ReplayManager::new(config);
    let physics = PhysicsConfig::default();

    for (run, ticks) in [(1, DEMO_TICKS), (2, DEMO_TICKS / 2)] {
        let mut sim = PlatformerSim::with_layout(DEMO_SEED, physics.clone(), 3);
        manager.on_level_load("demo", "default", DEMO_SEED);
        let mut ghost_finished_at = None;

        for t in 0..ticks {
            let inputs = scripted_input(t);
            manager.record_tick(&sim, &inputs);
            if manager.step_ghost(&sim) == Some(GhostStatus::Finished) && ghost_finished_at.is_none() {
                ghost_finished_at = Some(t);
            }
            sim.advance_one_tick(&inputs);
        }

        let outcome = manager.commit_run()?;
        info!(
            "Run {}: {} ticks, ghost finished at {:?}, commit {:?}",
            run, ticks, ghost_finished_at, outcome
        );
    }

    let store = manager.store();
    match store.load("demo", rollsync::replay::ReplayKind::Best)? {
        Some(best) => {
            let result = verify_replay(&best, PlatformerSim::with_layout(best.seed, physics, 3));
            info!(
                "Best run: {} ticks, {} checkpoints, valid: {}",
                result.ticks,
                result.checkpoint_results.len(),
                result.valid
            );
            if !result.valid {
                bail!("replay verification failed: {:?}", result.first_divergence());
            }
        }
        None => warn!("No best replay stored"),
    }

    Ok(())
}
