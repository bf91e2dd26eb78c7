//! Batch Simulation
//!
//! Runs many independent simulation instances in parallel for throughput
//! measurement and soak testing. Each instance owns its simulation, RNG and
//! rollback buffer and is driven by a seeded random policy on a blocking
//! worker; only its summary comes back, over a one-shot channel.

use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::core::hash::short_hex;
use crate::core::rng::{derive_stream_seed, DeterministicRng};
use crate::sim::{InputToken, PlatformerSim};
use crate::sync::reconcile::{DivergenceCheck, ReconciliationService};
use crate::sync::rollback::FrameMiss;
use crate::sync::snapshot;
use crate::DEFAULT_ROLLBACK_CAPACITY;

/// Batch run errors.
#[derive(Debug, Error)]
pub enum BatchError {
    /// A worker ended without reporting.
    #[error("instance {0} exited without a result")]
    WorkerLost(usize),

    /// A worker could not buffer a tick.
    #[error("instance {instance} failed: {source}")]
    Instance {
        /// Failing instance.
        instance: usize,
        /// Buffer failure.
        #[source]
        source: FrameMiss,
    },
}

/// Batch parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
    /// Number of parallel instances.
    pub instances: usize,
    /// Ticks per instance.
    pub steps: u64,
    /// Seed every instance seed is derived from.
    pub base_seed: u64,
    /// Rollback buffer capacity per instance.
    pub rollback_capacity: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            instances: 4,
            steps: 1000,
            base_seed: 42,
            rollback_capacity: DEFAULT_ROLLBACK_CAPACITY,
        }
    }
}

/// Summary of one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceResult {
    /// Instance index.
    pub instance: usize,
    /// World seed used.
    pub seed: u64,
    /// Ticks simulated.
    pub steps: u64,
    /// Final score.
    pub score: i64,
    /// Final death counter.
    pub dead_count: i64,
    /// Short hex checksum of the final snapshot.
    pub final_checksum: String,
}

/// Aggregate batch result.
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// Ticks simulated across all instances.
    pub total_steps: u64,
    /// Wall-clock duration.
    pub wall_time: Duration,
    /// Throughput.
    pub steps_per_sec: f64,
    /// Per-instance results, by instance index.
    pub results: Vec<InstanceResult>,
}

/// Random input for one tick.
fn random_policy(rng: &mut DeterministicRng) -> Vec<InputToken> {
    let mut inputs = Vec::with_capacity(2);
    match rng.randint(0, 2) {
        0 => inputs.push(InputToken::Left),
        1 => inputs.push(InputToken::Right),
        _ => {}
    }
    for token in [InputToken::Jump, InputToken::Dash, InputToken::Shoot] {
        if rng.random() < 0.05 {
            inputs.push(token);
        }
    }
    inputs
}

fn run_instance(instance: usize, config: &BatchConfig) -> Result<InstanceResult, BatchError> {
    let seed = derive_stream_seed(config.base_seed, instance as u64);
    let mut policy = DeterministicRng::new(derive_stream_seed(seed, 1));
    let mut service = ReconciliationService::new(
        PlatformerSim::new(seed),
        config.rollback_capacity.max(1),
        DivergenceCheck::default(),
    );

    for _ in 0..config.steps {
        let inputs = random_policy(&mut policy);
        service
            .predict(&inputs)
            .map_err(|source| BatchError::Instance { instance, source })?;
    }

    let final_snapshot = snapshot::capture(service.sim(), false);
    Ok(InstanceResult {
        instance,
        seed,
        steps: config.steps,
        score: final_snapshot.score,
        dead_count: final_snapshot.dead_count,
        final_checksum: short_hex(&final_snapshot.checksum()),
    })
}

/// Run every instance to completion and aggregate the results.
pub async fn run_batch(config: BatchConfig) -> Result<BatchReport, BatchError> {
    let start = Instant::now();
    info!(
        instances = config.instances,
        steps = config.steps,
        base_seed = config.base_seed,
        "Starting batch"
    );

    let receivers: Vec<_> = (0..config.instances)
        .map(|instance| {
            let (tx, rx) = oneshot::channel();
            let config = config.clone();
            tokio::task::spawn_blocking(move || {
                // The receiver only disappears if the batch was dropped.
                let _ = tx.send(run_instance(instance, &config));
            });
            (instance, rx)
        })
        .collect();

    let mut results = Vec::with_capacity(receivers.len());
    for (instance, rx) in receivers {
        let result = rx.await.map_err(|_| BatchError::WorkerLost(instance))??;
        debug!(instance, checksum = %result.final_checksum, "Instance finished");
        results.push(result);
    }

    let wall_time = start.elapsed();
    let total_steps: u64 = results.iter().map(|r| r.steps).sum();
    let secs = wall_time.as_secs_f64();
    let steps_per_sec = if secs > 0.0 {
        total_steps as f64 / secs
    } else {
        0.0
    };

    info!(total_steps, ?wall_time, steps_per_sec, "Batch complete");
    Ok(BatchReport {
        total_steps,
        wall_time,
        steps_per_sec,
        results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> BatchConfig {
        BatchConfig {
            instances: 3,
            steps: 200,
            base_seed: 7,
            rollback_capacity: 32,
        }
    }

    #[tokio::test]
    async fn test_batch_aggregates_all_instances() {
        let report = run_batch(small()).await.unwrap();

        assert_eq!(report.results.len(), 3);
        assert_eq!(report.total_steps, 600);
        for (i, result) in report.results.iter().enumerate() {
            assert_eq!(result.instance, i);
            assert_eq!(result.steps, 200);
        }
        let seeds: std::collections::HashSet<_> = report.results.iter().map(|r| r.seed).collect();
        assert_eq!(seeds.len(), 3);
    }

    #[tokio::test]
    async fn test_batch_is_deterministic() {
        let a = run_batch(small()).await.unwrap();
        let b = run_batch(small()).await.unwrap();
        assert_eq!(a.results, b.results);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let report = run_batch(BatchConfig {
            instances: 0,
            ..small()
        })
        .await
        .unwrap();
        assert_eq!(report.total_steps, 0);
        assert!(report.results.is_empty());
    }

    #[test]
    fn test_random_policy_is_seeded() {
        let mut a = DeterministicRng::new(3);
        let mut b = DeterministicRng::new(3);
        for _ in 0..50 {
            assert_eq!(random_policy(&mut a), random_policy(&mut b));
        }
    }
}
