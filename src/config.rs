//! Runtime configuration.
//!
//! Every field has a default; `from_env` overrides them from `ROLLSYNC_*`
//! variables:
//!
//! | Variable                         | Field                 | Default     |
//! |----------------------------------|-----------------------|-------------|
//! | `ROLLSYNC_ROLLBACK_CAPACITY`     | `rollback_capacity`   | 600         |
//! | `ROLLSYNC_CHECKPOINT_INTERVAL`   | `checkpoint_interval` | 10          |
//! | `ROLLSYNC_DIVERGENCE_CHECK`      | `divergence_check`    | `checksum`  |
//! | `ROLLSYNC_REPLAY_DIR`            | `replay_dir`          | `data/replays` |
//! | `ROLLSYNC_GHOST_ENABLED`         | `ghost_enabled`       | `true`      |
//! | `ROLLSYNC_GHOST_MODE`            | `ghost_mode`          | `best`      |
//!
//! Unparseable values fall back to the default with a warning.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::sync::reconcile::DivergenceCheck;
use crate::{DEFAULT_CHECKPOINT_INTERVAL, DEFAULT_ROLLBACK_CAPACITY};

/// Which stored run the ghost prefers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GhostMode {
    /// Fastest run first, most recent as fallback.
    #[default]
    Best,
    /// Most recent run first, fastest as fallback.
    Last,
}

impl fmt::Display for GhostMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GhostMode::Best => "best",
            GhostMode::Last => "last",
        })
    }
}

impl FromStr for GhostMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "best" => Ok(GhostMode::Best),
            "last" => Ok(GhostMode::Last),
            other => Err(format!("unknown ghost mode: {other}")),
        }
    }
}

/// Synchronization and replay settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncConfig {
    /// Rollback buffer slots (ticks of history).
    pub rollback_capacity: usize,
    /// Ticks between replay checkpoints.
    pub checkpoint_interval: u64,
    /// Divergence comparison for reconciliation.
    pub divergence_check: DivergenceCheck,
    /// Directory holding replay files.
    pub replay_dir: PathBuf,
    /// Record runs and show ghosts.
    pub ghost_enabled: bool,
    /// Ghost source preference.
    pub ghost_mode: GhostMode,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            rollback_capacity: DEFAULT_ROLLBACK_CAPACITY,
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
            divergence_check: DivergenceCheck::default(),
            replay_dir: PathBuf::from("data/replays"),
            ghost_enabled: true,
            ghost_mode: GhostMode::default(),
        }
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> T
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match raw {
        None => default,
        Some(value) => match value.trim().parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(key, value = %value, error = %e, "Ignoring invalid config value");
                default
            }
        },
    }
}

impl SyncConfig {
    /// Load from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let capacity = parse_or(
            "ROLLSYNC_ROLLBACK_CAPACITY",
            lookup("ROLLSYNC_ROLLBACK_CAPACITY"),
            defaults.rollback_capacity,
        );
        let rollback_capacity = if capacity == 0 {
            warn!("ROLLSYNC_ROLLBACK_CAPACITY must be > 0, using default");
            defaults.rollback_capacity
        } else {
            capacity
        };

        Self {
            rollback_capacity,
            checkpoint_interval: parse_or(
                "ROLLSYNC_CHECKPOINT_INTERVAL",
                lookup("ROLLSYNC_CHECKPOINT_INTERVAL"),
                defaults.checkpoint_interval,
            )
            .max(1),
            divergence_check: parse_or(
                "ROLLSYNC_DIVERGENCE_CHECK",
                lookup("ROLLSYNC_DIVERGENCE_CHECK"),
                defaults.divergence_check,
            ),
            replay_dir: lookup("ROLLSYNC_REPLAY_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.replay_dir),
            ghost_enabled: lookup("ROLLSYNC_GHOST_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.ghost_enabled),
            ghost_mode: parse_or(
                "ROLLSYNC_GHOST_MODE",
                lookup("ROLLSYNC_GHOST_MODE"),
                defaults.ghost_mode,
            ),
        }
    }
}
