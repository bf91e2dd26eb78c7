//! Rollback Buffer
//!
//! Fixed-capacity history of `(snapshot, inputs)` per tick, used to rewind
//! and resimulate when authoritative state arrives.
//!
//! Storage is a ring indexed by `tick % capacity`. Each slot is tagged with
//! the tick it holds (the snapshot's own tick), so a lookup is one index
//! computation plus a tag check. Eviction is slot based, not FIFO: pushing
//! tick `t` displaces whatever tick previously mapped to the same slot.

use thiserror::Error;
use tracing::trace;

use crate::sim::InputToken;

use super::snapshot::SimulationSnapshot;

/// One buffered tick: the state after the tick and the inputs that produced it.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameData {
    /// State at `snapshot.tick`.
    pub snapshot: SimulationSnapshot,
    /// Inputs applied during that tick.
    pub inputs: Vec<InputToken>,
}

impl FrameData {
    /// Tick this frame belongs to.
    pub fn tick(&self) -> u64 {
        self.snapshot.tick
    }
}

/// Why a tick is not in the buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum FrameMiss {
    /// Older than the retained window.
    #[error("tick {tick} evicted (oldest retained is {oldest})")]
    Evicted {
        /// Requested tick.
        tick: u64,
        /// Oldest tick the window can still hold.
        oldest: u64,
    },
    /// Newer than the newest buffered tick.
    #[error("tick {tick} is ahead of newest tick {newest}")]
    Ahead {
        /// Requested tick.
        tick: u64,
        /// Newest buffered tick.
        newest: u64,
    },
    /// Inside the window but never pushed.
    #[error("tick {0} was never buffered")]
    Missing(u64),
}

/// Result of a buffer lookup.
pub type Lookup<'a> = Result<&'a FrameData, FrameMiss>;

/// Fixed-capacity tick-indexed frame history.
#[derive(Clone, Debug)]
pub struct RollbackBuffer {
    slots: Vec<Option<FrameData>>,
    newest_tick: Option<u64>,
}

impl RollbackBuffer {
    /// Create an empty buffer.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "RollbackBuffer capacity must be > 0");
        Self {
            slots: vec![None; capacity],
            newest_tick: None,
        }
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Newest tick pushed so far.
    pub fn newest_tick(&self) -> Option<u64> {
        self.newest_tick
    }

    #[inline]
    fn slot_index(&self, tick: u64) -> usize {
        (tick % self.slots.len() as u64) as usize
    }

    /// Oldest tick the current window can hold.
    fn window_start(&self, newest: u64) -> u64 {
        newest.saturating_sub(self.slots.len() as u64 - 1)
    }

    /// Store the frame for `snapshot.tick`, overwriting any frame already
    /// held for that tick and displacing any stale tick sharing its slot.
    ///
    /// Returns the displaced frame of a different tick, if any. Ticks older
    /// than the retained window are refused, since their slot belongs to a
    /// newer tick.
    pub fn push(
        &mut self,
        snapshot: SimulationSnapshot,
        inputs: Vec<InputToken>,
    ) -> Result<Option<FrameData>, FrameMiss> {
        let tick = snapshot.tick;
        if let Some(newest) = self.newest_tick {
            let oldest = self.window_start(newest);
            if tick < oldest {
                return Err(FrameMiss::Evicted { tick, oldest });
            }
        }

        let index = self.slot_index(tick);
        let previous = self.slots[index].replace(FrameData { snapshot, inputs });
        self.newest_tick = Some(self.newest_tick.map_or(tick, |n| n.max(tick)));

        Ok(previous.filter(|frame| {
            let stale = frame.tick() != tick;
            if stale {
                trace!(evicted = frame.tick(), by = tick, "Rollback slot reused");
            }
            stale
        }))
    }

    /// Look up the frame for `tick`. Never panics.
    pub fn get(&self, tick: u64) -> Lookup<'_> {
        let newest = self.newest_tick.ok_or(FrameMiss::Missing(tick))?;
        if tick > newest {
            return Err(FrameMiss::Ahead { tick, newest });
        }
        let oldest = self.window_start(newest);
        if tick < oldest {
            return Err(FrameMiss::Evicted { tick, oldest });
        }

        match &self.slots[self.slot_index(tick)] {
            Some(frame) if frame.tick() == tick => Ok(frame),
            _ => Err(FrameMiss::Missing(tick)),
        }
    }

    /// Frame for the newest tick.
    pub fn latest(&self) -> Option<&FrameData> {
        self.newest_tick.and_then(|tick| self.get(tick).ok())
    }

    fn live_frames(&self) -> impl Iterator<Item = &FrameData> {
        let window = self
            .newest_tick
            .map(|newest| (self.window_start(newest), newest));
        self.slots.iter().flatten().filter(move |frame| {
            window.is_some_and(|(oldest, newest)| (oldest..=newest).contains(&frame.tick()))
        })
    }

    /// Oldest tick still retrievable.
    pub fn oldest_tick(&self) -> Option<u64> {
        self.live_frames().map(FrameData::tick).min()
    }

    /// Number of retrievable frames.
    pub fn len(&self) -> usize {
        self.live_frames().count()
    }

    /// True when no frame is retrievable.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every frame.
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.newest_tick = None;
    }
}

// =============================================================================
// TESTS
// =============================================================================
