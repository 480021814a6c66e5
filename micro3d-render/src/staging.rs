//! Pooled staging buffers for queued figures
//!
//! Every queued figure needs its own copy of the posed vertices, because the
//! live instance may be re-posed before the queue is flushed. Buffers are
//! recycled after the blended pass, keyed by the model they were sized for,
//! so steady-state frames stop allocating. Slots hold the model weakly and
//! are pruned once it is dropped.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use log::trace;
use micro3d_mbac::Model;
use parking_lot::Mutex;

use crate::figure::StagingBuffers;

/// Counters for monitoring pool reuse
#[derive(Debug, Default)]
pub struct PoolStatistics {
    /// Buffers handed out from the pool
    pub hits: AtomicU64,
    /// Buffers freshly allocated because the pool was empty
    pub misses: AtomicU64,
    /// Buffers given back after a flush
    pub returns: AtomicU64,
    /// Returned buffers dropped because the model's slot was full
    pub discards: AtomicU64,
    /// Slots removed because their model was dropped
    pub evictions: AtomicU64,
}

impl PoolStatistics {
    /// Share of acquisitions served from the pool (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

/// Identity of a shared model
///
/// The address stays reserved while a slot holds a `Weak` to it, so a key
/// never aliases a different live model.
pub type ModelKey = usize;

pub fn model_key(model: &Arc<Model>) -> ModelKey {
    Arc::as_ptr(model) as ModelKey
}

#[derive(Debug)]
struct Slot {
    model: Weak<Model>,
    buffers: VecDeque<StagingBuffers>,
}

impl Slot {
    fn new(model: &Arc<Model>) -> Self {
        Self {
            model: Arc::downgrade(model),
            buffers: VecDeque::new(),
        }
    }

    fn is_live(&self) -> bool {
        self.model.strong_count() > 0
    }
}

/// Bounded per-model pool of [`StagingBuffers`]
#[derive(Debug)]
pub struct StagingPool {
    slots: Mutex<HashMap<ModelKey, Slot>>,
    limit: usize,
    stats: PoolStatistics,
}

impl StagingPool {
    /// Pool keeping at most `limit` buffers per model
    pub fn new(limit: usize) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            limit,
            stats: PoolStatistics::default(),
        }
    }

    /// A cleared buffer for `model`, reused when one is available
    pub fn acquire(&self, model: &Arc<Model>) -> StagingBuffers {
        let reused = self
            .slots
            .lock()
            .get_mut(&model_key(model))
            .and_then(|slot| slot.buffers.pop_front());

        match reused {
            Some(buffers) => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                buffers
            }
            None => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                StagingBuffers::new()
            }
        }
    }

    /// Give a buffer back; it is dropped when the model's slot is full
    pub fn release(&self, model: &Arc<Model>, mut buffers: StagingBuffers) {
        self.stats.returns.fetch_add(1, Ordering::Relaxed);
        buffers.clear();

        let mut slots = self.slots.lock();
        let slot = slots
            .entry(model_key(model))
            .or_insert_with(|| Slot::new(model));
        if slot.buffers.len() < self.limit {
            slot.buffers.push_back(buffers);
        } else {
            self.stats.discards.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Drop the slots of models that no longer exist, returning how many went
    pub fn prune(&self) -> usize {
        let mut slots = self.slots.lock();
        let before = slots.len();
        slots.retain(|_, slot| slot.is_live());
        let evicted = before - slots.len();
        if evicted > 0 {
            self.stats
                .evictions
                .fetch_add(evicted as u64, Ordering::Relaxed);
            trace!("Pruned {evicted} staging slots of dropped models");
        }
        evicted
    }

    /// Buffers currently pooled for `model`
    pub fn pooled(&self, model: &Arc<Model>) -> usize {
        self.slots
            .lock()
            .get(&model_key(model))
            .map_or(0, |slot| slot.buffers.len())
    }

    /// Number of models with a slot
    pub fn slots(&self) -> usize {
        self.slots.lock().len()
    }

    /// Forget every pooled buffer
    pub fn clear(&self) {
        self.slots.lock().clear();
    }

    pub fn statistics(&self) -> &PoolStatistics {
        &self.stats
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}
