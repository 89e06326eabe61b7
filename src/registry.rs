//! The pool registry: the process-wide directory of open pools. Implemented
//! both as an injectable collaborator (`Registry`) for tests and multiple
//! independent instances, and as a default global singleton behind
//! `registry_init`/`registry_shutdown`.

use std::sync::OnceLock;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::error::Error;
use crate::pool::Pool;
use crate::types::{AllocHandle, GrowthPolicy, Policy, PoolConfig, PoolHandle, SegmentInfo};

enum Slot {
    Empty { generation: u32 },
    Occupied { generation: u32, pool: Pool },
}

/// A flat table of pool handles, grown by the same load-factor policy as
/// a pool's own node table and gap index.
///
/// Capacity is monotonic: a slot freed by `close` is reused by a later
/// `open`, but the table never shrinks, so a [`PoolHandle`] stays
/// meaningful (or is cleanly rejected via its generation) for as long as
/// the `Registry` lives.
pub struct Registry {
    slots: Vec<Slot>,
    capacity: usize,
    used: usize,
    growth: GrowthPolicy,
}

impl Registry {
    /// Creates a registry with the default growth policy.
    #[must_use]
    pub fn new(initial_capacity: usize) -> Self {
        Self::with_growth(initial_capacity, GrowthPolicy::default())
    }

    /// Creates a registry with an explicit growth policy.
    #[must_use]
    pub fn with_growth(initial_capacity: usize, growth: GrowthPolicy) -> Self {
        let capacity = initial_capacity.max(1);
        let slots = (0..capacity).map(|_| Slot::Empty { generation: 0 }).collect();
        Self {
            slots,
            capacity,
            used: 0,
            growth,
        }
    }

    fn maybe_grow(&mut self) {
        let load = (self.used + 1) as f32 / self.capacity as f32;
        if load <= self.growth.fill_threshold {
            return;
        }
        let new_capacity = (self.capacity * self.growth.growth_factor).max(self.capacity + 1);
        self.slots
            .resize_with(new_capacity, || Slot::Empty { generation: 0 });
        self.capacity = new_capacity;
    }

    /// Opens a new pool and registers it, returning a stable handle.
    pub fn open(
        &mut self,
        size: usize,
        policy: Policy,
        config: Option<PoolConfig>,
    ) -> Result<PoolHandle, Error> {
        let pool = Pool::open(size, policy, config.unwrap_or_default())?;

        self.maybe_grow();
        let idx = self
            .slots
            .iter()
            .position(|s| matches!(s, Slot::Empty { .. }))
            .expect("maybe_grow ensures a free slot exists");
        let generation = match &self.slots[idx] {
            Slot::Empty { generation } => *generation,
            Slot::Occupied { .. } => unreachable!(),
        };
        self.slots[idx] = Slot::Occupied { generation, pool };
        self.used += 1;

        info!(size, policy = ?policy, pool = idx, "pool opened");
        Ok(PoolHandle {
            index: idx as u32,
            generation,
        })
    }

    /// Closes a pool if and only if it is fully free (no allocations, one
    /// gap spanning the whole region).
    pub fn close(&mut self, handle: PoolHandle) -> Result<(), Error> {
        let pool = self.find(handle).ok_or(Error::NotFound)?;
        if !pool.is_fully_free() {
            warn!(pool = handle.index, "close rejected: pool not fully free");
            return Err(Error::NotFreed);
        }
        let idx = handle.index as usize;
        self.slots[idx] = Slot::Empty {
            generation: handle.generation.wrapping_add(1),
        };
        self.used -= 1;
        info!(pool = idx, "pool closed");
        Ok(())
    }

    /// Looks up a pool by handle, rejecting stale generations.
    #[must_use]
    pub fn find(&self, handle: PoolHandle) -> Option<&Pool> {
        match self.slots.get(handle.index as usize)? {
            Slot::Occupied { generation, pool } if *generation == handle.generation => Some(pool),
            _ => None,
        }
    }

    /// Mutable counterpart of [`Self::find`].
    #[must_use]
    pub fn find_mut(&mut self, handle: PoolHandle) -> Option<&mut Pool> {
        match self.slots.get_mut(handle.index as usize)? {
            Slot::Occupied { generation, pool } if *generation == handle.generation => Some(pool),
            _ => None,
        }
    }

    /// Convenience wrapper: `new_alloc` on the pool behind `handle`.
    pub fn new_alloc(&mut self, handle: PoolHandle, size: usize) -> Result<AllocHandle, Error> {
        self.find_mut(handle).ok_or(Error::NotFound)?.new_alloc(size)
    }

    /// Convenience wrapper: `del_alloc` on the pool behind `handle`.
    pub fn del_alloc(&mut self, handle: PoolHandle, alloc: AllocHandle) -> Result<(), Error> {
        self.find_mut(handle).ok_or(Error::NotFound)?.del_alloc(alloc)
    }

    /// Convenience wrapper: `inspect` on the pool behind `handle`.
    pub fn inspect(&self, handle: PoolHandle) -> Result<Vec<SegmentInfo>, Error> {
        self.find(handle).ok_or(Error::NotFound).map(Pool::inspect)
    }
}

static GLOBAL: OnceLock<Mutex<Option<Registry>>> = OnceLock::new();

fn global_cell() -> &'static Mutex<Option<Registry>> {
    GLOBAL.get_or_init(|| Mutex::new(None))
}

/// Initializes the default process-wide registry. Fails with
/// [`Error::AlreadyInitialized`] if called again without an intervening
/// [`registry_shutdown`].
pub fn registry_init(capacity: usize) -> Result<(), Error> {
    let mut guard = global_cell().lock();
    if guard.is_some() {
        return Err(Error::AlreadyInitialized);
    }
    *guard = Some(Registry::new(capacity));
    info!(capacity, "global registry initialized");
    Ok(())
}

/// Releases the default process-wide registry. Fails with
/// [`Error::NotInitialized`] if it was never initialized (or already shut
/// down).
pub fn registry_shutdown() -> Result<(), Error> {
    let mut guard = global_cell().lock();
    if guard.take().is_none() {
        return Err(Error::NotInitialized);
    }
    info!("global registry shut down");
    Ok(())
}

/// Runs `f` against the default process-wide registry. Fails with
/// [`Error::NotInitialized`] if [`registry_init`] has not been called.
pub fn with_global_registry<R>(f: impl FnOnce(&mut Registry) -> R) -> Result<R, Error> {
    let mut guard = global_cell().lock();
    match guard.as_mut() {
        Some(registry) => Ok(f(registry)),
        None => Err(Error::NotInitialized),
    }
}
