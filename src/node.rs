//! The node table: a flat arena of segment records linked into a
//! doubly-linked, address-ordered list by stable index.

use tracing::debug;

use crate::types::GrowthPolicy;

/// Sentinel meaning "no node" for `prev`/`next` links.
pub(crate) const NONE: u32 = u32::MAX;

/// Metadata for one contiguous segment of a pool.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Node {
    /// Byte offset of this segment within the pool.
    pub base: usize,
    /// Size of this segment in bytes.
    pub size: usize,
    /// `true` once some list node occupies this slot.
    pub in_use: bool,
    /// `true` if the segment is handed to a caller (vs. a gap).
    pub allocated: bool,
    /// Bumped each time this slot is handed out for a brand-new node,
    /// so a handle captured before the slot was reused is rejected.
    pub generation: u32,
    pub prev: u32,
    pub next: u32,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            base: 0,
            size: 0,
            in_use: false,
            allocated: false,
            generation: 0,
            prev: NONE,
            next: NONE,
        }
    }
}

/// A dynamically grown flat array of [`Node`] slots.
pub(crate) struct NodeTable {
    slots: Vec<Node>,
    capacity: usize,
    used: usize,
    growth: GrowthPolicy,
}

impl NodeTable {
    pub(crate) fn new(initial_capacity: usize, growth: GrowthPolicy) -> Self {
        let capacity = initial_capacity.max(1);
        Self {
            slots: vec![Node::default(); capacity],
            capacity,
            used: 0,
            growth,
        }
    }

    pub(crate) fn get(&self, idx: u32) -> &Node {
        &self.slots[idx as usize]
    }

    pub(crate) fn get_mut(&mut self, idx: u32) -> &mut Node {
        &mut self.slots[idx as usize]
    }

    /// Grows the table if the load factor exceeds the configured
    /// threshold. Existing indices remain valid: `Vec::resize` only
    /// appends new, unused slots.
    pub(crate) fn maybe_grow(&mut self) -> bool {
        let load = self.used as f32 / self.capacity as f32;
        if load <= self.growth.fill_threshold {
            return false;
        }
        let new_capacity = (self.capacity * self.growth.growth_factor).max(self.capacity + 1);
        debug!(old_capacity = self.capacity, new_capacity, "growing node table");
        self.slots.resize(new_capacity, Node::default());
        self.capacity = new_capacity;
        true
    }

    /// Finds a free slot by linear scan and marks it in use, bumping its
    /// generation. A linear scan is fine here: node counts are expected to
    /// stay small relative to memory latency.
    ///
    /// Forces an out-of-band growth (beyond the load-factor threshold in
    /// [`Self::maybe_grow`]) if no free slot exists at all, so this never
    /// panics; the bool reports whether that happened, so the caller
    /// knows whether the gap index needs rebuilding too.
    pub(crate) fn acquire_slot(&mut self) -> (u32, bool) {
        let mut grew = false;
        if self.used >= self.capacity {
            let new_capacity = (self.capacity * self.growth.growth_factor).max(self.capacity + 1);
            debug!(old_capacity = self.capacity, new_capacity, "force-growing node table for split");
            self.slots.resize(new_capacity, Node::default());
            self.capacity = new_capacity;
            grew = true;
        }
        let idx = self
            .slots
            .iter()
            .position(|n| !n.in_use)
            .expect("a free slot must exist after growth");
        let node = &mut self.slots[idx];
        node.generation = node.generation.wrapping_add(1);
        node.in_use = true;
        self.used += 1;
        (idx as u32, grew)
    }

    pub(crate) fn release_slot(&mut self, idx: u32) {
        let node = &mut self.slots[idx as usize];
        node.in_use = false;
        node.allocated = false;
        node.prev = NONE;
        node.next = NONE;
        self.used -= 1;
    }

    pub(crate) fn used(&self) -> usize {
        self.used
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }
}
