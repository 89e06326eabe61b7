//! Shared value types: policy tag, growth configuration, handles, and the
//! record returned by `inspect`.

/// Allocation policy. Encoding is part of the public contract: first-fit
/// is `0`, best-fit is `1`, and this ordering must not change.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Walk the address-ordered list, take the first gap large enough.
    FirstFit = 0,
    /// Walk the size-ordered gap index, take the smallest gap large enough.
    BestFit = 1,
}

/// Growth behavior shared by the node table, the gap index, and the
/// registry's own slot table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrowthPolicy {
    /// When `used / capacity` exceeds this ratio, the container grows.
    pub fill_threshold: f32,
    /// Capacity is multiplied by this factor on growth.
    pub growth_factor: usize,
}

impl Default for GrowthPolicy {
    fn default() -> Self {
        Self {
            fill_threshold: 0.75,
            growth_factor: 2,
        }
    }
}

/// Tunable parameters for a single pool's auxiliary tables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoolConfig {
    /// Growth behavior for the node table and the gap index.
    pub growth: GrowthPolicy,
    /// Node table slots present at `open`.
    pub initial_node_capacity: usize,
    /// Gap index entries present at `open`.
    pub initial_gap_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            growth: GrowthPolicy::default(),
            initial_node_capacity: 16,
            initial_gap_capacity: 8,
        }
    }
}

/// Stable, generation-tagged reference to an open pool.
///
/// Growth events never invalidate a `PoolHandle`; only `close` does, by
/// bumping the slot's generation so a stale copy is rejected rather than
/// silently resolving to whatever pool now occupies the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolHandle {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

/// Stable, generation-tagged reference to one allocation inside a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AllocHandle {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

/// One live segment of a pool, as reported by `inspect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentInfo {
    /// Size of the segment in bytes.
    pub size: usize,
    /// `true` if the segment is currently handed to a caller.
    pub allocated: bool,
}
