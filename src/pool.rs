//! The pool manager: owns the backing region, the node table, and the gap
//! index, and implements `new_alloc` / `del_alloc` / `inspect`.

use tracing::{debug, error};

use crate::error::Error;
use crate::gap_index::GapIndex;
use crate::node::{NodeTable, NONE};
use crate::types::{AllocHandle, Policy, PoolConfig, SegmentInfo};

/// A single fixed-size byte region, partitioned into allocated and gap
/// segments.
///
/// Use [`crate::Registry::open`] to create one; `Pool` itself has no
/// public constructor, since every pool must be reachable through a
/// [`crate::PoolHandle`].
pub struct Pool {
    // Never read; its only job is to make "acquire/release a region" a
    // real, fallible-in-spirit resource rather than bookkeeping alone.
    _region: Box<[u8]>,
    total_size: usize,
    policy: Policy,
    head: u32,
    nodes: NodeTable,
    gaps: GapIndex,
    alloc_count: usize,
    alloc_bytes: usize,
}

impl Pool {
    pub(crate) fn open(size: usize, policy: Policy, config: PoolConfig) -> Result<Self, Error> {
        if size == 0 {
            return Err(Error::InvalidSize);
        }

        let region = vec![0u8; size].into_boxed_slice();
        let mut nodes = NodeTable::new(config.initial_node_capacity, config.growth);
        let mut gaps = GapIndex::new(config.initial_gap_capacity, config.growth);

        let (head, _) = nodes.acquire_slot();
        {
            let node = nodes.get_mut(head);
            node.base = 0;
            node.size = size;
            node.allocated = false;
        }
        gaps.add(size, 0, head);

        Ok(Self {
            _region: region,
            total_size: size,
            policy,
            head,
            nodes,
            gaps,
            alloc_count: 0,
            alloc_bytes: 0,
        })
    }

    /// Total size of the backing region in bytes.
    pub fn total_size(&self) -> usize {
        self.total_size
    }

    /// The allocation policy this pool was opened with.
    pub fn policy(&self) -> Policy {
        self.policy
    }

    /// Number of currently live allocations.
    pub fn alloc_count(&self) -> usize {
        self.alloc_count
    }

    /// Sum of requested sizes over all currently live allocations.
    pub fn alloc_bytes(&self) -> usize {
        self.alloc_bytes
    }

    /// Number of currently unallocated segments.
    pub fn gap_count(&self) -> usize {
        self.gaps.len()
    }

    /// `true` only when the pool is exactly one gap spanning the whole
    /// region: the sole state `close` is willing to accept.
    pub(crate) fn is_fully_free(&self) -> bool {
        self.alloc_count == 0 && self.gaps.len() == 1
    }

    /// Allocates `size` bytes from the pool according to its policy.
    ///
    /// Leaves the pool's layout and counters unchanged on any error path.
    pub fn new_alloc(&mut self, size: usize) -> Result<AllocHandle, Error> {
        if size == 0 {
            return Err(Error::InvalidSize);
        }
        if self.gaps.is_empty() {
            return Err(Error::OutOfMemory);
        }

        if self.nodes.maybe_grow() {
            self.rebuild_gap_index();
        }

        let chosen = match self.policy {
            Policy::FirstFit => self.first_fit(size),
            Policy::BestFit => self.gaps.best_fit(size).map(|(_, node)| node),
        };
        let chosen = chosen.ok_or(Error::OutOfMemory)?;

        if !self.gaps.remove(chosen) {
            error!(node = chosen, "gap index missing chosen node");
            return Err(Error::Corrupted("chosen gap missing from gap index"));
        }

        let orig_size = self.nodes.get(chosen).size;
        {
            let node = self.nodes.get_mut(chosen);
            node.allocated = true;
            node.size = size;
        }

        if orig_size > size {
            let remainder_base = self.nodes.get(chosen).base + size;
            let remainder_size = orig_size - size;
            let old_next = self.nodes.get(chosen).next;

            let (new_idx, grew) = self.nodes.acquire_slot();
            if grew {
                self.rebuild_gap_index();
            }

            {
                let node = self.nodes.get_mut(new_idx);
                node.base = remainder_base;
                node.size = remainder_size;
                node.allocated = false;
                node.prev = chosen;
                node.next = old_next;
            }
            if old_next != NONE {
                self.nodes.get_mut(old_next).prev = new_idx;
            }
            self.nodes.get_mut(chosen).next = new_idx;

            self.gaps.add(remainder_size, remainder_base, new_idx);
        }

        self.alloc_count += 1;
        self.alloc_bytes += size;

        let handle = AllocHandle {
            index: chosen,
            generation: self.nodes.get(chosen).generation,
        };
        debug!(size, policy = ?self.policy, node = chosen, "allocated");
        Ok(handle)
    }

    /// Frees a previously returned allocation, coalescing it with an
    /// adjacent gap on either side.
    pub fn del_alloc(&mut self, handle: AllocHandle) -> Result<(), Error> {
        let idx = handle.index;
        if idx as usize >= self.nodes.capacity() {
            return Err(Error::NotFound);
        }
        {
            let node = self.nodes.get(idx);
            if !node.in_use || node.generation != handle.generation {
                return Err(Error::NotFound);
            }
            if !node.allocated {
                return Err(Error::NotAllocated);
            }
        }

        let freed_size = self.nodes.get(idx).size;
        self.nodes.get_mut(idx).allocated = false;
        self.alloc_count -= 1;
        self.alloc_bytes -= freed_size;

        // Forward coalesce.
        let succ = self.nodes.get(idx).next;
        if succ != NONE && !self.nodes.get(succ).allocated {
            if !self.gaps.remove(succ) {
                error!(node = idx, neighbor = succ, "gap index missing forward neighbor");
                return Err(Error::Corrupted("gap index missing forward neighbor"));
            }
            let succ_size = self.nodes.get(succ).size;
            let succ_next = self.nodes.get(succ).next;
            self.nodes.get_mut(idx).size += succ_size;
            self.nodes.get_mut(idx).next = succ_next;
            if succ_next != NONE {
                self.nodes.get_mut(succ_next).prev = idx;
            }
            self.nodes.release_slot(succ);
        }

        // Backward coalesce. The survivor is the predecessor if it is a
        // gap, otherwise `idx` itself.
        let pred = self.nodes.get(idx).prev;
        let survivor = if pred != NONE && !self.nodes.get(pred).allocated {
            if !self.gaps.remove(pred) {
                error!(node = idx, neighbor = pred, "gap index missing backward neighbor");
                return Err(Error::Corrupted("gap index missing backward neighbor"));
            }
            let idx_size = self.nodes.get(idx).size;
            let idx_next = self.nodes.get(idx).next;
            self.nodes.get_mut(pred).size += idx_size;
            self.nodes.get_mut(pred).next = idx_next;
            if idx_next != NONE {
                self.nodes.get_mut(idx_next).prev = pred;
            }
            self.nodes.release_slot(idx);
            pred
        } else {
            idx
        };

        let survivor_node = self.nodes.get(survivor);
        self.gaps.add(survivor_node.size, survivor_node.base, survivor);
        debug!(freed_size, gap_count = self.gaps.len(), "freed");
        Ok(())
    }

    /// Returns one record per live segment, in address order.
    pub fn inspect(&self) -> Vec<SegmentInfo> {
        let mut out = Vec::new();
        let mut cur = self.head;
        while cur != NONE {
            let node = self.nodes.get(cur);
            out.push(SegmentInfo {
                size: node.size,
                allocated: node.allocated,
            });
            cur = node.next;
        }
        out
    }

    fn first_fit(&self, min_size: usize) -> Option<u32> {
        let mut cur = self.head;
        while cur != NONE {
            let node = self.nodes.get(cur);
            if !node.allocated && node.size >= min_size {
                return Some(cur);
            }
            cur = node.next;
        }
        None
    }

    /// Re-derives the gap index from scratch by walking the
    /// address-ordered list. Called after a node-table growth event; see
    /// the module docs for why this is a defensive re-derivation rather
    /// than a correctness requirement of index-based references.
    fn rebuild_gap_index(&mut self) {
        self.gaps.clear();
        let mut cur = self.head;
        while cur != NONE {
            let node = self.nodes.get(cur);
            if !node.allocated {
                self.gaps.add(node.size, node.base, cur);
            }
            cur = node.next;
        }
    }

    #[cfg(test)]
    pub(crate) fn invariants_hold(&self) -> bool {
        let mut sum = 0usize;
        let mut alloc_sum = 0usize;
        let mut gap_count = 0usize;
        let mut cur = self.head;
        let mut expected_base = 0usize;
        let mut prev_was_gap = false;
        while cur != NONE {
            let node = self.nodes.get(cur);
            if node.base != expected_base {
                return false;
            }
            if !node.allocated {
                if prev_was_gap {
                    return false;
                }
                gap_count += 1;
            }
            prev_was_gap = !node.allocated;
            sum += node.size;
            if node.allocated {
                alloc_sum += node.size;
            }
            expected_base += node.size;
            cur = node.next;
        }
        sum == self.total_size
            && alloc_sum == self.alloc_bytes
            && gap_count == self.gaps.len()
            && self.gaps.is_sorted_and_unique()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PoolConfig;

    fn open(size: usize, policy: Policy) -> Pool {
        Pool::open(size, policy, PoolConfig::default()).unwrap()
    }

    #[test]
    fn fresh_pool_is_one_unallocated_segment() {
        let pool = open(100, Policy::FirstFit);
        assert_eq!(pool.inspect(), vec![SegmentInfo { size: 100, allocated: false }]);
        assert!(pool.is_fully_free());
        assert!(pool.invariants_hold());
    }

    #[test]
    fn zero_size_open_is_rejected() {
        assert!(matches!(
            Pool::open(0, Policy::FirstFit, PoolConfig::default()),
            Err(Error::InvalidSize)
        ));
    }

    #[test]
    fn zero_size_alloc_is_rejected() {
        let mut pool = open(100, Policy::FirstFit);
        assert!(matches!(pool.new_alloc(0), Err(Error::InvalidSize)));
        assert!(pool.is_fully_free());
    }

    #[test]
    fn scenario_two_allocations_split_the_remainder() {
        let mut pool = open(100, Policy::FirstFit);
        let a = pool.new_alloc(20).unwrap();
        let b = pool.new_alloc(30).unwrap();
        assert_eq!(
            pool.inspect(),
            vec![
                SegmentInfo { size: 20, allocated: true },
                SegmentInfo { size: 30, allocated: true },
                SegmentInfo { size: 50, allocated: false },
            ]
        );
        assert_eq!(pool.alloc_count(), 2);
        assert_eq!(pool.alloc_bytes(), 50);
        assert_eq!(pool.gap_count(), 1);
        assert!(pool.invariants_hold());
        drop(a);
        drop(b);
    }

    #[test]
    fn scenario_free_then_free_coalesces_fully() {
        let mut pool = open(100, Policy::FirstFit);
        let a = pool.new_alloc(20).unwrap();
        let b = pool.new_alloc(30).unwrap();

        pool.del_alloc(a).unwrap();
        assert_eq!(
            pool.inspect(),
            vec![
                SegmentInfo { size: 20, allocated: false },
                SegmentInfo { size: 30, allocated: true },
                SegmentInfo { size: 50, allocated: false },
            ]
        );
        assert_eq!(pool.gap_count(), 2);
        assert!(pool.invariants_hold());

        pool.del_alloc(b).unwrap();
        assert_eq!(pool.inspect(), vec![SegmentInfo { size: 100, allocated: false }]);
        assert_eq!(pool.gap_count(), 1);
        assert!(pool.is_fully_free());
        assert!(pool.invariants_hold());
    }

    #[test]
    fn scenario_best_fit_serves_from_merged_gap() {
        let mut pool = open(60, Policy::BestFit);
        let x = pool.new_alloc(10).unwrap();
        let y = pool.new_alloc(10).unwrap();
        let _z = pool.new_alloc(10).unwrap();
        pool.del_alloc(y).unwrap();
        pool.del_alloc(x).unwrap();
        pool.new_alloc(15).unwrap();

        assert_eq!(
            pool.inspect(),
            vec![
                SegmentInfo { size: 15, allocated: true },
                SegmentInfo { size: 5, allocated: false },
                SegmentInfo { size: 10, allocated: true },
                SegmentInfo { size: 30, allocated: false },
            ]
        );
        assert!(pool.invariants_hold());
    }

    #[test]
    fn alloc_exactly_matching_gap_does_not_split() {
        let mut pool = open(50, Policy::FirstFit);
        pool.new_alloc(50).unwrap();
        assert_eq!(pool.inspect(), vec![SegmentInfo { size: 50, allocated: true }]);
        assert_eq!(pool.gap_count(), 0);
        assert!(pool.invariants_hold());
    }

    #[test]
    fn alloc_larger_than_any_gap_fails_and_is_a_no_op() {
        let mut pool = open(50, Policy::FirstFit);
        let before = pool.inspect();
        assert!(matches!(pool.new_alloc(51), Err(Error::OutOfMemory)));
        assert_eq!(pool.inspect(), before);
        assert_eq!(pool.alloc_count(), 0);
    }

    #[test]
    fn alloc_on_fully_allocated_pool_fails() {
        let mut pool = open(10, Policy::FirstFit);
        pool.new_alloc(10).unwrap();
        assert!(matches!(pool.new_alloc(1), Err(Error::OutOfMemory)));
    }

    #[test]
    fn del_alloc_on_unknown_handle_is_not_found() {
        let mut pool = open(10, Policy::FirstFit);
        let bogus = AllocHandle { index: 0, generation: 999 };
        assert!(matches!(pool.del_alloc(bogus), Err(Error::NotFound)));
    }

    #[test]
    fn double_free_is_rejected() {
        let mut pool = open(10, Policy::FirstFit);
        let a = pool.new_alloc(10).unwrap();
        pool.del_alloc(a).unwrap();
        assert!(matches!(pool.del_alloc(a), Err(Error::NotAllocated)));
    }

    #[test]
    fn first_fit_takes_earliest_address_not_smallest() {
        let mut pool = open(100, Policy::FirstFit);
        let a = pool.new_alloc(10).unwrap();
        let b = pool.new_alloc(40).unwrap();
        pool.new_alloc(10).unwrap();
        pool.del_alloc(a).unwrap();
        pool.del_alloc(b).unwrap();
        // The leading gap (coalesced back to 50 bytes) comes before the
        // trailing 40-byte gap in address order; first-fit must pick it
        // even though it is not the smallest candidate.
        pool.new_alloc(5).unwrap();
        assert_eq!(pool.inspect()[0], SegmentInfo { size: 5, allocated: true });
        assert!(pool.invariants_hold());
    }

    #[test]
    fn node_table_growth_preserves_invariants() {
        let config = PoolConfig {
            initial_node_capacity: 2,
            ..PoolConfig::default()
        };
        let mut pool = Pool::open(1000, Policy::FirstFit, config).unwrap();
        let mut handles = Vec::new();
        for _ in 0..20 {
            handles.push(pool.new_alloc(10).unwrap());
        }
        assert!(pool.invariants_hold());
        assert_eq!(pool.alloc_count(), 20);
        for h in handles {
            pool.del_alloc(h).unwrap();
        }
        assert!(pool.is_fully_free());
        assert!(pool.invariants_hold());
    }

    #[test]
    fn stale_handle_from_an_absorbed_slot_is_rejected_after_reuse() {
        let mut pool = open(30, Policy::FirstFit);
        let a = pool.new_alloc(10).unwrap();
        let b = pool.new_alloc(10).unwrap();

        // Freeing both triggers a cascade of forward- then backward-coalesce
        // that releases b's slot entirely (it is absorbed into a's
        // predecessor gap, not the other way around).
        pool.del_alloc(a).unwrap();
        pool.del_alloc(b).unwrap();
        assert!(pool.is_fully_free());

        // The next split's remainder slot is acquired by linear scan, which
        // reuses b's now-free slot and bumps its generation.
        pool.new_alloc(5).unwrap();

        assert!(matches!(pool.del_alloc(b), Err(Error::NotFound)));
    }

    mod property {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone, Copy)]
        enum Op {
            Alloc(usize),
            Free(usize),
        }

        fn op_strategy() -> impl Strategy<Value = Op> {
            prop_oneof![
                (1usize..=48).prop_map(Op::Alloc),
                (0usize..8).prop_map(Op::Free),
            ]
        }

        proptest! {
            /// For any sequence of alloc/free ops under either policy, the
            /// cross-cutting invariants from the testable-properties section
            /// hold after every single step, not just at the end.
            #[test]
            fn invariants_hold_after_any_op_sequence(
                best_fit in any::<bool>(),
                ops in proptest::collection::vec(op_strategy(), 0..64),
            ) {
                let policy = if best_fit { Policy::BestFit } else { Policy::FirstFit };
                let mut pool = open(2000, policy);
                let mut live: Vec<AllocHandle> = Vec::new();
                for op in &ops {
                    match *op {
                        Op::Alloc(size) => {
                            if let Ok(handle) = pool.new_alloc(size) {
                                live.push(handle);
                            }
                        }
                        Op::Free(pick) => {
                            if !live.is_empty() {
                                let handle = live.remove(pick % live.len());
                                prop_assert!(pool.del_alloc(handle).is_ok());
                            }
                        }
                    }
                    prop_assert!(pool.invariants_hold());
                }
            }
        }
    }

    #[quickcheck_macros::quickcheck]
    fn qc_invariants_hold_after_alloc_free_sequence(raw_sizes: Vec<u8>) -> bool {
        let mut pool = open(4000, Policy::FirstFit);
        let mut live: Vec<AllocHandle> = Vec::new();
        for (i, &raw) in raw_sizes.iter().enumerate() {
            let size = (raw as usize % 64) + 1;
            if i % 3 == 2 && !live.is_empty() {
                let handle = live.remove(i % live.len());
                if pool.del_alloc(handle).is_err() {
                    return false;
                }
            } else if let Ok(handle) = pool.new_alloc(size) {
                live.push(handle);
            }
            if !pool.invariants_hold() {
                return false;
            }
        }
        true
    }
}
