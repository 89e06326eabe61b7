//! A fixed-size region allocator: carve a byte region into variable-size
//! sub-allocations, track free gaps with a size-ordered index, and
//! coalesce adjacent gaps on release.
//!
//! The core is a [`Pool`]: a backing byte region, a [`Node`](node::Node)
//! table linking segments into a doubly-linked, address-ordered list by
//! stable index, and a gap index of the currently-unallocated segments
//! sorted by `(size, base)`. Pools are only reachable through a
//! [`Registry`], which hands out generation-tagged [`PoolHandle`]s so a
//! stale handle from a closed pool is rejected rather than silently
//! reused.
//!
//! ```
//! use region_pool::{Policy, Registry};
//!
//! let mut registry = Registry::new(4);
//! let pool = registry.open(100, Policy::FirstFit, None).unwrap();
//!
//! let a = registry.new_alloc(pool, 20).unwrap();
//! let b = registry.new_alloc(pool, 30).unwrap();
//! assert_eq!(registry.inspect(pool).unwrap().len(), 3);
//!
//! registry.del_alloc(pool, a).unwrap();
//! registry.del_alloc(pool, b).unwrap();
//! assert_eq!(registry.inspect(pool).unwrap().len(), 1);
//! registry.close(pool).unwrap();
//! ```
//!
//! This crate does not provide thread safety, persistence, or alignment
//! guarantees beyond byte granularity; a caller needing shared access
//! wraps the public operations in external mutual exclusion at pool
//! granularity.

#![deny(missing_docs)]
#![deny(unused)]
#![warn(clippy::all)]

mod error;
mod gap_index;
mod node;
mod pool;
mod registry;
mod types;

pub use error::{Error, Status};
pub use pool::Pool;
pub use registry::{registry_init, registry_shutdown, with_global_registry, Registry};
pub use types::{AllocHandle, GrowthPolicy, Policy, PoolConfig, PoolHandle, SegmentInfo};
