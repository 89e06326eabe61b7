//! Walks through the allocator's lifecycle by hand: open a pool, split it
//! with a few allocations, free them out of order to trigger both
//! coalescing directions, and print the layout after each step.
//!
//! Run with: cargo run --example pool_walkthrough

use region_pool::{Policy, Registry};

fn print_layout(registry: &Registry, pool: region_pool::PoolHandle, label: &str) {
    let segments = registry.inspect(pool).unwrap();
    let rendered: Vec<String> = segments
        .iter()
        .map(|s| format!("{}:{}", if s.allocated { "alloc" } else { "gap" }, s.size))
        .collect();
    println!("{label}: [{}]", rendered.join(", "));
}

fn main() {
    tracing_subscriber::fmt::init();

    let mut registry = Registry::new(4);
    let pool = registry
        .open(100, Policy::FirstFit, None)
        .expect("opening a 100-byte pool should never fail");
    print_layout(&registry, pool, "opened");

    let a = registry.new_alloc(pool, 20).unwrap();
    let b = registry.new_alloc(pool, 30).unwrap();
    print_layout(&registry, pool, "after two allocations");

    registry.del_alloc(pool, a).unwrap();
    print_layout(&registry, pool, "after freeing the first allocation");

    registry.del_alloc(pool, b).unwrap();
    print_layout(&registry, pool, "after freeing the second allocation");

    registry.close(pool).expect("pool is fully free, close must succeed");
    println!("pool closed");
}
