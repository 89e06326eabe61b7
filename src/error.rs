//! Error types and the stable ordinal status taxonomy.

/// Ordinal status codes. Stable across releases: callers that cannot
/// pattern-match a Rust enum (e.g. across an FFI boundary) can switch on
/// the discriminant instead.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The operation completed normally.
    Ok = 0,
    /// The operation failed (bad input, exhaustion, not-found, ...).
    Fail = 1,
    /// `close` was called on a pool that is not fully free.
    NotFreed = 2,
    /// An init/shutdown operation was called out of order.
    CalledAgain = 3,
}

/// Errors produced by the public API.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// `new_alloc` was asked for a zero-byte allocation.
    #[error("requested size must be greater than zero")]
    InvalidSize,

    /// No gap in the pool is large enough to satisfy the request.
    #[error("pool has no gap large enough to satisfy the request")]
    OutOfMemory,

    /// A handle does not resolve to a live pool or allocation, or its
    /// generation is stale.
    #[error("handle does not resolve to a live pool or allocation")]
    NotFound,

    /// The handle resolves to a node that is currently a gap, not an
    /// allocation (e.g. a double free).
    #[error("allocation handle refers to a node that is not currently allocated")]
    NotAllocated,

    /// `close` was called on a pool that still has live allocations or
    /// more than one gap.
    #[error("pool still has live allocations or is not reduced to a single gap")]
    NotFreed,

    /// `registry_init` was called on an already-initialized registry.
    #[error("registry already initialized")]
    AlreadyInitialized,

    /// `registry_shutdown` (or an operation requiring it) was called
    /// before `registry_init`.
    #[error("registry was never initialized")]
    NotInitialized,

    /// An internal invariant was violated. These are bugs, not recoverable
    /// conditions; the pool that raised one should be treated as unusable.
    #[error("internal invariant violated: {0}")]
    Corrupted(&'static str),
}

impl Error {
    /// Maps this error onto the stable ordinal [`Status`] taxonomy.
    #[must_use]
    pub const fn as_status(&self) -> Status {
        match self {
            Error::NotFreed => Status::NotFreed,
            Error::AlreadyInitialized | Error::NotInitialized => Status::CalledAgain,
            Error::InvalidSize
            | Error::OutOfMemory
            | Error::NotFound
            | Error::NotAllocated
            | Error::Corrupted(_) => Status::Fail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_ordinals_are_stable() {
        assert_eq!(Status::Ok as u8, 0);
        assert_eq!(Status::Fail as u8, 1);
        assert_eq!(Status::NotFreed as u8, 2);
        assert_eq!(Status::CalledAgain as u8, 3);
    }

    #[test]
    fn not_freed_maps_to_not_freed_status() {
        assert_eq!(Error::NotFreed.as_status(), Status::NotFreed);
    }

    #[test]
    fn init_shutdown_errors_map_to_called_again() {
        assert_eq!(Error::AlreadyInitialized.as_status(), Status::CalledAgain);
        assert_eq!(Error::NotInitialized.as_status(), Status::CalledAgain);
    }

    #[test]
    fn remaining_errors_map_to_fail() {
        assert_eq!(Error::InvalidSize.as_status(), Status::Fail);
        assert_eq!(Error::OutOfMemory.as_status(), Status::Fail);
        assert_eq!(Error::NotFound.as_status(), Status::Fail);
        assert_eq!(Error::NotAllocated.as_status(), Status::Fail);
        assert_eq!(Error::Corrupted("test").as_status(), Status::Fail);
    }
}
