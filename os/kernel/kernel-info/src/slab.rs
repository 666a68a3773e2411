//! # Object Cache Limits

/// Smallest sized cache served by `kmalloc`.
pub const SIZED_CACHE_MIN: usize = 16;

/// Largest sized cache served by `kmalloc`.
pub const SIZED_CACHE_MAX: usize = 2048;

/// Number of power-of-two sized caches (`16, 32, ..., 2048`).
pub const SIZED_CACHE_NUM: usize = 8;

/// Maximum number of bytes kept from a cache name.
pub const CACHE_NAME_LEN: usize = 16;

/// Bytes of free-list bookkeeping per slab object.
pub const SLAB_LINK_BYTES: usize = 2;

const _: () = {
    assert!(SIZED_CACHE_MIN << (SIZED_CACHE_NUM - 1) == SIZED_CACHE_MAX);
    assert!(SIZED_CACHE_MIN.is_power_of_two());
};
