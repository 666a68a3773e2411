//! # Swap Device Geometry

use kernel_memory_addresses::PAGE_SIZE;

/// Size of one disk sector in bytes.
pub const SECTOR_SIZE: usize = 512;

/// Sectors needed to store one page frame.
#[allow(clippy::cast_possible_truncation)]
pub const PAGE_NSECT: u32 = (PAGE_SIZE / SECTOR_SIZE) as u32;

/// Device number of the swap disk.
pub const SWAP_DEV_NO: u32 = 1;

/// Shift of the slot number inside a swap token (`slot << 8`).
pub const SWAP_SLOT_SHIFT: u32 = 8;

const _: () = {
    assert!(PAGE_SIZE.is_multiple_of(SECTOR_SIZE));
    assert!(PAGE_NSECT == 8);
};
