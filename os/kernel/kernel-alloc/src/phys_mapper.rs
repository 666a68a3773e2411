//! # Direct-Map PhysMapper for Kernel Virtual Memory
//!
//! The kernel maps all of physical memory (up to `KMEMSIZE`) linearly at
//! `KERNBASE`, so physical address `pa` is reachable at `KERNBASE + pa`.
//! [`DirectPhysMapper`] implements [`PhysMapper`] on top of that mapping and
//! is what the allocators use to reach page tables, slabs and the buddy
//! index on the target.
//!
//! Host tests substitute a mapper over simulated RAM.
//!
//! ## Example
//! ```rust
//! use kernel_alloc::phys_mapper::DirectPhysMapper;
//! use kernel_memory_addresses::PhysicalAddress;
//! assert_eq!(DirectPhysMapper::kernel_virtual(PhysicalAddress::new(0x1000)), 0xC000_1000);
//! ```

use kernel_info::memory::{KERNBASE, KERNTOP};
use kernel_memory_addresses::PhysicalAddress;
use kernel_vmem::PhysMapper;

/// [`PhysMapper`] for the kernel's direct map at `KERNBASE`.
///
/// # Safety
/// - The direct map must be present and cover the referenced physical range.
/// - The returned reference must only be used for valid, mapped, and writable memory.
pub struct DirectPhysMapper;

impl DirectPhysMapper {
    /// Kernel virtual address of `pa`.
    #[inline]
    #[must_use]
    pub const fn kernel_virtual(pa: PhysicalAddress) -> usize {
        debug_assert!(pa.as_u32() < KERNTOP - KERNBASE);
        KERNBASE as usize + pa.as_usize()
    }
}

impl PhysMapper for DirectPhysMapper {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        let va = Self::kernel_virtual(pa) as *mut T;
        // SAFETY: Caller must ensure the physical address is valid and direct-mapped.
        unsafe { &mut *va }
    }
}
