//! # Virtual Memory Support
//!
//! i386 two-level paging helpers for the kernel memory core.
//!
//! ## What you get
//! - The 32-bit entry layout [`PageEntryBits`] with named accessors.
//! - Typed [`PageDirectory`] / [`PageTable`] and their entries.
//! - The page-table walker: [`walk`] (lookup) and [`walk_create`].
//! - [`SwapEntry`] tokens for swapped-out pages.
//! - The collaborator seams [`FrameAlloc`] and [`PhysMapper`].
//! - [`PageFaultErrorCode`] to decode the hardware fault error code.
//!
//! ## Linear Address → Physical Address Walk
//!
//! Each 32-bit linear address is divided into three fields:
//!
//! ```text
//! | 31‒22 | 21‒12 | 11‒0   |
//! |  PDX  |  PTX  | Offset |
//! ```
//!
//! ```text
//!  CR3 → Page Directory → Page Table → Physical Page
//!             │               │
//!             │               └───► PTE (maps 4 KiB page, or holds a swap token)
//!             └───────────────────► PDE (points to a page table)
//! ```
//!
//! | Level | Table | Entry | Description |
//! |:------|:------|:------|:------------|
//! | 1 | **PD** (Page Directory) | **PDE** | One per address space; each entry covers 4 MiB. |
//! | 2 | **PT** (Page Table) | **PTE** | Each entry maps a 4 KiB page. |
//!
//! Page tables are created on demand by [`walk_create`]; a directory entry is
//! always installed with present + writable + user so that the leaf entry
//! alone decides the effective permissions.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod fault_code;
mod page_entry_bits;
pub mod page_table;
mod swap_entry;
mod tlb;
pub mod walk;

pub use crate::fault_code::PageFaultErrorCode;
pub use crate::page_entry_bits::PageEntryBits;
pub use crate::page_table::{PageDirectory, PageTable, PdEntry, PtEntry};
pub use crate::swap_entry::SwapEntry;
pub use crate::tlb::tlb_invalidate;
pub use crate::walk::{WalkError, walk, walk_create};

/// Re-export constants as info module.
pub use kernel_info::memory as info;

use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress};

/// Frame source for page tables.
///
/// Returned frames **must** be 4 KiB aligned. Returns `None` on
/// out-of-memory.
pub trait FrameAlloc {
    /// Allocate one 4 KiB *physical* frame.
    fn alloc_frame(&mut self) -> Option<PhysicalAddress>;

    /// Return one frame obtained from [`alloc_frame`](Self::alloc_frame).
    fn free_frame(&mut self, frame: PhysicalAddress);

    /// Record the number of references to `frame`.
    fn set_ref_count(&mut self, frame: PhysicalAddress, count: u32);
}

/// Converts physical addresses to *temporarily* usable references in the
/// current address space (e.g., the kernel's direct map at `KERNBASE`).
///
/// # Safety
/// - Implementations must return references to memory that is mapped and
///   writable for as long as the mapper lives.
/// - Type `T` must match the bytes at `pa` (no aliasing UB).
pub trait PhysMapper {
    /// Convert a *physical* address to a usable mutable reference.
    ///
    /// # Safety
    /// The caller picks `T` and `'a`; it must not create two live mutable
    /// references to the same bytes.
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T;

    /// Convert a physical range of `len` values of `T` to a slice.
    ///
    /// # Safety
    /// Same as [`phys_to_mut`](Self::phys_to_mut); the whole range must be
    /// physically contiguous and mapped contiguously.
    unsafe fn phys_to_slice_mut<'a, T>(&self, pa: PhysicalAddress, len: usize) -> &'a mut [T] {
        unsafe {
            let first: &'a mut T = self.phys_to_mut(pa);
            core::slice::from_raw_parts_mut(core::ptr::from_mut(first), len)
        }
    }

    /// Borrow the page directory stored in frame `pa`.
    #[inline]
    fn page_directory_mut(&self, pa: PhysicalAddress) -> &mut PageDirectory {
        unsafe { self.phys_to_mut::<PageDirectory>(pa) }
    }

    /// Borrow the page table stored in frame `pa`.
    #[inline]
    fn page_table_mut(&self, pa: PhysicalAddress) -> &mut PageTable {
        unsafe { self.phys_to_mut::<PageTable>(pa) }
    }

    /// Borrow the raw bytes of frame `pa`.
    #[inline]
    fn frame_bytes_mut(&self, pa: PhysicalAddress) -> &mut [u8; PAGE_SIZE] {
        debug_assert!(pa.is_page_aligned());
        unsafe { self.phys_to_mut::<[u8; PAGE_SIZE]>(pa) }
    }
}
