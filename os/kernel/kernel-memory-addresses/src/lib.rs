//! # Physical and Linear Address Types (i386, 32-bit)
//!
//! Strongly typed wrappers for the raw 32-bit values that flow through the
//! memory core: physical addresses, linear (paged) addresses and physical
//! page frame numbers.
//!
//! ## Overview
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`PhysicalAddress`] | A byte address in physical memory. |
//! | [`LinearAddress`] | A byte address translated by the two-level page table. |
//! | [`FrameNumber`] | Index of a 4 KiB physical frame (`pa >> 12`). |
//!
//! The wrappers are `#[repr(transparent)]` and zero-cost; they exist only so
//! that a linear address can never be handed to code expecting a physical
//! one (and vice versa).
//!
//! ## Linear address split
//!
//! ```text
//! | 31‒22 | 21‒12 | 11‒0   |
//! |  PDX  |  PTX  | Offset |
//! ```
//!
//! [`LinearAddress::dir_index`] and [`LinearAddress::table_index`] extract the
//! page-directory and page-table indices.
//!
//! ## Typical Usage
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let la = LinearAddress::new(0x0040_3123);
//! assert_eq!(la.dir_index(), 1);
//! assert_eq!(la.table_index(), 3);
//! assert_eq!(la.page_offset(), 0x123);
//!
//! let pa = PhysicalAddress::new(0x0012_3456);
//! let frame = pa.frame();
//! assert_eq!(frame.as_u32(), 0x123);
//! assert_eq!(frame.base().as_u32(), 0x0012_3000);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

mod frame_number;
mod linear_address;
mod physical_address;

pub use crate::frame_number::FrameNumber;
pub use crate::linear_address::LinearAddress;
pub use crate::physical_address::PhysicalAddress;

/// Size of one page frame in bytes.
pub const PAGE_SIZE: usize = 4096;

/// `log2(PAGE_SIZE)`.
pub const PAGE_SHIFT: u32 = 12;

/// Mask of the in-page offset bits.
pub const PAGE_MASK: u32 = (1 << PAGE_SHIFT) - 1;

const _: () = {
    assert!(PAGE_SIZE == 1 << PAGE_SHIFT);
};

/// Align `x` down to the nearest multiple of `a`.
///
/// `a` must be a non-zero power of two.
///
/// ```rust
/// # use kernel_memory_addresses::align_down;
/// assert_eq!(align_down(4095, 4096), 0);
/// assert_eq!(align_down(8191, 4096), 4096);
/// ```
#[inline]
#[must_use]
pub const fn align_down(x: u32, a: u32) -> u32 {
    x & !(a - 1)
}
