//! # Kernel Memory Configuration
//!
//! Compile-time constants shared by every crate of the memory core. This crate
//! is the single source of truth for the memory layout, the swap device
//! geometry and the object cache limits; changing a value here reconfigures
//! the allocators, the page-table walker and the swap store together.
//!
//! ## Modules
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`memory`] | Page size, kernel direct map, page-table geometry. |
//! | [`swap`] | Sector size, sectors per page, swap device number, token layout. |
//! | [`slab`] | Sized cache classes and cache name length. |
//!
//! ## Virtual Memory Layout (i386, two-level paging)
//!
//! ```text
//! 0x0000_0000 ┌─────────────────────────────────┐
//!             │         User Space              │
//!             │  (VMAs, demand paged, swapped)  │
//! KERNBASE    ├─────────────────────────────────┤ 0xC000_0000
//!             │   Direct map of physical RAM    │
//!             │   [0, KMEMSIZE)                 │
//! KERNTOP     ├─────────────────────────────────┤ 0xF800_0000
//!             │          unused                 │
//! 0xFFFF_FFFF └─────────────────────────────────┘
//! ```
//!
//! Each page-directory entry covers [`PTSIZE`](memory::PTSIZE) bytes (4 MiB);
//! each page-table entry covers one 4 KiB page.
//!
//! ## Swap Layout
//!
//! A page that has been written to the swap device leaves a *swap token* in
//! its page-table entry: `(linear_page_index + 1) << 8`. The token's slot
//! number selects [`PAGE_NSECT`](swap::PAGE_NSECT) consecutive sectors on the
//! device. Slot 0 is never used, so a zero entry always means "never mapped".
//!
//! All values are validated with `const` assertions at compile time.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod memory;
pub mod slab;
pub mod swap;
