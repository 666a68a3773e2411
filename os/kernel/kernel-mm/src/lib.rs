//! # Kernel Memory Manager
//!
//! The virtual side of the memory core, built on `kernel-alloc` and
//! `kernel-vmem`:
//!
//! - [`AddressSpace`]: the sorted, disjoint [`Vma`]s of one user address
//!   space, its page directory and its clock state.
//! - [`MemoryManager`]: resolves page faults, maps and unmaps pages, and
//!   evicts pages to a [`SwapStore`] under memory pressure.
//! - [`ClockState`]: second-chance victim selection over the resident,
//!   swappable frames of an address space.
//! - [`BlockSwapStore`]: a [`SwapStore`] over a sector-addressed
//!   [`BlockDevice`].
//!
//! ## Locking
//!
//! Nothing in here locks on its own. The kernel keeps a single
//! [`GlobalMemory`] (an [`IrqSpinLock`](kernel_sync::IrqSpinLock) around the
//! manager) and calls into it with interrupts masked:
//!
//! ```rust,ignore
//! static MEMORY: GlobalMemory<'static, DirectPhysMapper, BlockSwapStore<Ide>> = ...;
//!
//! fn page_fault(space: &mut AddressSpace, code: PageFaultErrorCode, la: LinearAddress) -> i32 {
//!     match MEMORY.with_lock(|mm| mm.handle_page_fault(space, code, la)) {
//!         Ok(()) => 0,
//!         Err(e) => e.code(),
//!     }
//! }
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

mod address_space;
pub mod clock;
mod fault;
mod manager;
pub mod swap;
pub mod vma;

pub use crate::address_space::AddressSpace;
pub use crate::clock::{ClockState, Victim};
pub use crate::fault::FaultError;
pub use crate::manager::{GlobalMemory, MemoryManager};
pub use crate::swap::{BlockDevice, BlockSwapStore, SwapError, SwapStore};
pub use crate::vma::{MAX_VMAS, VmFlags, Vma, VmaError, VmaList};
