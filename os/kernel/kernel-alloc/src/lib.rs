//! # Kernel Frame and Object Allocation
//!
//! The physical side of the memory core: who owns which page frame, and how
//! frames are handed out whole or carved into small objects.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  Slab Allocator                     │
//! │    • Named caches of fixed-size objects             │
//! │    • kmalloc / kfree over 16..2048 byte classes     │
//! └─────────────────┬───────────────────────────────────┘
//!                   │ one frame per slab
//! ┌─────────────────▼───────────────────────────────────┐
//! │              Buddy Frame Allocator                  │
//! │    • Power-of-two runs of 4 KiB frames              │
//! │    • Implicit binary tree in the region prefix      │
//! └─────────────────┬───────────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────────┐
//! │               Frame Descriptors                     │
//! │    • Reference count and flags per frame            │
//! │    • Index links for slab and clock lists           │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! Memory is reached through a [`kernel_vmem::PhysMapper`]:
//! [`phys_mapper::DirectPhysMapper`] on the target, a RAM simulator in tests.
//!
//! None of the types here lock. The kernel keeps them inside one
//! interrupt-masked critical section (see `kernel-sync`).
//!
//! ## Usage
//! ```rust,ignore
//! use kernel_alloc::{BuddyFrameAlloc, Frame, SlabAllocator};
//!
//! let mut pmm = unsafe { BuddyFrameAlloc::init(&mapper, &mut frames, base, count) };
//! let run = pmm.alloc(4).expect("four frames");
//! pmm.free(run, 4);
//!
//! let mut slab = SlabAllocator::new();
//! let obj = slab.kmalloc(100, &mut pmm, &mapper)?;
//! slab.kfree(obj, &mut pmm, &mapper);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod buddy;
pub mod frame;
pub mod frame_alloc;
pub mod frame_list;
pub mod phys_mapper;
pub mod slab;

pub use crate::frame::{Frame, FrameFlags, FrameTable, Link, SlabInfo};
pub use crate::frame_alloc::BuddyFrameAlloc;
pub use crate::frame_list::{ClockLink, FrameList, LinkKind, SlabLink};
pub use crate::slab::{CacheId, ObjectHook, SlabAllocator, SlabCounts, SlabError};
