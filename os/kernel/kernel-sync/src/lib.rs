//! # Kernel synchronization primitives
//!
//! The memory core runs on a single processor, but interrupts may re-enter
//! the kernel at any point. Every structural mutation (buddy tree update,
//! slab partition move, VMA insertion, clock list splice) therefore runs
//! inside one critical section that masks interrupts and holds a lock:
//! [`IrqSpinLock`].

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod irq;
mod irq_lock;

pub use irq::IrqGuard;
pub use irq_lock::{IrqSpinLock, IrqSpinLockGuard};
