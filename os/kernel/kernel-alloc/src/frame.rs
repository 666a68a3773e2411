//! # Frame Descriptors
//!
//! One [`Frame`] per physical page, indexed by [`FrameNumber`]. The array is
//! created once for the whole physical range and then borrowed by the
//! allocator context as a [`FrameTable`].
//!
//! A descriptor carries:
//! - the reference count (number of page-table entries mapping the frame),
//! - the [`FrameFlags`],
//! - slab bookkeeping when the frame is carved into objects,
//! - two intrusive index links: one for the slab partition lists, one for
//!   the clock list,
//! - the linear address the frame backs while it is swappable.

use crate::slab::CacheId;
use bitflags::bitflags;
use core::ops::{Index, IndexMut};
use kernel_memory_addresses::{FrameNumber, LinearAddress};

bitflags! {
    /// State bits of a [`Frame`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FrameFlags: u32 {
        /// Not managed by the buddy allocator (kernel image, buddy index,
        /// holes).
        const RESERVED = 1 << 0;
        /// Free and available for allocation.
        const PROPERTY = 1 << 1;
        /// Mapped into user space and linked into a clock list.
        const SWAPPABLE = 1 << 2;
        /// The swap slot holds an up-to-date copy of the content.
        const SWAP_BACKED = 1 << 3;
        /// Carved into slab objects.
        const SLAB = 1 << 4;
    }
}

/// A `prev`/`next` pair linking a frame into one index-linked list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Link {
    pub prev: Option<FrameNumber>,
    pub next: Option<FrameNumber>,
    pub linked: bool,
}

impl Link {
    pub const UNLINKED: Self = Self {
        prev: None,
        next: None,
        linked: false,
    };
}

/// Slab state kept in the descriptor of a frame used as a slab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlabInfo {
    /// The owning cache.
    pub cache: CacheId,
    /// Number of allocated objects.
    pub in_use: u16,
    /// Index of the first free object, `-1` if the slab is full.
    pub free: i16,
}

/// Descriptor of one physical page frame.
#[derive(Debug, Clone, Copy)]
pub struct Frame {
    pub ref_count: u32,
    pub flags: FrameFlags,
    pub slab: Option<SlabInfo>,
    pub slab_link: Link,
    pub clock_link: Link,
    /// Linear address backed by this frame while it is swappable.
    pub linear: LinearAddress,
}

impl Frame {
    /// A reserved descriptor; the buddy allocator releases what it manages.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ref_count: 0,
            flags: FrameFlags::RESERVED,
            slab: None,
            slab_link: Link::UNLINKED,
            clock_link: Link::UNLINKED,
            linear: LinearAddress::new(0),
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_reserved(&self) -> bool {
        self.flags.contains(FrameFlags::RESERVED)
    }

    #[inline]
    #[must_use]
    pub const fn is_free(&self) -> bool {
        self.flags.contains(FrameFlags::PROPERTY)
    }

    /// Increment the reference count and return the new value.
    #[inline]
    pub const fn ref_inc(&mut self) -> u32 {
        self.ref_count += 1;
        self.ref_count
    }

    /// Decrement the reference count and return the new value.
    ///
    /// # Panics
    /// When the count is already zero.
    #[inline]
    pub fn ref_dec(&mut self) -> u32 {
        assert!(self.ref_count > 0, "reference count underflow");
        self.ref_count -= 1;
        self.ref_count
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}

/// The frame descriptor array, indexed by absolute frame number.
pub struct FrameTable<'m> {
    frames: &'m mut [Frame],
}

impl<'m> FrameTable<'m> {
    /// Borrow a descriptor array covering frames `0 .. frames.len()`.
    pub const fn new(frames: &'m mut [Frame]) -> Self {
        Self { frames }
    }

    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn get(&self, frame: FrameNumber) -> Option<&Frame> {
        self.frames.get(frame.as_usize())
    }

    #[inline]
    pub fn get_mut(&mut self, frame: FrameNumber) -> Option<&mut Frame> {
        self.frames.get_mut(frame.as_usize())
    }
}

impl Index<FrameNumber> for FrameTable<'_> {
    type Output = Frame;

    #[inline]
    fn index(&self, frame: FrameNumber) -> &Frame {
        &self.frames[frame.as_usize()]
    }
}

impl IndexMut<FrameNumber> for FrameTable<'_> {
    #[inline]
    fn index_mut(&mut self, frame: FrameNumber) -> &mut Frame {
        &mut self.frames[frame.as_usize()]
    }
}
