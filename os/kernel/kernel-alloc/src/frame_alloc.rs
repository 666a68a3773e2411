//! # Buddy Frame Allocator
//!
//! Allocates and frees power-of-two runs of physical frames out of one
//! contiguous region. The region is split into:
//!
//! ```text
//! base                 base + P               base + P + L
//!  ├── buddy index ─────┼──────── L managed leaf frames ───────┼── unused ──┤
//!  │  (RESERVED)        │  (PROPERTY while free)                │ (RESERVED) │
//! ```
//!
//! `L` is the largest power of two for which the leaves plus the index
//! (`P = L / 512 + 1` frames) fit into the region. Frame descriptors for the
//! whole physical range are borrowed as a [`FrameTable`].

use crate::buddy::BuddyTree;
use crate::frame::{Frame, FrameFlags, FrameTable};
use kernel_info::memory::MAX_FRAMES;
use kernel_memory_addresses::{FrameNumber, PhysicalAddress};
use kernel_vmem::{FrameAlloc, PhysMapper};

/// The physical frame allocator context.
pub struct BuddyFrameAlloc<'m> {
    frames: FrameTable<'m>,
    tree: BuddyTree<'m>,
    /// First managed leaf frame.
    base: FrameNumber,
    nr_free: u32,
}

impl<'m> BuddyFrameAlloc<'m> {
    /// Take over `count` frames starting at `base`.
    ///
    /// The descriptors in `frames` cover physical frames `0 .. frames.len()`.
    /// The index is written into the first frames of the region through
    /// `mapper`.
    ///
    /// # Safety
    /// The region must be RAM that is mapped through `mapper` for `'m` and
    /// not used by anything else.
    ///
    /// # Panics
    /// If the region is too small to manage a single frame, exceeds the
    /// descriptor table or reaches past the direct map.
    pub unsafe fn init<M: PhysMapper>(
        mapper: &M,
        frames: &'m mut [Frame],
        base: FrameNumber,
        count: u32,
    ) -> Self {
        assert!(count > 0, "buddy init with an empty region");
        assert!(
            base.as_usize() + count as usize <= frames.len(),
            "buddy region exceeds the frame table"
        );
        assert!(
            base.as_usize() + count as usize <= MAX_FRAMES,
            "buddy region lies outside the direct map"
        );

        let leaves = BuddyTree::leaves_for(count);
        assert!(leaves > 0, "buddy region of {count} frames is too small");
        let prefix = BuddyTree::index_frames(leaves);

        let mut frames = FrameTable::new(frames);
        for i in 0..count {
            let frame = &mut frames[base + i];
            *frame = Frame::new();
            if (prefix..prefix + leaves).contains(&i) {
                frame.flags = FrameFlags::PROPERTY;
            }
        }

        let nodes = unsafe { mapper.phys_to_slice_mut::<u32>(base.base(), 2 * leaves as usize) };
        let tree = BuddyTree::new(nodes, leaves);

        log::info!("buddy init: total {count}, use {prefix}, free {leaves}");
        Self {
            frames,
            tree,
            base: base + prefix,
            nr_free: leaves,
        }
    }

    /// Allocate a run of at least `n` frames (rounded up to a power of two).
    ///
    /// # Panics
    /// If `n` is zero.
    pub fn alloc(&mut self, n: u32) -> Option<FrameNumber> {
        let (offset, size) = self.tree.alloc(n)?;
        let first = self.base + offset;
        for i in 0..size {
            let frame = &mut self.frames[first + i];
            debug_assert!(frame.is_free(), "{:?} handed out twice", first + i);
            frame.flags.remove(FrameFlags::PROPERTY);
            frame.ref_count = 0;
        }
        self.nr_free -= size;
        Some(first)
    }

    /// Free the run of `n` frames starting at `first`.
    ///
    /// # Panics
    /// If the run was not obtained from [`alloc`](Self::alloc) (see
    /// [`BuddyTree::free`]).
    pub fn free(&mut self, first: FrameNumber, n: u32) {
        assert!(
            first >= self.base && first - self.base < self.tree.leaves(),
            "buddy free of {first:?} outside the managed range"
        );
        let offset = first - self.base;
        let size = self.tree.free(offset, n);
        for i in 0..size {
            self.frames[first + i].flags.insert(FrameFlags::PROPERTY);
        }
        self.nr_free += size;
    }

    /// Largest run that can currently be allocated.
    #[inline]
    #[must_use]
    pub fn free_count(&self) -> u32 {
        self.tree.root()
    }

    /// Total number of free frames, fragmented or not.
    #[inline]
    #[must_use]
    pub const fn nr_free_frames(&self) -> u32 {
        self.nr_free
    }

    /// Number of frames managed by the allocator.
    #[inline]
    #[must_use]
    pub const fn nr_managed(&self) -> u32 {
        self.tree.leaves()
    }

    /// First managed frame.
    #[inline]
    #[must_use]
    pub const fn managed_base(&self) -> FrameNumber {
        self.base
    }

    #[inline]
    #[must_use]
    pub const fn frames(&self) -> &FrameTable<'m> {
        &self.frames
    }

    #[inline]
    pub const fn frames_mut(&mut self) -> &mut FrameTable<'m> {
        &mut self.frames
    }

    /// Descriptor of the frame containing `pa`.
    #[inline]
    #[must_use]
    pub fn frame(&self, pa: PhysicalAddress) -> &Frame {
        &self.frames[pa.frame()]
    }

    #[inline]
    pub fn frame_mut(&mut self, pa: PhysicalAddress) -> &mut Frame {
        &mut self.frames[pa.frame()]
    }
}

impl FrameAlloc for BuddyFrameAlloc<'_> {
    fn alloc_frame(&mut self) -> Option<PhysicalAddress> {
        self.alloc(1).map(FrameNumber::base)
    }

    fn free_frame(&mut self, frame: PhysicalAddress) {
        self.free(frame.frame(), 1);
    }

    fn set_ref_count(&mut self, frame: PhysicalAddress, count: u32) {
        self.frame_mut(frame).ref_count = count;
    }
}
