//! # Buddy Index
//!
//! An implicit complete binary tree over `L` leaves, stored as a flat array
//! of `2·L` slots (slot 0 unused, root at 1, children of `i` at `2i` and
//! `2i + 1`). Slot `i` holds the length of the largest free run in its
//! subtree:
//!
//! ```text
//!                 [1] 8
//!          [2] 4          [3] 4
//!       [4] 2  [5] 2   [6] 2  [7] 2
//!      1   1  1   1   1   1  1   1      <- leaves 8..15
//! ```
//!
//! An internal node equals the sum of its children when the whole subtree is
//! free, otherwise the max of its children. Allocating a block sets its node
//! to 0 and leaves the descendants untouched; they are valid again once the
//! block is freed.

/// The index array together with its leaf count.
pub struct BuddyTree<'m> {
    nodes: &'m mut [u32],
    leaves: u32,
}

impl<'m> BuddyTree<'m> {
    /// Largest power of two `L` such that `L` leaves plus the frames holding
    /// their index (`L / 512`, one slot being 4 bytes) fit in `count` frames.
    ///
    /// Returns 0 when `count` cannot hold even a single leaf.
    #[must_use]
    pub const fn leaves_for(count: u32) -> u32 {
        let mut leaves: u32 = 1;
        let mut i = 0;
        while i < 30 {
            if leaves + (leaves >> 9) >= count {
                break;
            }
            leaves <<= 1;
            i += 1;
        }
        leaves >> 1
    }

    /// Frames reserved in front of the leaves to store the index.
    #[must_use]
    pub const fn index_frames(leaves: u32) -> u32 {
        (leaves >> 9) + 1
    }

    /// Build the all-free tree over `leaves` leaves inside `nodes`.
    ///
    /// # Panics
    /// If `leaves` is not a power of two or `nodes` is shorter than
    /// `2 * leaves`.
    pub fn new(nodes: &'m mut [u32], leaves: u32) -> Self {
        assert!(leaves.is_power_of_two(), "buddy leaf count must be a power of two");
        let size = 2 * leaves as usize;
        assert!(nodes.len() >= size, "buddy index too small");

        let nodes = &mut nodes[..size];
        nodes[0] = 0;
        nodes[leaves as usize..].fill(1);
        for i in (1..leaves as usize).rev() {
            nodes[i] = nodes[2 * i] << 1;
        }
        Self { nodes, leaves }
    }

    #[inline]
    #[must_use]
    pub const fn leaves(&self) -> u32 {
        self.leaves
    }

    /// Largest free run in the whole tree.
    #[inline]
    #[must_use]
    pub fn root(&self) -> u32 {
        self.nodes[1]
    }

    /// Allocate a block of at least `n` leaves.
    ///
    /// Returns the offset of the first leaf and the block size, or `None`
    /// if no free run of `n` exists.
    ///
    /// # Panics
    /// If `n` is zero.
    pub fn alloc(&mut self, n: u32) -> Option<(u32, u32)> {
        assert!(n > 0, "buddy alloc of zero frames");
        if n > self.root() {
            return None;
        }

        let mut index = 1;
        let mut size = self.leaves;
        while size > 1 {
            if self.nodes[2 * index] >= n {
                index *= 2;
            } else if self.nodes[2 * index + 1] >= n {
                index = 2 * index + 1;
            } else {
                break;
            }
            size >>= 1;
        }

        self.nodes[index] = 0;
        #[allow(clippy::cast_possible_truncation)]
        let offset = index as u32 * size - self.leaves;

        while index > 1 {
            index /= 2;
            self.nodes[index] = self.nodes[2 * index].max(self.nodes[2 * index + 1]);
        }
        Some((offset, size))
    }

    /// Free the block of `n` leaves starting at `offset`, returning the
    /// size of the block that was released.
    ///
    /// # Panics
    /// If `offset` is outside the tree, no allocated block starts there, or
    /// `n` exceeds the block.
    pub fn free(&mut self, offset: u32, n: u32) -> u32 {
        assert!(offset < self.leaves, "buddy free outside the managed range");

        let mut index = (offset + self.leaves) as usize;
        let mut size = 1;
        while self.nodes[index] > 0 {
            assert!(index > 1, "buddy free of a block that is not allocated");
            index /= 2;
            size <<= 1;
        }
        assert!(offset % size == 0, "buddy free of a misaligned block");
        assert!(n <= size, "buddy free larger than the allocated block");

        self.nodes[index] = size;
        let mut span = size;
        while index > 1 {
            index /= 2;
            span <<= 1;
            let left = self.nodes[2 * index];
            let right = self.nodes[2 * index + 1];
            self.nodes[index] = if left + right == span {
                span
            } else {
                left.max(right)
            };
        }
        size
    }
}
