//! # Index-Linked Frame Lists
//!
//! Doubly linked lists whose nodes are [`Frame`] descriptors, linked by
//! [`FrameNumber`] instead of pointers. The list header only holds head,
//! tail and length; the links live in the descriptors, selected by a
//! [`LinkKind`], so one frame can sit on a slab list and a clock list at the
//! same time.

use crate::frame::{Frame, FrameTable, Link};
use core::marker::PhantomData;
use kernel_memory_addresses::FrameNumber;

/// Selects which [`Link`] of a [`Frame`] a list uses.
pub trait LinkKind {
    fn link(frame: &Frame) -> &Link;
    fn link_mut(frame: &mut Frame) -> &mut Link;
}

/// Links used by the slab partitions (full, partial, empty).
pub enum SlabLink {}

/// Links used by the clock list of an address space.
pub enum ClockLink {}

impl LinkKind for SlabLink {
    #[inline]
    fn link(frame: &Frame) -> &Link {
        &frame.slab_link
    }

    #[inline]
    fn link_mut(frame: &mut Frame) -> &mut Link {
        &mut frame.slab_link
    }
}

impl LinkKind for ClockLink {
    #[inline]
    fn link(frame: &Frame) -> &Link {
        &frame.clock_link
    }

    #[inline]
    fn link_mut(frame: &mut Frame) -> &mut Link {
        &mut frame.clock_link
    }
}

/// An index-linked list of frames.
pub struct FrameList<K: LinkKind> {
    head: Option<FrameNumber>,
    tail: Option<FrameNumber>,
    len: usize,
    _kind: PhantomData<K>,
}

impl<K: LinkKind> Default for FrameList<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: LinkKind> core::fmt::Debug for FrameList<K> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FrameList")
            .field("head", &self.head)
            .field("tail", &self.tail)
            .field("len", &self.len)
            .finish()
    }
}

impl<K: LinkKind> FrameList<K> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
            _kind: PhantomData,
        }
    }

    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    #[must_use]
    pub const fn front(&self) -> Option<FrameNumber> {
        self.head
    }

    #[inline]
    #[must_use]
    pub const fn back(&self) -> Option<FrameNumber> {
        self.tail
    }

    /// The successor of `frame`, or `None` at the tail.
    #[inline]
    #[must_use]
    pub fn next(&self, frames: &FrameTable<'_>, frame: FrameNumber) -> Option<FrameNumber> {
        K::link(&frames[frame]).next
    }

    /// The successor of `frame`, wrapping from the tail to the head.
    #[inline]
    #[must_use]
    pub fn next_cyclic(&self, frames: &FrameTable<'_>, frame: FrameNumber) -> Option<FrameNumber> {
        self.next(frames, frame).or(self.head)
    }

    /// Whether `frame` is linked through this list's link kind.
    #[inline]
    #[must_use]
    pub fn is_linked(frames: &FrameTable<'_>, frame: FrameNumber) -> bool {
        K::link(&frames[frame]).linked
    }

    /// Whether `frame` is on this particular list, not merely on some list
    /// of the same link kind. Walks back to the head.
    #[must_use]
    pub fn contains(&self, frames: &FrameTable<'_>, frame: FrameNumber) -> bool {
        if !Self::is_linked(frames, frame) {
            return false;
        }
        let mut first = frame;
        while let Some(prev) = K::link(&frames[first]).prev {
            first = prev;
        }
        self.head == Some(first)
    }

    pub fn push_front(&mut self, frames: &mut FrameTable<'_>, frame: FrameNumber) {
        debug_assert!(!Self::is_linked(frames, frame), "{frame:?} already linked");
        *K::link_mut(&mut frames[frame]) = Link {
            prev: None,
            next: self.head,
            linked: true,
        };
        match self.head {
            Some(old) => K::link_mut(&mut frames[old]).prev = Some(frame),
            None => self.tail = Some(frame),
        }
        self.head = Some(frame);
        self.len += 1;
    }

    pub fn push_back(&mut self, frames: &mut FrameTable<'_>, frame: FrameNumber) {
        debug_assert!(!Self::is_linked(frames, frame), "{frame:?} already linked");
        *K::link_mut(&mut frames[frame]) = Link {
            prev: self.tail,
            next: None,
            linked: true,
        };
        match self.tail {
            Some(old) => K::link_mut(&mut frames[old]).next = Some(frame),
            None => self.head = Some(frame),
        }
        self.tail = Some(frame);
        self.len += 1;
    }

    /// Unlink `frame`, which must be on this list.
    pub fn remove(&mut self, frames: &mut FrameTable<'_>, frame: FrameNumber) {
        let link = *K::link(&frames[frame]);
        debug_assert!(link.linked, "{frame:?} is not linked");
        match link.prev {
            Some(prev) => K::link_mut(&mut frames[prev]).next = link.next,
            None => self.head = link.next,
        }
        match link.next {
            Some(next) => K::link_mut(&mut frames[next]).prev = link.prev,
            None => self.tail = link.prev,
        }
        *K::link_mut(&mut frames[frame]) = Link::UNLINKED;
        self.len -= 1;
    }

    pub fn pop_front(&mut self, frames: &mut FrameTable<'_>) -> Option<FrameNumber> {
        let head = self.head?;
        self.remove(frames, head);
        Some(head)
    }

    /// Iterate from head to tail.
    pub fn iter<'a, 'm>(&self, frames: &'a FrameTable<'m>) -> Iter<'a, 'm, K> {
        Iter {
            frames,
            cursor: self.head,
            _kind: PhantomData,
        }
    }
}

/// Iterator over the frame numbers of a [`FrameList`].
pub struct Iter<'a, 'm, K: LinkKind> {
    frames: &'a FrameTable<'m>,
    cursor: Option<FrameNumber>,
    _kind: PhantomData<K>,
}

impl<K: LinkKind> Iterator for Iter<'_, '_, K> {
    type Item = FrameNumber;

    fn next(&mut self) -> Option<FrameNumber> {
        let current = self.cursor?;
        self.cursor = K::link(&self.frames[current]).next;
        Some(current)
    }
}
