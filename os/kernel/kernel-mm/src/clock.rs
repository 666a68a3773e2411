//! # Clock (Second-Chance) Eviction
//!
//! Every resident, swappable user frame of an address space sits on a
//! circular list. A hand walks the list and looks at the accessed (`A`) and
//! dirty (`D`) bits of the entry mapping each frame:
//!
//! | `A` | `D` | Action |
//! |-----|-----|--------|
//! | 0 | 0 | select as victim |
//! | 0 | 1 | write to the swap slot, clear `D`, move on |
//! | 1 | * | clear `A`, move on |
//!
//! A frame touched since the last visit therefore survives one more round.
//! With `N` frames the scan selects a victim within `2N` steps when no frame
//! is dirty and within `3N` steps otherwise.
//!
//! New frames are appended at the tail; insertion is always allowed.

use crate::swap::{SwapError, SwapStore};
use kernel_alloc::{ClockLink, FrameFlags, FrameList, FrameTable};
use kernel_memory_addresses::{FrameNumber, LinearAddress, PhysicalAddress};
use kernel_vmem::{PhysMapper, SwapEntry, tlb_invalidate, walk};

/// A frame chosen for eviction, already unlinked from the clock list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Victim {
    pub frame: FrameNumber,
    /// The linear address the frame was mapped at.
    pub linear: LinearAddress,
    /// Number of frames inspected, the victim included.
    pub scanned: usize,
}

/// Clock list and hand of one address space.
#[derive(Debug, Default)]
pub struct ClockState {
    list: FrameList<ClockLink>,
    hand: Option<FrameNumber>,
}

impl ClockState {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            list: FrameList::new(),
            hand: None,
        }
    }

    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.list.len()
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// The next frame the scan will look at.
    #[inline]
    #[must_use]
    pub const fn hand(&self) -> Option<FrameNumber> {
        self.hand
    }

    /// Frames in list order, starting at the head.
    pub fn frames<'a, 'm>(
        &self,
        frames: &'a FrameTable<'m>,
    ) -> impl Iterator<Item = FrameNumber> + use<'a, 'm> {
        self.list.iter(frames)
    }

    /// Whether `frame` is on this clock.
    #[must_use]
    pub fn contains(&self, frames: &FrameTable<'_>, frame: FrameNumber) -> bool {
        self.list.contains(frames, frame)
    }

    /// Register `frame`, mapped at `la`, as swappable.
    pub fn map_swappable(
        &mut self,
        frames: &mut FrameTable<'_>,
        frame: FrameNumber,
        la: LinearAddress,
    ) {
        let desc = &mut frames[frame];
        desc.linear = la.align_down();
        desc.flags.insert(FrameFlags::SWAPPABLE);
        self.list.push_back(frames, frame);
        if self.hand.is_none() {
            self.hand = Some(frame);
        }
    }

    /// Take `frame` off the list, moving the hand past it.
    pub fn unlink(&mut self, frames: &mut FrameTable<'_>, frame: FrameNumber) {
        if self.hand == Some(frame) {
            self.hand = self
                .list
                .next_cyclic(frames, frame)
                .filter(|&next| next != frame);
        }
        self.list.remove(frames, frame);
        frames[frame].flags.remove(FrameFlags::SWAPPABLE);
    }

    /// Run the clock until a victim is found.
    ///
    /// Returns `Ok(None)` if the list is empty.
    ///
    /// # Errors
    /// A failed write-back of a dirty frame aborts the scan.
    ///
    /// # Panics
    /// If a listed frame is not mapped at its recorded linear address.
    pub fn pick_victim<M: PhysMapper, S: SwapStore>(
        &mut self,
        frames: &mut FrameTable<'_>,
        mapper: &M,
        root: PhysicalAddress,
        store: &mut S,
    ) -> Result<Option<Victim>, SwapError> {
        let Some(mut current) = self.hand else {
            return Ok(None);
        };

        let mut scanned = 0;
        loop {
            scanned += 1;
            let la = frames[current].linear;
            let pte = match walk(mapper, root, la) {
                Some(pte) if pte.frame() == Some(current.base()) => pte,
                _ => panic!("clock list holds {current:?}, which is not mapped at {la}"),
            };

            let flags = pte.flags();
            log::trace!(
                "clock visit {current:?} at {la}: A={} D={}",
                u8::from(flags.accessed()),
                u8::from(flags.dirty())
            );
            match (flags.accessed(), flags.dirty()) {
                (false, false) => {
                    self.unlink(frames, current);
                    return Ok(Some(Victim {
                        frame: current,
                        linear: la,
                        scanned,
                    }));
                }
                (false, true) => {
                    store.write(SwapEntry::for_linear(la), mapper.frame_bytes_mut(current.base()))?;
                    pte.flags_mut().set_dirty(false);
                    frames[current].flags.insert(FrameFlags::SWAP_BACKED);
                    tlb_invalidate(la);
                }
                (true, _) => {
                    pte.flags_mut().set_accessed(false);
                    tlb_invalidate(la);
                }
            }

            current = self.list.next_cyclic(frames, current).unwrap_or(current);
            self.hand = Some(current);
        }
    }
}
