//! # Memory Manager
//!
//! [`MemoryManager`] is the allocator context of the memory core: it owns the
//! buddy frame allocator, the slab caches and the optional swap store, and
//! resolves page faults for the address spaces handed to it.
//!
//! ## Page-fault resolution
//!
//! ```text
//!  fault(la, code)
//!     │
//!     ├─ no area covers la ─────────────────────────► InvalidAddress
//!     ├─ write, area not writable ──────────────────► PermissionDenied
//!     ├─ read, page present ────────────────────────► ReadOnPresent
//!     ├─ read, area neither readable nor executable ► PermissionDenied
//!     │
//!     └─ entry = walk_create(la)
//!           ├─ zero ──────► fresh zeroed frame, map, register with clock
//!           ├─ present ───► AlreadyMapped
//!           └─ swap token ► swap in, map, register with clock
//! ```
//!
//! The kernel keeps the manager behind one [`GlobalMemory`] lock, so every
//! method runs with interrupts masked.

use crate::address_space::AddressSpace;
use crate::clock::ClockState;
use crate::fault::FaultError;
use crate::swap::SwapStore;
use crate::vma::VmFlags;
use kernel_alloc::{BuddyFrameAlloc, FrameFlags, SlabAllocator, SlabError};
use kernel_info::memory::ENTRIES_PER_TABLE;
use kernel_memory_addresses::{LinearAddress, PhysicalAddress};
use kernel_sync::IrqSpinLock;
use kernel_vmem::{
    FrameAlloc, PageEntryBits, PageFaultErrorCode, PdEntry, PhysMapper, PtEntry, SwapEntry,
    tlb_invalidate, walk, walk_create,
};

/// The memory manager behind the kernel's global critical section.
pub type GlobalMemory<'m, M, S> = IrqSpinLock<MemoryManager<'m, M, S>>;

pub struct MemoryManager<'m, M: PhysMapper, S: SwapStore> {
    mapper: &'m M,
    pmm: BuddyFrameAlloc<'m>,
    slab: SlabAllocator,
    swap: Option<S>,
    faults: u64,
}

impl<'m, M: PhysMapper, S: SwapStore> MemoryManager<'m, M, S> {
    /// Combine an initialized frame allocator with a fresh slab arena.
    /// Swap starts disabled.
    #[must_use]
    pub fn new(mapper: &'m M, pmm: BuddyFrameAlloc<'m>) -> Self {
        Self {
            mapper,
            pmm,
            slab: SlabAllocator::new(),
            swap: None,
            faults: 0,
        }
    }

    /// Attach the swap store; from now on user frames are evictable.
    pub fn enable_swap(&mut self, store: S) {
        self.swap = Some(store);
        log::info!("swap enabled");
    }

    #[inline]
    #[must_use]
    pub const fn swap_enabled(&self) -> bool {
        self.swap.is_some()
    }

    #[inline]
    #[must_use]
    pub const fn swap_store(&self) -> Option<&S> {
        self.swap.as_ref()
    }

    #[inline]
    #[must_use]
    pub const fn mapper(&self) -> &'m M {
        self.mapper
    }

    #[inline]
    #[must_use]
    pub const fn pmm(&self) -> &BuddyFrameAlloc<'m> {
        &self.pmm
    }

    #[inline]
    pub const fn pmm_mut(&mut self) -> &mut BuddyFrameAlloc<'m> {
        &mut self.pmm
    }

    #[inline]
    #[must_use]
    pub const fn slab(&self) -> &SlabAllocator {
        &self.slab
    }

    /// Borrow the slab arena and the frame allocator together, e.g. to
    /// create or grow a named cache.
    #[inline]
    pub const fn split(&mut self) -> (&mut SlabAllocator, &mut BuddyFrameAlloc<'m>, &'m M) {
        (&mut self.slab, &mut self.pmm, self.mapper)
    }

    /// Number of page faults handled so far, rejected ones included.
    #[inline]
    #[must_use]
    pub const fn fault_count(&self) -> u64 {
        self.faults
    }

    /// Allocate `size` bytes from the sized caches.
    ///
    /// # Errors
    /// See [`SlabAllocator::kmalloc`].
    pub fn kmalloc(&mut self, size: usize) -> Result<PhysicalAddress, SlabError> {
        self.slab.kmalloc(size, &mut self.pmm, self.mapper)
    }

    pub fn kfree(&mut self, obj: PhysicalAddress) {
        self.slab.kfree(obj, &mut self.pmm, self.mapper);
    }

    /// Return the frames of all empty slabs.
    pub fn reap(&mut self) -> usize {
        self.slab.reap(&mut self.pmm, self.mapper)
    }

    /// Give `space` an empty page directory, returning its address.
    ///
    /// # Errors
    /// [`FaultError::OutOfMemory`].
    pub fn setup_page_directory(
        &mut self,
        space: &mut AddressSpace,
    ) -> Result<PhysicalAddress, FaultError> {
        if let Some(root) = space.page_directory() {
            return Ok(root);
        }
        let root = self.pmm.alloc_frame().ok_or(FaultError::OutOfMemory)?;
        self.mapper.page_directory_mut(root).zero();
        self.pmm.set_ref_count(root, 1);
        space.set_page_directory(root);
        Ok(root)
    }

    /// The frame mapped at `la`, if any.
    #[must_use]
    pub fn lookup_page(&self, space: &AddressSpace, la: LinearAddress) -> Option<PhysicalAddress> {
        let root = space.page_directory()?;
        walk(self.mapper, root, la).and_then(|pte| pte.frame())
    }

    /// Map `frame` at `la` with `perm`, replacing whatever was mapped there.
    ///
    /// The frame gains a reference; a different frame previously mapped at
    /// `la` loses one.
    ///
    /// # Errors
    /// [`FaultError::NoPageDirectory`], [`FaultError::OutOfMemory`] if the
    /// page table cannot be created.
    pub fn map_page(
        &mut self,
        space: &mut AddressSpace,
        frame: PhysicalAddress,
        la: LinearAddress,
        perm: PageEntryBits,
    ) -> Result<(), FaultError> {
        let root = space.page_directory().ok_or(FaultError::NoPageDirectory)?;
        let la = la.align_down();
        let pte = walk_create(self.mapper, &mut self.pmm, root, la)?;

        self.pmm.frame_mut(frame).ref_inc();
        match pte.frame() {
            Some(existing) if existing == frame => {
                self.pmm.frame_mut(frame).ref_dec();
            }
            Some(_) => self.release_entry(space.clock_mut(), la, pte),
            None => {}
        }

        *pte = PtEntry::make_page(frame, perm);
        tlb_invalidate(la);
        Ok(())
    }

    /// Remove whatever is mapped at `la`. A swap token is simply dropped.
    pub fn unmap_page(&mut self, space: &mut AddressSpace, la: LinearAddress) {
        let Some(root) = space.page_directory() else {
            return;
        };
        let la = la.align_down();
        if let Some(pte) = walk(self.mapper, root, la)
            && !pte.is_zero()
        {
            self.release_entry(space.clock_mut(), la, pte);
        }
    }

    /// Drop the reference held by `pte` and clear it.
    fn release_entry(&mut self, clock: &mut ClockState, la: LinearAddress, pte: &mut PtEntry) {
        if let Some(frame) = pte.frame() {
            let number = frame.frame();
            let tracked = {
                let desc = self.pmm.frame(frame);
                desc.flags.contains(FrameFlags::SWAPPABLE)
                    && desc.linear == la
                    && clock.contains(self.pmm.frames(), number)
            };
            let remaining = self.pmm.frame_mut(frame).ref_dec();
            if tracked {
                clock.unlink(self.pmm.frames_mut(), number);
            }
            if remaining == 0 {
                self.pmm.frame_mut(frame).flags.remove(FrameFlags::SWAP_BACKED);
                self.pmm.free(number, 1);
            }
        }
        *pte = PtEntry::zero();
        tlb_invalidate(la);
    }

    /// Resolve a page fault at `la` in `space`.
    ///
    /// # Errors
    /// A [`FaultError`] describing why the fault cannot be resolved; see the
    /// module documentation.
    pub fn handle_page_fault(
        &mut self,
        space: &mut AddressSpace,
        code: PageFaultErrorCode,
        la: LinearAddress,
    ) -> Result<(), FaultError> {
        self.faults += 1;

        let Some(vma) = space.find_vma(la).copied() else {
            log::warn!("page fault at {la}: no memory area ({})", code.explain());
            return Err(FaultError::InvalidAddress(la));
        };

        if code.write() {
            if !vma.is_writable() {
                log::warn!("page fault at {la}: write to read-only area {vma}");
                return Err(FaultError::PermissionDenied(la));
            }
        } else if code.present() {
            log::warn!("page fault at {la}: read fault on a present page");
            return Err(FaultError::ReadOnPresent(la));
        } else if !vma.is_readable() {
            log::warn!("page fault at {la}: area {vma} is neither readable nor executable");
            return Err(FaultError::PermissionDenied(la));
        }

        let perm = PageEntryBits::new_user(vma.flags().contains(VmFlags::WRITE));
        let la = la.align_down();
        let root = space.page_directory().ok_or(FaultError::NoPageDirectory)?;
        let entry = *walk_create(self.mapper, &mut self.pmm, root, la)?;

        if entry.is_zero() {
            let frame = self.alloc_user_frame(space)?;
            self.mapper.frame_bytes_mut(frame).fill(0);
            if let Err(err) = self.map_page(space, frame, la, perm) {
                self.pmm.free_frame(frame);
                return Err(err);
            }
            if self.swap_enabled() {
                space
                    .clock_mut()
                    .map_swappable(self.pmm.frames_mut(), frame.frame(), la);
            }
            return Ok(());
        }

        if entry.is_present() {
            log::warn!("page fault at {la}: write fault on a present page");
            return Err(FaultError::AlreadyMapped(la));
        }

        let Some(token) = entry.swap_entry() else {
            return Err(FaultError::CorruptEntry {
                la,
                raw: entry.raw(),
            });
        };
        if !self.swap_enabled() {
            log::warn!("page fault at {la}: swap token {token:?} but swap is disabled");
            return Err(FaultError::SwapUnavailable(la));
        }

        let frame = self.swap_in(space, la, token)?;
        if let Err(err) = self.map_page(space, frame, la, perm) {
            self.pmm.free_frame(frame);
            return Err(err);
        }
        space
            .clock_mut()
            .map_swappable(self.pmm.frames_mut(), frame.frame(), la);
        Ok(())
    }

    /// Allocate a frame for a user page, reaping slab caches and evicting
    /// pages of `space` when memory is short.
    ///
    /// # Errors
    /// [`FaultError::OutOfMemory`] when nothing can be reclaimed,
    /// [`FaultError::SwapIo`] when writing a victim fails.
    pub fn alloc_user_frame(
        &mut self,
        space: &mut AddressSpace,
    ) -> Result<PhysicalAddress, FaultError> {
        loop {
            if let Some(frame) = self.pmm.alloc_frame() {
                return Ok(frame);
            }
            if self.reap() > 0 {
                continue;
            }
            if !self.swap_enabled() || self.swap_out(space, 1)? == 0 {
                return Err(FaultError::OutOfMemory);
            }
        }
    }

    /// Load the page stored under `token` into a new frame.
    ///
    /// # Errors
    /// [`FaultError::SwapUnavailable`], [`FaultError::OutOfMemory`],
    /// [`FaultError::SwapIo`].
    pub fn swap_in(
        &mut self,
        space: &mut AddressSpace,
        la: LinearAddress,
        token: SwapEntry,
    ) -> Result<PhysicalAddress, FaultError> {
        if !self.swap_enabled() {
            return Err(FaultError::SwapUnavailable(la));
        }
        let frame = self.alloc_user_frame(space)?;
        let result = match self.swap.as_mut() {
            Some(store) => store.read(token, self.mapper.frame_bytes_mut(frame)),
            None => Ok(()),
        };
        if let Err(err) = result {
            self.pmm.free_frame(frame);
            return Err(err.into());
        }
        self.pmm.frame_mut(frame).flags.insert(FrameFlags::SWAP_BACKED);
        log::debug!("swap_in: slot {} loaded into {frame:?} for {la}", token.slot());
        Ok(frame)
    }

    /// Evict up to `n` pages of `space`, returning how many were evicted.
    ///
    /// Each victim is written to its slot unless the slot already holds its
    /// content, its entry is replaced by the swap token, and the frame is
    /// freed once unreferenced.
    ///
    /// # Errors
    /// [`FaultError::SwapIo`]; [`FaultError::SwapUnavailable`] when swap is
    /// disabled.
    pub fn swap_out(&mut self, space: &mut AddressSpace, n: usize) -> Result<usize, FaultError> {
        let Some(root) = space.page_directory() else {
            return Ok(0);
        };
        let mapper = self.mapper;
        let Some(store) = self.swap.as_mut() else {
            return Err(FaultError::SwapUnavailable(LinearAddress::new(0)));
        };

        let mut evicted = 0;
        while evicted < n {
            let Some(victim) =
                space
                    .clock_mut()
                    .pick_victim(self.pmm.frames_mut(), mapper, root, store)?
            else {
                break;
            };
            let frame = victim.frame;
            let la = victim.linear;
            let token = SwapEntry::for_linear(la);

            if !self.pmm.frames()[frame].flags.contains(FrameFlags::SWAP_BACKED)
                && let Err(err) = store.write(token, mapper.frame_bytes_mut(frame.base()))
            {
                space.clock_mut().map_swappable(self.pmm.frames_mut(), frame, la);
                return Err(err.into());
            }

            if let Some(pte) = walk(mapper, root, la) {
                *pte = PtEntry::swapped(token);
            }
            tlb_invalidate(la);

            let desc = &mut self.pmm.frames_mut()[frame];
            desc.flags.remove(FrameFlags::SWAPPABLE | FrameFlags::SWAP_BACKED);
            if desc.ref_dec() == 0 {
                self.pmm.free(frame, 1);
            }
            log::debug!(
                "swap_out: {la} (frame {frame:?}) stored in slot {}, {} frames scanned",
                token.slot(),
                victim.scanned
            );
            evicted += 1;
        }
        Ok(evicted)
    }

    /// Unmap every page of `space`, free its page tables and directory, and
    /// destroy it.
    pub fn teardown(&mut self, mut space: AddressSpace) {
        if let Some(root) = space.page_directory() {
            let mapper = self.mapper;
            for pdx in 0..ENTRIES_PER_TABLE {
                let Some(table) = mapper.page_directory_mut(root).get(pdx).table() else {
                    continue;
                };
                for ptx in 0..ENTRIES_PER_TABLE {
                    let pte = mapper.page_table_mut(table).entry_mut(ptx);
                    if !pte.is_zero() {
                        let la = LinearAddress::from_indices(pdx, ptx);
                        self.release_entry(space.clock_mut(), la, pte);
                    }
                }
                mapper.page_directory_mut(root).set(pdx, PdEntry::zero());
                self.pmm.free_frame(table);
            }
            self.pmm.free_frame(root);
        }
        space.destroy();
    }
}
