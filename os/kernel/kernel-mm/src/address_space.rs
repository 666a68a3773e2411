//! # Address Spaces
//!
//! An [`AddressSpace`] groups what the memory core knows about one user
//! address space: its areas, the physical address of its page directory
//! (once set up) and its clock eviction state.
//!
//! The space does not own frames. Mapped pages and page tables are released
//! by [`MemoryManager::teardown`](crate::MemoryManager::teardown).

use crate::clock::ClockState;
use crate::vma::{Vma, VmaError, VmaList};
use kernel_memory_addresses::{LinearAddress, PhysicalAddress};

#[derive(Default)]
pub struct AddressSpace {
    vmas: VmaList,
    page_directory: Option<PhysicalAddress>,
    clock: ClockState,
}

impl AddressSpace {
    /// An empty space: no areas, no page directory, empty clock list.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            vmas: VmaList::new(),
            page_directory: None,
            clock: ClockState::new(),
        }
    }

    /// Add an area.
    ///
    /// # Errors
    /// See [`VmaList::insert`].
    pub fn insert_vma(&mut self, vma: Vma) -> Result<(), VmaError> {
        self.vmas.insert(vma)
    }

    /// The area containing `la`.
    #[must_use]
    pub fn find_vma(&self, la: LinearAddress) -> Option<&Vma> {
        self.vmas.find(la)
    }

    #[inline]
    #[must_use]
    pub const fn vmas(&self) -> &VmaList {
        &self.vmas
    }

    #[inline]
    #[must_use]
    pub const fn page_directory(&self) -> Option<PhysicalAddress> {
        self.page_directory
    }

    #[inline]
    pub const fn set_page_directory(&mut self, root: PhysicalAddress) {
        self.page_directory = Some(root);
    }

    #[inline]
    #[must_use]
    pub const fn clock(&self) -> &ClockState {
        &self.clock
    }

    #[inline]
    pub const fn clock_mut(&mut self) -> &mut ClockState {
        &mut self.clock
    }

    /// Release every area and the space itself.
    pub fn destroy(mut self) {
        log::debug!("address space with {} areas destroyed", self.vmas.len());
        self.vmas.clear();
    }
}
