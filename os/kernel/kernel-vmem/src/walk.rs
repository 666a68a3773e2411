//! # Page-Table Walker
//!
//! Translates a linear address into the location of its page-table entry.
//!
//! - [`walk`] is a read-only lookup: it never allocates and returns `None`
//!   when the page directory has no table for the address.
//! - [`walk_create`] allocates the missing page table: one frame from the
//!   [`FrameAlloc`], zeroed, reference count 1, linked into the directory
//!   with present + writable + user.
//!
//! The returned `&mut PtEntry` lives in physical memory reached through the
//! [`PhysMapper`]; it stays valid for as long as the mapper does and must not
//! be held across another walk of the same address.

use crate::{FrameAlloc, PdEntry, PhysMapper, PtEntry};
use kernel_memory_addresses::{LinearAddress, PhysicalAddress};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WalkError {
    #[error("out of memory while creating a page table for {0}")]
    OutOfMemory(LinearAddress),
}

/// Look up the entry for `la` below the directory at `root`; never allocates.
#[must_use]
pub fn walk<'m, M: PhysMapper>(
    mapper: &'m M,
    root: PhysicalAddress,
    la: LinearAddress,
) -> Option<&'m mut PtEntry> {
    let dir = mapper.page_directory_mut(root);
    let table = dir.get(la.dir_index()).table()?;
    Some(mapper.page_table_mut(table).entry_mut(la.table_index()))
}

/// Return the entry for `la`, creating the page table if it is missing.
///
/// # Errors
/// [`WalkError::OutOfMemory`] when no frame is left for a new page table.
pub fn walk_create<'m, M: PhysMapper, A: FrameAlloc>(
    mapper: &'m M,
    alloc: &mut A,
    root: PhysicalAddress,
    la: LinearAddress,
) -> Result<&'m mut PtEntry, WalkError> {
    let dir = mapper.page_directory_mut(root);
    let table = match dir.get(la.dir_index()).table() {
        Some(table) => table,
        None => {
            let frame = alloc.alloc_frame().ok_or(WalkError::OutOfMemory(la))?;
            mapper.page_table_mut(frame).zero();
            alloc.set_ref_count(frame, 1);
            dir.set(la.dir_index(), PdEntry::make_table(frame));
            log::trace!("page table {frame} created for {la}");
            frame
        }
    };
    Ok(mapper.page_table_mut(table).entry_mut(la.table_index()))
}
