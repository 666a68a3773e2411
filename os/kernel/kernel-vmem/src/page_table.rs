//! # i386 Two-Level Page Tables
//!
//! - [`PdEntry`] / [`PageDirectory`]: the top level, one per address space.
//!   Each present entry points to a [`PageTable`].
//! - [`PtEntry`] / [`PageTable`]: the leaf level. A present entry maps one
//!   4 KiB page; a non-present, non-zero entry holds a swap token.
//!
//! Both tables are 4 KiB-aligned arrays of 1024 32-bit entries.
//!
//! After modifying active mappings the caller must perform the required TLB
//! maintenance ([`tlb_invalidate`](crate::tlb_invalidate)).

use crate::{PageEntryBits, SwapEntry};
use kernel_info::memory::ENTRIES_PER_TABLE;
use kernel_memory_addresses::PhysicalAddress;

/// A page-directory entry (PDE).
#[doc(alias = "PDE")]
#[repr(transparent)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PdEntry(PageEntryBits);

/// A page-table entry (PTE).
///
/// Three states matter to the memory core:
///
/// | State | Raw value | Meaning |
/// |-------|-----------|---------|
/// | zero | `0` | never mapped |
/// | present | `P = 1` | maps a frame |
/// | swapped | `P = 0`, non-zero | swap token |
#[doc(alias = "PTE")]
#[repr(transparent)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PtEntry(PageEntryBits);

/// The page directory: 1024 entries, 4 KiB-aligned.
#[doc(alias = "PD")]
#[repr(C, align(4096))]
pub struct PageDirectory {
    entries: [PdEntry; ENTRIES_PER_TABLE],
}

/// A page table: 1024 entries, 4 KiB-aligned.
#[doc(alias = "PT")]
#[repr(C, align(4096))]
pub struct PageTable {
    entries: [PtEntry; ENTRIES_PER_TABLE],
}

const _: () = {
    assert!(size_of::<PageDirectory>() == 4096);
    assert!(size_of::<PageTable>() == 4096);
};

impl PdEntry {
    /// Create a zero (non-present) entry.
    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self(PageEntryBits::new())
    }

    #[inline]
    #[must_use]
    pub const fn is_present(self) -> bool {
        self.0.present()
    }

    /// Link to a page table at `table` with present + writable + user.
    #[inline]
    #[must_use]
    pub const fn make_table(table: PhysicalAddress) -> Self {
        Self(PageEntryBits::new_table_link().with_physical_address(table))
    }

    /// If present, the physical address of the referenced page table.
    #[inline]
    #[must_use]
    pub const fn table(self) -> Option<PhysicalAddress> {
        if self.is_present() {
            Some(self.0.physical_address())
        } else {
            None
        }
    }

    #[inline]
    #[must_use]
    pub const fn flags(self) -> PageEntryBits {
        self.0
    }

    #[inline]
    #[must_use]
    pub fn raw(self) -> u32 {
        self.0.into()
    }
}

impl PtEntry {
    /// Create a zero (never mapped) entry.
    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self(PageEntryBits::new())
    }

    #[inline]
    #[must_use]
    pub fn is_zero(self) -> bool {
        self.raw() == 0
    }

    /// Return `true` if the entry is marked present.
    #[inline]
    #[must_use]
    pub const fn is_present(self) -> bool {
        self.0.present()
    }

    /// Expose the underlying bitfield.
    #[inline]
    #[must_use]
    pub const fn flags(self) -> PageEntryBits {
        self.0
    }

    /// Mutable access to the underlying bitfield, e.g. to clear `A`/`D`.
    #[inline]
    pub const fn flags_mut(&mut self) -> &mut PageEntryBits {
        &mut self.0
    }

    /// Create a present 4 KiB leaf mapping `frame` with the given permissions.
    #[inline]
    #[must_use]
    pub const fn make_page(frame: PhysicalAddress, perm: PageEntryBits) -> Self {
        Self(perm.permissions().with_present(true).with_physical_address(frame))
    }

    /// Create a non-present entry that carries `token`.
    #[inline]
    #[must_use]
    pub fn swapped(token: SwapEntry) -> Self {
        Self::from_raw(token.raw())
    }

    /// If present, the mapped frame.
    #[inline]
    #[must_use]
    pub const fn frame(self) -> Option<PhysicalAddress> {
        if self.is_present() {
            Some(self.0.physical_address())
        } else {
            None
        }
    }

    /// If non-present and non-zero, the swap token stored in the entry.
    #[inline]
    #[must_use]
    pub fn swap_entry(self) -> Option<SwapEntry> {
        SwapEntry::from_raw(self.raw())
    }

    /// Return the raw 32-bit value (flags + address).
    #[inline]
    #[must_use]
    pub fn raw(self) -> u32 {
        self.0.into()
    }

    /// Construct from a raw 32-bit value. No validation is performed.
    #[inline]
    #[must_use]
    pub fn from_raw(v: u32) -> Self {
        Self(PageEntryBits::from(v))
    }
}

impl PageDirectory {
    /// Create a fully zeroed page directory.
    #[inline]
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            entries: [PdEntry::zero(); ENTRIES_PER_TABLE],
        }
    }

    /// Clear all entries.
    #[inline]
    pub fn zero(&mut self) {
        self.entries.fill(PdEntry::zero());
    }

    #[inline]
    #[must_use]
    pub const fn get(&self, i: usize) -> PdEntry {
        self.entries[i]
    }

    #[inline]
    pub const fn set(&mut self, i: usize, e: PdEntry) {
        self.entries[i] = e;
    }
}

impl PageTable {
    /// Create a fully zeroed page table.
    #[inline]
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            entries: [PtEntry::zero(); ENTRIES_PER_TABLE],
        }
    }

    /// Clear all entries.
    #[inline]
    pub fn zero(&mut self) {
        self.entries.fill(PtEntry::zero());
    }

    #[inline]
    #[must_use]
    pub const fn get(&self, i: usize) -> PtEntry {
        self.entries[i]
    }

    #[inline]
    pub const fn entry_mut(&mut self, i: usize) -> &mut PtEntry {
        &mut self.entries[i]
    }

    #[inline]
    pub const fn set(&mut self, i: usize, e: PtEntry) {
        self.entries[i] = e;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use kernel_memory_addresses::LinearAddress;

    #[test]
    fn pte_leaf_keeps_only_permissions() {
        let perm = PageEntryBits::new_user(true).with_dirty(true);
        let e = PtEntry::make_page(PhysicalAddress::new(0x5555_0000), perm);
        assert!(e.is_present());
        assert_eq!(e.frame(), Some(PhysicalAddress::new(0x5555_0000)));
        assert!(e.flags().writable());
        assert!(e.flags().user_access());
        assert!(!e.flags().dirty());
        assert_eq!(e.swap_entry(), None);
    }

    #[test]
    fn pte_swap_token_round_trip() {
        let token = SwapEntry::for_linear(LinearAddress::new(0x4000));
        let e = PtEntry::swapped(token);
        assert!(!e.is_present());
        assert!(!e.is_zero());
        assert_eq!(e.frame(), None);
        assert_eq!(e.swap_entry(), Some(token));
    }

    #[test]
    fn pde_links_table_with_user_write() {
        let e = PdEntry::make_table(PhysicalAddress::new(0x0000_3000));
        assert_eq!(e.raw(), 0x3007);
        assert_eq!(e.table(), Some(PhysicalAddress::new(0x3000)));
        assert_eq!(PdEntry::zero().table(), None);
    }
}
