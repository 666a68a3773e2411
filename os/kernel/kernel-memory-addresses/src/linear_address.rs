use crate::{PAGE_MASK, PAGE_SHIFT};
use core::fmt;
use core::ops::Add;

/// Linear (paged) memory address.
///
/// The address a running program uses, translated by the page directory and
/// page table before it reaches physical memory. No validation happens at
/// runtime; the type only carries the *kind* of address.
///
/// ### Examples
/// ```rust
/// # use kernel_memory_addresses::*;
/// let la = LinearAddress::new(0x1050);
/// assert_eq!(la.align_down(), LinearAddress::new(0x1000));
/// assert_eq!(la.page_index(), 1);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct LinearAddress(u32);

impl LinearAddress {
    #[inline]
    #[must_use]
    pub const fn new(v: u32) -> Self {
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Page-directory index (`PDX`, bits `[31:22]`).
    #[inline]
    #[must_use]
    pub const fn dir_index(self) -> usize {
        (self.0 >> 22) as usize
    }

    /// Page-table index (`PTX`, bits `[21:12]`).
    #[inline]
    #[must_use]
    pub const fn table_index(self) -> usize {
        ((self.0 >> PAGE_SHIFT) & 0x3FF) as usize
    }

    /// Byte offset within the page (bits `[11:0]`).
    #[inline]
    #[must_use]
    pub const fn page_offset(self) -> u32 {
        self.0 & PAGE_MASK
    }

    /// Linear page number (`la >> 12`).
    #[inline]
    #[must_use]
    pub const fn page_index(self) -> u32 {
        self.0 >> PAGE_SHIFT
    }

    /// Round down to the containing page boundary.
    #[inline]
    #[must_use]
    pub const fn align_down(self) -> Self {
        Self(self.0 & !PAGE_MASK)
    }

    #[inline]
    #[must_use]
    pub const fn is_page_aligned(self) -> bool {
        self.page_offset() == 0
    }

    /// Rebuild an address from directory and table indices.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from_indices(dir: usize, table: usize) -> Self {
        debug_assert!(dir < 1024 && table < 1024);
        Self(((dir as u32) << 22) | ((table as u32) << PAGE_SHIFT))
    }

    #[inline]
    #[must_use]
    pub const fn checked_add(self, rhs: u32) -> Option<Self> {
        match self.0.checked_add(rhs) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }
}

impl fmt::Debug for LinearAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LA(0x{:08X})", self.0)
    }
}

impl fmt::Display for LinearAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

impl From<u32> for LinearAddress {
    #[inline]
    fn from(v: u32) -> Self {
        Self::new(v)
    }
}

impl Add<u32> for LinearAddress {
    type Output = Self;
    #[inline]
    fn add(self, rhs: u32) -> Self::Output {
        Self(self.0 + rhs)
    }
}
