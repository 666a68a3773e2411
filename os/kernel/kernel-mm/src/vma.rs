//! # Virtual Memory Areas
//!
//! A [`Vma`] is a half-open linear range `[start, end)` with uniform access
//! permissions. A [`VmaList`] keeps the areas of one address space sorted by
//! start address and pairwise disjoint; it has a fixed capacity of
//! [`MAX_VMAS`] and never allocates.
//!
//! Lookups first try a one-entry cache holding the last hit, since
//! consecutive faults tend to land in the same area.

use bitflags::bitflags;
use core::cell::Cell;
use core::fmt;
use kernel_memory_addresses::LinearAddress;

/// Maximum number of areas per address space.
pub const MAX_VMAS: usize = 128;

bitflags! {
    /// Access permissions of a [`Vma`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct VmFlags: u32 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const EXEC = 1 << 2;
    }
}

/// A linear range `[start, end)` with permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vma {
    start: LinearAddress,
    end: LinearAddress,
    flags: VmFlags,
}

impl Vma {
    const EMPTY: Self = Self {
        start: LinearAddress::new(0),
        end: LinearAddress::new(0),
        flags: VmFlags::empty(),
    };

    #[must_use]
    pub const fn new(start: LinearAddress, end: LinearAddress, flags: VmFlags) -> Self {
        Self { start, end, flags }
    }

    #[inline]
    #[must_use]
    pub const fn start(&self) -> LinearAddress {
        self.start
    }

    #[inline]
    #[must_use]
    pub const fn end(&self) -> LinearAddress {
        self.end
    }

    #[inline]
    #[must_use]
    pub const fn flags(&self) -> VmFlags {
        self.flags
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, la: LinearAddress) -> bool {
        self.start <= la && la < self.end
    }

    #[inline]
    #[must_use]
    pub const fn is_writable(&self) -> bool {
        self.flags.contains(VmFlags::WRITE)
    }

    #[inline]
    #[must_use]
    pub const fn is_readable(&self) -> bool {
        self.flags.intersects(VmFlags::READ.union(VmFlags::EXEC))
    }
}

impl fmt::Display for Vma {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VmaError {
    #[error("memory area {new} overlaps {existing}")]
    Overlap { new: Vma, existing: Vma },
    #[error("memory area {0} is empty")]
    EmptyRange(Vma),
    #[error("no room for another memory area")]
    Full,
}

/// Sorted, disjoint areas of one address space.
pub struct VmaList {
    vmas: [Vma; MAX_VMAS],
    len: usize,
    cache: Cell<Option<usize>>,
}

impl Default for VmaList {
    fn default() -> Self {
        Self::new()
    }
}

impl VmaList {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            vmas: [Vma::EMPTY; MAX_VMAS],
            len: 0,
            cache: Cell::new(None),
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
    pub fn iter(&self) -> core::slice::Iter<'_, Vma> {
        self.vmas[..self.len].iter()
    }

    /// Insert `vma` at its ordered position.
    ///
    /// # Errors
    /// - [`VmaError::EmptyRange`] if `start >= end`.
    /// - [`VmaError::Overlap`] if it intersects its predecessor or successor.
    /// - [`VmaError::Full`] if [`MAX_VMAS`] areas exist already.
    pub fn insert(&mut self, vma: Vma) -> Result<(), VmaError> {
        if vma.start >= vma.end {
            return Err(VmaError::EmptyRange(vma));
        }

        let at = self.vmas[..self.len].partition_point(|v| v.start < vma.start);
        let prev = at.checked_sub(1).map(|i| self.vmas[i]);
        let next = (at < self.len).then(|| self.vmas[at]);
        for existing in [prev, next].into_iter().flatten() {
            if existing.start < vma.end && vma.start < existing.end {
                log::error!("memory area {vma} overlaps {existing}");
                return Err(VmaError::Overlap { new: vma, existing });
            }
        }

        if self.len == MAX_VMAS {
            return Err(VmaError::Full);
        }
        self.vmas.copy_within(at..self.len, at + 1);
        self.vmas[at] = vma;
        self.len += 1;
        self.cache.set(None);
        Ok(())
    }

    /// The area containing `la`, if any.
    pub fn find(&self, la: LinearAddress) -> Option<&Vma> {
        if let Some(i) = self.cache.get()
            && self.vmas[i].contains(la)
        {
            return Some(&self.vmas[i]);
        }

        let at = self.vmas[..self.len].partition_point(|v| v.start <= la);
        let i = at.checked_sub(1)?;
        if self.vmas[i].contains(la) {
            self.cache.set(Some(i));
            Some(&self.vmas[i])
        } else {
            None
        }
    }

    /// Index of the cached area, for diagnostics.
    #[must_use]
    pub fn cached(&self) -> Option<&Vma> {
        self.cache.get().map(|i| &self.vmas[i])
    }

    /// Drop every area.
    pub fn clear(&mut self) {
        self.len = 0;
        self.cache.set(None);
    }
}

impl<'a> IntoIterator for &'a VmaList {
    type Item = &'a Vma;
    type IntoIter = core::slice::Iter<'a, Vma>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
