//! # Swap Tokens
//!
//! When a page is evicted, its page-table entry is replaced by a
//! *swap token*: a non-present value that names the swap slot holding the
//! page content.
//!
//! ```text
//! | 31 ‒ 8 | 7 ‒ 1 | 0 |
//! |  slot  |   0   | 0 |
//! ```
//!
//! The slot is `linear_page_index + 1`, so slot 0 (and thus the all-zero
//! entry) never denotes swapped content.

use kernel_info::swap::SWAP_SLOT_SHIFT;
use kernel_memory_addresses::LinearAddress;

/// A swap token stored in a non-present page-table entry.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SwapEntry(u32);

impl SwapEntry {
    /// The token for the page containing `la`.
    #[inline]
    #[must_use]
    pub const fn for_linear(la: LinearAddress) -> Self {
        Self((la.page_index() + 1) << SWAP_SLOT_SHIFT)
    }

    /// Interpret a raw non-present entry value as a token.
    ///
    /// Returns `None` for values that cannot be tokens: zero, present
    /// entries, or values with a zero slot.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u32) -> Option<Self> {
        if raw & 1 != 0 || raw >> SWAP_SLOT_SHIFT == 0 {
            None
        } else {
            Some(Self(raw))
        }
    }

    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Swap slot index on the backing store; never zero.
    #[inline]
    #[must_use]
    pub const fn slot(self) -> u32 {
        self.0 >> SWAP_SLOT_SHIFT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_encodes_page_index_plus_one() {
        let e = SwapEntry::for_linear(LinearAddress::new(0x3010));
        assert_eq!(e.raw(), 4 << 8);
        assert_eq!(e.slot(), 4);

        let first = SwapEntry::for_linear(LinearAddress::new(0));
        assert_eq!(first.slot(), 1);
    }

    #[test]
    fn zero_and_present_values_are_not_tokens() {
        assert_eq!(SwapEntry::from_raw(0), None);
        assert_eq!(SwapEntry::from_raw(0x0000_0080), None);
        assert_eq!(SwapEntry::from_raw(0x0000_5001), None);
        assert_eq!(SwapEntry::from_raw(0x500).map(SwapEntry::slot), Some(5));
    }
}
