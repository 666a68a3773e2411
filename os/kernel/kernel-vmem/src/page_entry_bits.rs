use bitfield_struct::bitfield;
use kernel_memory_addresses::PhysicalAddress;

/// A single 32-bit i386 page-directory or page-table entry in its raw
/// bitfield form.
///
/// Both levels of the two-level walk share this layout. Each bit corresponds
/// to a hardware-defined flag or address field; the positions are fixed by the
/// processor and must not change.
///
/// ### Bit layout
///
/// | Bits   | Name / Mnemonic | Meaning |
/// |--------|-----------------|---------|
/// | 0      | `P` (present)   | Valid entry if set |
/// | 1      | `RW`            | Writable if set |
/// | 2      | `US`            | User-mode accessible if set |
/// | 3      | `PWT`           | Write-through caching |
/// | 4      | `PCD`           | Disable caching |
/// | 5      | `A`             | Accessed, set by the CPU |
/// | 6      | `D`             | Dirty, set by the CPU on write (leaf only) |
/// | 7      | `PS`            | 4 MiB page (directory only, unused here) |
/// | 8      | `G`             | Global (leaf only) |
/// | 9–11   | `AVL`           | Available for OS use |
/// | 12–31  | `addr`          | Physical frame bits `[31:12]` |
///
/// A **non-present** entry is ignored by the hardware. The memory core
/// stores a swap token in such entries (see [`SwapEntry`](crate::SwapEntry)).
///
/// ### Example
/// ```rust
/// # use kernel_memory_addresses::PhysicalAddress;
/// # use kernel_vmem::PageEntryBits;
/// let e = PageEntryBits::new()
///     .with_present(true)
///     .with_writable(true)
///     .with_physical_address(PhysicalAddress::new(0x0012_3000));
/// assert_eq!(u32::from(e), 0x0012_3003);
/// ```
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct PageEntryBits {
    /// Present (P, bit 0).
    pub present: bool,

    /// Writable (RW, bit 1).
    pub writable: bool,

    /// User/Supervisor (US, bit 2).
    pub user_access: bool,

    /// Page Write-Through (PWT, bit 3).
    pub write_through: bool,

    /// Page Cache Disable (PCD, bit 4).
    pub cache_disabled: bool,

    /// Accessed (A, bit 5).
    ///
    /// Set by the CPU on any access through this entry. The clock policy
    /// clears it to age the page.
    pub accessed: bool,

    /// Dirty (D, bit 6), **leaf only**.
    ///
    /// Set by the CPU on first write. Cleared once the page content has been
    /// written to the swap device.
    pub dirty: bool,

    /// Page Size (PS, bit 7). Always clear in this kernel.
    pub large_page: bool,

    /// Global (G, bit 8), **leaf only**.
    pub global_translation: bool,

    /// OS-available (bits 9..=11).
    #[bits(3)]
    pub os_available: u8,

    /// Physical address bits `[31:12]`.
    #[bits(20)]
    phys_addr_bits_31_12: u32,
}

impl PageEntryBits {
    #[inline]
    pub const fn set_physical_address(&mut self, phys: PhysicalAddress) {
        self.set_phys_addr_bits_31_12(phys.as_u32() >> 12);
    }

    #[inline]
    #[must_use]
    pub const fn with_physical_address(mut self, phys: PhysicalAddress) -> Self {
        self.set_physical_address(phys);
        self
    }

    #[inline]
    #[must_use]
    pub const fn physical_address(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.phys_addr_bits_31_12() << 12)
    }

    /// Flags installed on a freshly created page-directory entry:
    /// present, writable, user.
    #[inline]
    #[must_use]
    pub const fn new_table_link() -> Self {
        Self::new()
            .with_present(true)
            .with_writable(true)
            .with_user_access(true)
    }

    /// Leaf permissions for a user page: always user-accessible, writable
    /// only when requested.
    #[inline]
    #[must_use]
    pub const fn new_user(writable: bool) -> Self {
        Self::new().with_user_access(true).with_writable(writable)
    }

    /// The permission part of the entry (`RW`, `US`, `PWT`, `PCD`, `G`),
    /// without address, status bits or present.
    #[inline]
    #[must_use]
    pub const fn permissions(self) -> Self {
        Self::new()
            .with_writable(self.writable())
            .with_user_access(self.user_access())
            .with_write_through(self.write_through())
            .with_cache_disabled(self.cache_disabled())
            .with_global_translation(self.global_translation())
    }
}
