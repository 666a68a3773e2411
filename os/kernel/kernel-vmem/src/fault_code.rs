use bitfield_struct::bitfield;

/// The error code the processor pushes for a page fault (vector 14).
///
/// Only the low bits are architecturally defined on i386; the rest are
/// reserved and read as zero.
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct PageFaultErrorCode {
    /// 0 = non-present page, 1 = protection violation.
    pub present: bool, // bit 0

    /// 0 = read, 1 = write.
    pub write: bool, // bit 1

    /// 1 = fault happened in user mode.
    pub user: bool, // bit 2

    /// 1 = reserved bit set in an entry.
    pub reserved_bit: bool, // bit 3

    /// 1 = instruction fetch (only with NX support).
    pub instruction_fetch: bool, // bit 4

    #[bits(27)]
    __: u32, // reserved
}

impl PageFaultErrorCode {
    /// Read fault on a page that is not present.
    #[inline]
    #[must_use]
    pub const fn read_miss() -> Self {
        Self::new()
    }

    /// Write fault on a page that is not present.
    #[inline]
    #[must_use]
    pub const fn write_miss() -> Self {
        Self::new().with_write(true)
    }

    #[must_use]
    pub const fn explain(&self) -> &'static str {
        if !self.present() {
            if self.write() {
                "Write to non-present page (not mapped or swapped out)"
            } else {
                "Read from non-present page (not mapped or swapped out)"
            }
        } else if self.reserved_bit() {
            "Reserved bit set in page table entry"
        } else if self.write() {
            "Write access to protected page"
        } else {
            "Read access to protected page"
        }
    }
}
