//! # Swap Store
//!
//! The backing store for evicted pages. [`SwapStore`] moves exactly one
//! page per call, addressed by the slot of a [`SwapEntry`].
//! [`BlockSwapStore`] implements it on top of a sector-addressed
//! [`BlockDevice`]: slot `s` occupies sectors `s * 8 .. s * 8 + 8`.
//!
//! Both calls are synchronous. The store is driven from inside the memory
//! manager's critical section.

use kernel_info::swap::{PAGE_NSECT, SECTOR_SIZE, SWAP_DEV_NO};
use kernel_memory_addresses::PAGE_SIZE;
use kernel_vmem::SwapEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SwapError {
    #[error("swap slot {0} is outside the swap device")]
    InvalidSlot(u32),
    #[error("I/O error on device {device} at sector {sector}")]
    Io { device: u32, sector: u32 },
}

/// Page-granular backing store.
pub trait SwapStore {
    /// Fill `frame` with the page stored under `entry`.
    ///
    /// # Errors
    /// [`SwapError`] on an invalid slot or a device failure.
    fn read(&mut self, entry: SwapEntry, frame: &mut [u8; PAGE_SIZE]) -> Result<(), SwapError>;

    /// Store `frame` under `entry`.
    ///
    /// # Errors
    /// [`SwapError`] on an invalid slot or a device failure.
    fn write(&mut self, entry: SwapEntry, frame: &[u8; PAGE_SIZE]) -> Result<(), SwapError>;
}

/// A device of 512-byte sectors.
pub trait BlockDevice {
    /// Device capacity in sectors.
    fn sector_count(&self) -> u32;

    /// Read `buf.len() / 512` sectors starting at `first`.
    ///
    /// # Errors
    /// [`SwapError::Io`] on a device failure.
    fn read_sectors(&mut self, first: u32, buf: &mut [u8]) -> Result<(), SwapError>;

    /// Write `buf.len() / 512` sectors starting at `first`.
    ///
    /// # Errors
    /// [`SwapError::Io`] on a device failure.
    fn write_sectors(&mut self, first: u32, buf: &[u8]) -> Result<(), SwapError>;
}

/// [`SwapStore`] over a [`BlockDevice`].
pub struct BlockSwapStore<D> {
    device: D,
    slots: u32,
}

impl<D: BlockDevice> BlockSwapStore<D> {
    #[must_use]
    pub fn new(device: D) -> Self {
        let slots = device.sector_count() / PAGE_NSECT;
        log::info!("swap device {SWAP_DEV_NO}: {slots} slots of {SECTOR_SIZE}-byte sectors");
        Self { device, slots }
    }

    /// Number of slots on the device, slot 0 included.
    #[inline]
    #[must_use]
    pub const fn slots(&self) -> u32 {
        self.slots
    }

    #[inline]
    #[must_use]
    pub const fn device(&self) -> &D {
        &self.device
    }

    #[inline]
    pub const fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    fn first_sector(&self, entry: SwapEntry) -> Result<u32, SwapError> {
        let slot = entry.slot();
        if slot == 0 || slot >= self.slots {
            return Err(SwapError::InvalidSlot(slot));
        }
        Ok(slot * PAGE_NSECT)
    }
}

impl<D: BlockDevice> SwapStore for BlockSwapStore<D> {
    fn read(&mut self, entry: SwapEntry, frame: &mut [u8; PAGE_SIZE]) -> Result<(), SwapError> {
        let first = self.first_sector(entry)?;
        self.device.read_sectors(first, frame)
    }

    fn write(&mut self, entry: SwapEntry, frame: &[u8; PAGE_SIZE]) -> Result<(), SwapError> {
        let first = self.first_sector(entry)?;
        self.device.write_sectors(first, frame)
    }
}
