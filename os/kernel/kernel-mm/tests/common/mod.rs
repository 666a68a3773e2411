#![allow(dead_code)]

use std::alloc::{Layout, alloc_zeroed};

use kernel_alloc::{BuddyFrameAlloc, Frame};
use kernel_info::swap::{SECTOR_SIZE, SWAP_DEV_NO};
use kernel_memory_addresses::{FrameNumber, LinearAddress, PAGE_SIZE, PhysicalAddress};
use kernel_mm::{
    AddressSpace, BlockDevice, BlockSwapStore, FaultError, MemoryManager, SwapError, VmFlags, Vma,
};
use kernel_vmem::{PageFaultErrorCode, PhysMapper, walk};

/// Simulated physical memory: physical address `pa` is byte `pa` of one
/// 4 KiB-aligned host allocation.
pub struct TestPhys {
    base: *mut u8,
    size: usize,
}

impl TestPhys {
    pub fn with_frames(n: usize) -> Self {
        let layout = Layout::from_size_align(n * PAGE_SIZE, PAGE_SIZE).unwrap();
        let base = unsafe { alloc_zeroed(layout) };
        assert!(!base.is_null());
        Self {
            base,
            size: layout.size(),
        }
    }

    pub fn frames(&self) -> usize {
        self.size / PAGE_SIZE
    }
}

impl PhysMapper for TestPhys {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        assert!(pa.as_usize() + size_of::<T>() <= self.size);
        unsafe { &mut *self.base.add(pa.as_usize()).cast::<T>() }
    }
}

/// A RAM-backed disk that counts its transfers.
pub struct RamDisk {
    data: Vec<u8>,
    pub reads: usize,
    pub writes: usize,
    pub fail_writes: bool,
}

impl RamDisk {
    pub fn new(sectors: usize) -> Self {
        Self {
            data: vec![0; sectors * SECTOR_SIZE],
            reads: 0,
            writes: 0,
            fail_writes: false,
        }
    }

    pub fn failing(sectors: usize) -> Self {
        Self {
            fail_writes: true,
            ..Self::new(sectors)
        }
    }
}

impl BlockDevice for RamDisk {
    fn sector_count(&self) -> u32 {
        u32::try_from(self.data.len() / SECTOR_SIZE).unwrap()
    }

    fn read_sectors(&mut self, first: u32, buf: &mut [u8]) -> Result<(), SwapError> {
        let at = first as usize * SECTOR_SIZE;
        buf.copy_from_slice(&self.data[at..at + buf.len()]);
        self.reads += 1;
        Ok(())
    }

    fn write_sectors(&mut self, first: u32, buf: &[u8]) -> Result<(), SwapError> {
        if self.fail_writes {
            return Err(SwapError::Io {
                device: SWAP_DEV_NO,
                sector: first,
            });
        }
        let at = first as usize * SECTOR_SIZE;
        self.data[at..at + buf.len()].copy_from_slice(buf);
        self.writes += 1;
        Ok(())
    }
}

pub type Store = BlockSwapStore<RamDisk>;
pub type Mm = MemoryManager<'static, TestPhys, Store>;

/// Simulated RAM plus its frame table, leaked for the test's lifetime.
pub fn leak_ram(frames: usize) -> (&'static TestPhys, BuddyFrameAlloc<'static>) {
    let phys: &'static TestPhys = Box::leak(Box::new(TestPhys::with_frames(frames)));
    let table: &'static mut [Frame] =
        Box::leak(vec![Frame::new(); phys.frames()].into_boxed_slice());
    let count = u32::try_from(table.len()).unwrap();
    let pmm = unsafe { BuddyFrameAlloc::init(phys, table, FrameNumber::new(0), count) };
    (phys, pmm)
}

/// A manager over `frames` frames of RAM, without swap.
pub fn machine(frames: usize) -> Mm {
    let (phys, pmm) = leak_ram(frames);
    MemoryManager::new(phys, pmm)
}

/// A manager with a 64-slot swap disk attached.
pub fn machine_with_swap(frames: usize) -> Mm {
    let mut mm = machine(frames);
    mm.enable_swap(BlockSwapStore::new(RamDisk::new(64 * 8)));
    mm
}

/// An address space with a page directory and one area.
pub fn space_with(mm: &mut Mm, start: u32, end: u32, flags: VmFlags) -> AddressSpace {
    let mut space = AddressSpace::new();
    mm.setup_page_directory(&mut space).unwrap();
    space
        .insert_vma(Vma::new(
            LinearAddress::new(start),
            LinearAddress::new(end),
            flags,
        ))
        .unwrap();
    space
}

/// Perform a user-mode byte access the way the MMU would: translate through
/// the page table, set `A` (and `D` on writes), and raise a page fault when
/// the translation fails.
pub fn access(
    mm: &mut Mm,
    space: &mut AddressSpace,
    la: u32,
    write: Option<u8>,
) -> Result<u8, FaultError> {
    let la = LinearAddress::new(la);
    for _ in 0..2 {
        let root = space.page_directory().expect("page directory");
        match walk(mm.mapper(), root, la) {
            Some(pte) if pte.is_present() && (write.is_none() || pte.flags().writable()) => {
                let frame = pte.frame().unwrap();
                let bytes = mm.mapper().frame_bytes_mut(frame);
                let offset = la.page_offset() as usize;
                pte.flags_mut().set_accessed(true);
                if let Some(value) = write {
                    pte.flags_mut().set_dirty(true);
                    bytes[offset] = value;
                }
                return Ok(bytes[offset]);
            }
            entry => {
                let code = PageFaultErrorCode::new()
                    .with_present(entry.is_some_and(|pte| pte.is_present()))
                    .with_write(write.is_some())
                    .with_user(true);
                mm.handle_page_fault(space, code, la)?;
            }
        }
    }
    panic!("fault at {la} was not resolved");
}

pub fn read(mm: &mut Mm, space: &mut AddressSpace, la: u32) -> Result<u8, FaultError> {
    access(mm, space, la, None)
}

pub fn write(mm: &mut Mm, space: &mut AddressSpace, la: u32, value: u8) -> Result<(), FaultError> {
    access(mm, space, la, Some(value)).map(|_| ())
}
