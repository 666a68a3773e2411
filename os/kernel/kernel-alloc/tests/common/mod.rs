#![allow(dead_code)]

use std::alloc::{Layout, alloc_zeroed, dealloc};

use kernel_alloc::{BuddyFrameAlloc, Frame};
use kernel_memory_addresses::{FrameNumber, PAGE_SIZE, PhysicalAddress};
use kernel_vmem::PhysMapper;

/// Simulated physical memory: physical address `pa` is byte `pa` of one
/// 4 KiB-aligned host allocation.
pub struct TestPhys {
    base: *mut u8,
    layout: Layout,
}

impl TestPhys {
    pub fn with_frames(n: usize) -> Self {
        let layout = Layout::from_size_align(n * PAGE_SIZE, PAGE_SIZE).unwrap();
        let base = unsafe { alloc_zeroed(layout) };
        assert!(!base.is_null());
        Self { base, layout }
    }

    pub fn frames(&self) -> usize {
        self.layout.size() / PAGE_SIZE
    }

    pub fn bytes(&self, pa: PhysicalAddress, len: usize) -> &[u8] {
        assert!(pa.as_usize() + len <= self.layout.size());
        unsafe { std::slice::from_raw_parts(self.base.add(pa.as_usize()), len) }
    }
}

impl Drop for TestPhys {
    fn drop(&mut self) {
        unsafe { dealloc(self.base, self.layout) }
    }
}

impl PhysMapper for TestPhys {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        assert!(pa.as_usize() + size_of::<T>() <= self.layout.size());
        unsafe { &mut *self.base.add(pa.as_usize()).cast::<T>() }
    }
}

/// One descriptor per simulated frame.
pub fn frame_table(phys: &TestPhys) -> Vec<Frame> {
    vec![Frame::new(); phys.frames()]
}

/// Hand every simulated frame to a buddy allocator.
pub fn buddy<'m>(phys: &'m TestPhys, frames: &'m mut [Frame]) -> BuddyFrameAlloc<'m> {
    let count = u32::try_from(frames.len()).unwrap();
    unsafe { BuddyFrameAlloc::init(phys, frames, FrameNumber::new(0), count) }
}
