//! # Memory Layout

pub use kernel_memory_addresses::{PAGE_SHIFT, PAGE_SIZE};

/// All physical memory is mapped at this linear address.
pub const KERNBASE: u32 = 0xC000_0000;

/// Maximum amount of physical memory the kernel manages.
pub const KMEMSIZE: u32 = 0x3800_0000;

/// End of the kernel's direct map of physical memory.
pub const KERNTOP: u32 = KERNBASE + KMEMSIZE;

/// Number of entries in a page directory or page table.
pub const ENTRIES_PER_TABLE: usize = 1024;

/// Bytes mapped by one page-directory entry.
#[allow(clippy::cast_possible_truncation)]
pub const PTSIZE: u32 = (PAGE_SIZE * ENTRIES_PER_TABLE) as u32;

/// Upper bound on physical frames the frame table has to describe.
pub const MAX_FRAMES: usize = (KMEMSIZE as usize) / PAGE_SIZE;

const _: () = {
    assert!(ENTRIES_PER_TABLE * 4 == PAGE_SIZE);
    assert!(KERNBASE.is_multiple_of(PTSIZE));
    assert!(KMEMSIZE.is_multiple_of(PTSIZE));
};
