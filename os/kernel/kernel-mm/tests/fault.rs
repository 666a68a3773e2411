mod common;

use common::{machine, read, space_with, write};
use kernel_alloc::FrameFlags;
use kernel_memory_addresses::{LinearAddress, PAGE_SIZE};
use kernel_mm::{AddressSpace, FaultError, VmFlags, Vma};
use kernel_vmem::{FrameAlloc, PageEntryBits, PageFaultErrorCode, PtEntry, SwapEntry, walk};

const RW: VmFlags = VmFlags::READ.union(VmFlags::WRITE);

#[test]
fn fault_maps_a_zeroed_page() {
    let mut mm = machine(32);
    let mut space = space_with(&mut mm, 0x1000, 0x2000, RW);

    write(&mut mm, &mut space, 0x1050, 0x5A).unwrap();
    assert_eq!(mm.fault_count(), 1);
    assert_eq!(read(&mut mm, &mut space, 0x1050).unwrap(), 0x5A);
    assert_eq!(read(&mut mm, &mut space, 0x1FFF).unwrap(), 0);
    assert_eq!(mm.fault_count(), 1);

    let frame = mm.lookup_page(&space, LinearAddress::new(0x1000)).unwrap();
    assert_eq!(mm.pmm().frame(frame).ref_count, 1);
    // Without swap nothing goes on the clock list.
    assert!(space.clock().is_empty());
}

#[test]
fn fault_outside_every_area_is_rejected() {
    let mut mm = machine(32);
    let mut space = space_with(&mut mm, 0x1000, 0x2000, RW);

    let err = read(&mut mm, &mut space, 0x2050).unwrap_err();
    assert_eq!(err, FaultError::InvalidAddress(LinearAddress::new(0x2050)));
    assert_eq!(err.code(), -3);
    assert_eq!(mm.fault_count(), 1);
    assert_eq!(mm.lookup_page(&space, LinearAddress::new(0x2000)), None);
}

#[test]
fn write_to_read_only_area_is_denied() {
    let mut mm = machine(32);
    let mut space = space_with(&mut mm, 0x4000, 0x6000, VmFlags::READ);

    assert_eq!(read(&mut mm, &mut space, 0x4010).unwrap(), 0);
    assert_eq!(
        write(&mut mm, &mut space, 0x4010, 1),
        Err(FaultError::PermissionDenied(LinearAddress::new(0x4010)))
    );
    assert_eq!(
        write(&mut mm, &mut space, 0x5000, 1),
        Err(FaultError::PermissionDenied(LinearAddress::new(0x5000)))
    );
}

#[test]
fn read_needs_read_or_exec() {
    let mut mm = machine(32);
    let mut space = space_with(&mut mm, 0x1000, 0x2000, VmFlags::WRITE);
    space
        .insert_vma(Vma::new(
            LinearAddress::new(0x8000),
            LinearAddress::new(0x9000),
            VmFlags::EXEC,
        ))
        .unwrap();

    assert_eq!(
        read(&mut mm, &mut space, 0x1000),
        Err(FaultError::PermissionDenied(LinearAddress::new(0x1000)))
    );
    write(&mut mm, &mut space, 0x1000, 7).unwrap();
    assert_eq!(read(&mut mm, &mut space, 0x8004).unwrap(), 0);
}

#[test]
fn faults_on_present_pages_are_rejected() {
    let mut mm = machine(32);
    let mut space = space_with(&mut mm, 0x1000, 0x3000, RW);
    write(&mut mm, &mut space, 0x1000, 1).unwrap();

    let la = LinearAddress::new(0x1008);
    let read_fault = PageFaultErrorCode::new().with_present(true).with_user(true);
    assert_eq!(
        mm.handle_page_fault(&mut space, read_fault, la),
        Err(FaultError::ReadOnPresent(la))
    );

    let write_fault = read_fault.with_write(true);
    assert_eq!(
        mm.handle_page_fault(&mut space, write_fault, la),
        Err(FaultError::AlreadyMapped(LinearAddress::new(0x1000)))
    );
    assert_eq!(mm.fault_count(), 3);
}

#[test]
fn swap_token_without_swap_is_a_configuration_error() {
    let mut mm = machine(32);
    let mut space = space_with(&mut mm, 0x1000, 0x3000, RW);
    let la = LinearAddress::new(0x2000);
    write(&mut mm, &mut space, 0x2000, 1).unwrap();

    let root = space.page_directory().unwrap();
    let pte = walk(mm.mapper(), root, la).unwrap();
    let frame = pte.frame().unwrap();
    *pte = PtEntry::swapped(SwapEntry::for_linear(la));
    mm.pmm_mut().frame_mut(frame).ref_dec();
    mm.pmm_mut().free_frame(frame);

    let err = read(&mut mm, &mut space, 0x2000).unwrap_err();
    assert_eq!(err, FaultError::SwapUnavailable(la));
    assert_eq!(err.code(), -6);
}

#[test]
fn fault_without_page_directory() {
    let mut mm = machine(32);
    let mut space = AddressSpace::new();
    space
        .insert_vma(Vma::new(
            LinearAddress::new(0x1000),
            LinearAddress::new(0x2000),
            RW,
        ))
        .unwrap();

    assert_eq!(
        mm.handle_page_fault(
            &mut space,
            PageFaultErrorCode::write_miss(),
            LinearAddress::new(0x1000)
        ),
        Err(FaultError::NoPageDirectory)
    );
}

#[test]
fn out_of_memory_without_swap() {
    let mut mm = machine(32);
    let mut space = space_with(&mut mm, 0x1000, 0x3000, RW);
    write(&mut mm, &mut space, 0x1000, 1).unwrap();
    while mm.pmm_mut().alloc(1).is_some() {}

    let err = write(&mut mm, &mut space, 0x2000, 1).unwrap_err();
    assert_eq!(err, FaultError::OutOfMemory);
    assert_eq!(err.code(), -4);
    assert_eq!(mm.lookup_page(&space, LinearAddress::new(0x2000)), None);
}

#[test]
fn empty_slabs_are_reaped_before_giving_up() {
    let mut mm = machine(32);
    let mut space = space_with(&mut mm, 0x1000, 0x3000, RW);
    write(&mut mm, &mut space, 0x1000, 1).unwrap();

    let obj = mm.kmalloc(2048).unwrap();
    mm.kfree(obj);
    while mm.pmm_mut().alloc(1).is_some() {}

    write(&mut mm, &mut space, 0x2000, 2).unwrap();
    assert_eq!(read(&mut mm, &mut space, 0x2000).unwrap(), 2);
    let largest = mm.slab().sized_cache(7).unwrap();
    assert_eq!(mm.slab().slab_counts(largest).unwrap().empty, 0);
}

#[test]
fn map_and_unmap_track_references() {
    let mut mm = machine(32);
    let mut space = space_with(&mut mm, 0, 0x10_0000, RW);
    let perm = PageEntryBits::new_user(true);
    let p1 = mm.pmm_mut().alloc_frame().unwrap();
    let p2 = mm.pmm_mut().alloc_frame().unwrap();
    let lo = LinearAddress::new(0);
    let hi = LinearAddress::new(PAGE_SIZE as u32);

    mm.map_page(&mut space, p1, lo, perm).unwrap();
    assert_eq!(mm.lookup_page(&space, lo), Some(p1));
    assert_eq!(mm.pmm().frame(p1).ref_count, 1);

    // Remapping the same frame at the same address keeps one reference.
    mm.map_page(&mut space, p1, lo, perm).unwrap();
    assert_eq!(mm.pmm().frame(p1).ref_count, 1);

    mm.map_page(&mut space, p1, hi, perm).unwrap();
    assert_eq!(mm.pmm().frame(p1).ref_count, 2);

    mm.map_page(&mut space, p2, hi, perm).unwrap();
    assert_eq!(mm.pmm().frame(p1).ref_count, 1);
    assert_eq!(mm.pmm().frame(p2).ref_count, 1);
    assert_eq!(mm.lookup_page(&space, hi), Some(p2));

    mm.unmap_page(&mut space, lo);
    assert_eq!(mm.lookup_page(&space, lo), None);
    assert!(mm.pmm().frame(p1).is_free());

    mm.unmap_page(&mut space, hi);
    assert!(mm.pmm().frame(p2).is_free());
    assert!(!mm.pmm().frame(p2).flags.contains(FrameFlags::SWAPPABLE));

    // Unmapping an empty slot is a no-op.
    mm.unmap_page(&mut space, hi);
}

#[test]
fn teardown_returns_every_frame() {
    let mut mm = machine(32);
    let free_before = mm.pmm().nr_free_frames();

    let mut space = space_with(&mut mm, 0x1000, 0x40_2000, RW);
    for la in [0x1000, 0x2000, 0x40_0000, 0x40_1000] {
        write(&mut mm, &mut space, la, 0xEE).unwrap();
    }
    // Directory, two tables, four pages.
    assert_eq!(mm.pmm().nr_free_frames(), free_before - 7);

    mm.teardown(space);
    assert_eq!(mm.pmm().nr_free_frames(), free_before);
}
