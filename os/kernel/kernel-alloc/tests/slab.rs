mod common;

use std::collections::{HashMap, HashSet};

use common::{TestPhys, buddy, frame_table};
use kernel_alloc::{CacheId, FrameFlags, SlabAllocator, SlabCounts, SlabError};
use kernel_memory_addresses::{FrameNumber, PhysicalAddress};
use proptest::prelude::*;

const TEST_OBJECT_SIZE: usize = 2046;

fn ctor(obj: &mut [u8]) {
    obj.fill(0x22);
}

fn dtor(obj: &mut [u8]) {
    obj.fill(0x11);
}

fn counts(full: usize, partial: usize, empty: usize) -> SlabCounts {
    SlabCounts {
        full,
        partial,
        empty,
    }
}

fn filled_with(phys: &TestPhys, obj: PhysicalAddress, value: u8) -> bool {
    phys.bytes(obj, TEST_OBJECT_SIZE).iter().all(|&b| b == value)
}

#[test]
fn cache_lifecycle() {
    let phys = TestPhys::with_frames(264);
    let mut frames = frame_table(&phys);
    let mut pmm = buddy(&phys, &mut frames);
    let mut slab = SlabAllocator::new();
    let available = pmm.nr_free_frames();

    let id = slab
        .create("test", TEST_OBJECT_SIZE, Some(ctor), Some(dtor))
        .unwrap();
    assert_eq!(slab.objects_per_slab(id), Some(2));
    assert_eq!(slab.cache_name(id), Some("test"));

    let mut objs = Vec::new();
    for _ in 0..5 {
        objs.push(slab.alloc(id, &mut pmm, &phys).unwrap());
    }
    objs.push(slab.zalloc(id, &mut pmm, &phys).unwrap());

    for &obj in &objs[..5] {
        assert!(filled_with(&phys, obj, 0x22), "{obj:?} not constructed");
    }
    assert!(filled_with(&phys, objs[5], 0x00));

    assert_eq!(slab.slab_counts(id), Some(counts(3, 0, 0)));
    assert_eq!(pmm.nr_free_frames(), available - 3);

    for &obj in &objs[3..6] {
        slab.free(id, obj, &mut pmm, &phys);
    }
    assert_eq!(slab.slab_counts(id), Some(counts(1, 1, 1)));

    assert_eq!(slab.shrink(id, &mut pmm, &phys), Ok(1));
    assert_eq!(slab.slab_counts(id), Some(counts(1, 1, 0)));
    assert!(filled_with(&phys, objs[4], 0x11), "destructor did not run");
    assert_eq!(pmm.nr_free_frames(), available - 2);

    for &obj in &objs[..3] {
        slab.free(id, obj, &mut pmm, &phys);
    }
    assert_eq!(slab.slab_counts(id), Some(counts(0, 0, 2)));
    assert_eq!(slab.reap(&mut pmm, &phys), 2);
    assert_eq!(pmm.nr_free_frames(), available);

    slab.destroy(id, &mut pmm, &phys).unwrap();
    assert_eq!(slab.cache_size(id), None);
    assert_eq!(
        slab.alloc(id, &mut pmm, &phys),
        Err(SlabError::UnknownCache(id))
    );
}

#[test]
fn objects_come_from_disjoint_slots() {
    let phys = TestPhys::with_frames(264);
    let mut frames = frame_table(&phys);
    let mut pmm = buddy(&phys, &mut frames);
    let mut slab = SlabAllocator::new();

    let id = slab.create("pairs", 64, None, None).unwrap();
    let per_slab = slab.objects_per_slab(id).unwrap();
    let mut objs: Vec<_> = (0..per_slab + 1)
        .map(|_| slab.alloc(id, &mut pmm, &phys).unwrap())
        .collect();
    assert_eq!(slab.slab_counts(id), Some(counts(1, 1, 0)));

    objs.sort();
    for pair in objs.windows(2) {
        if pair[0].frame() == pair[1].frame() {
            assert!(pair[1] - pair[0] >= 64, "{pair:?} overlap");
        }
    }

    // a freed slot is handed out again
    let last = objs[3];
    slab.free(id, last, &mut pmm, &phys);
    assert_eq!(slab.alloc(id, &mut pmm, &phys), Ok(last));
}

#[test]
fn destroy_releases_slabs_in_use() {
    let phys = TestPhys::with_frames(264);
    let mut frames = frame_table(&phys);
    let mut pmm = buddy(&phys, &mut frames);
    let mut slab = SlabAllocator::new();
    let available = pmm.nr_free_frames();

    let id = slab.create("doomed", 1000, None, Some(dtor)).unwrap();
    for _ in 0..9 {
        slab.alloc(id, &mut pmm, &phys).unwrap();
    }
    assert_eq!(pmm.nr_free_frames(), available - 3);

    slab.destroy(id, &mut pmm, &phys).unwrap();
    assert_eq!(pmm.nr_free_frames(), available);
    assert!(
        pmm.frames()
            .get(pmm.managed_base())
            .is_some_and(|f| !f.flags.contains(FrameFlags::SLAB))
    );
}

#[test]
fn kmalloc_uses_the_smallest_class() {
    let phys = TestPhys::with_frames(264);
    let mut frames = frame_table(&phys);
    let mut pmm = buddy(&phys, &mut frames);
    let mut slab = SlabAllocator::new();
    let available = pmm.nr_free_frames();

    let obj = slab.kmalloc(2048, &mut pmm, &phys).unwrap();
    assert_eq!(pmm.nr_free_frames(), available - 1);
    assert_eq!(slab.ksize(obj, &pmm), Some(2048));
    slab.kfree(obj, &mut pmm, &phys);
    assert_eq!(slab.reap(&mut pmm, &phys), 1);
    assert_eq!(pmm.nr_free_frames(), available);

    for (size, class) in [(1, 16), (16, 16), (17, 32), (100, 128), (1025, 2048)] {
        let obj = slab.kmalloc(size, &mut pmm, &phys).unwrap();
        assert_eq!(slab.ksize(obj, &pmm), Some(class), "kmalloc({size})");
        slab.kfree(obj, &mut pmm, &phys);
    }

    assert_eq!(slab.kmalloc(0, &mut pmm, &phys), Err(SlabError::InvalidSize(0)));
    assert_eq!(slab.kmalloc(2049, &mut pmm, &phys), Err(SlabError::TooLarge(2049)));
}

#[test]
fn growth_fails_without_frames() {
    let phys = TestPhys::with_frames(3);
    let mut frames = frame_table(&phys);
    let mut pmm = buddy(&phys, &mut frames);
    let mut slab = SlabAllocator::new();

    assert_eq!(pmm.nr_managed(), 2);
    let a = slab.kmalloc(2048, &mut pmm, &phys).unwrap();
    let b = slab.kmalloc(2048, &mut pmm, &phys).unwrap();
    assert_ne!(a.frame(), b.frame());
    assert_eq!(slab.kmalloc(2048, &mut pmm, &phys), Err(SlabError::OutOfMemory));
    assert_eq!(slab.ksize(PhysicalAddress::zero(), &pmm), None);
}

#[test]
#[should_panic(expected = "not an object of cache")]
fn free_into_the_wrong_cache_is_fatal() {
    let phys = TestPhys::with_frames(264);
    let mut frames = frame_table(&phys);
    let mut pmm = buddy(&phys, &mut frames);
    let mut slab = SlabAllocator::new();

    let a = slab.create("a", 32, None, None).unwrap();
    let b: CacheId = slab.create("b", 32, None, None).unwrap();
    let obj = slab.alloc(a, &mut pmm, &phys).unwrap();
    slab.free(b, obj, &mut pmm, &phys);
}

#[test]
#[should_panic(expected = "object boundary")]
fn free_of_an_interior_pointer_is_fatal() {
    let phys = TestPhys::with_frames(264);
    let mut frames = frame_table(&phys);
    let mut pmm = buddy(&phys, &mut frames);
    let mut slab = SlabAllocator::new();

    let obj = slab.kmalloc(64, &mut pmm, &phys).unwrap();
    slab.kfree(obj + 8, &mut pmm, &phys);
}

#[test]
#[should_panic(expected = "double free")]
fn double_free_in_a_busy_slab_is_fatal() {
    let phys = TestPhys::with_frames(264);
    let mut frames = frame_table(&phys);
    let mut pmm = buddy(&phys, &mut frames);
    let mut slab = SlabAllocator::new();

    let id = slab.create("twice", 64, None, None).unwrap();
    let a = slab.alloc(id, &mut pmm, &phys).unwrap();
    let _b = slab.alloc(id, &mut pmm, &phys).unwrap();
    slab.free(id, a, &mut pmm, &phys);
    slab.free(id, a, &mut pmm, &phys);
}

#[test]
fn sized_caches_cannot_be_destroyed() {
    let phys = TestPhys::with_frames(264);
    let mut frames = frame_table(&phys);
    let mut pmm = buddy(&phys, &mut frames);
    let mut slab = SlabAllocator::new();

    let smallest = slab.sized_cache(0).unwrap();
    assert_eq!(
        slab.destroy(smallest, &mut pmm, &phys),
        Err(SlabError::SizedCache(smallest))
    );

    let tiny = slab.create("tiny", 8, None, None).unwrap();
    assert_ne!(tiny, smallest);
    let obj = slab.kmalloc(16, &mut pmm, &phys).unwrap();
    assert_eq!(slab.ksize(obj, &pmm), Some(16));
}

#[derive(Debug, Clone)]
enum Op {
    Alloc,
    Free(prop::sample::Index),
    Shrink,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Alloc),
        2 => any::<prop::sample::Index>().prop_map(Op::Free),
        1 => Just(Op::Shrink),
    ]
}

proptest! {
    #[test]
    fn partitions_follow_the_live_objects(ops in prop::collection::vec(op(), 1..120)) {
        let phys = TestPhys::with_frames(264);
        let mut frames = frame_table(&phys);
        let mut pmm = buddy(&phys, &mut frames);
        let mut slab = SlabAllocator::new();
        let id = slab.create("model", 500, None, None).unwrap();
        let per_slab = slab.objects_per_slab(id).unwrap();

        let mut live: Vec<PhysicalAddress> = Vec::new();
        let mut slabs: HashSet<FrameNumber> = HashSet::new();
        for op in ops {
            match op {
                Op::Alloc => {
                    let obj = slab.alloc(id, &mut pmm, &phys).unwrap();
                    prop_assert!(!live.contains(&obj), "{:?} handed out twice", obj);
                    slabs.insert(obj.frame());
                    live.push(obj);
                }
                Op::Free(idx) => {
                    if !live.is_empty() {
                        let obj = live.swap_remove(idx.index(live.len()));
                        slab.free(id, obj, &mut pmm, &phys);
                    }
                }
                Op::Shrink => {
                    slab.shrink(id, &mut pmm, &phys).unwrap();
                    slabs.retain(|f| live.iter().any(|o| o.frame() == *f));
                }
            }

            let mut in_use: HashMap<FrameNumber, usize> = HashMap::new();
            for obj in &live {
                *in_use.entry(obj.frame()).or_default() += 1;
            }
            let full = in_use.values().filter(|&&n| n == per_slab).count();
            let partial = in_use.len() - full;
            let expected = counts(full, partial, slabs.len() - in_use.len());
            prop_assert_eq!(slab.slab_counts(id), Some(expected));

            for &f in &slabs {
                let info = pmm.frames()[f].slab;
                let used = in_use.get(&f).copied().unwrap_or(0);
                prop_assert_eq!(info.map(|i| usize::from(i.in_use)), Some(used));
            }
        }
    }
}
