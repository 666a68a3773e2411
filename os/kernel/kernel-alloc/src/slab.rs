//! # Slab Cache
//!
//! Carves single frames into fixed-size objects. Each slab is one frame:
//!
//! ```text
//! ┌────────────────────┬──────────┬──────────┬─────┬────────────┬───────┐
//! │ link[0..N] (i16)   │ object 0 │ object 1 │ ... │ object N-1 │ slack │
//! └────────────────────┴──────────┴──────────┴─────┴────────────┴───────┘
//! ```
//!
//! `N = PAGE_SIZE / (2 + size)`. `link[i]` holds the index of the next free
//! object after `i`, `-1` ends the list. The head of the free list, the
//! in-use count and the owning cache are kept in the frame descriptor, so an
//! object address resolves to its slab and cache through
//! `round_down(obj, PAGE_SIZE)`.
//!
//! A cache keeps its slabs in exactly one of three partitions, decided by
//! the in-use count: `empty` (0), `partial` (between), `full` (`N`).
//!
//! Eight power-of-two caches (16 to 2048 bytes) back [`SlabAllocator::kmalloc`].

use crate::frame::{FrameFlags, SlabInfo};
use crate::frame_alloc::BuddyFrameAlloc;
use crate::frame_list::{FrameList, SlabLink};
use kernel_info::slab::{
    CACHE_NAME_LEN, SIZED_CACHE_MAX, SIZED_CACHE_MIN, SIZED_CACHE_NUM, SLAB_LINK_BYTES,
};
use kernel_memory_addresses::{FrameNumber, PAGE_SIZE, PhysicalAddress};
use kernel_vmem::PhysMapper;

/// Number of cache slots, sized caches included.
pub const MAX_CACHES: usize = 32;

/// Object constructor or destructor; receives the object's bytes.
pub type ObjectHook = fn(&mut [u8]);

/// Handle of a cache in a [`SlabAllocator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheId(u16);

impl CacheId {
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SlabError {
    #[error("invalid object size {0}")]
    InvalidSize(usize),
    #[error("size {0} exceeds the largest sized cache")]
    TooLarge(usize),
    #[error("all cache slots are in use")]
    TooManyCaches,
    #[error("out of memory while growing a cache")]
    OutOfMemory,
    #[error("unknown cache {0:?}")]
    UnknownCache(CacheId),
    #[error("cache {0:?} backs kmalloc and cannot be destroyed")]
    SizedCache(CacheId),
}

/// Partition lengths of a cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlabCounts {
    pub full: usize,
    pub partial: usize,
    pub empty: usize,
}

struct Cache {
    name: [u8; CACHE_NAME_LEN],
    name_len: usize,
    size: usize,
    num: usize,
    ctor: Option<ObjectHook>,
    dtor: Option<ObjectHook>,
    full: FrameList<SlabLink>,
    partial: FrameList<SlabLink>,
    empty: FrameList<SlabLink>,
}

impl Cache {
    fn new(name: &str, size: usize, ctor: Option<ObjectHook>, dtor: Option<ObjectHook>) -> Self {
        let mut name_len = name.len().min(CACHE_NAME_LEN);
        while !name.is_char_boundary(name_len) {
            name_len -= 1;
        }
        let mut buf = [0; CACHE_NAME_LEN];
        buf[..name_len].copy_from_slice(&name.as_bytes()[..name_len]);

        Self {
            name: buf,
            name_len,
            size,
            num: PAGE_SIZE / (SLAB_LINK_BYTES + size),
            ctor,
            dtor,
            full: FrameList::new(),
            partial: FrameList::new(),
            empty: FrameList::new(),
        }
    }

    fn name(&self) -> &str {
        core::str::from_utf8(&self.name[..self.name_len]).unwrap_or_default()
    }

    /// Byte offset of the first object inside a slab.
    const fn objects_offset(&self) -> usize {
        SLAB_LINK_BYTES * self.num
    }

    const fn object_range(&self, index: usize) -> core::ops::Range<usize> {
        let start = self.objects_offset() + index * self.size;
        start..start + self.size
    }
}

fn read_link(slab: &[u8; PAGE_SIZE], index: usize) -> i16 {
    let at = index * SLAB_LINK_BYTES;
    i16::from_ne_bytes([slab[at], slab[at + 1]])
}

fn write_link(slab: &mut [u8; PAGE_SIZE], index: usize, next: i16) {
    let at = index * SLAB_LINK_BYTES;
    slab[at..at + SLAB_LINK_BYTES].copy_from_slice(&next.to_ne_bytes());
}

/// Whether object `index` is on the free list starting at `head`.
fn free_list_contains(slab: &[u8; PAGE_SIZE], head: i16, index: usize, num: usize) -> bool {
    let mut cursor = head;
    for _ in 0..num {
        let Ok(current) = usize::try_from(cursor) else {
            return false;
        };
        if current == index {
            return true;
        }
        cursor = read_link(slab, current);
    }
    false
}

/// The cache arena together with the sized caches.
pub struct SlabAllocator {
    caches: [Option<Cache>; MAX_CACHES],
    sized: [CacheId; SIZED_CACHE_NUM],
}

impl Default for SlabAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl SlabAllocator {
    /// Create the arena with the eight sized caches registered.
    #[must_use]
    pub fn new() -> Self {
        let mut caches = [const { None }; MAX_CACHES];
        let mut sized = [CacheId(0); SIZED_CACHE_NUM];
        for (i, id) in sized.iter_mut().enumerate() {
            caches[i] = Some(Cache::new("sized", SIZED_CACHE_MIN << i, None, None));
            #[allow(clippy::cast_possible_truncation)]
            let index = i as u16;
            *id = CacheId(index);
        }
        Self { caches, sized }
    }

    /// Register a cache for objects of `size` bytes.
    ///
    /// Names longer than 16 bytes are truncated.
    ///
    /// # Errors
    /// [`SlabError::InvalidSize`] for `size == 0` or objects that leave no
    /// room for their link, [`SlabError::TooManyCaches`] when the arena is
    /// full.
    pub fn create(
        &mut self,
        name: &str,
        size: usize,
        ctor: Option<ObjectHook>,
        dtor: Option<ObjectHook>,
    ) -> Result<CacheId, SlabError> {
        if size == 0 || size > PAGE_SIZE - SLAB_LINK_BYTES {
            return Err(SlabError::InvalidSize(size));
        }
        let slot = self
            .caches
            .iter()
            .position(Option::is_none)
            .ok_or(SlabError::TooManyCaches)?;
        self.caches[slot] = Some(Cache::new(name, size, ctor, dtor));
        #[allow(clippy::cast_possible_truncation)]
        let index = slot as u16;
        Ok(CacheId(index))
    }

    fn cache(&self, id: CacheId) -> Result<&Cache, SlabError> {
        self.caches
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(SlabError::UnknownCache(id))
    }

    fn cache_mut(&mut self, id: CacheId) -> Result<&mut Cache, SlabError> {
        self.caches
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(SlabError::UnknownCache(id))
    }

    /// Add one empty slab to the cache.
    ///
    /// # Errors
    /// [`SlabError::OutOfMemory`] when no frame is available.
    pub fn grow<M: PhysMapper>(
        &mut self,
        id: CacheId,
        pmm: &mut BuddyFrameAlloc<'_>,
        mapper: &M,
    ) -> Result<FrameNumber, SlabError> {
        let cache = self.cache_mut(id)?;
        let frame = pmm.alloc(1).ok_or(SlabError::OutOfMemory)?;

        let bytes = mapper.frame_bytes_mut(frame.base());
        for i in 0..cache.num {
            #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
            let next = if i + 1 < cache.num { (i + 1) as i16 } else { -1 };
            write_link(bytes, i, next);
        }
        if let Some(ctor) = cache.ctor {
            for i in 0..cache.num {
                ctor(&mut bytes[cache.object_range(i)]);
            }
        }

        let frames = pmm.frames_mut();
        let desc = &mut frames[frame];
        desc.flags.insert(FrameFlags::SLAB);
        desc.slab = Some(SlabInfo {
            cache: id,
            in_use: 0,
            free: 0,
        });
        cache.empty.push_front(frames, frame);

        log::debug!(
            "slab {frame:?} added to cache {:?} ({} x {} bytes)",
            cache.name(),
            cache.num,
            cache.size
        );
        Ok(frame)
    }

    /// Allocate one object and return its physical address.
    ///
    /// # Errors
    /// [`SlabError::OutOfMemory`] when the cache has no free object and no
    /// frame is left to grow it.
    ///
    /// # Panics
    /// When a listed slab has lost its slab state or its free list.
    pub fn alloc<M: PhysMapper>(
        &mut self,
        id: CacheId,
        pmm: &mut BuddyFrameAlloc<'_>,
        mapper: &M,
    ) -> Result<PhysicalAddress, SlabError> {
        {
            let cache = self.cache(id)?;
            if cache.partial.is_empty() && cache.empty.is_empty() {
                self.grow(id, pmm, mapper)?;
            }
        }

        let cache = self.cache_mut(id)?;
        let frames = pmm.frames_mut();
        let slab = match cache.partial.pop_front(frames) {
            Some(slab) => slab,
            None => cache.empty.pop_front(frames).ok_or(SlabError::OutOfMemory)?,
        };

        let bytes = mapper.frame_bytes_mut(slab.base());
        let Some(info) = frames[slab].slab.as_mut() else {
            panic!("{slab:?} on a slab list without slab state");
        };
        let index = usize::try_from(info.free)
            .unwrap_or_else(|_| panic!("{slab:?} listed as free but full"));
        info.free = read_link(bytes, index);
        info.in_use += 1;
        let now_full = usize::from(info.in_use) == cache.num;

        if now_full {
            cache.full.push_front(frames, slab);
        } else {
            cache.partial.push_front(frames, slab);
        }

        #[allow(clippy::cast_possible_truncation)]
        let offset = cache.object_range(index).start as u32;
        Ok(slab.base() + offset)
    }

    /// Allocate one object and zero it.
    ///
    /// # Errors
    /// See [`alloc`](Self::alloc).
    pub fn zalloc<M: PhysMapper>(
        &mut self,
        id: CacheId,
        pmm: &mut BuddyFrameAlloc<'_>,
        mapper: &M,
    ) -> Result<PhysicalAddress, SlabError> {
        let obj = self.alloc(id, pmm, mapper)?;
        let size = self.cache(id)?.size;
        let offset = obj.page_offset() as usize;
        mapper.frame_bytes_mut(obj.align_down())[offset..offset + size].fill(0);
        Ok(obj)
    }

    /// Return `obj` to cache `id`.
    ///
    /// # Panics
    /// When `obj` does not belong to a slab of this cache, does not start an
    /// object, is already free, or its slab has no object in use.
    pub fn free<M: PhysMapper>(
        &mut self,
        id: CacheId,
        obj: PhysicalAddress,
        pmm: &mut BuddyFrameAlloc<'_>,
        mapper: &M,
    ) {
        let Ok(cache) = self.cache_mut(id) else {
            panic!("free of {obj:?} into unknown cache {id:?}");
        };
        let slab = obj.frame();
        let frames = pmm.frames_mut();
        let info = match frames.get_mut(slab).and_then(|f| f.slab.as_mut()) {
            Some(info) if info.cache == id => info,
            _ => panic!("{obj:?} is not an object of cache {:?}", cache.name()),
        };

        let offset = (obj.page_offset() as usize)
            .checked_sub(cache.objects_offset())
            .filter(|off| off % cache.size == 0 && off / cache.size < cache.num)
            .unwrap_or_else(|| panic!("{obj:?} is not on an object boundary"));
        assert!(info.in_use > 0, "free into {slab:?} with no object in use");

        let index = offset / cache.size;
        let was_full = usize::from(info.in_use) == cache.num;
        let bytes = mapper.frame_bytes_mut(slab.base());
        assert!(
            !free_list_contains(bytes, info.free, index, cache.num),
            "double free of {obj:?} in cache {:?}",
            cache.name()
        );
        write_link(bytes, index, info.free);
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        let head = index as i16;
        info.free = head;
        info.in_use -= 1;
        let now_empty = info.in_use == 0;

        if was_full {
            cache.full.remove(frames, slab);
        } else {
            cache.partial.remove(frames, slab);
        }
        if now_empty {
            cache.empty.push_front(frames, slab);
        } else {
            cache.partial.push_front(frames, slab);
        }
    }

    /// Run the destructor over a slab and give its frame back.
    fn destroy_slab<M: PhysMapper>(
        cache: &Cache,
        slab: FrameNumber,
        pmm: &mut BuddyFrameAlloc<'_>,
        mapper: &M,
    ) {
        if let Some(dtor) = cache.dtor {
            let bytes = mapper.frame_bytes_mut(slab.base());
            for i in 0..cache.num {
                dtor(&mut bytes[cache.object_range(i)]);
            }
        }
        let desc = &mut pmm.frames_mut()[slab];
        desc.slab = None;
        desc.flags.remove(FrameFlags::SLAB);
        pmm.free(slab, 1);
    }

    /// Destroy every empty slab of the cache, returning how many were freed.
    ///
    /// # Errors
    /// [`SlabError::UnknownCache`].
    pub fn shrink<M: PhysMapper>(
        &mut self,
        id: CacheId,
        pmm: &mut BuddyFrameAlloc<'_>,
        mapper: &M,
    ) -> Result<usize, SlabError> {
        let cache = self.cache_mut(id)?;
        let mut count = 0;
        while let Some(slab) = cache.empty.pop_front(pmm.frames_mut()) {
            Self::destroy_slab(cache, slab, pmm, mapper);
            count += 1;
        }
        Ok(count)
    }

    /// Shrink every registered cache.
    pub fn reap<M: PhysMapper>(&mut self, pmm: &mut BuddyFrameAlloc<'_>, mapper: &M) -> usize {
        let mut count = 0;
        for cache in self.caches.iter_mut().flatten() {
            while let Some(slab) = cache.empty.pop_front(pmm.frames_mut()) {
                Self::destroy_slab(cache, slab, pmm, mapper);
                count += 1;
            }
        }
        count
    }

    /// Destroy all slabs of a cache, in use or not, and release its slot.
    ///
    /// # Errors
    /// [`SlabError::UnknownCache`]; [`SlabError::SizedCache`] for the caches
    /// behind [`kmalloc`](Self::kmalloc).
    pub fn destroy<M: PhysMapper>(
        &mut self,
        id: CacheId,
        pmm: &mut BuddyFrameAlloc<'_>,
        mapper: &M,
    ) -> Result<(), SlabError> {
        if self.sized.contains(&id) {
            return Err(SlabError::SizedCache(id));
        }
        let mut cache = self
            .caches
            .get_mut(id.index())
            .and_then(Option::take)
            .ok_or(SlabError::UnknownCache(id))?;

        loop {
            let frames = pmm.frames_mut();
            let Some(slab) = cache
                .full
                .pop_front(frames)
                .or_else(|| cache.partial.pop_front(frames))
                .or_else(|| cache.empty.pop_front(frames))
            else {
                break;
            };
            Self::destroy_slab(&cache, slab, pmm, mapper);
        }
        log::debug!("cache {:?} destroyed", cache.name());
        Ok(())
    }

    /// Allocate `size` bytes from the smallest sized cache that fits.
    ///
    /// # Errors
    /// [`SlabError::InvalidSize`] for zero, [`SlabError::TooLarge`] above
    /// 2048 bytes, [`SlabError::OutOfMemory`].
    pub fn kmalloc<M: PhysMapper>(
        &mut self,
        size: usize,
        pmm: &mut BuddyFrameAlloc<'_>,
        mapper: &M,
    ) -> Result<PhysicalAddress, SlabError> {
        if size == 0 {
            return Err(SlabError::InvalidSize(size));
        }
        if size > SIZED_CACHE_MAX {
            return Err(SlabError::TooLarge(size));
        }
        let class = size.max(SIZED_CACHE_MIN).next_power_of_two();
        let index = (class.trailing_zeros() - SIZED_CACHE_MIN.trailing_zeros()) as usize;
        self.alloc(self.sized[index], pmm, mapper)
    }

    /// Free an object obtained from [`kmalloc`](Self::kmalloc) (or any cache).
    ///
    /// # Panics
    /// When `obj` is not a slab object.
    pub fn kfree<M: PhysMapper>(
        &mut self,
        obj: PhysicalAddress,
        pmm: &mut BuddyFrameAlloc<'_>,
        mapper: &M,
    ) {
        let Some(id) = Self::owner(obj, pmm) else {
            panic!("kfree of {obj:?}, which is not a slab object");
        };
        self.free(id, obj, pmm, mapper);
    }

    /// Object size of the cache owning `obj`.
    #[must_use]
    pub fn ksize(&self, obj: PhysicalAddress, pmm: &BuddyFrameAlloc<'_>) -> Option<usize> {
        let id = Self::owner(obj, pmm)?;
        self.cache(id).ok().map(|c| c.size)
    }

    fn owner(obj: PhysicalAddress, pmm: &BuddyFrameAlloc<'_>) -> Option<CacheId> {
        pmm.frames()
            .get(obj.frame())
            .and_then(|f| f.slab)
            .map(|info| info.cache)
    }

    /// The sized cache of class `index` (16 << index bytes).
    #[must_use]
    pub fn sized_cache(&self, index: usize) -> Option<CacheId> {
        self.sized.get(index).copied()
    }

    #[must_use]
    pub fn cache_size(&self, id: CacheId) -> Option<usize> {
        self.cache(id).ok().map(|c| c.size)
    }

    #[must_use]
    pub fn cache_name(&self, id: CacheId) -> Option<&str> {
        self.cache(id).ok().map(Cache::name)
    }

    #[must_use]
    pub fn objects_per_slab(&self, id: CacheId) -> Option<usize> {
        self.cache(id).ok().map(|c| c.num)
    }

    #[must_use]
    pub fn slab_counts(&self, id: CacheId) -> Option<SlabCounts> {
        self.cache(id).ok().map(|c| SlabCounts {
            full: c.full.len(),
            partial: c.partial.len(),
            empty: c.empty.len(),
        })
    }
}
