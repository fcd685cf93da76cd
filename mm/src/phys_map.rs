//! Transient physical-to-virtual window mapping.
//!
//! Firmware tables and other physical structures are only reachable through
//! page-granular mappings into a reserved kernel virtual window. The
//! [`PhysMapper`] trait is the capability consumers hold; the
//! [`KernelPhysMapper`] implementation allocates window space from a
//! free-list and drives the page-map primitives the paging layer registers
//! at boot via [`register_page_ops`]. Every mapped range can be returned
//! with [`PhysMapper::unmap_range`], which releases both the translations
//! and the window space.

use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};

use opal_abi::PAGE_SIZE;
use opal_abi::addr::{PhysAddr, VirtAddr};
use opal_lib::klog_warn;
use spin::Mutex;

use crate::error::{MapError, MapResult};

/// Kernel virtual window reserved for transient physical-table mappings.
pub const TABLE_WINDOW_VIRT_BASE: u64 = 0xFFFF_8200_0000_0000;

/// Size of the transient mapping window (16 MiB).
pub const TABLE_WINDOW_VIRT_SIZE: u64 = 0x0000_0000_0100_0000;

/// Capability to map a physical page range into kernel virtual space.
///
/// `map_range` maps `pages` kernel pages starting at the page containing
/// `phys_base` and returns the *page-aligned* virtual base; callers re-apply
/// the intra-page offset themselves. `unmap_range` must be passed exactly
/// the base and page count a successful `map_range` produced.
pub trait PhysMapper: Sync {
    fn map_range(&self, phys_base: PhysAddr, pages: usize) -> MapResult<VirtAddr>;
    fn unmap_range(&self, virt_base: VirtAddr, pages: usize);
}

// ---------------------------------------------------------------------------
// Page-map primitive registration
// ---------------------------------------------------------------------------

/// Map one 4KB kernel page; returns 0 on success.
pub type MapPageFn = fn(VirtAddr, PhysAddr) -> i32;

/// Unmap one 4KB kernel page; returns 0 on success.
pub type UnmapPageFn = fn(VirtAddr) -> i32;

static MAP_PAGE: AtomicPtr<()> = AtomicPtr::new(ptr::null_mut());
static UNMAP_PAGE: AtomicPtr<()> = AtomicPtr::new(ptr::null_mut());

/// Register the paging layer's page-map primitives.
///
/// Called once during boot, before any `PhysMapper` use. Mapping attempts
/// made earlier fail with [`MapError::NoBackend`].
pub fn register_page_ops(map: MapPageFn, unmap: UnmapPageFn) {
    MAP_PAGE.store(map as *mut (), Ordering::Release);
    UNMAP_PAGE.store(unmap as *mut (), Ordering::Release);
}

fn map_page_fn() -> Option<MapPageFn> {
    let raw = MAP_PAGE.load(Ordering::Acquire);
    if raw.is_null() {
        None
    } else {
        // SAFETY: `register_page_ops` only stores valid `MapPageFn` pointers,
        // which have the same representation as `*mut ()` on x86_64.
        Some(unsafe { core::mem::transmute::<*mut (), MapPageFn>(raw) })
    }
}

fn unmap_page_fn() -> Option<UnmapPageFn> {
    let raw = UNMAP_PAGE.load(Ordering::Acquire);
    if raw.is_null() {
        None
    } else {
        // SAFETY: as in `map_page_fn`.
        Some(unsafe { core::mem::transmute::<*mut (), UnmapPageFn>(raw) })
    }
}

// ---------------------------------------------------------------------------
// Window free-list
// ---------------------------------------------------------------------------

const FREE_LIST_CAPACITY: usize = 32;

#[derive(Clone, Copy)]
struct Range {
    base: u64,
    pages: u64,
}

/// First-fit allocator over the reserved window, sorted by base address.
struct FreeList {
    ranges: [Range; FREE_LIST_CAPACITY],
    len: usize,
}

impl FreeList {
    const fn new() -> Self {
        let mut ranges = [Range { base: 0, pages: 0 }; FREE_LIST_CAPACITY];
        ranges[0] = Range {
            base: TABLE_WINDOW_VIRT_BASE,
            pages: TABLE_WINDOW_VIRT_SIZE / PAGE_SIZE,
        };
        Self { ranges, len: 1 }
    }

    fn alloc(&mut self, pages: u64) -> Option<u64> {
        for i in 0..self.len {
            if self.ranges[i].pages >= pages {
                let base = self.ranges[i].base;
                self.ranges[i].base += pages * PAGE_SIZE;
                self.ranges[i].pages -= pages;
                if self.ranges[i].pages == 0 {
                    self.remove(i);
                }
                return Some(base);
            }
        }
        None
    }

    fn free(&mut self, base: u64, pages: u64) {
        let end = base + pages * PAGE_SIZE;

        let mut idx = self.len;
        for i in 0..self.len {
            if self.ranges[i].base > base {
                idx = i;
                break;
            }
        }

        let merges_prev =
            idx > 0 && self.ranges[idx - 1].base + self.ranges[idx - 1].pages * PAGE_SIZE == base;
        let merges_next = idx < self.len && self.ranges[idx].base == end;

        if merges_prev && merges_next {
            self.ranges[idx - 1].pages += pages + self.ranges[idx].pages;
            self.remove(idx);
        } else if merges_prev {
            self.ranges[idx - 1].pages += pages;
        } else if merges_next {
            self.ranges[idx].base = base;
            self.ranges[idx].pages += pages;
        } else if self.len < FREE_LIST_CAPACITY {
            for i in (idx..self.len).rev() {
                self.ranges[i + 1] = self.ranges[i];
            }
            self.ranges[idx] = Range { base, pages };
            self.len += 1;
        } else {
            // The range stays mapped out of the allocator; window space is
            // lost but correctness is unaffected.
            klog_warn!(
                "phys_map: free-list full, dropping window range {:#x} ({} pages)",
                base,
                pages
            );
        }
    }

    fn remove(&mut self, idx: usize) {
        for i in idx..self.len - 1 {
            self.ranges[i] = self.ranges[i + 1];
        }
        self.len -= 1;
    }
}

static WINDOW_FREE_LIST: Mutex<FreeList> = Mutex::new(FreeList::new());

// ---------------------------------------------------------------------------
// Kernel mapper
// ---------------------------------------------------------------------------

/// The production [`PhysMapper`] over the reserved kernel window.
///
/// Stateless handle; window bookkeeping and the registered page-map
/// primitives are shared process-wide.
pub struct KernelPhysMapper;

impl KernelPhysMapper {
    pub const fn new() -> Self {
        Self
    }
}

impl Default for KernelPhysMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysMapper for KernelPhysMapper {
    fn map_range(&self, phys_base: PhysAddr, pages: usize) -> MapResult<VirtAddr> {
        let map_page = map_page_fn().ok_or(MapError::NoBackend)?;
        let pages = pages as u64;

        let page_base = phys_base.page_base();
        let end = page_base
            .checked_offset(pages * PAGE_SIZE)
            .ok_or(MapError::InvalidPhysicalAddress {
                address: phys_base.as_u64(),
            })?;
        if end.as_u64() > PhysAddr::MAX.as_u64() {
            return Err(MapError::InvalidPhysicalAddress {
                address: phys_base.as_u64(),
            });
        }

        let virt_base = WINDOW_FREE_LIST
            .lock()
            .alloc(pages)
            .ok_or(MapError::WindowExhausted)?;

        for i in 0..pages {
            let virt = VirtAddr::new(virt_base + i * PAGE_SIZE);
            let phys = page_base.offset(i * PAGE_SIZE);
            if map_page(virt, phys) != 0 {
                if let Some(unmap_page) = unmap_page_fn() {
                    for j in 0..i {
                        let _ = unmap_page(VirtAddr::new(virt_base + j * PAGE_SIZE));
                    }
                }
                WINDOW_FREE_LIST.lock().free(virt_base, pages);
                return Err(MapError::PageMapFailed {
                    address: phys.as_u64(),
                });
            }
        }

        Ok(VirtAddr::new(virt_base))
    }

    fn unmap_range(&self, virt_base: VirtAddr, pages: usize) {
        let pages = pages as u64;
        if let Some(unmap_page) = unmap_page_fn() {
            for i in 0..pages {
                let _ = unmap_page(VirtAddr::new(virt_base.as_u64() + i * PAGE_SIZE));
            }
        }
        WINDOW_FREE_LIST.lock().free(virt_base.as_u64(), pages);
    }
}
