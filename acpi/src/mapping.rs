//! Scoped physical-table mappings.
//!
//! Firmware never bounds a table's length in advance, yet mapping is only
//! possible at page granularity. Every table access therefore follows the
//! same two-phase sequence: [`TableWindow::header`] maps a fixed two-page
//! window (enough for any table header at any intra-page offset) to learn
//! the table's true length, then [`TableWindow::exact`] re-maps precisely.
//!
//! A `TableWindow` owns its window for its whole lifetime; dropping it
//! returns both the translations and the virtual range to the mapper, on
//! every exit path.

use core::mem;

use opal_abi::PAGE_SIZE;
use opal_abi::addr::{PhysAddr, VirtAddr};
use opal_lib::align_up_u64;
use opal_mm::{MapResult, PhysMapper};

/// Pages mapped by [`TableWindow::header`]: one for the page containing the
/// table base, one more so a header straddling the page end stays readable.
const HEADER_WINDOW_PAGES: usize = 2;

/// A transient, read-only view of physical memory starting at `phys`.
pub struct TableWindow<'a> {
    mapper: &'a dyn PhysMapper,
    virt_base: VirtAddr,
    pages: usize,
    phys: PhysAddr,
    capacity: usize,
}

impl<'a> TableWindow<'a> {
    /// Bootstrap mapping: two pages from the page containing `phys`.
    pub fn header(mapper: &'a dyn PhysMapper, phys: PhysAddr) -> MapResult<Self> {
        Self::with_pages(mapper, phys, HEADER_WINDOW_PAGES)
    }

    /// Precise mapping for a table whose `length` is already known:
    /// `ceil(length / PAGE_SIZE) + 1` pages from the page containing `phys`.
    pub fn exact(mapper: &'a dyn PhysMapper, phys: PhysAddr, length: u64) -> MapResult<Self> {
        let pages = (align_up_u64(length, PAGE_SIZE) / PAGE_SIZE + 1) as usize;
        Self::with_pages(mapper, phys, pages)
    }

    fn with_pages(mapper: &'a dyn PhysMapper, phys: PhysAddr, pages: usize) -> MapResult<Self> {
        let virt_base = mapper.map_range(phys, pages)?;
        Ok(Self {
            mapper,
            virt_base,
            pages,
            phys,
            capacity: pages * PAGE_SIZE as usize - phys.page_offset() as usize,
        })
    }

    /// Physical base this window was opened at.
    #[inline]
    pub fn phys(&self) -> PhysAddr {
        self.phys
    }

    /// Readable bytes from `phys` to the end of the mapped window.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    fn start(&self) -> *const u8 {
        let virt = self.virt_base.offset(self.phys.page_offset());
        virt.as_ptr::<u8>()
    }

    /// Copy a `T` out of the window at byte `offset` from `phys`.
    ///
    /// # Panics
    ///
    /// Panics if `offset + size_of::<T>()` exceeds the window capacity.
    pub fn read_unaligned<T: Copy>(&self, offset: usize) -> T {
        let size = mem::size_of::<T>();
        assert!(
            offset + size <= self.capacity,
            "table window read out of range: offset {} size {} capacity {}",
            offset,
            size,
            self.capacity
        );
        // SAFETY: the range was just bounds-checked against the mapped
        // window, and `read_unaligned` has no alignment requirement.
        unsafe { core::ptr::read_unaligned(self.start().add(offset) as *const T) }
    }

    /// Borrow `len` bytes of the window at byte `offset` from `phys`.
    ///
    /// # Panics
    ///
    /// Panics if `offset + len` exceeds the window capacity.
    pub fn bytes(&self, offset: usize, len: usize) -> &[u8] {
        assert!(
            offset + len <= self.capacity,
            "table window slice out of range: offset {} len {} capacity {}",
            offset,
            len,
            self.capacity
        );
        // SAFETY: bounds-checked above; the window stays mapped for the
        // lifetime of the borrow.
        unsafe { core::slice::from_raw_parts(self.start().add(offset), len) }
    }
}

impl Drop for TableWindow<'_> {
    fn drop(&mut self) {
        self.mapper.unmap_range(self.virt_base, self.pages);
    }
}
