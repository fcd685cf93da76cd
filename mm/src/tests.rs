//! In-kernel tests for the transient window mapper.
//!
//! The page-map primitives are replaced with counting fakes, so these suites
//! exercise window bookkeeping (first-fit reuse, rollback, exhaustion)
//! without touching real page tables.

use core::sync::atomic::{AtomicUsize, Ordering};

use opal_abi::PAGE_SIZE;
use opal_abi::addr::{PhysAddr, VirtAddr};
use opal_lib::testing::TestResult;
use opal_lib::{assert_eq_test, assert_test, define_test_suite, fail, pass};

use crate::error::MapError;
use crate::phys_map::{
    KernelPhysMapper, PhysMapper, TABLE_WINDOW_VIRT_BASE, TABLE_WINDOW_VIRT_SIZE,
    register_page_ops,
};

static MAP_CALLS: AtomicUsize = AtomicUsize::new(0);
static UNMAP_CALLS: AtomicUsize = AtomicUsize::new(0);
/// When non-zero, the fake map op fails on exactly this call number.
static FAIL_MAP_AT: AtomicUsize = AtomicUsize::new(0);

fn fake_map_page(_virt: VirtAddr, _phys: PhysAddr) -> i32 {
    let call = MAP_CALLS.fetch_add(1, Ordering::Relaxed) + 1;
    let fail_at = FAIL_MAP_AT.load(Ordering::Relaxed);
    if fail_at != 0 && call == fail_at { -1 } else { 0 }
}

fn fake_unmap_page(_virt: VirtAddr) -> i32 {
    UNMAP_CALLS.fetch_add(1, Ordering::Relaxed);
    0
}

fn reset_fakes() {
    MAP_CALLS.store(0, Ordering::Relaxed);
    UNMAP_CALLS.store(0, Ordering::Relaxed);
    FAIL_MAP_AT.store(0, Ordering::Relaxed);
}

/// Runs before any page ops are registered: mapping must refuse cleanly.
pub fn test_map_without_backend() -> TestResult {
    let mapper = KernelPhysMapper::new();
    match mapper.map_range(PhysAddr::new(0x1000), 1) {
        Err(MapError::NoBackend) => pass!(),
        other => fail!("expected NoBackend, got {:?}", other),
    }
}

pub fn test_map_and_unmap_counts() -> TestResult {
    register_page_ops(fake_map_page, fake_unmap_page);
    reset_fakes();
    let mapper = KernelPhysMapper::new();

    let virt = match mapper.map_range(PhysAddr::new(0x1234), 2) {
        Ok(v) => v,
        Err(e) => return fail!("map_range failed: {}", e),
    };

    assert_test!(virt.is_aligned(PAGE_SIZE), "window base not page-aligned");
    assert_test!(
        virt.as_u64() >= TABLE_WINDOW_VIRT_BASE
            && virt.as_u64() < TABLE_WINDOW_VIRT_BASE + TABLE_WINDOW_VIRT_SIZE,
        "window base outside reserved region"
    );
    assert_eq_test!(MAP_CALLS.load(Ordering::Relaxed), 2, "map call count");

    mapper.unmap_range(virt, 2);
    assert_eq_test!(UNMAP_CALLS.load(Ordering::Relaxed), 2, "unmap call count");
    pass!()
}

pub fn test_window_reuse_after_free() -> TestResult {
    register_page_ops(fake_map_page, fake_unmap_page);
    reset_fakes();
    let mapper = KernelPhysMapper::new();

    let first = match mapper.map_range(PhysAddr::new(0x8000), 3) {
        Ok(v) => v,
        Err(e) => return fail!("first map failed: {}", e),
    };
    mapper.unmap_range(first, 3);

    let second = match mapper.map_range(PhysAddr::new(0x20000), 3) {
        Ok(v) => v,
        Err(e) => return fail!("second map failed: {}", e),
    };
    mapper.unmap_range(second, 3);

    assert_eq_test!(second, first, "freed window range not reused first-fit");
    pass!()
}

pub fn test_failed_map_rolls_back() -> TestResult {
    register_page_ops(fake_map_page, fake_unmap_page);
    reset_fakes();
    FAIL_MAP_AT.store(3, Ordering::Relaxed);
    let mapper = KernelPhysMapper::new();

    let before = match mapper.map_range(PhysAddr::new(0x40000), 1) {
        Ok(v) => v,
        Err(e) => return fail!("probe map failed: {}", e),
    };
    mapper.unmap_range(before, 1);
    reset_fakes();
    FAIL_MAP_AT.store(3, Ordering::Relaxed);

    match mapper.map_range(PhysAddr::new(0x40000), 4) {
        Err(MapError::PageMapFailed { .. }) => {}
        other => return fail!("expected PageMapFailed, got {:?}", other),
    }
    // Two pages were established before the third failed; both must be torn
    // down again.
    assert_eq_test!(UNMAP_CALLS.load(Ordering::Relaxed), 2, "rollback unmaps");

    FAIL_MAP_AT.store(0, Ordering::Relaxed);
    let after = match mapper.map_range(PhysAddr::new(0x40000), 1) {
        Ok(v) => v,
        Err(e) => return fail!("map after rollback failed: {}", e),
    };
    mapper.unmap_range(after, 1);
    assert_eq_test!(after, before, "window range leaked by failed mapping");
    pass!()
}

pub fn test_window_exhaustion() -> TestResult {
    register_page_ops(fake_map_page, fake_unmap_page);
    reset_fakes();
    let mapper = KernelPhysMapper::new();

    let total_pages = (TABLE_WINDOW_VIRT_SIZE / PAGE_SIZE) as usize;
    let all = match mapper.map_range(PhysAddr::new(0), total_pages) {
        Ok(v) => v,
        Err(e) => return fail!("full-window map failed: {}", e),
    };

    let overflow = mapper.map_range(PhysAddr::new(0), 1);
    mapper.unmap_range(all, total_pages);

    match overflow {
        Err(MapError::WindowExhausted) => pass!(),
        other => fail!("expected WindowExhausted, got {:?}", other),
    }
}

define_test_suite!(
    phys_map,
    [
        test_map_without_backend,
        test_map_and_unmap_counts,
        test_window_reuse_after_free,
        test_failed_map_rolls_back,
        test_window_exhaustion,
    ]
);
