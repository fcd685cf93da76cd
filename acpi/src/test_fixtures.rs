//! Test support: a simulated physical address space and firmware images.
//!
//! [`FakeMapper`] implements [`PhysMapper`] over a sparse set of in-memory
//! regions. `map_range` copies the covered bytes into a freshly allocated
//! window (unbacked addresses read as zero) and `unmap_range` frees it
//! again, so the leak-freedom of discovery is directly observable through
//! [`FakeMapper::outstanding`].

use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;
use core::mem;
use core::sync::atomic::{AtomicUsize, Ordering};

use opal_abi::PAGE_SIZE;
use opal_abi::addr::{PhysAddr, VirtAddr};
use opal_mm::{MapResult, PhysMapper};
use spin::Mutex;

use crate::fadt::{ADDRESS_SPACE_SYSTEM_IO, Fadt, GenericAddress};
use crate::rsdp::Rsdp;
use crate::tables::{SDT_HEADER_LEN, SdtHeader};

pub struct FakeMapper {
    regions: Mutex<Vec<(u64, Vec<u8>)>>,
    live: Mutex<Vec<(u64, usize)>>,
    total_maps: AtomicUsize,
}

impl FakeMapper {
    pub fn new() -> Self {
        Self {
            regions: Mutex::new(Vec::new()),
            live: Mutex::new(Vec::new()),
            total_maps: AtomicUsize::new(0),
        }
    }

    /// Back `data.len()` bytes of simulated physical memory at `base`.
    pub fn add_region(&self, base: u64, data: Vec<u8>) {
        self.regions.lock().push((base, data));
    }

    /// Number of windows currently mapped and not yet released.
    pub fn outstanding(&self) -> usize {
        self.live.lock().len()
    }

    /// Total `map_range` calls ever made through this mapper.
    pub fn map_count(&self) -> usize {
        self.total_maps.load(Ordering::Relaxed)
    }
}

impl Default for FakeMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysMapper for FakeMapper {
    fn map_range(&self, phys_base: PhysAddr, pages: usize) -> MapResult<VirtAddr> {
        let window_base = phys_base.page_base().as_u64();
        let size = pages * PAGE_SIZE as usize;
        let mut window = vec![0u8; size].into_boxed_slice();

        for (region_base, data) in self.regions.lock().iter() {
            let region_end = region_base + data.len() as u64;
            let start = window_base.max(*region_base);
            let end = (window_base + size as u64).min(region_end);
            if start < end {
                let dst = (start - window_base) as usize..(end - window_base) as usize;
                let src = (start - region_base) as usize..(end - region_base) as usize;
                window[dst].copy_from_slice(&data[src]);
            }
        }

        let virt = Box::into_raw(window) as *mut u8 as u64;
        self.live.lock().push((virt, pages));
        self.total_maps.fetch_add(1, Ordering::Relaxed);
        Ok(VirtAddr::new(virt))
    }

    fn unmap_range(&self, virt_base: VirtAddr, pages: usize) {
        let mut live = self.live.lock();
        let idx = live
            .iter()
            .position(|&(virt, page_count)| virt == virt_base.as_u64() && page_count == pages)
            .expect("unmap of a window that was never mapped");
        live.remove(idx);

        let size = pages * PAGE_SIZE as usize;
        // SAFETY: pointer and length reconstruct exactly the boxed slice
        // leaked by map_range for this window.
        unsafe {
            drop(Box::from_raw(core::slice::from_raw_parts_mut(
                virt_base.as_mut_ptr::<u8>(),
                size,
            )));
        }
    }
}

// ---------------------------------------------------------------------------
// Firmware image builders
// ---------------------------------------------------------------------------

fn struct_bytes<T: Copy>(value: &T) -> Vec<u8> {
    // SAFETY: T is a packed firmware struct of plain integers; reading its
    // object representation is always valid.
    let bytes =
        unsafe { core::slice::from_raw_parts(value as *const T as *const u8, mem::size_of::<T>()) };
    bytes.to_vec()
}

fn header(signature: [u8; 4], length: u32, revision: u8) -> SdtHeader {
    SdtHeader {
        signature,
        length,
        revision,
        checksum: 0,
        oem_id: *b"OPAL  ",
        oem_table_id: *b"OPALTEST",
        oem_revision: 1,
        creator_id: 0,
        creator_revision: 0,
    }
}

/// BIOS data area image covering `0..0x410`, with the EBDA segment word at
/// `0x40E`. A zero segment means "no EBDA".
pub fn bda_image(ebda_segment: u16) -> Vec<u8> {
    let mut bytes = vec![0u8; 0x410];
    bytes[0x40E..0x410].copy_from_slice(&ebda_segment.to_le_bytes());
    bytes
}

pub fn rsdp_image(revision: u8, rsdt_address: u32, xsdt_address: u64) -> Vec<u8> {
    let rsdp = Rsdp {
        signature: *b"RSD PTR ",
        checksum: 0,
        oem_id: *b"OPAL  ",
        revision,
        rsdt_address,
        length: mem::size_of::<Rsdp>() as u32,
        xsdt_address,
        extended_checksum: 0,
        reserved: [0; 3],
    };
    struct_bytes(&rsdp)
}

/// A bare table: just a header with the given signature.
pub fn sdt_image(signature: [u8; 4]) -> Vec<u8> {
    struct_bytes(&header(signature, SDT_HEADER_LEN as u32, 1))
}

pub fn rsdt_image(entries: &[u32]) -> Vec<u8> {
    let length = (SDT_HEADER_LEN + entries.len() * mem::size_of::<u32>()) as u32;
    let mut image = struct_bytes(&header(*b"RSDT", length, 1));
    for entry in entries {
        image.extend_from_slice(&entry.to_le_bytes());
    }
    image
}

pub fn xsdt_image(entries: &[u64]) -> Vec<u8> {
    let length = (SDT_HEADER_LEN + entries.len() * mem::size_of::<u64>()) as u32;
    let mut image = struct_bytes(&header(*b"XSDT", length, 1));
    for entry in entries {
        image.extend_from_slice(&entry.to_le_bytes());
    }
    image
}

pub struct FadtSpec {
    pub revision: u8,
    pub dsdt: u32,
    pub x_dsdt: u64,
    pub reset_port: u16,
    pub reset_value: u8,
}

pub fn fadt_image(spec: &FadtSpec) -> Vec<u8> {
    // SAFETY: Fadt is all plain integers; the zero pattern is valid.
    let mut fadt: Fadt = unsafe { mem::zeroed() };
    fadt.header = header(*b"FACP", mem::size_of::<Fadt>() as u32, spec.revision);
    fadt.dsdt = spec.dsdt;
    fadt.x_dsdt = spec.x_dsdt;
    fadt.preferred_pm_profile = 1;
    fadt.sci_interrupt = 9;
    fadt.smi_command = 0xB2;
    fadt.acpi_enable = 0xA0;
    fadt.acpi_disable = 0xA1;
    fadt.pm1a_event_block = 0x600;
    fadt.pm1a_control_block = 0x604;
    fadt.pm_timer_block = 0x608;
    fadt.pm1_event_length = 4;
    fadt.pm1_control_length = 2;
    fadt.pm_timer_length = 4;
    fadt.c2_latency = 101;
    fadt.c3_latency = 1001;
    fadt.century = 0x32;
    fadt.iapc_boot_arch = 0x0003;
    fadt.flags = (1 << 10) | (1 << 2);
    fadt.reset_register = GenericAddress {
        address_space: ADDRESS_SPACE_SYSTEM_IO,
        bit_width: 8,
        bit_offset: 0,
        access_size: 1,
        address: spec.reset_port as u64,
    };
    fadt.reset_value = spec.reset_value;
    fadt.hypervisor_vendor_identity = 0x4F50_414C;
    struct_bytes(&fadt)
}

// ---------------------------------------------------------------------------
// Canonical test platform
// ---------------------------------------------------------------------------

pub const FIXTURE_XSDT: u64 = 0x10_1000;
pub const FIXTURE_LEGACY_DSDT: u64 = 0x10_2000;
pub const FIXTURE_FADT: u64 = 0x10_3000;
pub const FIXTURE_SSDT1: u64 = 0x10_4000;
pub const FIXTURE_HPET: u64 = 0x10_5000;
pub const FIXTURE_SSDT2: u64 = 0x10_6000;
pub const FIXTURE_X_DSDT: u64 = 0x10_7000;
pub const FIXTURE_RESET_PORT: u16 = 0xCF9;
pub const FIXTURE_RESET_VALUE: u8 = 0x06;

/// Revision-2 platform with an XSDT, an FADT carrying both DSDT pointers,
/// two SSDTs, and one unrelated table. The RSDP sits in the legacy BIOS
/// window; there is no EBDA.
pub fn standard_platform() -> FakeMapper {
    let mapper = FakeMapper::new();
    mapper.add_region(0, bda_image(0));
    mapper.add_region(0xE0000, rsdp_image(2, 0, FIXTURE_XSDT));
    mapper.add_region(
        FIXTURE_XSDT,
        xsdt_image(&[FIXTURE_FADT, FIXTURE_SSDT1, FIXTURE_HPET, FIXTURE_SSDT2]),
    );
    mapper.add_region(
        FIXTURE_FADT,
        fadt_image(&FadtSpec {
            revision: 2,
            dsdt: FIXTURE_LEGACY_DSDT as u32,
            x_dsdt: FIXTURE_X_DSDT,
            reset_port: FIXTURE_RESET_PORT,
            reset_value: FIXTURE_RESET_VALUE,
        }),
    );
    mapper.add_region(FIXTURE_LEGACY_DSDT, sdt_image(*b"DSDT"));
    mapper.add_region(FIXTURE_X_DSDT, sdt_image(*b"DSDT"));
    mapper.add_region(FIXTURE_SSDT1, sdt_image(*b"SSDT"));
    mapper.add_region(FIXTURE_SSDT2, sdt_image(*b"SSDT"));
    mapper.add_region(FIXTURE_HPET, sdt_image(*b"HPET"));
    mapper
}
