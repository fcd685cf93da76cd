//! RSDP location.
//!
//! The Root System Description Pointer lives either in the Extended BIOS
//! Data Area or in the legacy BIOS range `0xE0000..0xFFFFF`, always on a
//! 16-byte boundary. The EBDA segment itself is published as a real-mode
//! segment word at physical `0x40E`. First match in scan order wins; no
//! checksum is validated.

use core::mem;

use opal_abi::addr::PhysAddr;
use opal_lib::{klog_info, klog_warn};
use opal_mm::PhysMapper;

use crate::mapping::TableWindow;

pub const RSDP_SIGNATURE: [u8; 8] = *b"RSD PTR ";

/// Physical location of the BDA word holding the EBDA real-mode segment.
const EBDA_SEGMENT_PTR: u64 = 0x40E;

/// Only the first 1 KiB of the EBDA is specified to hold the RSDP.
const EBDA_SCAN_LEN: u64 = 1024;

const BIOS_AREA_BASE: u64 = 0xE0000;
const BIOS_AREA_LEN: u64 = 0x20000;

/// RSDP as published by firmware (ACPI 2.0 shape; the trailing fields are
/// only meaningful when `revision >= 2`).
#[derive(Clone, Copy)]
#[repr(C, packed)]
pub struct Rsdp {
    pub signature: [u8; 8],
    pub checksum: u8,
    pub oem_id: [u8; 6],
    pub revision: u8,
    pub rsdt_address: u32,
    pub length: u32,
    pub xsdt_address: u64,
    pub extended_checksum: u8,
    pub reserved: [u8; 3],
}

/// Owned snapshot of the located RSDP; nothing points back into the scan
/// window after `search` returns.
#[derive(Clone, Copy, Debug)]
pub struct RsdpInfo {
    pub base: PhysAddr,
    pub revision: u8,
    pub rsdt_address: u32,
    pub xsdt_address: u64,
}

/// Scan both firmware windows for the RSDP signature.
///
/// `None` is not an error: the kernel simply continues without ACPI.
pub fn search(mapper: &dyn PhysMapper) -> Option<RsdpInfo> {
    let ebda_segment = match TableWindow::header(mapper, PhysAddr::new(0)) {
        Ok(window) => window.read_unaligned::<u16>(EBDA_SEGMENT_PTR as usize),
        Err(e) => {
            klog_warn!("ACPI: cannot map BIOS data area: {}", e);
            return None;
        }
    };

    let ebda_base = (ebda_segment as u64) << 4;
    if ebda_base != 0 {
        klog_info!("ACPI: probing EBDA, segment {:#x}", ebda_segment);
        if let Some(info) = scan_window(mapper, PhysAddr::new(ebda_base), EBDA_SCAN_LEN) {
            return Some(info);
        }
    }

    scan_window(mapper, PhysAddr::new(BIOS_AREA_BASE), BIOS_AREA_LEN)
}

/// Scan `len` bytes from `base` for the signature at 16-byte alignment.
fn scan_window(mapper: &dyn PhysMapper, base: PhysAddr, len: u64) -> Option<RsdpInfo> {
    let window = match TableWindow::exact(mapper, base, len) {
        Ok(window) => window,
        Err(e) => {
            klog_warn!("ACPI: cannot map RSDP scan window {:#x}: {}", base, e);
            return None;
        }
    };

    let mut offset = 0usize;
    while offset + mem::size_of::<Rsdp>() <= len as usize {
        let signature: [u8; 8] = window.read_unaligned(offset);
        if signature == RSDP_SIGNATURE {
            let raw: Rsdp = window.read_unaligned(offset);
            let revision = raw.revision;
            let rsdt_address = raw.rsdt_address;
            let xsdt_address = raw.xsdt_address;
            return Some(RsdpInfo {
                base: base.offset(offset as u64),
                revision,
                rsdt_address,
                xsdt_address,
            });
        }
        offset += 16;
    }
    None
}
