//! AML-bearing table collection.
//!
//! The DSDT is reachable only through the FADT; every SSDT is a
//! continuation of it and appears in the main table. This module only
//! records where the AML blobs live — interpreting them is someone else's
//! job.

use alloc::vec::Vec;

use opal_abi::addr::PhysAddr;
use opal_lib::{klog_info, klog_warn};
use opal_mm::PhysMapper;

use crate::fadt::FixedPlatformData;
use crate::mapping::TableWindow;
use crate::tables::{MainTable, SdtHeader};

pub const SSDT_SIGNATURE: [u8; 4] = *b"SSDT";

/// Every AML-bearing table: the resolved DSDT first, then each SSDT in
/// main-table discovery order.
pub struct AmlTableSet {
    tables: Vec<PhysAddr>,
}

impl AmlTableSet {
    pub fn locate(
        mapper: &dyn PhysMapper,
        main: &MainTable,
        fixed: &FixedPlatformData,
    ) -> Self {
        klog_info!("ACPI: searching for AML tables");
        let mut tables = Vec::new();
        tables.push(fixed.dsdt());

        for &phys in main.entries() {
            let window = match TableWindow::header(mapper, phys) {
                Ok(window) => window,
                Err(e) => {
                    klog_warn!("ACPI: skipping unmappable table @ {:#x}: {}", phys, e);
                    continue;
                }
            };
            let header: SdtHeader = window.read_unaligned(0);
            if header.signature == SSDT_SIGNATURE {
                klog_info!("ACPI: found SSDT @ {:#x}", phys);
                tables.push(phys);
            }
        }

        klog_info!("ACPI: {} AML tables registered", tables.len());
        Self { tables }
    }

    /// The DSDT followed by every SSDT, in discovery order.
    #[inline]
    pub fn tables(&self) -> &[PhysAddr] {
        &self.tables
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
