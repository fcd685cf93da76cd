//! ACPI table discovery for OpalOS.
//!
//! This crate turns the untyped, variably-sized tables firmware leaves in
//! physical memory into a kernel-owned snapshot of the platform
//! configuration. Discovery runs exactly once, synchronously, during boot:
//!
//! 1. scan the EBDA and legacy BIOS windows for the RSDP;
//! 2. select the root table (RSDT or XSDT) from the RSDP revision;
//! 3. copy the root table's ordered child-pointer array;
//! 4. snapshot the FADT into [`fadt::FixedPlatformData`];
//! 5. collect the AML-bearing tables (DSDT + SSDTs).
//!
//! Physical memory is only ever touched through scoped
//! [`mapping::TableWindow`]s borrowed from an [`opal_mm::PhysMapper`]
//! capability; no raw physical pointer is dereferenced anywhere.
//!
//! A missing RSDP disables the subsystem and boot continues; a missing FADT
//! or DSDT is fatal. AML is located here but never interpreted.
//!
//! # Usage
//!
//! ```ignore
//! use opal_acpi::AcpiSubsystem;
//! use opal_mm::KernelPhysMapper;
//!
//! static MAPPER: KernelPhysMapper = KernelPhysMapper::new();
//!
//! let acpi = AcpiSubsystem::discover(&MAPPER);
//! if acpi.is_operable() {
//!     let hpet = acpi.find_table(b"HPET");
//! }
//! ```

#![no_std]
#![allow(unsafe_op_in_unsafe_fn)]

extern crate alloc;

pub mod aml;
pub mod fadt;
pub mod mapping;
pub mod power;
pub mod rsdp;
pub mod tables;
pub mod test_fixtures;
pub mod tests;

use opal_abi::addr::PhysAddr;
use opal_lib::{cpu, klog_error, klog_info};
use opal_mm::PhysMapper;

use crate::aml::AmlTableSet;
use crate::fadt::FixedPlatformData;
use crate::rsdp::RsdpInfo;
use crate::tables::{MainTable, RootTable};

struct DiscoveredTables {
    rsdp: RsdpInfo,
    root: RootTable,
    main: MainTable,
    fixed: FixedPlatformData,
    aml: AmlTableSet,
}

/// The boot-time ACPI discovery service.
///
/// Constructed once during boot sequencing and handed by reference to
/// consumers (power management, device enumeration). When no RSDP exists
/// the subsystem is inoperable: every lookup returns empty and boot goes on
/// without platform-table support.
pub struct AcpiSubsystem<'a> {
    mapper: &'a dyn PhysMapper,
    discovered: Option<DiscoveredTables>,
}

impl<'a> AcpiSubsystem<'a> {
    /// Run the full discovery sequence.
    ///
    /// # Panics
    ///
    /// Panics (halting boot) if an RSDP was found but the mandatory tables
    /// behind it are missing or unmappable; see [`FixedPlatformData`].
    pub fn discover(mapper: &'a dyn PhysMapper) -> Self {
        let Some(rsdp) = rsdp::search(mapper) else {
            klog_info!("ACPI: disabled, due to RSDP being absent");
            return Self {
                mapper,
                discovered: None,
            };
        };

        let base = rsdp.base;
        let revision = rsdp.revision;
        klog_info!("ACPI: using RSDP @ {:#x}, revision {}", base, revision);

        let root = RootTable::select(&rsdp);
        let main = match MainTable::build(mapper, &root) {
            Ok(main) => main,
            Err(e) => panic!("ACPI: cannot map {} @ {:#x}: {}", root.name(), root.base(), e),
        };
        let fixed = FixedPlatformData::capture(mapper, &main);
        let aml = AmlTableSet::locate(mapper, &main, &fixed);

        Self {
            mapper,
            discovered: Some(DiscoveredTables {
                rsdp,
                root,
                main,
                fixed,
                aml,
            }),
        }
    }

    /// Whether an RSDP was found and the table set is usable.
    #[inline]
    pub fn is_operable(&self) -> bool {
        self.discovered.is_some()
    }

    /// The RSDP snapshot, when operable.
    pub fn rsdp(&self) -> Option<&RsdpInfo> {
        self.discovered.as_ref().map(|d| &d.rsdp)
    }

    /// Which root table was selected, when operable.
    pub fn root_table(&self) -> Option<RootTable> {
        self.discovered.as_ref().map(|d| d.root)
    }

    /// The ordered child-table pointer list, when operable.
    pub fn main_table(&self) -> Option<&MainTable> {
        self.discovered.as_ref().map(|d| &d.main)
    }

    /// First main-table entry matching `signature`, or `None` (also `None`
    /// whenever the subsystem is inoperable).
    pub fn find_table(&self, signature: &[u8; 4]) -> Option<PhysAddr> {
        let discovered = self.discovered.as_ref()?;
        tables::find_table(self.mapper, &discovered.main, signature)
    }

    /// The owned FADT snapshot, when operable.
    pub fn fixed_data(&self) -> Option<&FixedPlatformData> {
        self.discovered.as_ref().map(|d| &d.fixed)
    }

    /// DSDT followed by every SSDT in discovery order; empty when
    /// inoperable.
    pub fn aml_tables(&self) -> &[PhysAddr] {
        match &self.discovered {
            Some(d) => d.aml.tables(),
            None => &[],
        }
    }

    /// Reboot through the FADT reset register. Never returns.
    pub fn reboot(&self) -> ! {
        match self.fixed_data() {
            Some(fixed) => power::reboot(fixed),
            None => {
                klog_error!("ACPI: reboot requested without platform data, halting");
                cpu::halt_loop()
            }
        }
    }

    /// Shutdown; unsupported and never returns.
    pub fn shutdown(&self) -> ! {
        power::shutdown()
    }
}
