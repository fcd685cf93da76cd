//! Fixed ACPI Description Table ("FACP") extraction.
//!
//! The FADT is the one mandatory table: it carries the fixed-hardware
//! register blocks, the reset mechanism, and the DSDT pointer. Everything
//! the kernel needs out of it is copied into the owned
//! [`FixedPlatformData`] record while the table is transiently mapped; no
//! reference into the mapping survives construction.

use bitflags::bitflags;
use opal_abi::addr::PhysAddr;
use opal_lib::klog_info;
use opal_mm::PhysMapper;

use crate::mapping::TableWindow;
use crate::tables::{MainTable, SdtHeader, find_table};

pub const FADT_SIGNATURE: [u8; 4] = *b"FACP";

/// ACPI Generic Address Structure: where a register lives (port I/O, MMIO,
/// PCI config, …) and how wide it is.
#[repr(C, packed)]
#[derive(Clone, Copy, Debug, Default)]
pub struct GenericAddress {
    pub address_space: u8,
    pub bit_width: u8,
    pub bit_offset: u8,
    pub access_size: u8,
    pub address: u64,
}

/// Address-space id for port-mapped I/O in a [`GenericAddress`].
pub const ADDRESS_SPACE_SYSTEM_IO: u8 = 1;

bitflags! {
    /// FADT fixed-feature flags (offset 112).
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct FadtFlags: u32 {
        const WBINVD = 1 << 0;
        const WBINVD_FLUSH = 1 << 1;
        const PROC_C1 = 1 << 2;
        const P_LVL2_UP = 1 << 3;
        const POWER_BUTTON = 1 << 4;
        const SLEEP_BUTTON = 1 << 5;
        const FIX_RTC = 1 << 6;
        const RTC_S4 = 1 << 7;
        const TIMER_VAL_EXT = 1 << 8;
        const DOCK_CAP = 1 << 9;
        const RESET_REG_SUPPORTED = 1 << 10;
        const SEALED_CASE = 1 << 11;
        const HEADLESS = 1 << 12;
        const CPU_SW_SLEEP = 1 << 13;
        const HW_REDUCED_ACPI = 1 << 20;
        const LOW_POWER_S0_IDLE = 1 << 21;
    }
}

bitflags! {
    /// IA-PC boot-architecture flags (offset 109).
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct IaPcBootArch: u16 {
        const LEGACY_DEVICES = 1 << 0;
        const PS2_8042 = 1 << 1;
        const VGA_NOT_PRESENT = 1 << 2;
        const MSI_NOT_SUPPORTED = 1 << 3;
        const PCIE_ASPM_CONTROLS = 1 << 4;
        const CMOS_RTC_NOT_PRESENT = 1 << 5;
    }
}

/// FADT as published by firmware (ACPI 6.0 shape, 276 bytes).
#[repr(C, packed)]
#[derive(Clone, Copy)]
pub struct Fadt {
    pub header: SdtHeader,
    pub firmware_ctrl: u32,
    pub dsdt: u32,
    pub reserved: u8,
    pub preferred_pm_profile: u8,
    pub sci_interrupt: u16,
    pub smi_command: u32,
    pub acpi_enable: u8,
    pub acpi_disable: u8,
    pub s4bios_request: u8,
    pub pstate_control: u8,
    pub pm1a_event_block: u32,
    pub pm1b_event_block: u32,
    pub pm1a_control_block: u32,
    pub pm1b_control_block: u32,
    pub pm2_control_block: u32,
    pub pm_timer_block: u32,
    pub gpe0_block: u32,
    pub gpe1_block: u32,
    pub pm1_event_length: u8,
    pub pm1_control_length: u8,
    pub pm2_control_length: u8,
    pub pm_timer_length: u8,
    pub gpe0_block_length: u8,
    pub gpe1_block_length: u8,
    pub gpe1_base: u8,
    pub cstate_control: u8,
    pub c2_latency: u16,
    pub c3_latency: u16,
    pub flush_size: u16,
    pub flush_stride: u16,
    pub duty_offset: u8,
    pub duty_width: u8,
    pub day_alarm: u8,
    pub month_alarm: u8,
    pub century: u8,
    pub iapc_boot_arch: u16,
    pub reserved2: u8,
    pub flags: u32,
    pub reset_register: GenericAddress,
    pub reset_value: u8,
    pub reserved3: [u8; 3],
    pub x_firmware_ctrl: u64,
    pub x_dsdt: u64,
    pub x_pm1a_event_block: GenericAddress,
    pub x_pm1b_event_block: GenericAddress,
    pub x_pm1a_control_block: GenericAddress,
    pub x_pm1b_control_block: GenericAddress,
    pub x_pm2_control_block: GenericAddress,
    pub x_pm_timer_block: GenericAddress,
    pub x_gpe0_block: GenericAddress,
    pub x_gpe1_block: GenericAddress,
    pub sleep_control: GenericAddress,
    pub sleep_status: GenericAddress,
    pub hypervisor_vendor_identity: u64,
}

/// Owned, pointer-free snapshot of the FADT's fixed configuration.
///
/// Built exactly once during discovery and never mutated afterwards; safe
/// for concurrent reads by any post-boot consumer.
#[derive(Clone, Copy, Debug)]
pub struct FixedPlatformData {
    pub revision: u8,
    pub preferred_pm_profile: u8,
    pub sci_interrupt: u16,
    pub smi_command: u32,
    pub acpi_enable: u8,
    pub acpi_disable: u8,
    pub s4bios_request: u8,
    pub pstate_control: u8,

    pub pm1a_event_block: u32,
    pub pm1b_event_block: u32,
    pub pm1a_control_block: u32,
    pub pm1b_control_block: u32,
    pub pm2_control_block: u32,
    pub pm_timer_block: u32,
    pub gpe0_block: u32,
    pub gpe1_block: u32,
    pub pm1_event_length: u8,
    pub pm1_control_length: u8,
    pub pm2_control_length: u8,
    pub pm_timer_length: u8,
    pub gpe0_block_length: u8,
    pub gpe1_block_length: u8,
    pub gpe1_base: u8,
    pub cstate_control: u8,
    pub c2_latency: u16,
    pub c3_latency: u16,
    pub flush_size: u16,
    pub flush_stride: u16,
    pub duty_offset: u8,
    pub duty_width: u8,
    pub day_alarm: u8,
    pub month_alarm: u8,
    pub century: u8,

    pub boot_arch_flags: IaPcBootArch,
    pub flags: FadtFlags,

    pub reset_register: GenericAddress,
    pub reset_value: u8,

    pub x_pm1a_event_block: GenericAddress,
    pub x_pm1b_event_block: GenericAddress,
    pub x_pm1a_control_block: GenericAddress,
    pub x_pm1b_control_block: GenericAddress,
    pub x_pm2_control_block: GenericAddress,
    pub x_pm_timer_block: GenericAddress,
    pub x_gpe0_block: GenericAddress,
    pub x_gpe1_block: GenericAddress,
    pub sleep_control: GenericAddress,
    pub sleep_status: GenericAddress,
    pub hypervisor_vendor_identity: u64,

    dsdt_address: u32,
    x_dsdt_address: u64,
}

impl FixedPlatformData {
    /// Locate, map, and snapshot the FADT.
    ///
    /// # Panics
    ///
    /// Panics if no "FACP" table exists: the RSDP already promised ACPI
    /// support, so a table set without a FADT cannot be booted on.
    pub fn capture(mapper: &dyn PhysMapper, main: &MainTable) -> Self {
        klog_info!("ACPI: searching for the fixed ACPI description table");
        let Some(phys) = find_table(mapper, main, &FADT_SIGNATURE) else {
            panic!("ACPI: no FADT in the main table, cannot continue boot");
        };

        let header_window = match TableWindow::header(mapper, phys) {
            Ok(window) => window,
            Err(e) => panic!("ACPI: cannot map FADT header @ {:#x}: {}", phys, e),
        };
        let header: SdtHeader = header_window.read_unaligned(0);
        let length = header.length;
        let revision = header.revision;
        drop(header_window);

        klog_info!("ACPI: FADT @ {:#x}, revision {}, length {}", phys, revision, length);

        let window = match TableWindow::exact(mapper, phys, length as u64) {
            Ok(window) => window,
            Err(e) => panic!("ACPI: cannot map FADT @ {:#x}: {}", phys, e),
        };
        let raw: Fadt = window.read_unaligned(0);
        Self::from_raw(&raw)
    }

    fn from_raw(fadt: &Fadt) -> Self {
        Self {
            revision: fadt.header.revision,
            preferred_pm_profile: fadt.preferred_pm_profile,
            sci_interrupt: fadt.sci_interrupt,
            smi_command: fadt.smi_command,
            acpi_enable: fadt.acpi_enable,
            acpi_disable: fadt.acpi_disable,
            s4bios_request: fadt.s4bios_request,
            pstate_control: fadt.pstate_control,

            pm1a_event_block: fadt.pm1a_event_block,
            pm1b_event_block: fadt.pm1b_event_block,
            pm1a_control_block: fadt.pm1a_control_block,
            pm1b_control_block: fadt.pm1b_control_block,
            pm2_control_block: fadt.pm2_control_block,
            pm_timer_block: fadt.pm_timer_block,
            gpe0_block: fadt.gpe0_block,
            gpe1_block: fadt.gpe1_block,
            pm1_event_length: fadt.pm1_event_length,
            pm1_control_length: fadt.pm1_control_length,
            pm2_control_length: fadt.pm2_control_length,
            pm_timer_length: fadt.pm_timer_length,
            gpe0_block_length: fadt.gpe0_block_length,
            gpe1_block_length: fadt.gpe1_block_length,
            gpe1_base: fadt.gpe1_base,
            cstate_control: fadt.cstate_control,
            c2_latency: fadt.c2_latency,
            c3_latency: fadt.c3_latency,
            flush_size: fadt.flush_size,
            flush_stride: fadt.flush_stride,
            duty_offset: fadt.duty_offset,
            duty_width: fadt.duty_width,
            day_alarm: fadt.day_alarm,
            month_alarm: fadt.month_alarm,
            century: fadt.century,

            boot_arch_flags: IaPcBootArch::from_bits_retain(fadt.iapc_boot_arch),
            flags: FadtFlags::from_bits_retain(fadt.flags),

            reset_register: fadt.reset_register,
            reset_value: fadt.reset_value,

            x_pm1a_event_block: fadt.x_pm1a_event_block,
            x_pm1b_event_block: fadt.x_pm1b_event_block,
            x_pm1a_control_block: fadt.x_pm1a_control_block,
            x_pm1b_control_block: fadt.x_pm1b_control_block,
            x_pm2_control_block: fadt.x_pm2_control_block,
            x_pm_timer_block: fadt.x_pm_timer_block,
            x_gpe0_block: fadt.x_gpe0_block,
            x_gpe1_block: fadt.x_gpe1_block,
            sleep_control: fadt.sleep_control,
            sleep_status: fadt.sleep_status,
            hypervisor_vendor_identity: fadt.hypervisor_vendor_identity,

            dsdt_address: fadt.dsdt,
            x_dsdt_address: fadt.x_dsdt,
        }
    }

    /// Canonical DSDT pointer: the 64-bit extended pointer wins whenever it
    /// is non-zero, regardless of the legacy value.
    ///
    /// # Panics
    ///
    /// Panics if both pointers are zero; a conformant table set must supply
    /// a DSDT.
    pub fn dsdt(&self) -> PhysAddr {
        if self.x_dsdt_address != 0 {
            PhysAddr::new(self.x_dsdt_address)
        } else if self.dsdt_address != 0 {
            PhysAddr::new(self.dsdt_address as u64)
        } else {
            panic!("ACPI: FADT carries no DSDT pointer");
        }
    }
}
