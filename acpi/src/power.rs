//! ACPI-driven reboot and shutdown.
//!
//! Reset goes through the FADT reset register, which this kernel only
//! supports as port-mapped I/O. There is no software fallback: if the
//! write does not take effect the machine halts where it stands.

use opal_lib::io::Port;
use opal_lib::{cpu, klog_error, klog_info};

use crate::fadt::FixedPlatformData;

/// The single port write a reboot would perform, if any.
///
/// `None` when the FADT revision predates the reset register (< 2); the
/// caller then halts without touching any port.
pub fn reset_action(fixed: &FixedPlatformData) -> Option<(u16, u8)> {
    if fixed.revision < 2 {
        return None;
    }
    let address = fixed.reset_register.address;
    Some((address as u16, fixed.reset_value))
}

/// Reboot through the FADT reset register, then halt.
///
/// A successful reset never returns, so everything past the port write is
/// the failure path.
pub fn reboot(fixed: &FixedPlatformData) -> ! {
    match reset_action(fixed) {
        Some((port, value)) => {
            klog_info!("ACPI: reboot, sending {:#x} to port {:#x}", value, port);
            unsafe { Port::<u8>::new(port).write(value) };
            klog_error!("ACPI: reset write had no effect, halting");
        }
        None => {
            let revision = fixed.revision;
            klog_error!("ACPI: reboot not supported on FADT revision {}, halting", revision);
        }
    }
    cpu::halt_loop()
}

/// Shutdown is not supported in this configuration; halts unconditionally.
pub fn shutdown() -> ! {
    klog_error!("ACPI: shutdown is not supported with the current configuration, halting");
    cpu::halt_loop()
}
