//! Root table selection, main-table construction, and signature lookup.
//!
//! The RSDT/XSDT is the single authoritative enumeration of every other
//! firmware table; its entry order is preserved by [`MainTable`] and relied
//! on by every later lookup (first match wins, AML tables keep discovery
//! order).

use alloc::vec::Vec;
use core::mem;

use opal_abi::addr::PhysAddr;
use opal_lib::{klog_debug, klog_info, klog_warn};
use opal_mm::{MapResult, PhysMapper};

use crate::mapping::TableWindow;
use crate::rsdp::RsdpInfo;

/// Common prefix of every system description table.
#[repr(C, packed)]
#[derive(Clone, Copy)]
pub struct SdtHeader {
    pub signature: [u8; 4],
    pub length: u32,
    pub revision: u8,
    pub checksum: u8,
    pub oem_id: [u8; 6],
    pub oem_table_id: [u8; 8],
    pub oem_revision: u32,
    pub creator_id: u32,
    pub creator_revision: u32,
}

pub const SDT_HEADER_LEN: usize = mem::size_of::<SdtHeader>();

/// Which root table the RSDP points at. Selected exactly once; everything
/// downstream reads widened [`PhysAddr`] entries and never re-derives this.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RootTable {
    /// Root System Description Table, 32-bit entries.
    Rsdt { base: PhysAddr },
    /// Extended System Description Table, 64-bit entries.
    Xsdt { base: PhysAddr },
}

impl RootTable {
    /// Decision table: revision 0 uses the RSDT; revision >= 2 uses the XSDT
    /// if and only if the extended pointer is non-zero.
    pub fn select(rsdp: &RsdpInfo) -> Self {
        if rsdp.revision >= 2 && rsdp.xsdt_address != 0 {
            Self::Xsdt {
                base: PhysAddr::new(rsdp.xsdt_address),
            }
        } else {
            Self::Rsdt {
                base: PhysAddr::new(rsdp.rsdt_address as u64),
            }
        }
    }

    #[inline]
    pub fn base(&self) -> PhysAddr {
        match *self {
            Self::Rsdt { base } | Self::Xsdt { base } => base,
        }
    }

    /// Size in bytes of one entry in the root table's pointer array.
    #[inline]
    pub fn entry_width(&self) -> usize {
        match self {
            Self::Rsdt { .. } => mem::size_of::<u32>(),
            Self::Xsdt { .. } => mem::size_of::<u64>(),
        }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Rsdt { .. } => "RSDT",
            Self::Xsdt { .. } => "XSDT",
        }
    }
}

/// Ordered physical pointers to every child table, copied out of the root
/// table once during boot. Immutable afterwards.
pub struct MainTable {
    entries: Vec<PhysAddr>,
}

impl MainTable {
    /// Two-phase map the root table and copy out its entry array.
    ///
    /// # Panics
    ///
    /// Panics if the root table's declared length cannot even hold its own
    /// header; nothing can be enumerated from such a system.
    pub fn build(mapper: &dyn PhysMapper, root: &RootTable) -> MapResult<Self> {
        let header_window = TableWindow::header(mapper, root.base())?;
        let header: SdtHeader = header_window.read_unaligned(0);
        let length = header.length;
        let revision = header.revision;
        drop(header_window);

        klog_info!(
            "ACPI: using {} @ {:#x}, revision {}, length {}",
            root.name(),
            root.base(),
            revision,
            length
        );

        if (length as usize) < SDT_HEADER_LEN {
            panic!("ACPI: {} length {} shorter than its header", root.name(), length);
        }

        let window = TableWindow::exact(mapper, root.base(), length as u64)?;
        let width = root.entry_width();
        let count = (length as usize - SDT_HEADER_LEN) / width;

        let mut entries = Vec::with_capacity(count);
        for i in 0..count {
            let offset = SDT_HEADER_LEN + i * width;
            let phys = if width == mem::size_of::<u64>() {
                window.read_unaligned::<u64>(offset)
            } else {
                window.read_unaligned::<u32>(offset) as u64
            };
            klog_debug!("ACPI: table entry {} @ {:#x}", i, phys);
            entries.push(PhysAddr::new(phys));
        }

        klog_info!("ACPI: enumerated {} tables", entries.len());
        Ok(Self { entries })
    }

    #[inline]
    pub fn entries(&self) -> &[PhysAddr] {
        &self.entries
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Find the first main-table entry with the given 4-byte signature.
///
/// Each candidate is header-mapped only long enough to compare signatures,
/// so at most one transient mapping is alive at a time. The comparison is
/// exact: case-sensitive, no trailing-space trimming.
pub fn find_table(
    mapper: &dyn PhysMapper,
    main: &MainTable,
    signature: &[u8; 4],
) -> Option<PhysAddr> {
    for &phys in main.entries() {
        let window = match TableWindow::header(mapper, phys) {
            Ok(window) => window,
            Err(e) => {
                klog_warn!("ACPI: skipping unmappable table @ {:#x}: {}", phys, e);
                continue;
            }
        };
        let header: SdtHeader = window.read_unaligned(0);
        if header.signature == *signature {
            return Some(phys);
        }
    }
    None
}
