use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapError {
    /// No page-map primitives have been registered by the paging layer yet.
    NoBackend,
    /// The reserved virtual window has no free range of the requested size.
    WindowExhausted,
    /// The paging layer refused to establish a translation.
    PageMapFailed { address: u64 },
    /// The requested physical range exceeds the addressable physical space.
    InvalidPhysicalAddress { address: u64 },
}

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoBackend => write!(f, "no page-map backend registered"),
            Self::WindowExhausted => write!(f, "table mapping window exhausted"),
            Self::PageMapFailed { address } => {
                write!(f, "failed to map physical page {:#x}", address)
            }
            Self::InvalidPhysicalAddress { address } => {
                write!(f, "invalid physical address {:#x}", address)
            }
        }
    }
}

pub type MapResult<T = ()> = Result<T, MapError>;
