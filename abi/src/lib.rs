//! OpalOS shared kernel ABI types.
//!
//! Canonical definitions shared by every kernel crate, so that the memory
//! manager, drivers, and platform code all agree on one address vocabulary.
//! All types in this crate are `#[repr(C)]` or `#[repr(transparent)]` for
//! layout stability.

#![no_std]
#![forbid(unsafe_code)]

pub mod addr;

/// Standard 4KB page size used for all kernel memory calculations.
pub const PAGE_SIZE: u64 = 0x1000;

pub use addr::*;
