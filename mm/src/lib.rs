//! OpalOS memory-management services consumed by platform discovery.
//!
//! This crate owns the seam between code that holds raw physical addresses
//! (firmware tables, MMIO) and the paging layer that can actually make them
//! readable: the [`phys_map::PhysMapper`] capability and its kernel
//! implementation over a reserved virtual window.

#![no_std]
#![allow(unsafe_op_in_unsafe_fn)]

pub mod error;
pub mod phys_map;
pub mod tests;

pub use error::{MapError, MapResult};
pub use phys_map::{KernelPhysMapper, MapPageFn, PhysMapper, UnmapPageFn, register_page_ops};
