#![no_std]
#![allow(unsafe_op_in_unsafe_fn)]

pub mod alignment;
pub mod cpu;
pub mod io;
pub mod klog;
pub mod ports;
pub mod testing;

pub mod tsc {
    use core::arch::asm;

    #[inline(always)]
    pub fn rdtsc() -> u64 {
        let lo: u32;
        let hi: u32;
        unsafe {
            asm!(
                "rdtsc",
                out("eax") lo,
                out("edx") hi,
                options(nomem, nostack, preserves_flags)
            );
        }
        ((hi as u64) << 32) | (lo as u64)
    }
}

#[doc(hidden)]
pub use paste;

pub use alignment::{align_down_u64, align_down_usize, align_up_u64, align_up_usize};
pub use alignment::{align_down_usize as align_down, align_up_usize as align_up};
pub use klog::{
    KlogLevel, klog_get_level, klog_init, klog_register_backend, klog_set_level,
};
pub use ports::COM1;
