//! Primitive CPU instructions: hlt, pause, cli, cpuid.

use core::arch::asm;

/// Execute the HLT instruction, halting the CPU until the next interrupt.
#[inline(always)]
pub fn hlt() {
    unsafe {
        asm!("hlt", options(nomem, nostack, preserves_flags));
    }
}

/// Execute the PAUSE instruction (spin-loop hint).
#[inline(always)]
pub fn pause() {
    unsafe {
        asm!("pause", options(nomem, nostack, preserves_flags));
    }
}

/// Halt forever in a loop. Does not return.
#[inline(always)]
pub fn halt_loop() -> ! {
    loop {
        hlt();
    }
}

/// Disable interrupts (CLI).
#[inline(always)]
pub fn disable_interrupts() {
    unsafe {
        asm!("cli", options(nomem, nostack));
    }
}

/// Execute CPUID for the given leaf, returning (eax, ebx, ecx, edx).
#[inline]
pub fn cpuid(leaf: u32) -> (u32, u32, u32, u32) {
    let res = core::arch::x86_64::__cpuid(leaf);
    (res.eax, res.ebx, res.ecx, res.edx)
}
