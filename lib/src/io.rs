//! Typed port-mapped I/O.
//!
//! [`Port<T>`] pairs a port number with the width of the accesses made
//! through it, so an 8-bit register cannot accidentally be read as a dword.
//! The actual `in`/`out` instructions live in the [`PortValue`] impls; all
//! reads and writes are `unsafe` because port I/O has arbitrary side effects.

use core::arch::asm;
use core::marker::PhantomData;

/// A value that can travel over an I/O port (u8, u16 or u32).
pub trait PortValue: Copy {
    /// Read one value from `port`.
    ///
    /// # Safety
    ///
    /// Port I/O. The caller must ensure the port exists and that the read has
    /// no unintended side effects.
    unsafe fn port_read(port: u16) -> Self;

    /// Write one value to `port`.
    ///
    /// # Safety
    ///
    /// Same requirements as [`PortValue::port_read`].
    unsafe fn port_write(port: u16, value: Self);
}

impl PortValue for u8 {
    #[inline(always)]
    unsafe fn port_read(port: u16) -> Self {
        let value: u8;
        asm!("in al, dx", out("al") value, in("dx") port, options(nomem, nostack, preserves_flags));
        value
    }

    #[inline(always)]
    unsafe fn port_write(port: u16, value: Self) {
        asm!("out dx, al", in("dx") port, in("al") value, options(nomem, nostack, preserves_flags));
    }
}

impl PortValue for u16 {
    #[inline(always)]
    unsafe fn port_read(port: u16) -> Self {
        let value: u16;
        asm!("in ax, dx", out("ax") value, in("dx") port, options(nomem, nostack, preserves_flags));
        value
    }

    #[inline(always)]
    unsafe fn port_write(port: u16, value: Self) {
        asm!("out dx, ax", in("dx") port, in("ax") value, options(nomem, nostack, preserves_flags));
    }
}

impl PortValue for u32 {
    #[inline(always)]
    unsafe fn port_read(port: u16) -> Self {
        let value: u32;
        asm!("in eax, dx", out("eax") value, in("dx") port, options(nomem, nostack, preserves_flags));
        value
    }

    #[inline(always)]
    unsafe fn port_write(port: u16, value: Self) {
        asm!("out dx, eax", in("dx") port, in("eax") value, options(nomem, nostack, preserves_flags));
    }
}

/// An I/O port of a fixed access width.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Port<T> {
    port: u16,
    _width: PhantomData<T>,
}

impl<T: PortValue> Port<T> {
    /// Create a port handle for the given port number.
    #[inline]
    pub const fn new(port: u16) -> Self {
        Self {
            port,
            _width: PhantomData,
        }
    }

    /// A sibling port at `self + off` (register banks like UARTs).
    #[inline]
    pub const fn offset(self, off: u16) -> Self {
        Self::new(self.port.wrapping_add(off))
    }

    /// The raw port number.
    #[inline]
    pub const fn number(self) -> u16 {
        self.port
    }

    /// Read one value from the port.
    ///
    /// # Safety
    ///
    /// Port I/O. See [`PortValue::port_read`].
    #[inline(always)]
    pub unsafe fn read(self) -> T {
        T::port_read(self.port)
    }

    /// Write one value to the port.
    ///
    /// # Safety
    ///
    /// Port I/O. See [`PortValue::port_write`].
    #[inline(always)]
    pub unsafe fn write(self, value: T) {
        T::port_write(self.port, value)
    }
}
