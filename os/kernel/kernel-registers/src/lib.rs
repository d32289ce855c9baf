//! # Typed x86-64 Control Registers
//!
//! Bitfield models of the registers the 32-bit to 64-bit mode switch touches:
//! [`Cr0`](cr0::Cr0), [`Cr3`](cr3::Cr3), [`Cr4`](cr4::Cr4) and
//! [`Efer`](efer::Efer).
//!
//! The types are plain `u64` bitfields, so their `const` constructors can feed
//! immediates into assembly that runs before Rust code can (the protected-mode
//! preamble), and the same values can be checked against a simulated processor
//! on the host. With the `asm` feature on an x86-64 target the types can also
//! be read back from the live registers.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

#[cfg(feature = "cr0")]
pub mod cr0;

#[cfg(feature = "cr3")]
pub mod cr3;

#[cfg(feature = "cr4")]
pub mod cr4;

#[cfg(feature = "efer")]
pub mod efer;

pub trait LoadRegisterUnsafe {
    /// # Safety
    /// The caller must uphold the implementation-specific safety requirements.
    /// Control register and MSR access is privileged and requires ring 0.
    unsafe fn load_unsafe() -> Self;
}
