#[cfg(all(feature = "asm", target_arch = "x86_64"))]
use crate::LoadRegisterUnsafe;
use bitfield_struct::bitfield;

/// `IA32_EFER` (MSR `0xC000_0080`): extended feature enables.
///
/// The boot path sets `LME`; the processor sets `LMA` itself once paging is
/// turned on with `LME` already armed.
#[bitfield(u64, order = Lsb)]
#[derive(Eq, PartialEq)]
pub struct Efer {
    /// Bit 0 (SCE): `SYSCALL`/`SYSRET` enable.
    pub sce: bool,

    #[bits(7)]
    pub reserved0: u8,

    /// Bit 8 (LME): long mode enable.
    pub lme: bool,

    #[bits(access = RO)]
    pub reserved1: bool,

    /// Bit 10 (LMA): long mode active. Written by the processor only.
    pub lma: bool,

    /// Bit 11 (NXE): no-execute enable.
    pub nxe: bool,

    /// Bit 12: SVME.
    pub svme: bool,

    /// Bit 13: LMSLE.
    pub lmsle: bool,

    /// Bit 14: FFXSR.
    pub ffxsr: bool,

    /// Bit 15: TCE.
    pub tce: bool,

    #[bits(48, access = RO)]
    pub reserved2: u64,
}

impl Efer {
    /// MSR index for `IA32_EFER`.
    pub const MSR_EFER: u32 = 0xC000_0080;

    /// The bit the preamble ORs into EFER to arm long mode.
    pub const LONG_MODE_ENABLE: Self = Self::new().with_lme(true);

    /// Bitwise OR of two values.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self::from_bits(self.into_bits() | other.into_bits())
    }
}

#[cfg(all(feature = "asm", target_arch = "x86_64"))]
impl LoadRegisterUnsafe for Efer {
    unsafe fn load_unsafe() -> Self {
        let (lo, hi): (u32, u32);
        unsafe {
            core::arch::asm!(
                "rdmsr",
                in("ecx") Self::MSR_EFER,
                out("eax") lo,
                out("edx") hi,
                options(nomem, nostack, preserves_flags)
            );
        }
        Self::from_bits((u64::from(hi) << 32) | u64::from(lo))
    }
}
