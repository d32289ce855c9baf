#[cfg(all(feature = "asm", target_arch = "x86_64"))]
use crate::LoadRegisterUnsafe;
use bitfield_struct::bitfield;

/// CR4: architectural extensions.
///
/// Long mode requires `PAE`; the remaining bits are modelled so that a value
/// read back from hardware (or from firmware state) survives a round trip.
#[bitfield(u64, order = Lsb)]
#[derive(Eq, PartialEq)]
pub struct Cr4 {
    /// Bit 0 (VME): virtual-8086 mode extensions.
    pub vme: bool,

    /// Bit 1 (PVI): protected-mode virtual interrupts.
    pub pvi: bool,

    /// Bit 2 (TSD): time stamp disable.
    pub tsd: bool,

    /// Bit 3 (DE): debugging extensions.
    pub de: bool,

    /// Bit 4 (PSE): page size extensions (ignored once PAE is set).
    pub pse: bool,

    /// Bit 5 (PAE): physical address extension. Mandatory for long mode.
    pub pae: bool,

    /// Bit 6 (MCE): machine-check enable.
    pub mce: bool,

    /// Bit 7 (PGE): global pages.
    pub pge: bool,

    /// Bit 8 (PCE): performance counter enable.
    pub pce: bool,

    /// Bit 9: OSFXSR.
    pub osfxsr: bool,

    /// Bit 10: OSXMMEXCPT.
    pub osxmmexcpt: bool,

    /// Bit 11: UMIP.
    pub umip: bool,

    /// Bit 12 (LA57): five-level paging.
    pub la57: bool,

    /// Bit 13: VMXE.
    pub vmxe: bool,

    /// Bit 14: SMXE.
    pub smxe: bool,

    #[bits(access = RO)]
    pub reserved0: bool,

    /// Bit 16: FSGSBASE.
    pub fsgsbase: bool,

    /// Bit 17: PCIDE.
    pub pcide: bool,

    /// Bit 18: OSXSAVE.
    pub osxsave: bool,

    #[bits(access = RO)]
    pub reserved1: bool,

    /// Bit 20: SMEP.
    pub smep: bool,

    /// Bit 21: SMAP.
    pub smap: bool,

    /// Bit 22: PKE.
    pub pke: bool,

    #[bits(41, access = RO)]
    pub reserved2: u64,
}

impl Cr4 {
    /// The bit the preamble ORs into CR4 before installing page tables.
    pub const PHYSICAL_ADDRESS_EXTENSION: Self = Self::new().with_pae(true);

    /// Bitwise OR of two values.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self::from_bits(self.into_bits() | other.into_bits())
    }
}

#[cfg(all(feature = "asm", target_arch = "x86_64"))]
impl LoadRegisterUnsafe for Cr4 {
    unsafe fn load_unsafe() -> Self {
        let mut cr4: u64;
        unsafe {
            core::arch::asm!("mov {}, cr4", out(reg) cr4, options(nomem, nostack, preserves_flags));
        }
        Self::from_bits(cr4)
    }
}
