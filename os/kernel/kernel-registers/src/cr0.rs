#[cfg(all(feature = "asm", target_arch = "x86_64"))]
use crate::LoadRegisterUnsafe;
use bitfield_struct::bitfield;

/// CR0: operating mode and cache control.
///
/// Only the two mode bits matter to the boot path: `PE` selects protected
/// mode, `PG` turns on paging (and, with `EFER.LME` set, activates long mode).
/// Reserved bits are private and always zero.
#[bitfield(u64)]
#[derive(Eq, PartialEq)]
pub struct Cr0 {
    /// Bit 0 (PE): protected mode enable.
    pub pe_protection_enable: bool,

    /// Bit 1 (MP): monitor coprocessor.
    pub mp_monitor_coprocessor: bool,

    /// Bit 2 (EM): x87 emulation.
    pub em_emulation: bool,

    /// Bit 3 (TS): task switched.
    pub ts_task_switched: bool,

    /// Bit 4 (ET): extension type (hardwired to 1 on modern parts).
    pub et_extension_type: bool,

    /// Bit 5 (NE): native x87 error reporting.
    pub ne_numeric_error: bool,

    #[bits(10, default = 0)]
    _reserved_6_15: u16,

    /// Bit 16 (WP): supervisor writes honor read-only pages.
    pub wp_write_protect: bool,

    #[bits(default = false)]
    _reserved_17: bool,

    /// Bit 18 (AM): alignment check mask.
    pub am_alignment_mask: bool,

    #[bits(10, default = 0)]
    _reserved_19_28: u16,

    /// Bit 29 (NW): not write-through.
    pub nw_not_write_through: bool,

    /// Bit 30 (CD): cache disable.
    pub cd_cache_disable: bool,

    /// Bit 31 (PG): paging enable. Requires PE.
    pub pg_paging: bool,

    #[bits(32, default = 0)]
    _reserved_32_63: u32,
}

impl Cr0 {
    /// `PE | PG`: the bits the preamble ORs into CR0 to turn paging on.
    pub const PROTECTED_PAGING: Self = Self::new()
        .with_pe_protection_enable(true)
        .with_pg_paging(true);

    /// Whether both protection and paging are enabled.
    #[must_use]
    pub const fn is_protected_paging(self) -> bool {
        self.pe_protection_enable() && self.pg_paging()
    }

    /// Bitwise OR of two values, as a `mov eax, cr0; or eax, imm` would do.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self::from_bits(self.into_bits() | other.into_bits())
    }
}

#[cfg(all(feature = "asm", target_arch = "x86_64"))]
impl LoadRegisterUnsafe for Cr0 {
    unsafe fn load_unsafe() -> Self {
        let mut cr0: u64;
        unsafe {
            core::arch::asm!("mov {}, cr0", out(reg) cr0, options(nomem, nostack, preserves_flags));
        }
        Self::from_bits(cr0)
    }
}
