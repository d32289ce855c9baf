#[cfg(all(feature = "asm", target_arch = "x86_64"))]
use crate::LoadRegisterUnsafe;
use bitfield_struct::bitfield;

/// CR3: physical base of the root paging structure (PCID disabled).
///
/// With PAE or long-mode paging the root is the PML4, which must be 4 KiB
/// aligned; the low 12 bits carry only the PWT/PCD cache controls.
#[bitfield(u64)]
#[derive(Eq, PartialEq)]
pub struct Cr3 {
    #[bits(3)]
    reserved0: u8,

    /// Bit 3 (PWT): write-through for root table accesses.
    pub pwt: bool,

    /// Bit 4 (PCD): cache disable for root table accesses.
    pub pcd: bool,

    #[bits(7)]
    reserved1: u8,

    /// Bits 12–51: root table physical address >> 12.
    #[bits(40)]
    root_base_4k: u64,

    #[bits(12)]
    reserved2: u16,
}

impl Cr3 {
    /// CR3 value pointing at the root table at `root_phys`, default caching.
    ///
    /// `root_phys` must be 4 KiB aligned.
    #[must_use]
    pub const fn from_root_phys(root_phys: u64) -> Self {
        debug_assert!(root_phys & 0xFFF == 0, "root table must be 4K-aligned");
        Self::new().with_root_base_4k(root_phys >> 12)
    }

    /// Physical address of the root table.
    #[must_use]
    pub const fn root_phys(self) -> u64 {
        self.root_base_4k() << 12
    }

    /// Whether the raw value has any bit set that is not part of the base or
    /// the two cache controls.
    #[must_use]
    pub const fn has_reserved_bits(self) -> bool {
        self.reserved0() != 0 || self.reserved1() != 0 || self.reserved2() != 0
    }
}

#[cfg(all(feature = "asm", target_arch = "x86_64"))]
impl LoadRegisterUnsafe for Cr3 {
    unsafe fn load_unsafe() -> Self {
        let mut cr3: u64;
        unsafe {
            core::arch::asm!("mov {}, cr3", out(reg) cr3, options(nomem, nostack, preserves_flags));
        }
        Self::from_bits(cr3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_roundtrip() {
        let cr3 = Cr3::from_root_phys(0x0012_3000);
        assert_eq!(cr3.root_phys(), 0x0012_3000);
        assert_eq!(cr3.into_bits(), 0x0012_3000);
        assert!(!cr3.has_reserved_bits());
    }

    #[test]
    fn low_bits_are_not_part_of_the_base() {
        let cr3 = Cr3::from_bits(0x0040_0007);
        assert_eq!(cr3.root_phys(), 0x0040_0000);
        assert!(cr3.has_reserved_bits());
    }
}
