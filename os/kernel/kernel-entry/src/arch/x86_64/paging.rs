//! # Boot identity map
//!
//! Long mode cannot be entered without paging, and the instruction after the
//! `CR0.PG` write is fetched through the new tables. The preamble therefore
//! identity-maps the first 1 GiB of physical memory with exactly two
//! structures and one entry in each:
//!
//! ```text
//!  CR3 ──► BOOT_PML4[0] ──► BOOT_PDPT[0] = 1 GiB page @ 0x0, PS=1, P=1, RW=1
//! ```
//!
//! A 1 GiB leaf at the PDPT level requires `PDPE1GB` (CPUID
//! `0x8000_0001:EDX[26]`); every long-mode processor QEMU models has it. The
//! kernel image, the boot stack, these tables and the boot GDT must all lie in
//! that first gigabyte.
//!
//! The preamble writes only entry 0 of each table; the other 511 entries must
//! already be zero. Both tables are zero-initialized statics in `.bss.boot`,
//! which the boot loader zero-fills when it loads the image.

use bitfield_struct::bitfield;
use kernel_info::layout::{IDENTITY_MAP_BYTES, PAGE_SIZE};

/// Entries per paging structure.
pub const ENTRIES: usize = 512;

/// PML4 entry pointing at a PDPT.
#[bitfield(u64)]
#[derive(Eq, PartialEq)]
pub struct Pml4Entry {
    pub present: bool,
    pub writable: bool,
    pub user: bool,
    pub write_through: bool,
    pub cache_disable: bool,
    pub accessed: bool,
    #[bits(1)]
    __ignored_6: u8,
    /// PS (bit 7): must be 0 at this level.
    #[bits(1)]
    __ps_must_be_0: u8,
    #[bits(4)]
    pub os_available_low: u8,
    /// Next-level table physical address (bits 12..51).
    #[bits(40)]
    phys_addr_51_12: u64,
    #[bits(11)]
    pub os_available_high: u16,
    pub no_execute: bool,
}

impl Pml4Entry {
    /// Present and writable entry for the PDPT at `table_phys` (4 KiB aligned).
    #[must_use]
    pub const fn pointing_to(table_phys: u64) -> Self {
        Self::new()
            .with_present(true)
            .with_writable(true)
            .with_phys_addr_51_12(table_phys >> 12)
    }

    /// Physical address of the next table, if the entry is present.
    #[must_use]
    pub const fn next_table(self) -> Option<u64> {
        if self.present() {
            Some(self.phys_addr_51_12() << 12)
        } else {
            None
        }
    }
}

/// PDPT entry mapping a 1 GiB page (`PS = 1`).
#[bitfield(u64)]
#[derive(Eq, PartialEq)]
pub struct Pdpte1G {
    pub present: bool,
    pub writable: bool,
    pub user: bool,
    pub write_through: bool,
    pub cache_disable: bool,
    pub accessed: bool,
    pub dirty: bool,
    /// PS (bit 7): set for a 1 GiB leaf.
    #[bits(default = true)]
    pub page_size: bool,
    pub global: bool,
    #[bits(3)]
    pub os_available_low: u8,
    pub pat_large: bool,
    #[bits(17)]
    __res_13_29: u32,
    /// Physical address bits 51:30.
    #[bits(22)]
    phys_addr_51_30: u32,
    #[bits(11)]
    pub os_available_high: u16,
    pub no_execute: bool,
}

impl Pdpte1G {
    /// Present, writable, 1 GiB page at physical 0.
    pub const IDENTITY_FIRST_GIB: Self = Self::new().with_present(true).with_writable(true);

    /// Physical base of the mapped 1 GiB page.
    #[must_use]
    pub const fn frame(self) -> u64 {
        (self.phys_addr_51_30() as u64) << 30
    }

    /// Whether `raw` encodes a present 1 GiB leaf.
    #[must_use]
    pub const fn is_leaf(raw: u64) -> bool {
        let entry = Self::from_bits(raw);
        entry.present() && entry.page_size()
    }
}

/// Index into a paging structure for `va` at the given level (4 = PML4, 3 = PDPT).
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn table_index(va: u64, level: u32) -> usize {
    ((va >> (12 + 9 * (level - 1))) & (ENTRIES as u64 - 1)) as usize
}

/// Whether `address` falls inside the boot identity map.
#[must_use]
pub const fn identity_mapped(address: u64) -> bool {
    address < IDENTITY_MAP_BYTES
}

/// A 4 KiB-aligned paging structure.
#[repr(C, align(4096))]
pub struct PageTable(pub [u64; ENTRIES]);

impl PageTable {
    #[must_use]
    pub const fn zeroed() -> Self {
        Self([0; ENTRIES])
    }
}

const _: () = {
    assert!(size_of::<PageTable>() == PAGE_SIZE);
    assert!(align_of::<PageTable>() == PAGE_SIZE);
    assert!(Pdpte1G::IDENTITY_FIRST_GIB.into_bits() == 0x83);
    assert!(IDENTITY_MAP_BYTES == 1 << 30);
};

#[cfg_attr(
    all(feature = "entry", target_os = "none"),
    unsafe(link_section = ".bss.boot")
)]
pub static mut BOOT_PML4: PageTable = PageTable::zeroed();

#[cfg_attr(
    all(feature = "entry", target_os = "none"),
    unsafe(link_section = ".bss.boot")
)]
pub static mut BOOT_PDPT: PageTable = PageTable::zeroed();

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pml4_entry_round_trips_the_table_address() {
        let entry = Pml4Entry::pointing_to(0x0010_2000);
        assert_eq!(entry.into_bits(), 0x0010_2003);
        assert_eq!(entry.next_table(), Some(0x0010_2000));
        assert_eq!(Pml4Entry::new().next_table(), None);
    }

    #[test]
    fn identity_leaf_maps_physical_zero() {
        let leaf = Pdpte1G::IDENTITY_FIRST_GIB;
        assert_eq!(leaf.frame(), 0);
        assert!(Pdpte1G::is_leaf(leaf.into_bits()));
        assert!(!Pdpte1G::is_leaf(0x03));
    }

    #[test]
    fn indices() {
        let va = 0x0000_0080_4020_1000_u64;
        assert_eq!(table_index(va, 4), 1);
        assert_eq!(table_index(va, 3), 1);
        assert_eq!(table_index(0x0010_0000, 4), 0);
        assert_eq!(table_index(0x0010_0000, 3), 0);
    }

    #[test]
    fn boot_tables_start_empty() {
        let root = unsafe { &(*(&raw const BOOT_PML4)).0 };
        let second = unsafe { &(*(&raw const BOOT_PDPT)).0 };
        assert!(root.iter().all(|entry| *entry == 0));
        assert!(second.iter().all(|entry| *entry == 0));
    }

    #[test]
    fn identity_window_is_one_gib() {
        assert!(identity_mapped(0x3FFF_FFFF));
        assert!(!identity_mapped(0x4000_0000));
    }
}
