//! # Boot descriptor table
//!
//! The smallest GDT that gets a 32-bit protected-mode processor into 64-bit
//! code:
//!
//! Index | Selector | Meaning
//! ------|----------|--------
//! 0     | 0x00     | Null
//! 1     | 0x08     | 64-bit code (`L=1`, `DB=0`, DPL 0; [`CODE64_SELECTOR`])
//! 2     | 0x10     | Flat 4 GiB read/write data, 32-bit compatible ([`DATA_SELECTOR`])
//!
//! The data descriptor keeps a real flat limit (`G=1`, `DB=1`) so it stays
//! valid if loaded while still in protected mode; in long mode base and limit
//! are ignored anyway. The kernel replaces this table with its own once it
//! runs.

use bitfield_struct::bitfield;
use core::marker::PhantomData;

/// Bit layout shared by code and data segment descriptors.
#[bitfield(u64)]
#[derive(Eq, PartialEq)]
pub struct SegmentDescriptor {
    pub limit_lo: u16, // [15:0]
    pub base_lo: u16,  // [31:16]
    pub base_mid: u8,  // [39:32]
    #[bits(4)]
    pub typ: u8, // [43:40]
    pub s: bool,       // [44]     = 1 (code/data)
    #[bits(2)]
    pub dpl: u8, // [46:45]
    pub p: bool,       // [47]
    #[bits(4)]
    pub limit_hi: u8, // [51:48]
    pub avl: bool,     // [52]
    pub l: bool,       // [53]     64-bit code
    pub db: bool,      // [54]
    pub g: bool,       // [55]     4 KiB limit granularity
    pub base_hi: u8,   // [63:56]
}

impl SegmentDescriptor {
    /// Type bit 3 distinguishes code (1) from data (0).
    const TYPE_CODE: u8 = 0b1000;

    /// Execute + read, 64-bit, ring 0.
    pub const CODE64: Self = Self::new()
        .with_typ(0b1010)
        .with_s(true)
        .with_p(true)
        .with_l(true)
        .with_db(false);

    /// Read/write, base 0, limit 4 GiB, ring 0.
    pub const FLAT_DATA: Self = Self::new()
        .with_limit_lo(0xFFFF)
        .with_typ(0b0010)
        .with_s(true)
        .with_p(true)
        .with_limit_hi(0xF)
        .with_db(true)
        .with_g(true);

    #[must_use]
    pub const fn is_code(self) -> bool {
        self.p() && self.s() && self.typ() & Self::TYPE_CODE != 0
    }

    /// A present code descriptor that executes in 64-bit mode.
    #[must_use]
    pub const fn is_long_code(self) -> bool {
        self.is_code() && self.l() && !self.db()
    }

    #[must_use]
    pub const fn is_data(self) -> bool {
        self.p() && self.s() && self.typ() & Self::TYPE_CODE == 0
    }
}

/// Marker for selectors that may be loaded into `CS`.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum CodeSel {}

/// Marker for selectors that may be loaded into `DS`/`ES`/`FS`/`GS`/`SS`.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum DataSel {}

/// A GDT selector at RPL 0.
///
/// ```text
///  15            3 2  1  0
/// +----------------+--+----+
/// |   Index[12:0]  |TI| RPL|
/// +----------------+--+----+
/// ```
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct SegmentSelector<K>(u16, PhantomData<K>);

impl<K> SegmentSelector<K> {
    #[must_use]
    pub const fn from_index(index: u16) -> Self {
        Self(index << 3, PhantomData)
    }

    #[must_use]
    pub const fn to_u16(self) -> u16 {
        self.0
    }

    #[must_use]
    pub const fn index(self) -> u16 {
        self.0 >> 3
    }

    /// Byte offset of the selected descriptor within the table.
    #[must_use]
    pub const fn table_offset(self) -> u64 {
        (self.0 & !0b111) as u64
    }
}

pub const CODE64_SELECTOR: SegmentSelector<CodeSel> = SegmentSelector::from_index(1);
pub const DATA_SELECTOR: SegmentSelector<DataSel> = SegmentSelector::from_index(2);

/// The boot GDT.
#[repr(C, align(16))]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct BootGdt {
    pub entries: [SegmentDescriptor; 3],
}

impl BootGdt {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: [
                SegmentDescriptor::new(),
                SegmentDescriptor::CODE64,
                SegmentDescriptor::FLAT_DATA,
            ],
        }
    }

    /// Value for the GDTR limit field.
    #[allow(clippy::cast_possible_truncation)]
    pub const LIMIT: u16 = (size_of::<Self>() - 1) as u16;
}

impl Default for BootGdt {
    fn default() -> Self {
        Self::new()
    }
}

/// Operand of `lgdt`, as the model passes it around.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct DescriptorTablePointer {
    pub limit: u16,
    pub base: u64,
}

impl DescriptorTablePointer {
    /// Whether a descriptor at `offset` lies within the table limit.
    #[must_use]
    pub const fn covers(&self, offset: u64) -> bool {
        offset + 7 <= self.limit as u64
    }
}

/// In-memory `lgdt` operand. Executed from 32-bit code, so only the low half
/// of `base` is consumed there; the image is identity-placed below 4 GiB.
#[repr(C, packed(2))]
pub struct GdtRegisterImage {
    pub limit: u16,
    pub base: *const BootGdt,
}

// SAFETY: immutable after link time; only read by `lgdt`.
unsafe impl Sync for GdtRegisterImage {}

pub static BOOT_GDT: BootGdt = BootGdt::new();

pub static BOOT_GDT_POINTER: GdtRegisterImage = GdtRegisterImage {
    limit: BootGdt::LIMIT,
    base: &raw const BOOT_GDT,
};

const _: () = {
    assert!(size_of::<SegmentDescriptor>() == 8);
    assert!(size_of::<BootGdt>() == 24);
    assert!(BootGdt::LIMIT == 23);
    assert!(CODE64_SELECTOR.to_u16() == 0x08);
    assert!(DATA_SELECTOR.to_u16() == 0x10);
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_encodings() {
        assert_eq!(SegmentDescriptor::CODE64.into_bits(), 0x0020_9A00_0000_0000);
        assert_eq!(SegmentDescriptor::FLAT_DATA.into_bits(), 0x00CF_9200_0000_FFFF);
        assert_eq!(BootGdt::new().entries[0].into_bits(), 0);
    }

    #[test]
    fn classification() {
        assert!(SegmentDescriptor::CODE64.is_long_code());
        assert!(!SegmentDescriptor::CODE64.is_data());
        assert!(SegmentDescriptor::FLAT_DATA.is_data());
        assert!(!SegmentDescriptor::FLAT_DATA.is_code());
        assert!(!SegmentDescriptor::new().is_code());
        assert!(!SegmentDescriptor::new().is_data());
    }

    #[test]
    fn pointer_limit_covers_all_entries() {
        let pointer = DescriptorTablePointer {
            limit: BootGdt::LIMIT,
            base: 0x1000,
        };
        assert!(pointer.covers(DATA_SELECTOR.table_offset()));
        assert!(!pointer.covers(SegmentSelector::<DataSel>::from_index(3).table_offset()));
    }
}
