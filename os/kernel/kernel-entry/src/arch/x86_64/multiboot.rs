//! Multiboot image headers.
//!
//! A Multiboot-compliant loader scans the first 32 KiB (Multiboot 2) or 8 KiB
//! (Multiboot 1) of the image for one of these. The linker script places
//! `.multiboot_header` first in the image.

use kernel_info::protocol::{multiboot1, multiboot2};

/// Multiboot 2 header with only the terminating tag.
#[repr(C, align(8))]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Multiboot2Header {
    pub magic: u32,
    pub architecture: u32,
    pub header_length: u32,
    pub checksum: u32,
    pub end_tag_type: u16,
    pub end_tag_flags: u16,
    pub end_tag_size: u32,
}

impl Multiboot2Header {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            magic: multiboot2::HEADER_MAGIC,
            architecture: multiboot2::ARCHITECTURE_I386,
            header_length: multiboot2::HEADER_LENGTH,
            checksum: multiboot2::CHECKSUM,
            end_tag_type: 0,
            end_tag_flags: 0,
            end_tag_size: 8,
        }
    }

    /// Magic, architecture, length and checksum sum to zero.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.magic
            .wrapping_add(self.architecture)
            .wrapping_add(self.header_length)
            .wrapping_add(self.checksum)
            == 0
            && self.header_length as usize == size_of::<Self>()
    }
}

impl Default for Multiboot2Header {
    fn default() -> Self {
        Self::new()
    }
}

/// Multiboot 1 header for an ELF image (no address fields).
#[repr(C, align(4))]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Multiboot1Header {
    pub magic: u32,
    pub flags: u32,
    pub checksum: u32,
}

impl Multiboot1Header {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            magic: multiboot1::HEADER_MAGIC,
            flags: multiboot1::FLAGS,
            checksum: multiboot1::CHECKSUM,
        }
    }

    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.magic
            .wrapping_add(self.flags)
            .wrapping_add(self.checksum)
            == 0
    }
}

impl Default for Multiboot1Header {
    fn default() -> Self {
        Self::new()
    }
}

const _: () = {
    assert!(Multiboot2Header::new().is_valid());
    assert!(Multiboot1Header::new().is_valid());
};

#[cfg(all(
    feature = "entry",
    target_os = "none",
    target_arch = "x86_64",
    not(feature = "multiboot1")
))]
#[used]
#[unsafe(link_section = ".multiboot_header")]
static MULTIBOOT_HEADER: Multiboot2Header = Multiboot2Header::new();

#[cfg(all(
    feature = "entry",
    target_os = "none",
    target_arch = "x86_64",
    feature = "multiboot1"
))]
#[used]
#[unsafe(link_section = ".multiboot_header")]
static MULTIBOOT_HEADER: Multiboot1Header = Multiboot1Header::new();

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiboot2_layout() {
        let header = Multiboot2Header::new();
        assert_eq!(size_of::<Multiboot2Header>(), 24);
        assert_eq!(header.magic, 0xE852_50D6);
        assert_eq!(header.checksum, 0x17AD_AF12);
    }

    #[test]
    fn multiboot1_checksum() {
        assert_eq!(Multiboot1Header::new().checksum, 0xE452_4FFB);
        assert_eq!(size_of::<Multiboot1Header>(), 12);
    }

    #[test]
    fn corrupted_headers_are_invalid() {
        let mut header = Multiboot2Header::new();
        header.checksum ^= 1;
        assert!(!header.is_valid());

        let mut header = Multiboot1Header::new();
        header.flags = 0;
        assert!(!header.is_valid());
    }
}
