//! # Boot Protocol Constants
//!
//! The x86-64 entry is reached through a Multiboot-style loader, which leaves
//! the processor in 32-bit protected mode with
//!
//! * `EAX` = the loader magic ([`MULTIBOOT2_LOADER_MAGIC`] or [`MULTIBOOT1_LOADER_MAGIC`]),
//! * `EBX` = the physical address of the boot information structure.
//!
//! The image advertises itself to the loader with a header whose magic,
//! architecture/flags and length words must sum to zero together with the
//! checksum word.

/// Name of the kernel routine the entry layer calls. Never expected to return.
pub const KERNEL_ENTRY_SYMBOL: &str = "kernel_main";

/// Value a Multiboot 2 compliant loader leaves in `EAX`.
pub const MULTIBOOT2_LOADER_MAGIC: u32 = 0x36d7_6289;

/// Value a Multiboot 1 compliant loader leaves in `EAX`.
pub const MULTIBOOT1_LOADER_MAGIC: u32 = 0x2bad_b002;

/// Multiboot 2 header layout.
pub mod multiboot2 {
    /// Header magic the loader scans for (8-byte aligned, first 32 KiB).
    pub const HEADER_MAGIC: u32 = 0xe852_50d6;

    /// Architecture field: 32-bit protected mode i386.
    pub const ARCHITECTURE_I386: u32 = 0;

    /// Fixed part (16 bytes) plus the mandatory end tag (8 bytes).
    pub const HEADER_LENGTH: u32 = 24;

    /// Chosen so that `magic + architecture + length + checksum == 0 (mod 2^32)`.
    pub const CHECKSUM: u32 = 0u32
        .wrapping_sub(HEADER_MAGIC)
        .wrapping_sub(ARCHITECTURE_I386)
        .wrapping_sub(HEADER_LENGTH);
}

/// Multiboot 1 header layout.
pub mod multiboot1 {
    /// Header magic the loader scans for (4-byte aligned, first 8 KiB).
    pub const HEADER_MAGIC: u32 = 0x1bad_b002;

    /// Page-align modules, provide memory information.
    pub const FLAGS: u32 = 0b11;

    /// Chosen so that `magic + flags + checksum == 0 (mod 2^32)`.
    pub const CHECKSUM: u32 = 0u32.wrapping_sub(HEADER_MAGIC).wrapping_sub(FLAGS);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiboot2_header_sums_to_zero() {
        let sum = multiboot2::HEADER_MAGIC
            .wrapping_add(multiboot2::ARCHITECTURE_I386)
            .wrapping_add(multiboot2::HEADER_LENGTH)
            .wrapping_add(multiboot2::CHECKSUM);
        assert_eq!(sum, 0);
    }

    #[test]
    fn multiboot1_header_sums_to_zero() {
        let sum = multiboot1::HEADER_MAGIC
            .wrapping_add(multiboot1::FLAGS)
            .wrapping_add(multiboot1::CHECKSUM);
        assert_eq!(sum, 0);
        // Matches the well-known encoding found in Multiboot 1 images.
        assert_eq!(multiboot1::CHECKSUM, 0xe4524ffb);
    }
}
