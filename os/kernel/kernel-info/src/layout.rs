//! # Memory Layout

/// Size of the boot stack handed to the kernel entry routine.
pub const BOOT_STACK_SIZE: usize = 16 * 1024;

/// Mandatory stack alignment shared by all supported calling conventions.
pub const BOOT_STACK_ALIGN: usize = 16;

/// Base page size; also the alignment of the x86-64 paging structures.
pub const PAGE_SIZE: usize = 4096;

/// Extent of the x86-64 boot identity map: a single 1 GiB large page.
pub const IDENTITY_MAP_BYTES: u64 = 1 << 30;

/// Architectures the entry layer has a backend for.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TargetArch {
    X86_64,
    Aarch64,
    Riscv64,
    PowerPc64,
    Mips64,
    LoongArch64,
    Sparc64,
}

impl TargetArch {
    /// All backends, in a stable order.
    pub const ALL: [Self; 7] = [
        Self::X86_64,
        Self::Aarch64,
        Self::Riscv64,
        Self::PowerPc64,
        Self::Mips64,
        Self::LoongArch64,
        Self::Sparc64,
    ];

    /// Resolve a `CARGO_CFG_TARGET_ARCH` value.
    #[must_use]
    pub fn from_cfg(target_arch: &str) -> Option<Self> {
        match target_arch {
            "x86_64" => Some(Self::X86_64),
            "aarch64" => Some(Self::Aarch64),
            "riscv64" => Some(Self::Riscv64),
            "powerpc64" => Some(Self::PowerPc64),
            "mips64" => Some(Self::Mips64),
            "loongarch64" => Some(Self::LoongArch64),
            "sparc64" => Some(Self::Sparc64),
            _ => None,
        }
    }

    /// The `target_arch` spelling of this backend.
    #[must_use]
    pub const fn cfg_name(self) -> &'static str {
        match self {
            Self::X86_64 => "x86_64",
            Self::Aarch64 => "aarch64",
            Self::Riscv64 => "riscv64",
            Self::PowerPc64 => "powerpc64",
            Self::Mips64 => "mips64",
            Self::LoongArch64 => "loongarch64",
            Self::Sparc64 => "sparc64",
        }
    }

    /// Address the image is linked and loaded at.
    ///
    /// # Kernel Build
    /// Sourced by the harness `build.rs` and passed to the linker script as
    /// `LOAD_ADDRESS`.
    #[must_use]
    pub const fn load_address(self) -> u64 {
        match self {
            // Above legacy low memory; must stay below 1 GiB for the identity map.
            Self::X86_64 => 0x0010_0000,
            // QEMU `virt`: RAM starts at 1 GiB, leave room for the DTB.
            Self::Aarch64 => 0x4008_0000,
            // After the SBI firmware.
            Self::Riscv64 => 0x8020_0000,
            Self::PowerPc64 => 0x0040_0000,
            // KSEG0, cached and unmapped.
            Self::Mips64 => 0xffff_ffff_8010_0000,
            // Direct-mapped cached window.
            Self::LoongArch64 => 0x9000_0000_0020_0000,
            Self::Sparc64 => 0x0040_4000,
        }
    }
}

const _: () = {
    assert!(BOOT_STACK_SIZE.is_multiple_of(BOOT_STACK_ALIGN));
    assert!(BOOT_STACK_SIZE.is_multiple_of(PAGE_SIZE));
    assert!(PAGE_SIZE.is_multiple_of(BOOT_STACK_ALIGN));
    assert!(TargetArch::X86_64.load_address() < IDENTITY_MAP_BYTES);
    assert!(TargetArch::X86_64.load_address().is_multiple_of(PAGE_SIZE as u64));
};
