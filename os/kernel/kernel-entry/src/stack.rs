//! # Boot stack
//!
//! One statically reserved, zero-initialized region serves as the stack for
//! `kernel_main`. Backends differ only in how the initial stack pointer is
//! derived from its top:
//!
//! ```text
//!  BOOT_STACK                                               BOOT_STACK + SIZE
//!  │                                                                │
//!  ▼                         initial SP                             ▼
//!  ┌───────────────────────────────┬─────────────────┬─────────────┐
//!  │        free stack space       │ reserved frame  │   (bias)    │
//!  └───────────────────────────────┴─────────────────┴─────────────┘
//!                                  ▲
//!                                  └─ align_down(SIZE) - reserved_frame - bias
//! ```
//!
//! The reserved frame covers ABI-mandated save areas below the first callee
//! frame (the PowerPC ELFv2 minimum frame, the SPARC register window save
//! area); the bias covers ABIs whose stack pointer is offset from the frame it
//! addresses (the SPARC V9 `2047` bias).
//!
//! [`BOOT_STACK`] lives in `.bss.boot`, which carries no file contents. The
//! entry routines never clear it: the boot loader must zero-fill the image's
//! NOBITS sections (every ELF loader does, Multiboot loaders included) before
//! jumping to `_start`.

use crate::error::StackError;
pub use kernel_info::layout::{BOOT_STACK_ALIGN, BOOT_STACK_SIZE};

/// How an architecture's ABI places the initial stack pointer.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct StackConvention {
    /// Required alignment of the stack frame, a power of two.
    pub alignment: usize,
    /// Bytes kept free above the stack pointer for the callee.
    pub reserved_frame: usize,
    /// Constant subtracted from the frame address to form the stack pointer.
    pub bias: usize,
}

impl StackConvention {
    /// A convention with neither reserved frame nor bias.
    #[must_use]
    pub const fn aligned(alignment: usize) -> Self {
        Self {
            alignment,
            reserved_frame: 0,
            bias: 0,
        }
    }

    /// Bytes between the stack base and the initial stack pointer for a stack
    /// of `size` bytes.
    ///
    /// This is a `const fn` so the entry routines can use the result as an
    /// immediate operand.
    ///
    /// # Panics
    /// At compile time (or in debug builds) if the stack is too small.
    #[must_use]
    pub const fn initial_offset(self, size: usize) -> usize {
        let top = size & !(self.alignment - 1);
        assert!(
            top >= self.reserved_frame + self.bias,
            "stack too small for the initial frame"
        );
        top - self.reserved_frame - self.bias
    }

    /// Whether a stack of `size` bytes leaves room for at least one aligned
    /// frame below the initial stack pointer.
    #[must_use]
    pub const fn fits(self, size: usize) -> bool {
        size & !(self.alignment - 1) >= self.required()
    }

    const fn required(self) -> usize {
        self.reserved_frame + self.bias + self.alignment
    }
}

/// A stack memory region.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct StackRegion {
    base: u64,
    size: usize,
}

impl StackRegion {
    #[must_use]
    pub const fn new(base: u64, size: usize) -> Self {
        Self { base, size }
    }

    /// The region occupied by [`BOOT_STACK`].
    #[must_use]
    pub fn boot() -> Self {
        Self::new((&raw const BOOT_STACK) as u64, BOOT_STACK_SIZE)
    }

    #[must_use]
    pub const fn base(&self) -> u64 {
        self.base
    }

    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// One past the highest byte of the region.
    #[must_use]
    pub const fn top(&self) -> u64 {
        self.base + self.size as u64
    }

    /// Whether `pointer` is a usable stack pointer for this region: above the
    /// base and at most the top (an empty full-descending stack).
    ///
    /// A biased pointer lies below the frame it addresses, so `bias` is added
    /// back before the check.
    #[must_use]
    pub const fn holds(&self, pointer: u64, bias: usize) -> bool {
        let frame = pointer.wrapping_add(bias as u64);
        frame > self.base && frame <= self.top()
    }

    /// The initial stack pointer under `convention`.
    ///
    /// # Errors
    /// If the base is misaligned or the region too small for the convention.
    pub const fn initial_pointer(&self, convention: StackConvention) -> Result<u64, StackError> {
        if self.base & (convention.alignment as u64 - 1) != 0 {
            return Err(StackError::Misaligned {
                base: self.base,
                alignment: convention.alignment,
            });
        }
        if !convention.fits(self.size) {
            return Err(StackError::TooSmall {
                size: self.size,
                required: convention.required(),
            });
        }
        Ok(self.base + convention.initial_offset(self.size) as u64)
    }
}

/// Backing storage of the boot stack.
#[repr(C, align(16))]
pub struct BootStack([u8; BOOT_STACK_SIZE]);

const _: () = assert!(align_of::<BootStack>() == BOOT_STACK_ALIGN);
const _: () = assert!(size_of::<BootStack>() == BOOT_STACK_SIZE);

/// The stack `kernel_main` runs on. Lives in `.bss.boot`, so it is zero when
/// the loader hands over the image.
#[cfg_attr(
    all(feature = "entry", target_os = "none"),
    unsafe(link_section = ".bss.boot")
)]
pub static mut BOOT_STACK: BootStack = BootStack([0; BOOT_STACK_SIZE]);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boot_stack_starts_zeroed() {
        let stack = unsafe { &(*(&raw const BOOT_STACK)).0 };
        assert!(stack.iter().all(|byte| *byte == 0));
    }

    #[test]
    fn plain_convention_uses_the_aligned_top() {
        let conv = StackConvention::aligned(16);
        assert_eq!(conv.initial_offset(BOOT_STACK_SIZE), BOOT_STACK_SIZE);
        assert_eq!(conv.initial_offset(100), 96);
    }

    #[test]
    fn reserved_frame_and_bias_are_subtracted() {
        let conv = StackConvention {
            alignment: 16,
            reserved_frame: 176,
            bias: 2047,
        };
        assert_eq!(conv.initial_offset(16 * 1024), 16 * 1024 - 176 - 2047);
    }

    #[test]
    fn initial_pointer_is_inside_the_region() {
        let region = StackRegion::new(0x8000, 0x4000);
        let sp = region
            .initial_pointer(StackConvention::aligned(16))
            .expect("aligned stack");
        assert_eq!(sp, 0xc000);
        assert!(region.holds(sp, 0));
        assert!(!region.holds(0x8000, 0));
        assert!(!region.holds(0xc010, 0));
    }

    #[test]
    fn misaligned_base_is_rejected() {
        let region = StackRegion::new(0x8008, 0x4000);
        assert_eq!(
            region.initial_pointer(StackConvention::aligned(16)),
            Err(StackError::Misaligned {
                base: 0x8008,
                alignment: 16
            })
        );
    }

    #[test]
    fn tiny_region_is_rejected() {
        let region = StackRegion::new(0x8000, 32);
        let conv = StackConvention {
            alignment: 16,
            reserved_frame: 32,
            bias: 0,
        };
        assert_eq!(
            region.initial_pointer(conv),
            Err(StackError::TooSmall {
                size: 32,
                required: 48
            })
        );
    }

    #[test]
    fn boot_stack_is_aligned() {
        let region = StackRegion::boot();
        assert_eq!(region.size(), BOOT_STACK_SIZE);
        assert_eq!(region.base() % BOOT_STACK_ALIGN as u64, 0);
    }
}
