//! # AArch64 backend
//!
//! Entered with up to three boot words in `x0`–`x2` (a Linux-style image
//! loader passes the device tree pointer in `x0`). This is the one backend
//! that checks its privilege level: `CurrentEL` must match the expected
//! exception level, otherwise the processor parks in a separate loop before
//! anything is captured.

use crate::contract::{Architecture, EntryState};
use crate::error::EntryFault;
use crate::halt::Idle;
use crate::registers::{Reg, Registers};
use crate::stack::{BOOT_STACK_SIZE, StackConvention};

pub const X0: Reg = Reg::new(0);
pub const X1: Reg = Reg::new(1);
pub const X2: Reg = Reg::new(2);
pub const X19: Reg = Reg::new(19);
pub const X20: Reg = Reg::new(20);
pub const X21: Reg = Reg::new(21);
pub const LR: Reg = Reg::new(30);
pub const SP: Reg = Reg::new(31);

const REGISTER_NAMES: [&str; 32] = [
    "x0", "x1", "x2", "x3", "x4", "x5", "x6", "x7", "x8", "x9", "x10", "x11", "x12", "x13", "x14",
    "x15", "x16", "x17", "x18", "x19", "x20", "x21", "x22", "x23", "x24", "x25", "x26", "x27",
    "x28", "x29", "x30", "sp",
];

/// Exception level the kernel must be entered at.
pub const EXPECTED_EXCEPTION_LEVEL: u8 = if cfg!(feature = "aarch64-el2") {
    2
} else {
    1
};

/// `CurrentEL` value for exception level `level` (the level sits in bits 3:2).
#[must_use]
pub const fn current_el_value(level: u8) -> u64 {
    (level as u64) << 2
}

pub struct Aarch64;

impl Architecture for Aarch64 {
    const NAME: &'static str = "aarch64";
    type File = Registers<32>;
    const REGISTER_NAMES: &'static [&'static str] = &REGISTER_NAMES;
    const STACK_POINTER: Reg = SP;
    const LINK_REGISTER: Option<Reg> = Some(LR);
    const BOOT_ARGUMENTS: &'static [Reg] = &[X0, X1, X2];
    const CAPTURE: &'static [Reg] = &[X19, X20, X21];
    const CALL_ARGUMENTS: &'static [Reg] = &[X0, X1, X2];
    const STACK: StackConvention = StackConvention::aligned(16);
    const IDLE: Idle = Idle::WaitForInterrupt;

    fn admit(entry: &EntryState<Self::File>) -> Result<(), EntryFault> {
        if entry.privilege_level == EXPECTED_EXCEPTION_LEVEL {
            Ok(())
        } else {
            Err(EntryFault::PrivilegeViolation {
                current: entry.privilege_level,
                expected: EXPECTED_EXCEPTION_LEVEL,
            })
        }
    }
}

pub const STACK_OFFSET: usize = Aarch64::STACK.initial_offset(BOOT_STACK_SIZE);

#[cfg(all(feature = "entry", target_os = "none", target_arch = "aarch64"))]
mod entry {
    use super::{EXPECTED_EXCEPTION_LEVEL, STACK_OFFSET, current_el_value};
    use crate::arch::kernel_main;
    use crate::stack::BOOT_STACK;
    use core::arch::naked_asm;

    #[unsafe(naked)]
    #[unsafe(no_mangle)]
    #[unsafe(link_section = ".text.boot")]
    pub unsafe extern "C" fn _start() -> ! {
        naked_asm!(
            "mrs x9, CurrentEL",
            "cmp x9, #{el}",
            "b.ne 3f",
            // Capture.
            "mov x19, x0",
            "mov x20, x1",
            "mov x21, x2",
            // Sanitize, x29 (fp) and x30 (lr) included.
            ".irp n, 0,1,2,3,4,5,6,7,8,9,10,11,12,13,14,15,16,17,18,22,23,24,25,26,27,28,29,30",
            "mov x\\n, xzr",
            ".endr",
            // Stack.
            "adrp x9, {stack}",
            "add x9, x9, :lo12:{stack}",
            "mov x10, #{stack_offset}",
            "add sp, x9, x10",
            "mov x9, xzr",
            "mov x10, xzr",
            // Reload.
            "mov x0, x19",
            "mov x1, x20",
            "mov x2, x21",
            "mov x19, xzr",
            "mov x20, xzr",
            "mov x21, xzr",
            "bl {kernel_main}",
            "2:",
            "wfi",
            "b 2b",
            // Wrong exception level.
            "3:",
            "wfi",
            "b 3b",
            el = const current_el_value(EXPECTED_EXCEPTION_LEVEL),
            stack = sym BOOT_STACK,
            stack_offset = const STACK_OFFSET,
            kernel_main = sym kernel_main,
        )
    }
}
