//! # PowerPC 64 backend (ELFv2)
//!
//! Firmware (OPAL, SLOF, a kexec loader) passes up to three words in
//! `r3`–`r5`. The ELFv2 ABI requires a 32-byte minimum frame above the stack
//! pointer and a back chain word at `0(r1)`; the entry routine stores a null
//! back chain so stack walkers stop at the first frame.
//!
//! The link register is not a GPR. It is modelled as slot 32 and cleared via
//! `mtlr` like any other register.

use crate::contract::Architecture;
use crate::halt::Idle;
use crate::registers::{Reg, Registers};
use crate::stack::{BOOT_STACK_SIZE, StackConvention};

pub const R1: Reg = Reg::new(1);
pub const R3: Reg = Reg::new(3);
pub const R4: Reg = Reg::new(4);
pub const R5: Reg = Reg::new(5);
pub const R14: Reg = Reg::new(14);
pub const R15: Reg = Reg::new(15);
pub const R16: Reg = Reg::new(16);
pub const LR: Reg = Reg::new(32);

/// ELFv2 minimum stack frame: back chain, CR save, LR save, TOC save.
pub const MINIMUM_FRAME: usize = 32;

const REGISTER_NAMES: [&str; 33] = [
    "r0", "r1", "r2", "r3", "r4", "r5", "r6", "r7", "r8", "r9", "r10", "r11", "r12", "r13", "r14",
    "r15", "r16", "r17", "r18", "r19", "r20", "r21", "r22", "r23", "r24", "r25", "r26", "r27",
    "r28", "r29", "r30", "r31", "lr",
];

pub struct PowerPc64;

impl Architecture for PowerPc64 {
    const NAME: &'static str = "powerpc64";
    type File = Registers<33>;
    const REGISTER_NAMES: &'static [&'static str] = &REGISTER_NAMES;
    const STACK_POINTER: Reg = R1;
    const LINK_REGISTER: Option<Reg> = Some(LR);
    const BOOT_ARGUMENTS: &'static [Reg] = &[R3, R4, R5];
    const CAPTURE: &'static [Reg] = &[R14, R15, R16];
    const CALL_ARGUMENTS: &'static [Reg] = &[R3, R4, R5];
    const STACK: StackConvention = StackConvention {
        alignment: 16,
        reserved_frame: MINIMUM_FRAME,
        bias: 0,
    };
    const IDLE: Idle = Idle::Spin;
}

pub const STACK_OFFSET: usize = PowerPc64::STACK.initial_offset(BOOT_STACK_SIZE);

// `addi` takes a signed 16-bit immediate.
const _: () = assert!(STACK_OFFSET <= i16::MAX as usize);

#[cfg(all(feature = "entry", target_os = "none", target_arch = "powerpc64"))]
mod entry {
    use super::STACK_OFFSET;
    use crate::arch::kernel_main;
    use crate::stack::BOOT_STACK;
    use core::arch::naked_asm;

    #[unsafe(naked)]
    #[unsafe(no_mangle)]
    #[unsafe(link_section = ".text.boot")]
    pub unsafe extern "C" fn _start() -> ! {
        naked_asm!(
            "mr 14, 3",
            "mr 15, 4",
            "mr 16, 5",
            ".irp r, 0,2,3,4,5,6,7,8,9,10,11,12,13,17,18,19,20,21,22,23,24,25,26,27,28,29,30,31",
            "li \\r, 0",
            ".endr",
            "mtlr 0",
            "lis 1, {stack}@highest",
            "ori 1, 1, {stack}@higher",
            "rldicr 1, 1, 32, 31",
            "oris 1, 1, {stack}@h",
            "ori 1, 1, {stack}@l",
            "addi 1, 1, {stack_offset}",
            // Null back chain.
            "std 0, 0(1)",
            "mr 3, 14",
            "mr 4, 15",
            "mr 5, 16",
            "li 14, 0",
            "li 15, 0",
            "li 16, 0",
            "bl {kernel_main}",
            "nop",
            "2:",
            "nop",
            "b 2b",
            stack = sym BOOT_STACK,
            stack_offset = const STACK_OFFSET,
            kernel_main = sym kernel_main,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_leaves_the_minimum_frame() {
        assert_eq!(STACK_OFFSET, BOOT_STACK_SIZE - MINIMUM_FRAME);
        assert_eq!(PowerPc64::register_name(LR), "lr");
    }
}
