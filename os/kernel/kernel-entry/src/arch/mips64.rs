//! MIPS64 backend (n64 ABI).
//!
//! Boot words arrive in `$a0`–`$a2` (`$4`–`$6`); the callee-saved `$s0`–`$s2`
//! hold them across sanitization. The routine runs with `noreorder`, so every
//! branch and jump carries an explicit delay-slot `nop`.

use crate::contract::Architecture;
use crate::halt::Idle;
use crate::registers::{Reg, Registers};
use crate::stack::{BOOT_STACK_SIZE, StackConvention};

pub const A0: Reg = Reg::new(4);
pub const A1: Reg = Reg::new(5);
pub const A2: Reg = Reg::new(6);
pub const S0: Reg = Reg::new(16);
pub const S1: Reg = Reg::new(17);
pub const S2: Reg = Reg::new(18);
pub const SP: Reg = Reg::new(29);
pub const RA: Reg = Reg::new(31);

const REGISTER_NAMES: [&str; 32] = [
    "$zero", "$at", "$v0", "$v1", "$a0", "$a1", "$a2", "$a3", "$a4", "$a5", "$a6", "$a7", "$t0",
    "$t1", "$t2", "$t3", "$s0", "$s1", "$s2", "$s3", "$s4", "$s5", "$s6", "$s7", "$t8", "$t9",
    "$k0", "$k1", "$gp", "$sp", "$fp", "$ra",
];

pub struct Mips64;

impl Architecture for Mips64 {
    const NAME: &'static str = "mips64";
    type File = Registers<32>;
    const REGISTER_NAMES: &'static [&'static str] = &REGISTER_NAMES;
    const STACK_POINTER: Reg = SP;
    const LINK_REGISTER: Option<Reg> = Some(RA);
    const BOOT_ARGUMENTS: &'static [Reg] = &[A0, A1, A2];
    const CAPTURE: &'static [Reg] = &[S0, S1, S2];
    const CALL_ARGUMENTS: &'static [Reg] = &[A0, A1, A2];
    const STACK: StackConvention = StackConvention::aligned(16);
    const IDLE: Idle = Idle::Wait;
}

pub const STACK_OFFSET: usize = Mips64::STACK.initial_offset(BOOT_STACK_SIZE);

#[cfg(all(feature = "entry", target_os = "none", target_arch = "mips64"))]
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
            ".set push",
            ".set noreorder",
            ".set noat",
            "move $16, $4",
            "move $17, $5",
            "move $18, $6",
            ".irp r, 1,2,3,4,5,6,7,8,9,10,11,12,13,14,15,19,20,21,22,23,24,25,26,27,28,30,31",
            "move $\\r, $0",
            ".endr",
            "lui $29, %highest({stack})",
            "daddiu $29, $29, %higher({stack})",
            "dsll $29, $29, 16",
            "daddiu $29, $29, %hi({stack})",
            "dsll $29, $29, 16",
            "daddiu $29, $29, %lo({stack})",
            "li $8, {stack_offset}",
            "daddu $29, $29, $8",
            "move $8, $0",
            "move $4, $16",
            "move $5, $17",
            "move $6, $18",
            "move $16, $0",
            "move $17, $0",
            "move $18, $0",
            "jal {kernel_main}",
            "nop",
            "2:",
            "wait",
            "b 2b",
            "nop",
            ".set pop",
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
    fn numbered_registers() {
        assert_eq!(Mips64::register_name(SP), "$sp");
        assert_eq!(Mips64::register_name(RA), "$ra");
        assert_eq!(Mips64::register_name(S0), "$s0");
        assert_eq!(Mips64::register_name(A2), "$a2");
    }
}
