//! RISC-V 64 backend.
//!
//! OpenSBI and U-Boot enter S-mode with the hart id in `a0` and the device
//! tree pointer in `a1`; `a2` is forwarded as well. `gp` is cleared with the
//! rest, so the stack address is loaded without linker relaxation.

use crate::contract::Architecture;
use crate::halt::Idle;
use crate::registers::{Reg, Registers};
use crate::stack::{BOOT_STACK_SIZE, StackConvention};

pub const RA: Reg = Reg::new(1);
pub const SP: Reg = Reg::new(2);
pub const S1: Reg = Reg::new(9);
pub const A0: Reg = Reg::new(10);
pub const A1: Reg = Reg::new(11);
pub const A2: Reg = Reg::new(12);
pub const S2: Reg = Reg::new(18);
pub const S3: Reg = Reg::new(19);

const REGISTER_NAMES: [&str; 32] = [
    "zero", "ra", "sp", "gp", "tp", "t0", "t1", "t2", "s0", "s1", "a0", "a1", "a2", "a3", "a4",
    "a5", "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7", "s8", "s9", "s10", "s11", "t3", "t4",
    "t5", "t6",
];

pub struct Riscv64;

impl Architecture for Riscv64 {
    const NAME: &'static str = "riscv64";
    type File = Registers<32>;
    const REGISTER_NAMES: &'static [&'static str] = &REGISTER_NAMES;
    const STACK_POINTER: Reg = SP;
    const LINK_REGISTER: Option<Reg> = Some(RA);
    const BOOT_ARGUMENTS: &'static [Reg] = &[A0, A1, A2];
    const CAPTURE: &'static [Reg] = &[S1, S2, S3];
    const CALL_ARGUMENTS: &'static [Reg] = &[A0, A1, A2];
    const STACK: StackConvention = StackConvention::aligned(16);
    const IDLE: Idle = Idle::WaitForInterrupt;
}

pub const STACK_OFFSET: usize = Riscv64::STACK.initial_offset(BOOT_STACK_SIZE);

#[cfg(all(feature = "entry", target_os = "none", target_arch = "riscv64"))]
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
            "mv s1, a0",
            "mv s2, a1",
            "mv s3, a2",
            ".irp r, ra,gp,tp,t0,t1,t2,s0,a0,a1,a2,a3,a4,a5,a6,a7,s4,s5,s6,s7,s8,s9,s10,s11,t3,t4,t5,t6",
            "mv \\r, zero",
            ".endr",
            ".option push",
            ".option norelax",
            "la sp, {stack}",
            ".option pop",
            "li t0, {stack_offset}",
            "add sp, sp, t0",
            "mv t0, zero",
            "mv a0, s1",
            "mv a1, s2",
            "mv a2, s3",
            "mv s1, zero",
            "mv s2, zero",
            "mv s3, zero",
            "call {kernel_main}",
            "2:",
            "wfi",
            "j 2b",
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
    fn abi_names_match_slots() {
        assert_eq!(Riscv64::register_name(S1), "s1");
        assert_eq!(Riscv64::register_name(S2), "s2");
        assert_eq!(Riscv64::register_name(A2), "a2");
        assert_eq!(Riscv64::register_name(Reg::new(0)), "zero");
    }
}
