//! LoongArch64 backend.

use crate::contract::Architecture;
use crate::halt::Idle;
use crate::registers::{Reg, Registers};
use crate::stack::{BOOT_STACK_SIZE, StackConvention};

pub const RA: Reg = Reg::new(1);
pub const SP: Reg = Reg::new(3);
pub const A0: Reg = Reg::new(4);
pub const A1: Reg = Reg::new(5);
pub const A2: Reg = Reg::new(6);
pub const S0: Reg = Reg::new(23);
pub const S1: Reg = Reg::new(24);
pub const S2: Reg = Reg::new(25);

const REGISTER_NAMES: [&str; 32] = [
    "$zero", "$ra", "$tp", "$sp", "$a0", "$a1", "$a2", "$a3", "$a4", "$a5", "$a6", "$a7", "$t0",
    "$t1", "$t2", "$t3", "$t4", "$t5", "$t6", "$t7", "$t8", "$r21", "$fp", "$s0", "$s1", "$s2",
    "$s3", "$s4", "$s5", "$s6", "$s7", "$s8",
];

pub struct LoongArch64;

impl Architecture for LoongArch64 {
    const NAME: &'static str = "loongarch64";
    type File = Registers<32>;
    const REGISTER_NAMES: &'static [&'static str] = &REGISTER_NAMES;
    const STACK_POINTER: Reg = SP;
    const LINK_REGISTER: Option<Reg> = Some(RA);
    const BOOT_ARGUMENTS: &'static [Reg] = &[A0, A1, A2];
    const CAPTURE: &'static [Reg] = &[S0, S1, S2];
    const CALL_ARGUMENTS: &'static [Reg] = &[A0, A1, A2];
    const STACK: StackConvention = StackConvention::aligned(16);
    const IDLE: Idle = Idle::IdleLevel0;
}

pub const STACK_OFFSET: usize = LoongArch64::STACK.initial_offset(BOOT_STACK_SIZE);

#[cfg(all(feature = "entry", target_os = "none", target_arch = "loongarch64"))]
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
            "move $r23, $r4",
            "move $r24, $r5",
            "move $r25, $r6",
            ".irp r, 1,2,4,5,6,7,8,9,10,11,12,13,14,15,16,17,18,19,20,21,22,26,27,28,29,30,31",
            "move $r\\r, $zero",
            ".endr",
            "la.pcrel $r3, {stack}",
            "li.d $r12, {stack_offset}",
            "add.d $r3, $r3, $r12",
            "move $r12, $zero",
            "move $r4, $r23",
            "move $r5, $r24",
            "move $r6, $r25",
            "move $r23, $zero",
            "move $r24, $zero",
            "move $r25, $zero",
            "bl {kernel_main}",
            "2:",
            "idle 0",
            "b 2b",
            stack = sym BOOT_STACK,
            stack_offset = const STACK_OFFSET,
            kernel_main = sym kernel_main,
        )
    }
}
