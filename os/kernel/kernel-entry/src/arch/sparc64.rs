//! # SPARC V9 backend
//!
//! OpenBoot passes its client interface and arguments in `%o0`–`%o2`. Two
//! ABI details shape the stack:
//!
//! * every frame reserves 176 bytes above the stack pointer for the register
//!   window spill area and outgoing argument slots,
//! * the V9 stack pointer is *biased*: `%sp` holds the frame address minus
//!   2047, which is how 64-bit code tells itself apart from 32-bit code.
//!
//! Slots are numbered `%g0`–`%g7`, `%o0`–`%o7`, `%l0`–`%l7`, `%i0`–`%i7`.

use crate::contract::Architecture;
use crate::halt::Idle;
use crate::registers::{Reg, Registers};
use crate::stack::{BOOT_STACK_SIZE, StackConvention};

pub const O0: Reg = Reg::new(8);
pub const O1: Reg = Reg::new(9);
pub const O2: Reg = Reg::new(10);
pub const SP: Reg = Reg::new(14);
pub const O7: Reg = Reg::new(15);
pub const L0: Reg = Reg::new(16);
pub const L1: Reg = Reg::new(17);
pub const L2: Reg = Reg::new(18);

/// Register window save area plus six outgoing argument slots.
pub const WINDOW_SAVE_AREA: usize = 176;
pub const STACK_BIAS: usize = 2047;

const REGISTER_NAMES: [&str; 32] = [
    "%g0", "%g1", "%g2", "%g3", "%g4", "%g5", "%g6", "%g7", "%o0", "%o1", "%o2", "%o3", "%o4",
    "%o5", "%o6", "%o7", "%l0", "%l1", "%l2", "%l3", "%l4", "%l5", "%l6", "%l7", "%i0", "%i1",
    "%i2", "%i3", "%i4", "%i5", "%i6", "%i7",
];

pub struct Sparc64;

impl Architecture for Sparc64 {
    const NAME: &'static str = "sparc64";
    type File = Registers<32>;
    const REGISTER_NAMES: &'static [&'static str] = &REGISTER_NAMES;
    const STACK_POINTER: Reg = SP;
    const LINK_REGISTER: Option<Reg> = Some(O7);
    const BOOT_ARGUMENTS: &'static [Reg] = &[O0, O1, O2];
    const CAPTURE: &'static [Reg] = &[L0, L1, L2];
    const CALL_ARGUMENTS: &'static [Reg] = &[O0, O1, O2];
    const STACK: StackConvention = StackConvention {
        alignment: 16,
        reserved_frame: WINDOW_SAVE_AREA,
        bias: STACK_BIAS,
    };
    const IDLE: Idle = Idle::Spin;
}

pub const STACK_OFFSET: usize = Sparc64::STACK.initial_offset(BOOT_STACK_SIZE);

#[cfg(all(feature = "entry", target_os = "none", target_arch = "sparc64"))]
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
            "mov %o0, %l0",
            "mov %o1, %l1",
            "mov %o2, %l2",
            ".irp r, g1,g2,g3,g4,g5,g6,g7,o0,o1,o2,o3,o4,o5,o7,l3,l4,l5,l6,l7,i0,i1,i2,i3,i4,i5,i6,i7",
            "clr %\\r",
            ".endr",
            "sethi %hh({stack}), %g1",
            "or %g1, %hm({stack}), %g1",
            "sllx %g1, 32, %g1",
            "sethi %lm({stack}), %g2",
            "or %g2, %lo({stack}), %g2",
            "or %g1, %g2, %g1",
            "sethi %hi({stack_offset}), %g2",
            "or %g2, %lo({stack_offset}), %g2",
            "add %g1, %g2, %sp",
            "clr %g1",
            "clr %g2",
            "mov %l0, %o0",
            "mov %l1, %o1",
            "mov %l2, %o2",
            "clr %l0",
            "clr %l1",
            "clr %l2",
            "call {kernel_main}",
            "nop",
            "2:",
            "nop",
            "ba 2b",
            "nop",
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
    fn biased_offset() {
        assert_eq!(STACK_OFFSET, BOOT_STACK_SIZE - 176 - 2047);
        assert_eq!(STACK_OFFSET, 14161);
        assert_eq!(Sparc64::register_name(SP), "%o6");
    }
}
