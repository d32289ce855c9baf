//! # x86-64 backend
//!
//! Entered by a Multiboot loader in 32-bit protected mode with the loader
//! magic in `EAX` and the boot information pointer in `EBX`. The two words are
//! captured in `EDI`/`ESI` before anything else runs, the
//! [preamble](preamble) switches to long mode, and the 64-bit half of the
//! entry routine finishes the contract with `RDI`/`RSI` as the arguments of
//! `kernel_main(info, magic)`.
//!
//! The capture temporaries are the call argument registers, so the reload
//! step is the identity here.

pub mod descriptors;
pub mod multiboot;
pub mod paging;
pub mod preamble;
pub mod sim;

#[cfg(all(feature = "entry", target_os = "none", target_arch = "x86_64"))]
mod entry;

use crate::contract::Architecture;
use crate::halt::Idle;
use crate::registers::{Reg, Registers};
use crate::stack::{BOOT_STACK_SIZE, StackConvention};
use kernel_registers::cr0::Cr0;
use kernel_registers::cr4::Cr4;
use kernel_registers::efer::Efer;

pub const RAX: Reg = Reg::new(0);
pub const RCX: Reg = Reg::new(1);
pub const RDX: Reg = Reg::new(2);
pub const RBX: Reg = Reg::new(3);
pub const RSP: Reg = Reg::new(4);
pub const RBP: Reg = Reg::new(5);
pub const RSI: Reg = Reg::new(6);
pub const RDI: Reg = Reg::new(7);

const REGISTER_NAMES: [&str; 16] = [
    "rax", "rcx", "rdx", "rbx", "rsp", "rbp", "rsi", "rdi", "r8", "r9", "r10", "r11", "r12",
    "r13", "r14", "r15",
];

/// The x86-64 entry contract, after the long-mode switch.
pub struct X86_64;

impl Architecture for X86_64 {
    const NAME: &'static str = "x86_64";
    type File = Registers<16>;
    const REGISTER_NAMES: &'static [&'static str] = &REGISTER_NAMES;
    const STACK_POINTER: Reg = RSP;
    // `call` pushes the return address; no register holds it.
    const LINK_REGISTER: Option<Reg> = None;
    const BOOT_ARGUMENTS: &'static [Reg] = &[RBX, RAX];
    // `EBX`/`EAX` in protected mode; upper halves are undefined after the switch.
    const BOOT_WORD_BITS: u32 = 32;
    const CAPTURE: &'static [Reg] = &[RDI, RSI];
    const CALL_ARGUMENTS: &'static [Reg] = &[RDI, RSI];
    const STACK: StackConvention = StackConvention::aligned(16);
    const IDLE: Idle = Idle::Halt;
}

/// Offset of the initial `RSP` from the boot stack base.
pub const STACK_OFFSET: usize = X86_64::STACK.initial_offset(BOOT_STACK_SIZE);

/// The control register bits the preamble is responsible for.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct LongModeStatus {
    pub cr0: Cr0,
    pub cr4: Cr4,
    pub efer: Efer,
}

impl LongModeStatus {
    /// `CR0.PE`, `CR0.PG`, `CR4.PAE`, `EFER.LME` and `EFER.LMA` all set.
    #[must_use]
    pub const fn is_long_mode(&self) -> bool {
        self.cr0.is_protected_paging() && self.cr4.pae() && self.efer.lme() && self.efer.lma()
    }
}

/// Reads back the control registers on the running processor.
///
/// # Safety
/// Ring 0 only.
#[cfg(all(feature = "entry", target_arch = "x86_64"))]
#[must_use]
pub unsafe fn long_mode_status() -> LongModeStatus {
    use kernel_registers::LoadRegisterUnsafe;
    unsafe {
        LongModeStatus {
            cr0: Cr0::load_unsafe(),
            cr4: Cr4::load_unsafe(),
            efer: Efer::load_unsafe(),
        }
    }
}
