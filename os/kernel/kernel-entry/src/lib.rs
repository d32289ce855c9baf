//! # Boot Entry Normalization
//!
//! The first code that runs after firmware or a bootloader transfers control.
//! Every supported architecture arrives here in a different machine state;
//! this crate brings each of them into one canonical state and then calls the
//! kernel's first high-level routine, `kernel_main`, which never returns.
//!
//! ## The canonical entry contract
//!
//! Immediately before the linking call into `kernel_main`:
//!
//! * the (up to three) boot argument words sit in the architecture's first
//!   argument registers, bit-for-bit as the firmware passed them,
//! * every other general-purpose register, the link register included, is zero,
//! * the stack pointer addresses the top of a 16 KiB statically reserved,
//!   zero-initialized [boot stack](stack::BOOT_STACK), aligned for the ABI.
//!
//! If `kernel_main` returns anyway, the processor parks in an idle loop.
//!
//! ```text
//!  firmware ──► [x86-64: mode-transition preamble] ──► contract ──► kernel_main
//!                         │                               │              │
//!                         └── bad magic ──► halt          └── wrong EL ──┴──► halt
//! ```
//!
//! ## Two renditions of one contract
//!
//! The contract exists twice, deliberately kept in lockstep:
//!
//! * **On target** (feature `entry`), each [`arch`] backend contributes a naked
//!   `_start` routine. Register choices are fixed in assembly; every numeric
//!   input (stack offsets, control-register bits, descriptor encodings, page
//!   table flags, protocol magic) is a `const` computed by the typed model.
//! * **On the host**, the same contract is a set of pure functions over an
//!   explicit register file ([`contract::hand_off`], [`contract::enter`]), so
//!   arbitrary firmware states can be constructed and the postconditions
//!   asserted with [`contract::check_handoff`]. The x86-64 preamble runs as a
//!   typestate machine ([`arch::x86_64::preamble`]) against a
//!   [simulated processor](arch::x86_64::sim::SimulatedCpu).
//!
//! ## Features
//!
//! * `entry`: emit the on-target symbols for the current `target_arch`.
//! * `multiboot1`: x86-64 accepts the Multiboot 1 protocol instead of Multiboot 2.
//! * `aarch64-el2`: AArch64 expects to be entered at EL2 instead of EL1.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]
#![cfg_attr(
    all(
        feature = "entry",
        any(
            target_arch = "powerpc64",
            target_arch = "mips64",
            target_arch = "sparc64"
        )
    ),
    feature(asm_experimental_arch)
)]

pub mod arch;
pub mod args;
pub mod contract;
pub mod error;
pub mod halt;
pub mod registers;
pub mod stack;

pub use crate::args::BootArgs;
pub use crate::contract::{Architecture, EntryState, Handoff};
pub use crate::error::{EntryFault, HandoffViolation, StackError};
pub use crate::registers::{Reg, RegisterFile, Registers};
pub use crate::stack::{StackConvention, StackRegion};
