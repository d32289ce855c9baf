//! Faults the entry layer can detect.
//!
//! None of these are recoverable at boot; every one of them ends in the
//! architecture's idle loop. They exist so the host model can say *why*.

use thiserror::Error;

/// Reason the entry layer parked the processor instead of running the kernel.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Error)]
pub enum EntryFault {
    /// The bootloader's magic value does not identify the expected protocol.
    #[error("boot protocol magic {found:#010x} does not match {expected:#010x}")]
    ProtocolViolation { found: u32, expected: u32 },

    /// The processor was entered at the wrong privilege (exception) level.
    #[error("entered at privilege level {current}, expected {expected}")]
    PrivilegeViolation { current: u8, expected: u8 },

    /// `kernel_main` came back.
    #[error("the kernel entry routine returned")]
    KernelReturned,

    #[error(transparent)]
    Stack(#[from] StackError),
}

/// The boot stack cannot host the initial frame.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Error)]
pub enum StackError {
    #[error("stack base {base:#x} is not aligned to {alignment} bytes")]
    Misaligned { base: u64, alignment: usize },

    #[error("a {size}-byte stack cannot hold a {required}-byte initial frame")]
    TooSmall { size: usize, required: usize },
}

/// A register state that breaks the canonical entry contract.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Error)]
pub enum HandoffViolation {
    #[error("{register} still holds {value:#x} at the handoff")]
    DirtyRegister { register: &'static str, value: u64 },

    #[error("argument {index} in {register} is {found:#x}, firmware passed {expected:#x}")]
    ArgumentMismatch {
        index: usize,
        register: &'static str,
        found: u64,
        expected: u64,
    },

    #[error("stack pointer {pointer:#x} is outside the boot stack")]
    StackOutOfRange { pointer: u64 },

    #[error("stack pointer {pointer:#x} is not aligned to {alignment} bytes")]
    StackMisaligned { pointer: u64, alignment: usize },
}
