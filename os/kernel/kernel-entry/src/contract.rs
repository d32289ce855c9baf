//! # The canonical entry contract
//!
//! Every backend runs the same six steps between firmware and the kernel:
//!
//! 1. **capture** the boot argument words into callee-saved temporaries,
//! 2. **sanitize** by zeroing every register except those temporaries and the
//!    stack pointer (the link register is not spared),
//! 3. **establish the stack** pointer on the boot stack,
//! 4. **reload** the arguments into the call argument registers and clear the
//!    temporaries that were not reused,
//! 5. make a linking **call** to `kernel_main`,
//! 6. **halt** if it ever returns.
//!
//! Steps 1–4 are pure functions over a register file and can be composed
//! with [`hand_off`]. [`enter`] runs the whole sequence, including an optional
//! [`ModeSwitch`] in front of it, against a [`KernelEntry`] and a [`Halt`].
//! [`check_handoff`] verifies the postconditions of step 4 independently.

use crate::args::BootArgs;
use crate::error::{EntryFault, HandoffViolation, StackError};
use crate::halt::{Halt, Idle};
use crate::registers::{Reg, RegisterFile};
use crate::stack::{StackConvention, StackRegion};
use log::{debug, trace, warn};

/// Per-architecture description of the entry contract.
///
/// The constants mirror the register choices hard-coded in the backend's
/// entry routine; the host model and the assembly must agree on them.
pub trait Architecture {
    /// Human-readable name, used in diagnostics.
    const NAME: &'static str;

    /// The modelled general-purpose register file.
    type File: RegisterFile;

    /// Assembler name of each slot of [`Self::File`].
    const REGISTER_NAMES: &'static [&'static str];

    const STACK_POINTER: Reg;

    /// Register a linking call writes the return address to, if any.
    const LINK_REGISTER: Option<Reg>;

    /// Where firmware leaves the boot argument words.
    const BOOT_ARGUMENTS: &'static [Reg];

    /// Width of the firmware registers in [`Self::BOOT_ARGUMENTS`]. Narrower
    /// words reach the kernel zero-extended.
    const BOOT_WORD_BITS: u32 = u64::BITS;

    /// Temporaries holding the arguments while everything else is cleared.
    const CAPTURE: &'static [Reg];

    /// Where `kernel_main` expects its arguments.
    const CALL_ARGUMENTS: &'static [Reg];

    const STACK: StackConvention;

    /// The wait instruction of the backend's halt loop.
    const IDLE: Idle;

    /// Checks entry preconditions observable before capture.
    ///
    /// # Errors
    /// If the processor was entered in a state the contract cannot normalize.
    fn admit(entry: &EntryState<Self::File>) -> Result<(), EntryFault> {
        let _ = entry;
        Ok(())
    }

    /// Assembler name of `reg`.
    fn register_name(reg: Reg) -> &'static str {
        Self::REGISTER_NAMES.get(reg.index()).copied().unwrap_or("?")
    }
}

/// Machine state as firmware left it.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct EntryState<F> {
    pub registers: F,
    /// Current privilege or exception level, where the architecture has one
    /// the entry routine inspects.
    pub privilege_level: u8,
}

impl<F: RegisterFile> EntryState<F> {
    #[must_use]
    pub const fn new(registers: F, privilege_level: u8) -> Self {
        Self {
            registers,
            privilege_level,
        }
    }
}

/// Machine state immediately before the linking call to `kernel_main`.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Handoff<F> {
    pub registers: F,
    /// The argument words as placed in the call argument registers.
    pub arguments: BootArgs,
}

/// Work that must complete before the contract runs, such as switching the
/// processor into its native execution mode.
pub trait ModeSwitch<F> {
    /// # Errors
    /// If the switch cannot be performed and the processor must halt.
    fn switch(&mut self, entry: &EntryState<F>) -> Result<(), EntryFault>;
}

/// For backends that are entered in their native mode.
#[derive(Copy, Clone, Debug, Default)]
pub struct NativeMode;

impl<F> ModeSwitch<F> for NativeMode {
    fn switch(&mut self, _entry: &EntryState<F>) -> Result<(), EntryFault> {
        Ok(())
    }
}

/// The kernel's first high-level routine.
///
/// It is meant to diverge; returning is a contract violation the entry layer
/// answers by halting.
pub trait KernelEntry<F> {
    fn enter(&mut self, handoff: &Handoff<F>);
}

impl<F, T> KernelEntry<F> for T
where
    T: FnMut(&Handoff<F>),
{
    fn enter(&mut self, handoff: &Handoff<F>) {
        self(handoff);
    }
}

/// The boot argument words as firmware passed them, at firmware width.
#[must_use]
pub fn firmware_arguments<A: Architecture>(registers: &A::File) -> BootArgs {
    BootArgs::read(registers, A::BOOT_ARGUMENTS).truncated(A::BOOT_WORD_BITS)
}

/// Step 1: copy the boot arguments into the capture temporaries.
#[must_use]
pub fn capture<A: Architecture>(registers: A::File) -> A::File {
    let args = firmware_arguments::<A>(&registers);
    trace!("{}: captured {:x?}", A::NAME, args.as_slice());
    args.write(registers, A::CAPTURE)
}

/// Step 2: zero every register except the capture temporaries and the stack
/// pointer.
#[must_use]
pub fn sanitize<A: Architecture>(registers: A::File) -> A::File {
    let mut clean = A::File::zeroed();
    for reg in A::CAPTURE.iter().chain(core::iter::once(&A::STACK_POINTER)) {
        clean.set(*reg, registers.get(*reg));
    }
    clean
}

/// Step 3: point the stack pointer at the initial frame on `stack`.
///
/// # Errors
/// If `stack` cannot hold the architecture's initial frame.
pub fn establish_stack<A: Architecture>(
    registers: A::File,
    stack: &StackRegion,
) -> Result<A::File, StackError> {
    let pointer = stack.initial_pointer(A::STACK)?;
    trace!("{}: stack pointer {pointer:#x}", A::NAME);
    Ok(registers.with(A::STACK_POINTER, pointer))
}

/// Step 4: move the arguments from the capture temporaries into the call
/// argument registers.
///
/// Temporaries that are not themselves call argument registers end up zero.
#[must_use]
pub fn reload_arguments<A: Architecture>(registers: A::File) -> A::File {
    let args = BootArgs::read(&registers, A::CAPTURE);
    let mut file = registers;
    for reg in A::CAPTURE {
        if !A::CALL_ARGUMENTS.contains(reg) {
            file.set(*reg, 0);
        }
    }
    args.write(file, A::CALL_ARGUMENTS)
}

/// Steps 1–4 on an entry state that has already been admitted.
fn normalize<A: Architecture>(
    entry: EntryState<A::File>,
    stack: &StackRegion,
) -> Result<Handoff<A::File>, EntryFault> {
    let registers = sanitize::<A>(capture::<A>(entry.registers));
    let registers = reload_arguments::<A>(establish_stack::<A>(registers, stack)?);
    Ok(Handoff {
        registers,
        arguments: BootArgs::read(&registers, A::CALL_ARGUMENTS),
    })
}

/// Admits `entry` and runs steps 1–4, producing the state the kernel sees.
///
/// # Errors
/// If the entry state is not admitted or the stack is unusable.
pub fn hand_off<A: Architecture>(
    entry: EntryState<A::File>,
    stack: &StackRegion,
) -> Result<Handoff<A::File>, EntryFault> {
    A::admit(&entry)?;
    normalize::<A>(entry, stack)
}

/// Checks `handoff` against the canonical entry contract.
///
/// `firmware` holds the words the kernel must observe, as returned by
/// [`firmware_arguments`] for the entry state.
///
/// # Errors
/// On the first violated postcondition.
pub fn check_handoff<A: Architecture>(
    handoff: &Handoff<A::File>,
    stack: &StackRegion,
    firmware: &BootArgs,
) -> Result<(), HandoffViolation> {
    let registers = &handoff.registers;
    let used = &A::CALL_ARGUMENTS[..firmware.len().min(A::CALL_ARGUMENTS.len())];

    for (index, (reg, expected)) in used.iter().zip(firmware.as_slice()).enumerate() {
        let found = registers.get(*reg);
        if found != *expected {
            return Err(HandoffViolation::ArgumentMismatch {
                index,
                register: A::register_name(*reg),
                found,
                expected: *expected,
            });
        }
    }

    let pointer = registers.get(A::STACK_POINTER);
    if !stack.holds(pointer, A::STACK.bias) {
        return Err(HandoffViolation::StackOutOfRange { pointer });
    }
    if pointer.wrapping_add(A::STACK.bias as u64) % A::STACK.alignment as u64 != 0 {
        return Err(HandoffViolation::StackMisaligned {
            pointer,
            alignment: A::STACK.alignment,
        });
    }

    for reg in A::File::slots() {
        if reg == A::STACK_POINTER || used.contains(&reg) {
            continue;
        }
        let value = registers.get(reg);
        if value != 0 {
            return Err(HandoffViolation::DirtyRegister {
                register: A::register_name(reg),
                value,
            });
        }
    }

    Ok(())
}

/// Runs the complete entry sequence and never returns.
///
/// `mode` runs first, then [`Architecture::admit`], then steps 1–4; `kernel`
/// is entered with the resulting [`Handoff`]. Any failure, and any return
/// from `kernel`, ends in `halt` with the architecture's [`Architecture::IDLE`].
pub fn enter<A, M, K, H>(
    entry: EntryState<A::File>,
    stack: &StackRegion,
    mode: &mut M,
    kernel: &mut K,
    halt: H,
) -> !
where
    A: Architecture,
    M: ModeSwitch<A::File>,
    K: KernelEntry<A::File>,
    H: Halt,
{
    let prepared = mode
        .switch(&entry)
        .and_then(|()| hand_off::<A>(entry, stack));

    match prepared {
        Ok(handoff) => {
            debug!(
                "{}: entering kernel with {:x?}",
                A::NAME,
                handoff.arguments.as_slice()
            );
            kernel.enter(&handoff);
            warn!(
                "{}: kernel entry routine returned, parking on `{}`",
                A::NAME,
                A::IDLE.mnemonic()
            );
            halt.halt(A::IDLE, EntryFault::KernelReturned)
        }
        Err(fault) => {
            warn!(
                "{}: halting before kernel entry, parking on `{}`: {fault}",
                A::NAME,
                A::IDLE.mnemonic()
            );
            halt.halt(A::IDLE, fault)
        }
    }
}
