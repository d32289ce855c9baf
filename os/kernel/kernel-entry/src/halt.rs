//! Parking the processor.
//!
//! Every way out of the entry layer other than a running kernel ends here:
//! a rejected boot protocol, the wrong privilege level, or `kernel_main`
//! returning. The processor spins in its cheapest wait state forever.

use crate::error::EntryFault;

/// Something that can stop execution for good.
///
/// On target this is the idle loop repeating `idle`; the host model
/// substitutes an implementation that records both arguments and unwinds.
pub trait Halt {
    fn halt(self, idle: Idle, reason: EntryFault) -> !;
}

/// The wait instruction an architecture's idle loop repeats.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Idle {
    /// `cli; hlt`: masked interrupts cannot resume execution.
    Halt,
    /// `wfi`
    WaitForInterrupt,
    /// MIPS `wait`
    Wait,
    /// LoongArch `idle 0`
    IdleLevel0,
    /// No low-power wait is architecturally safe; spin on `nop`.
    Spin,
}

impl Idle {
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Halt => "hlt",
            Self::WaitForInterrupt => "wfi",
            Self::Wait => "wait",
            Self::IdleLevel0 => "idle 0",
            Self::Spin => "nop",
        }
    }
}

/// Parks the current processor forever.
///
/// Used by the entry routines after `kernel_main` returns and by the kernel's
/// panic handler.
pub fn park() -> ! {
    loop {
        idle_once();
    }
}

#[cfg(all(feature = "entry", target_os = "none", target_arch = "x86_64"))]
#[inline(always)]
fn idle_once() {
    unsafe { core::arch::asm!("cli", "hlt", options(nomem, nostack)) }
}

#[cfg(all(
    feature = "entry",
    target_os = "none",
    any(target_arch = "aarch64", target_arch = "riscv64")
))]
#[inline(always)]
fn idle_once() {
    unsafe { core::arch::asm!("wfi", options(nomem, nostack)) }
}

#[cfg(all(feature = "entry", target_os = "none", target_arch = "mips64"))]
#[inline(always)]
fn idle_once() {
    unsafe { core::arch::asm!("wait", options(nomem, nostack)) }
}

#[cfg(all(feature = "entry", target_os = "none", target_arch = "loongarch64"))]
#[inline(always)]
fn idle_once() {
    unsafe { core::arch::asm!("idle 0", options(nomem, nostack)) }
}

#[cfg(all(
    feature = "entry",
    target_os = "none",
    any(target_arch = "powerpc64", target_arch = "sparc64")
))]
#[inline(always)]
fn idle_once() {
    unsafe { core::arch::asm!("nop", options(nomem, nostack)) }
}

#[cfg(not(all(
    feature = "entry",
    target_os = "none",
    any(
        target_arch = "x86_64",
        target_arch = "aarch64",
        target_arch = "riscv64",
        target_arch = "mips64",
        target_arch = "loongarch64",
        target_arch = "powerpc64",
        target_arch = "sparc64"
    )
)))]
#[inline(always)]
fn idle_once() {
    core::hint::spin_loop();
}
