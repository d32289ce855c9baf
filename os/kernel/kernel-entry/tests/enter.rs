use kernel_entry::arch::aarch64::{self, Aarch64};
use kernel_entry::arch::riscv64::Riscv64;
use kernel_entry::arch::x86_64::descriptors::BootGdt;
use kernel_entry::arch::x86_64::preamble::{EXPECTED_MAGIC, LongModePreamble, PreambleLayout};
use kernel_entry::arch::x86_64::sim::{CpuMode, SimulatedCpu};
use kernel_entry::arch::x86_64::{RAX, RBX, RDI, RSI, X86_64};
use kernel_entry::contract::{
    KernelEntry, ModeSwitch, NativeMode, check_handoff, enter, firmware_arguments,
};
use kernel_entry::halt::{Halt, Idle};
use kernel_entry::stack::BOOT_STACK_SIZE;
use kernel_entry::{
    Architecture, BootArgs, EntryFault, EntryState, Handoff, RegisterFile, Registers, StackRegion,
};
use std::panic::{self, AssertUnwindSafe};

const STACK: StackRegion = StackRegion::new(0x0020_0000, BOOT_STACK_SIZE);

const LAYOUT: PreambleLayout = PreambleLayout {
    root_table: 0x0010_1000,
    second_table: 0x0010_2000,
    gdt: 0x0010_3000,
    long_mode_entry: 0x0010_0400,
};

/// How a run of [`enter`] ended.
#[derive(Debug, PartialEq, Eq)]
struct Halted {
    idle: Idle,
    reason: EntryFault,
}

/// Unwinds with [`Halted`] so a test can observe a divergent path.
struct Unwind;

impl Halt for Unwind {
    fn halt(self, idle: Idle, reason: EntryFault) -> ! {
        panic::panic_any(Halted { idle, reason })
    }
}

/// Runs [`enter`] and returns how it halted.
fn halted<A, M, K>(entry: EntryState<A::File>, mode: &mut M, kernel: &mut K) -> Halted
where
    A: Architecture,
    M: ModeSwitch<A::File>,
    K: KernelEntry<A::File>,
{
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        enter::<A, _, _, _>(entry, &STACK, mode, kernel, Unwind);
    }));
    let payload = outcome.expect_err("enter never returns");
    *payload.downcast::<Halted>().expect("halted through `Halt`")
}

#[test]
fn returning_kernel_is_parked() {
    let file = Registers::<32>::from_words([0x5A; 32]);
    let firmware = firmware_arguments::<Riscv64>(&file);
    let mut calls = 0;
    let mut kernel = |handoff: &Handoff<Registers<32>>| {
        calls += 1;
        assert_eq!(check_handoff::<Riscv64>(handoff, &STACK, &firmware), Ok(()));
    };

    let entry = EntryState::new(file, 0);
    let outcome = halted::<Riscv64, _, _>(entry, &mut NativeMode, &mut kernel);

    assert_eq!(
        outcome,
        Halted {
            idle: Idle::WaitForInterrupt,
            reason: EntryFault::KernelReturned
        }
    );
    assert_eq!(calls, 1);
}

#[test]
fn wrong_exception_level_never_reaches_the_kernel() {
    let file = Registers::<32>::zeroed();
    let mut calls = 0;
    let mut kernel = |_: &Handoff<Registers<32>>| calls += 1;

    let entry = EntryState::new(file, 0);
    let outcome = halted::<Aarch64, _, _>(entry, &mut NativeMode, &mut kernel);

    assert_eq!(outcome.idle, Aarch64::IDLE);
    assert_eq!(
        outcome.reason,
        EntryFault::PrivilegeViolation {
            current: 0,
            expected: aarch64::EXPECTED_EXCEPTION_LEVEL
        }
    );
    assert_eq!(calls, 0);
}

fn loader_state(magic: u64, info: u64) -> EntryState<Registers<16>> {
    let file = Registers::<16>::from_words([0xCC; 16])
        .with(RAX, magic)
        .with(RBX, info);
    EntryState::new(file, 0)
}

fn loaded_cpu() -> SimulatedCpu {
    let mut cpu = SimulatedCpu::new();
    cpu.place_gdt(LAYOUT.gdt, &BootGdt::new()).expect("gdt fits");
    cpu
}

#[test]
fn x86_64_boots_through_the_preamble() {
    let mut cpu = loaded_cpu();
    let mut seen = None;
    let mut kernel = |handoff: &Handoff<Registers<16>>| seen = Some(handoff.arguments);

    let outcome = {
        let mut preamble = LongModePreamble::new(&mut cpu, LAYOUT);
        let entry = loader_state(u64::from(EXPECTED_MAGIC), 0x0009_5000);
        halted::<X86_64, _, _>(entry, &mut preamble, &mut kernel)
    };

    assert_eq!(outcome.reason, EntryFault::KernelReturned);
    assert_eq!(outcome.idle, Idle::Halt);
    assert_eq!(
        seen,
        Some(BootArgs::new(&[0x0009_5000, u64::from(EXPECTED_MAGIC)]))
    );
    assert_eq!(cpu.fault(), None);
    assert_eq!(cpu.mode(), CpuMode::Long64);
    assert!(cpu.status().is_long_mode());
    assert!(!cpu.interrupts_enabled());
}

#[test]
fn x86_64_bad_magic_halts_before_touching_anything() {
    let mut cpu = loaded_cpu();
    let mut calls = 0;
    let mut kernel = |_: &Handoff<Registers<16>>| calls += 1;

    let outcome = {
        let mut preamble = LongModePreamble::new(&mut cpu, LAYOUT);
        let entry = loader_state(0x1BAD_F00D, 0x0009_5000);
        halted::<X86_64, _, _>(entry, &mut preamble, &mut kernel)
    };

    assert_eq!(outcome.idle, Idle::Halt);
    assert_eq!(
        outcome.reason,
        EntryFault::ProtocolViolation {
            found: 0x1BAD_F00D,
            expected: EXPECTED_MAGIC
        }
    );
    assert_eq!(calls, 0);
    assert!(!cpu.interrupts_enabled());
    assert_eq!(cpu.register_writes(), 0);
    assert_eq!(cpu.memory_writes(), 0);
    assert!(cpu.table(LAYOUT.root_table).is_none());
    assert_eq!(cpu.mode(), CpuMode::Protected32);
}

#[test]
fn x86_64_kernel_sees_zero_extended_boot_words() {
    let mut cpu = loaded_cpu();
    let mut seen = None;
    let mut kernel = |handoff: &Handoff<Registers<16>>| {
        seen = Some((handoff.registers.get(RDI), handoff.registers.get(RSI)));
    };

    let outcome = {
        let mut preamble = LongModePreamble::new(&mut cpu, LAYOUT);
        let magic = 0xFFFF_FFFF_0000_0000 | u64::from(EXPECTED_MAGIC);
        let entry = loader_state(magic, 0xDEAD_BEEF_0009_5000);
        halted::<X86_64, _, _>(entry, &mut preamble, &mut kernel)
    };

    assert_eq!(outcome.reason, EntryFault::KernelReturned);
    assert_eq!(seen, Some((0x0009_5000, u64::from(EXPECTED_MAGIC))));
}
