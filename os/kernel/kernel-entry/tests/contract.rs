use kernel_entry::arch::aarch64::{self, Aarch64};
use kernel_entry::arch::loongarch64::LoongArch64;
use kernel_entry::arch::mips64::Mips64;
use kernel_entry::arch::powerpc64::PowerPc64;
use kernel_entry::arch::riscv64::{self, Riscv64};
use kernel_entry::arch::sparc64::Sparc64;
use kernel_entry::arch::x86_64::X86_64;
use kernel_entry::contract::{
    capture, check_handoff, establish_stack, firmware_arguments, hand_off, reload_arguments,
    sanitize,
};
use kernel_entry::stack::BOOT_STACK_SIZE;
use kernel_entry::{
    Architecture, BootArgs, EntryFault, EntryState, HandoffViolation, RegisterFile, StackError,
    StackRegion,
};

const STACK: StackRegion = StackRegion::new(0x8000_0000, BOOT_STACK_SIZE);

/// Every slot holds a distinct, recognizable non-zero word.
fn dirty_file<A: Architecture>() -> A::File {
    let mut file = A::File::zeroed();
    for reg in A::File::slots() {
        file.set(reg, 0xDEAD_0000_0000_0000 | ((reg.index() as u64 + 1) * 0x0101));
    }
    file
}

fn expected_level<A: Architecture>() -> u8 {
    if A::NAME == Aarch64::NAME {
        aarch64::EXPECTED_EXCEPTION_LEVEL
    } else {
        0
    }
}

fn assert_contract<A: Architecture>() {
    let file = dirty_file::<A>();
    let firmware = firmware_arguments::<A>(&file);
    let entry = EntryState::new(file, expected_level::<A>());

    let handoff = hand_off::<A>(entry, &STACK).expect("entry admitted");
    assert_eq!(check_handoff::<A>(&handoff, &STACK, &firmware), Ok(()), "{}", A::NAME);
    assert_eq!(handoff.arguments, firmware, "{}", A::NAME);

    if let Some(link) = A::LINK_REGISTER {
        assert_eq!(handoff.registers.get(link), 0, "{} link register", A::NAME);
    }
    for reg in A::CAPTURE {
        if !A::CALL_ARGUMENTS.contains(reg) {
            assert_eq!(handoff.registers.get(*reg), 0, "{} temporary", A::NAME);
        }
    }
}

#[test]
fn every_backend_meets_the_contract() {
    assert_contract::<X86_64>();
    assert_contract::<Aarch64>();
    assert_contract::<Riscv64>();
    assert_contract::<PowerPc64>();
    assert_contract::<Mips64>();
    assert_contract::<LoongArch64>();
    assert_contract::<Sparc64>();
}

fn assert_roles_are_consistent<A: Architecture>() {
    assert_eq!(A::BOOT_ARGUMENTS.len(), A::CAPTURE.len(), "{}", A::NAME);
    assert_eq!(A::CAPTURE.len(), A::CALL_ARGUMENTS.len(), "{}", A::NAME);
    assert_eq!(A::REGISTER_NAMES.len(), A::File::SLOTS, "{}", A::NAME);
    assert!(!A::CAPTURE.contains(&A::STACK_POINTER), "{}", A::NAME);
    if let Some(link) = A::LINK_REGISTER {
        assert!(!A::CAPTURE.contains(&link), "{}", A::NAME);
    }
    assert!(A::STACK.fits(BOOT_STACK_SIZE), "{}", A::NAME);
}

#[test]
fn register_roles_are_consistent() {
    assert_roles_are_consistent::<X86_64>();
    assert_roles_are_consistent::<Aarch64>();
    assert_roles_are_consistent::<Riscv64>();
    assert_roles_are_consistent::<PowerPc64>();
    assert_roles_are_consistent::<Mips64>();
    assert_roles_are_consistent::<LoongArch64>();
    assert_roles_are_consistent::<Sparc64>();
}

#[test]
fn extreme_argument_values_pass_through() {
    for word in [0, u64::MAX, 0x8000_0000_0000_0000] {
        let mut file = <Riscv64 as Architecture>::File::zeroed();
        for reg in Riscv64::BOOT_ARGUMENTS {
            file.set(*reg, word);
        }
        let firmware = BootArgs::new(&[word, word, word]);
        let handoff = hand_off::<Riscv64>(EntryState::new(file, 0), &STACK).expect("admitted");
        assert_eq!(check_handoff::<Riscv64>(&handoff, &STACK, &firmware), Ok(()));
    }
}

#[test]
fn x86_64_forwards_only_the_protected_mode_halves() {
    let file = dirty_file::<X86_64>();
    let handoff = hand_off::<X86_64>(EntryState::new(file, 0), &STACK).expect("admitted");

    let info = file.get(X86_64::BOOT_ARGUMENTS[0]);
    let magic = file.get(X86_64::BOOT_ARGUMENTS[1]);
    assert_ne!(info >> 32, 0);
    assert_eq!(
        handoff.arguments.as_slice(),
        &[info & 0xFFFF_FFFF, magic & 0xFFFF_FFFF]
    );
    let full_width = BootArgs::read(&file, X86_64::BOOT_ARGUMENTS);
    assert_eq!(
        check_handoff::<X86_64>(&handoff, &STACK, &full_width),
        Err(HandoffViolation::ArgumentMismatch {
            index: 0,
            register: "rdi",
            found: info & 0xFFFF_FFFF,
            expected: info,
        })
    );
}

#[test]
fn steps_compose_one_at_a_time() {
    let file = dirty_file::<Riscv64>();
    let a0 = file.get(riscv64::A0);

    let captured = capture::<Riscv64>(file);
    assert_eq!(captured.get(riscv64::S1), a0);

    let clean = sanitize::<Riscv64>(captured);
    let live: Vec<_> = clean.nonzero().map(|(reg, _)| reg).collect();
    assert_eq!(
        live,
        vec![riscv64::SP, riscv64::S1, riscv64::S2, riscv64::S3]
    );

    let stacked = establish_stack::<Riscv64>(clean, &STACK).expect("usable stack");
    assert_eq!(stacked.get(riscv64::SP), STACK.top());

    let reloaded = reload_arguments::<Riscv64>(stacked);
    assert_eq!(reloaded.get(riscv64::A0), a0);
    assert_eq!(reloaded.get(riscv64::S1), 0);
}

#[test]
fn sparc_stack_pointer_carries_the_bias() {
    let handoff = hand_off::<Sparc64>(EntryState::new(dirty_file::<Sparc64>(), 0), &STACK)
        .expect("admitted");
    let sp = handoff.registers.get(Sparc64::STACK_POINTER);
    assert_eq!(sp, STACK.top() - 176 - 2047);
    assert_eq!(sp % 2, 1);
}

#[test]
fn powerpc_leaves_the_minimum_frame_above_the_stack_pointer() {
    let handoff = hand_off::<PowerPc64>(EntryState::new(dirty_file::<PowerPc64>(), 0), &STACK)
        .expect("admitted");
    assert_eq!(
        handoff.registers.get(PowerPc64::STACK_POINTER),
        STACK.top() - 32
    );
}

#[test]
fn wrong_exception_level_is_refused_before_capture() {
    let entry = EntryState::new(dirty_file::<Aarch64>(), 3);
    assert_eq!(
        hand_off::<Aarch64>(entry, &STACK),
        Err(EntryFault::PrivilegeViolation {
            current: 3,
            expected: aarch64::EXPECTED_EXCEPTION_LEVEL
        })
    );
}

#[test]
fn unusable_stack_is_reported() {
    let misaligned = StackRegion::new(0x8000_0004, BOOT_STACK_SIZE);
    let entry = EntryState::new(dirty_file::<Mips64>(), 0);
    assert_eq!(
        hand_off::<Mips64>(entry, &misaligned),
        Err(EntryFault::Stack(StackError::Misaligned {
            base: 0x8000_0004,
            alignment: 16
        }))
    );
}

#[test]
fn check_flags_a_live_link_register() {
    let file = dirty_file::<Aarch64>();
    let firmware = firmware_arguments::<Aarch64>(&file);
    let mut handoff = hand_off::<Aarch64>(
        EntryState::new(file, aarch64::EXPECTED_EXCEPTION_LEVEL),
        &STACK,
    )
    .expect("admitted");
    handoff.registers.set(aarch64::LR, 0x4008_1234);

    assert_eq!(
        check_handoff::<Aarch64>(&handoff, &STACK, &firmware),
        Err(HandoffViolation::DirtyRegister {
            register: "x30",
            value: 0x4008_1234
        })
    );
}

#[test]
fn check_flags_a_changed_argument() {
    let file = dirty_file::<LoongArch64>();
    let firmware = firmware_arguments::<LoongArch64>(&file);
    let mut handoff = hand_off::<LoongArch64>(EntryState::new(file, 0), &STACK).expect("admitted");
    let a1 = LoongArch64::CALL_ARGUMENTS[1];
    handoff.registers.set(a1, 7);

    assert_eq!(
        check_handoff::<LoongArch64>(&handoff, &STACK, &firmware),
        Err(HandoffViolation::ArgumentMismatch {
            index: 1,
            register: "$a1",
            found: 7,
            expected: firmware.get(1).expect("three arguments"),
        })
    );
}

#[test]
fn check_flags_a_foreign_stack_pointer() {
    let file = dirty_file::<X86_64>();
    let firmware = firmware_arguments::<X86_64>(&file);
    let mut handoff = hand_off::<X86_64>(EntryState::new(file, 0), &STACK).expect("admitted");
    handoff.registers.set(X86_64::STACK_POINTER, 0x10);

    assert_eq!(
        check_handoff::<X86_64>(&handoff, &STACK, &firmware),
        Err(HandoffViolation::StackOutOfRange { pointer: 0x10 })
    );
}
