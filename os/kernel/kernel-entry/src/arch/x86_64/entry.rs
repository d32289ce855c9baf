//! On-target x86-64 entry: the 32-bit preamble and the 64-bit contract.

use super::descriptors::{BOOT_GDT_POINTER, CODE64_SELECTOR, DATA_SELECTOR};
use super::paging::{BOOT_PDPT, BOOT_PML4, Pdpte1G, Pml4Entry};
use super::preamble::EXPECTED_MAGIC;
use super::STACK_OFFSET;
use crate::arch::kernel_main;
use crate::stack::BOOT_STACK;
use core::arch::{global_asm, naked_asm};
use kernel_registers::cr0::Cr0;
use kernel_registers::cr4::Cr4;
use kernel_registers::efer::Efer;

// Protected mode, paging off, EAX = loader magic, EBX = boot information.
global_asm!(
    ".pushsection .boot.text32, \"ax\"",
    ".code32",
    ".global _start",
    "_start:",
    "cli",
    // Capture before S1-S6 clobber EAX/ECX/EDX.
    "mov edi, ebx",
    "mov esi, eax",
    // S0
    "cmp esi, {magic}",
    "jne 3f",
    // S1
    "mov eax, offset {pdpt}",
    "or eax, {table_flags}",
    "mov dword ptr [{pml4}], eax",
    "mov dword ptr [{pml4} + 4], 0",
    "mov dword ptr [{pdpt}], {leaf}",
    "mov dword ptr [{pdpt} + 4], 0",
    // S2
    "mov eax, cr4",
    "or eax, {pae}",
    "mov cr4, eax",
    // S3
    "mov eax, offset {pml4}",
    "mov cr3, eax",
    // S6 precedes S4: LME cannot change while paging is on.
    "mov ecx, {efer_msr}",
    "rdmsr",
    "or eax, {lme}",
    "wrmsr",
    // S4
    "mov eax, cr0",
    "or eax, {pe_pg}",
    "mov cr0, eax",
    // S5
    "lgdt [{gdtr}]",
    // S7
    "mov esp, offset {stack}",
    "add esp, {stack_offset}",
    "push {code64}",
    "push offset {long_mode_entry}",
    "retf",
    "3:",
    "cli",
    "hlt",
    "jmp 3b",
    ".code64",
    ".popsection",
    magic = const EXPECTED_MAGIC,
    pml4 = sym BOOT_PML4,
    pdpt = sym BOOT_PDPT,
    table_flags = const Pml4Entry::pointing_to(0).into_bits(),
    leaf = const Pdpte1G::IDENTITY_FIRST_GIB.into_bits(),
    pae = const Cr4::PHYSICAL_ADDRESS_EXTENSION.into_bits(),
    efer_msr = const Efer::MSR_EFER,
    lme = const Efer::LONG_MODE_ENABLE.into_bits(),
    pe_pg = const Cr0::PROTECTED_PAGING.into_bits(),
    gdtr = sym BOOT_GDT_POINTER,
    stack = sym BOOT_STACK,
    stack_offset = const STACK_OFFSET,
    code64 = const CODE64_SELECTOR.to_u16(),
    long_mode_entry = sym long_mode_entry,
);

/// First 64-bit instruction; reached through the far return above with
/// `EDI`/`ESI` still holding the captured boot words.
#[unsafe(naked)]
unsafe extern "C" fn long_mode_entry() -> ! {
    naked_asm!(
        // S8
        "mov ax, {data}",
        "mov ds, ax",
        "mov es, ax",
        "mov fs, ax",
        "mov gs, ax",
        "mov ss, ax",
        // Upper halves are undefined across the mode switch.
        "mov edi, edi",
        "mov esi, esi",
        // Sanitize.
        "xor eax, eax",
        "xor ecx, ecx",
        "xor edx, edx",
        "xor ebx, ebx",
        "xor ebp, ebp",
        "xor r8d, r8d",
        "xor r9d, r9d",
        "xor r10d, r10d",
        "xor r11d, r11d",
        "xor r12d, r12d",
        "xor r13d, r13d",
        "xor r14d, r14d",
        "xor r15d, r15d",
        // Stack.
        "lea rsp, [rip + {stack}]",
        "add rsp, {stack_offset}",
        // RDI/RSI are already the argument registers.
        "call {kernel_main}",
        "2:",
        "cli",
        "hlt",
        "jmp 2b",
        data = const DATA_SELECTOR.to_u16(),
        stack = sym BOOT_STACK,
        stack_offset = const STACK_OFFSET,
        kernel_main = sym kernel_main,
    )
}
