use kernel_entry::EntryFault;
use kernel_entry::arch::x86_64::descriptors::{BootGdt, CODE64_SELECTOR, DATA_SELECTOR};
use kernel_entry::arch::x86_64::paging::ENTRIES;
use kernel_entry::arch::x86_64::preamble::{self, EXPECTED_MAGIC, LongModeSwitch, PreambleLayout};
use kernel_entry::arch::x86_64::sim::{CpuMode, SimulatedCpu};
use kernel_registers::cr4::Cr4;

const LAYOUT: PreambleLayout = PreambleLayout {
    root_table: 0x0010_1000,
    second_table: 0x0010_2000,
    gdt: 0x0010_3000,
    long_mode_entry: 0x0010_0400,
};

fn loaded_cpu() -> SimulatedCpu {
    let mut cpu = SimulatedCpu::new();
    cpu.place_gdt(LAYOUT.gdt, &BootGdt::new()).expect("gdt fits");
    cpu
}

/// Indices of the non-zero entries of a table.
fn populated(table: &[u64; ENTRIES]) -> Vec<(usize, u64)> {
    table
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, entry)| *entry != 0)
        .collect()
}

#[test]
fn reaches_64_bit_code_through_the_boot_gdt() {
    let mut cpu = loaded_cpu();
    preamble::run(&mut cpu, LAYOUT, EXPECTED_MAGIC).expect("magic accepted");

    assert_eq!(cpu.fault(), None);
    assert_eq!(cpu.mode(), CpuMode::Long64);
    assert_eq!(cpu.code_selector(), CODE64_SELECTOR.to_u16());
    assert_eq!(cpu.code_selector(), 0x08);
    assert_eq!(cpu.instruction_pointer(), LAYOUT.long_mode_entry);
    assert_eq!(cpu.data_selector(), Some(DATA_SELECTOR.to_u16()));
    assert_eq!(cpu.cr3().root_phys(), LAYOUT.root_table);
    assert_eq!(cpu.gdtr().map(|gdtr| gdtr.base), Some(LAYOUT.gdt));
}

#[test]
fn identity_map_has_one_entry_per_level() {
    let mut cpu = loaded_cpu();
    preamble::run(&mut cpu, LAYOUT, EXPECTED_MAGIC).expect("magic accepted");

    let root = cpu.table(LAYOUT.root_table).expect("root table written");
    assert_eq!(populated(root), vec![(0, LAYOUT.second_table | 0x3)]);

    let second = cpu.table(LAYOUT.second_table).expect("second table written");
    assert_eq!(populated(second), vec![(0, 0x83)]);

    for address in [0, LAYOUT.long_mode_entry, LAYOUT.gdt, 0x3FFF_F000] {
        assert_eq!(cpu.translate(address), Some(address));
    }
    assert_eq!(cpu.translate(0x4000_0000), None);
}

#[test]
fn paging_state_after_enabling_paging() {
    let mut cpu = loaded_cpu();
    let switch = LongModeSwitch::begin(&mut cpu, LAYOUT)
        .confirm_protocol(EXPECTED_MAGIC)
        .expect("magic accepted")
        .build_identity_map()
        .enable_address_extension()
        .install_page_tables()
        .arm_long_mode()
        .enable_paging();

    let status = switch.cpu().status();
    assert!(status.cr0.pe_protection_enable());
    assert!(status.cr0.pg_paging());
    assert!(status.cr4.pae());
    assert!(status.efer.lma());
    assert_eq!(switch.cpu().mode(), CpuMode::Compatibility);
}

#[test]
fn firmware_cr4_bits_survive() {
    let firmware = Cr4::new().with_osfxsr(true).with_pse(true);
    let mut cpu = SimulatedCpu::new().with_cr4(firmware);
    cpu.place_gdt(LAYOUT.gdt, &BootGdt::new()).expect("gdt fits");
    preamble::run(&mut cpu, LAYOUT, EXPECTED_MAGIC).expect("magic accepted");

    let cr4 = cpu.status().cr4;
    assert!(cr4.pae());
    assert!(cr4.osfxsr());
    assert!(cr4.pse());
}

#[test]
fn foreign_protocol_magic_is_rejected() {
    let other = if EXPECTED_MAGIC == 0x36D7_6289 {
        0x2BAD_B002
    } else {
        0x36D7_6289
    };
    let mut cpu = loaded_cpu();
    assert_eq!(
        preamble::run(&mut cpu, LAYOUT, other),
        Err(EntryFault::ProtocolViolation {
            found: other,
            expected: EXPECTED_MAGIC
        })
    );
    assert!(!cpu.interrupts_enabled());
    assert_eq!(cpu.memory_writes(), 0);
    assert!(!cpu.status().cr0.pg_paging());
}
