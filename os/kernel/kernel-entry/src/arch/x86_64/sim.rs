//! # Simulated x86-64 processor
//!
//! Just enough of an x86-64 processor to run the protected-mode → long-mode
//! preamble on the host and observe the result: CR0, CR3, CR4, EFER (with
//! the processor-owned `LMA` bit), GDTR, `CS`/`RIP`, the data selectors, the
//! interrupt flag, a handful of 4 KiB physical frames, and a 4-level page walk
//! that understands 1 GiB leaves.
//!
//! The architectural checks that matter for the mode switch raise a
//! [`CpuFault`]. The first fault stops the simulated processor: every later
//! operation is ignored, the way a triple fault would end a real boot.
//!
//! No allocation: memory is a fixed array of frames, claimed on first write.

use super::LongModeStatus;
use super::descriptors::{
    BootGdt, CodeSel, DataSel, DescriptorTablePointer, SegmentDescriptor, SegmentSelector,
};
use super::paging::{ENTRIES, Pdpte1G, Pml4Entry, table_index};
use super::preamble::ProtectedModeCpu;
use kernel_info::layout::{IDENTITY_MAP_BYTES, PAGE_SIZE};
use kernel_registers::cr0::Cr0;
use kernel_registers::cr3::Cr3;
use kernel_registers::cr4::Cr4;
use kernel_registers::efer::Efer;
use log::warn;
use thiserror::Error;

/// Number of physical frames the simulator can back.
pub const FRAMES: usize = 8;

/// An architectural fault (#GP or worse) the simulated processor detected.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Error)]
pub enum CpuFault {
    #[error("CR0.PG set without CR0.PE")]
    PagingWithoutProtection,

    #[error("paging enabled without CR4.PAE")]
    PagingWithoutPae,

    #[error("PAE paging enabled without EFER.LME; the PML4 would be read as PDPTEs")]
    PaePagingWithoutLongMode,

    #[error("EFER.LME changed while paging is enabled")]
    LongModeToggledWhilePaging,

    #[error("CR4.PAE cleared while long mode is active")]
    PaeClearedInLongMode,

    #[error("CR3 value {value:#x} sets reserved bits")]
    MisalignedRoot { value: u64 },

    #[error("segment load without a GDT")]
    NoDescriptorTable,

    #[error("selector {selector:#06x} lies beyond the GDT limit")]
    SelectorOutOfBounds { selector: u16 },

    #[error("selector {selector:#06x} does not reference a present code descriptor")]
    NotACodeSegment { selector: u16 },

    #[error("selector {selector:#06x} does not reference a present data descriptor")]
    NotADataSegment { selector: u16 },

    #[error("linear address {address:#x} is not mapped")]
    Unmapped { address: u64 },

    #[error("unaligned 64-bit access at {address:#x}")]
    UnalignedAccess { address: u64 },

    #[error("no free simulated frame for {address:#x}")]
    MemoryExhausted { address: u64 },
}

/// Execution mode, as derived from `CR0`, `EFER.LMA` and the `CS` descriptor.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum CpuMode {
    Protected32,
    /// Long mode active, 32-bit code segment.
    Compatibility,
    Long64,
}

const WORDS_PER_FRAME: usize = PAGE_SIZE / 8;
const FRAME_MASK: u64 = PAGE_SIZE as u64 - 1;

#[derive(Copy, Clone)]
struct Frame {
    base: Option<u64>,
    words: [u64; WORDS_PER_FRAME],
}

impl Frame {
    const EMPTY: Self = Self {
        base: None,
        words: [0; WORDS_PER_FRAME],
    };
}

/// Sparse physical memory; unbacked addresses read as zero.
struct PhysicalMemory {
    frames: [Frame; FRAMES],
    writes: usize,
}

impl PhysicalMemory {
    const fn new() -> Self {
        Self {
            frames: [Frame::EMPTY; FRAMES],
            writes: 0,
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    const fn word_index(address: u64) -> usize {
        ((address & FRAME_MASK) / 8) as usize
    }

    fn frame(&self, base: u64) -> Option<&Frame> {
        self.frames.iter().find(|frame| frame.base == Some(base))
    }

    fn read(&self, address: u64) -> u64 {
        self.frame(address & !FRAME_MASK)
            .map_or(0, |frame| frame.words[Self::word_index(address)])
    }

    fn write(&mut self, address: u64, value: u64) -> Result<(), CpuFault> {
        if address % 8 != 0 {
            return Err(CpuFault::UnalignedAccess { address });
        }
        let base = address & !FRAME_MASK;
        let slot = match self.frames.iter().position(|frame| frame.base == Some(base)) {
            Some(slot) => slot,
            None => self
                .frames
                .iter()
                .position(|frame| frame.base.is_none())
                .ok_or(CpuFault::MemoryExhausted { address })?,
        };
        let frame = &mut self.frames[slot];
        frame.base = Some(base);
        frame.words[Self::word_index(address)] = value;
        self.writes += 1;
        Ok(())
    }
}

/// A simulated processor as a Multiboot loader leaves it: 32-bit protected
/// mode, paging off, interrupts possibly enabled.
pub struct SimulatedCpu {
    cr0: Cr0,
    cr3: Cr3,
    cr4: Cr4,
    efer: Efer,
    gdtr: Option<DescriptorTablePointer>,
    cs: u16,
    rip: u64,
    data_selector: Option<u16>,
    mode: CpuMode,
    interrupts_enabled: bool,
    memory: PhysicalMemory,
    register_writes: usize,
    fault: Option<CpuFault>,
}

impl Default for SimulatedCpu {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedCpu {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cr0: Cr0::new().with_pe_protection_enable(true),
            cr3: Cr3::new(),
            cr4: Cr4::new(),
            efer: Efer::new(),
            gdtr: None,
            cs: 0x10,
            rip: 0,
            data_selector: None,
            mode: CpuMode::Protected32,
            interrupts_enabled: true,
            memory: PhysicalMemory::new(),
            register_writes: 0,
            fault: None,
        }
    }

    /// Replaces the firmware-provided CR4 (loaders may leave bits set).
    #[must_use]
    pub const fn with_cr4(mut self, cr4: Cr4) -> Self {
        self.cr4 = cr4;
        self
    }

    /// Copies `gdt` into simulated memory at `base`, as the image loader would.
    ///
    /// Does not count as a write performed by the code under test.
    ///
    /// # Errors
    /// If the simulated memory cannot back the table.
    pub fn place_gdt(&mut self, base: u64, gdt: &BootGdt) -> Result<(), CpuFault> {
        let mut address = base;
        for entry in &gdt.entries {
            self.memory.write(address, entry.into_bits())?;
            address += 8;
        }
        self.memory.writes = 0;
        Ok(())
    }

    /// Runs one state-changing operation unless the processor already faulted.
    fn step(&mut self, op: impl FnOnce(&mut Self) -> Result<(), CpuFault>) {
        if self.fault.is_some() {
            return;
        }
        self.register_writes += 1;
        if let Err(fault) = op(self) {
            warn!("simulated cpu: {fault}");
            self.fault = Some(fault);
        }
    }

    /// The physical address `linear` resolves to under the current paging mode.
    #[must_use]
    pub fn translate(&self, linear: u64) -> Option<u64> {
        if !self.cr0.pg_paging() {
            return (linear <= u64::from(u32::MAX)).then_some(linear);
        }
        if !self.efer.lma() || linear >> 47 != 0 {
            return None;
        }
        let root = self.cr3.root_phys();
        let pml4e = Pml4Entry::from_bits(self.memory.read(root + slot_offset(linear, 4)));
        let pdpt = pml4e.next_table()?;
        let raw = self.memory.read(pdpt + slot_offset(linear, 3));
        if !Pdpte1G::is_leaf(raw) {
            return None;
        }
        Some(Pdpte1G::from_bits(raw).frame() + (linear & (IDENTITY_MAP_BYTES - 1)))
    }

    fn descriptor(&self, offset: u64, selector: u16) -> Result<SegmentDescriptor, CpuFault> {
        let gdtr = self.gdtr.ok_or(CpuFault::NoDescriptorTable)?;
        if !gdtr.covers(offset) {
            return Err(CpuFault::SelectorOutOfBounds { selector });
        }
        let linear = gdtr.base + offset;
        let physical = self
            .translate(linear)
            .ok_or(CpuFault::Unmapped { address: linear })?;
        Ok(SegmentDescriptor::from_bits(self.memory.read(physical)))
    }

    fn apply_cr0(&mut self, value: Cr0) -> Result<(), CpuFault> {
        if value.pg_paging() && !value.pe_protection_enable() {
            return Err(CpuFault::PagingWithoutProtection);
        }
        let enabling_paging = value.pg_paging() && !self.cr0.pg_paging();
        if enabling_paging {
            if !self.cr4.pae() {
                return Err(CpuFault::PagingWithoutPae);
            }
            if !self.efer.lme() {
                return Err(CpuFault::PaePagingWithoutLongMode);
            }
            self.efer = self.efer.with_lma(true);
            self.mode = CpuMode::Compatibility;
        }
        self.cr0 = value;
        Ok(())
    }

    fn apply_cr4(&mut self, value: Cr4) -> Result<(), CpuFault> {
        if self.efer.lma() && !value.pae() {
            return Err(CpuFault::PaeClearedInLongMode);
        }
        self.cr4 = value;
        Ok(())
    }

    fn apply_cr3(&mut self, value: Cr3) -> Result<(), CpuFault> {
        if value.has_reserved_bits() {
            return Err(CpuFault::MisalignedRoot {
                value: value.into_bits(),
            });
        }
        self.cr3 = value;
        Ok(())
    }

    fn apply_efer(&mut self, value: Efer) -> Result<(), CpuFault> {
        if self.cr0.pg_paging() && value.lme() != self.efer.lme() {
            return Err(CpuFault::LongModeToggledWhilePaging);
        }
        self.efer = value.with_lma(self.efer.lma());
        Ok(())
    }

    fn apply_far_transfer(
        &mut self,
        code: SegmentSelector<CodeSel>,
        entry: u64,
    ) -> Result<(), CpuFault> {
        let selector = code.to_u16();
        let descriptor = self.descriptor(code.table_offset(), selector)?;
        if !descriptor.is_code() {
            return Err(CpuFault::NotACodeSegment { selector });
        }
        if self.translate(entry).is_none() {
            return Err(CpuFault::Unmapped { address: entry });
        }
        self.mode = match (self.efer.lma(), descriptor.is_long_code()) {
            (true, true) => CpuMode::Long64,
            (true, false) => CpuMode::Compatibility,
            (false, _) => CpuMode::Protected32,
        };
        self.cs = selector;
        self.rip = entry;
        Ok(())
    }

    fn apply_data_segments(&mut self, data: SegmentSelector<DataSel>) -> Result<(), CpuFault> {
        let selector = data.to_u16();
        if !self.descriptor(data.table_offset(), selector)?.is_data() {
            return Err(CpuFault::NotADataSegment { selector });
        }
        self.data_selector = Some(selector);
        Ok(())
    }

    #[must_use]
    pub const fn mode(&self) -> CpuMode {
        self.mode
    }

    #[must_use]
    pub const fn code_selector(&self) -> u16 {
        self.cs
    }

    #[must_use]
    pub const fn instruction_pointer(&self) -> u64 {
        self.rip
    }

    /// Selector in `DS`/`ES`/`FS`/`GS`/`SS`, once the code under test loaded one.
    #[must_use]
    pub const fn data_selector(&self) -> Option<u16> {
        self.data_selector
    }

    #[must_use]
    pub const fn gdtr(&self) -> Option<DescriptorTablePointer> {
        self.gdtr
    }

    #[must_use]
    pub const fn cr3(&self) -> Cr3 {
        self.cr3
    }

    #[must_use]
    pub const fn interrupts_enabled(&self) -> bool {
        self.interrupts_enabled
    }

    #[must_use]
    pub const fn fault(&self) -> Option<CpuFault> {
        self.fault
    }

    /// Memory stores performed by the code under test.
    #[must_use]
    pub const fn memory_writes(&self) -> usize {
        self.memory.writes
    }

    /// Register, descriptor-table and memory writes performed by the code
    /// under test (`cli` excluded).
    #[must_use]
    pub const fn register_writes(&self) -> usize {
        self.register_writes
    }

    /// The 64-bit word at physical `address`.
    #[must_use]
    pub fn read_physical(&self, address: u64) -> u64 {
        self.memory.read(address)
    }

    /// The entries of the table at physical `base`, if any were written.
    #[must_use]
    pub fn table(&self, base: u64) -> Option<&[u64; ENTRIES]> {
        self.memory.frame(base).map(|frame| &frame.words)
    }

    /// Control registers as [`long_mode_status`](super::long_mode_status) reads them on target.
    #[must_use]
    pub const fn status(&self) -> LongModeStatus {
        LongModeStatus {
            cr0: self.cr0,
            cr4: self.cr4,
            efer: self.efer,
        }
    }
}

const fn slot_offset(linear: u64, level: u32) -> u64 {
    table_index(linear, level) as u64 * 8
}

impl ProtectedModeCpu for SimulatedCpu {
    fn disable_interrupts(&mut self) {
        if self.fault.is_none() {
            self.interrupts_enabled = false;
        }
    }

    fn write_physical(&mut self, address: u64, value: u64) {
        self.step(|cpu| cpu.memory.write(address, value));
    }

    fn cr0(&self) -> Cr0 {
        self.cr0
    }

    fn write_cr0(&mut self, value: Cr0) {
        self.step(|cpu| cpu.apply_cr0(value));
    }

    fn cr4(&self) -> Cr4 {
        self.cr4
    }

    fn write_cr4(&mut self, value: Cr4) {
        self.step(|cpu| cpu.apply_cr4(value));
    }

    fn write_cr3(&mut self, value: Cr3) {
        self.step(|cpu| cpu.apply_cr3(value));
    }

    fn efer(&self) -> Efer {
        self.efer
    }

    fn write_efer(&mut self, value: Efer) {
        self.step(|cpu| cpu.apply_efer(value));
    }

    fn load_gdt(&mut self, pointer: DescriptorTablePointer) {
        self.step(|cpu| {
            cpu.gdtr = Some(pointer);
            Ok(())
        });
    }

    fn far_transfer(&mut self, code: SegmentSelector<CodeSel>, entry: u64) {
        self.step(|cpu| cpu.apply_far_transfer(code, entry));
    }

    fn load_data_segments(&mut self, data: SegmentSelector<DataSel>) {
        self.step(|cpu| cpu.apply_data_segments(data));
    }
}
