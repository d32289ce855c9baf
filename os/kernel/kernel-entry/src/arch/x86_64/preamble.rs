//! # Protected mode → long mode
//!
//! A Multiboot loader hands over in 32-bit protected mode with paging off.
//! Before the entry contract can run, the processor has to be walked into
//! 64-bit long mode. The walk is a fixed sequence of states; each one is a
//! type parameter of [`LongModeSwitch`], so the sequence cannot be reordered
//! or skipped:
//!
//! ```text
//!  Protected ──magic ok──► ProtocolConfirmed ──► IdentityMapped ──► AddressExtended
//!      │                                                                   │
//!      └──magic bad──► halt                                                ▼
//!  Ready ◄── Long64 ◄── DescriptorsLoaded ◄── PagingEnabled ◄── LongModeArmed ◄── TablesInstalled
//! ```
//!
//! `EFER.LME` is armed *before* `CR0.PG` is set: the processor refuses to
//! toggle `LME` while paging is on, and it only activates long mode (sets
//! `EFER.LMA`) when paging is enabled with `LME` already armed.
//!
//! Interrupts are masked on the very first instruction and stay masked: no
//! IDT exists until the kernel installs one.
//!
//! The same sequence is emitted as assembly by the on-target entry routine;
//! this module drives it against any [`ProtectedModeCpu`], in particular the
//! [`SimulatedCpu`](super::sim::SimulatedCpu).

use super::RAX;
use super::descriptors::{
    BootGdt, CODE64_SELECTOR, CodeSel, DATA_SELECTOR, DataSel, DescriptorTablePointer,
    SegmentSelector,
};
use super::paging::{Pdpte1G, Pml4Entry};
use crate::contract::{EntryState, ModeSwitch};
use crate::error::EntryFault;
use crate::registers::{RegisterFile, Registers};
use core::marker::PhantomData;
use kernel_info::protocol::{MULTIBOOT1_LOADER_MAGIC, MULTIBOOT2_LOADER_MAGIC};
use kernel_registers::cr0::Cr0;
use kernel_registers::cr3::Cr3;
use kernel_registers::cr4::Cr4;
use kernel_registers::efer::Efer;
use log::{debug, trace};

/// Loader magic expected in `EAX` at entry.
pub const EXPECTED_MAGIC: u32 = if cfg!(feature = "multiboot1") {
    MULTIBOOT1_LOADER_MAGIC
} else {
    MULTIBOOT2_LOADER_MAGIC
};

/// The processor operations the preamble performs, one per instruction (or
/// short instruction sequence) of the on-target routine.
pub trait ProtectedModeCpu {
    /// `cli`
    fn disable_interrupts(&mut self);

    /// A 64-bit store to a physical address (paging is off while it is used).
    fn write_physical(&mut self, address: u64, value: u64);

    fn cr0(&self) -> Cr0;
    fn write_cr0(&mut self, value: Cr0);

    fn cr4(&self) -> Cr4;
    fn write_cr4(&mut self, value: Cr4);

    fn write_cr3(&mut self, value: Cr3);

    /// `rdmsr` of `IA32_EFER`
    fn efer(&self) -> Efer;
    /// `wrmsr` of `IA32_EFER`
    fn write_efer(&mut self, value: Efer);

    /// `lgdt`
    fn load_gdt(&mut self, pointer: DescriptorTablePointer);

    /// Far transfer (`retf`/`ljmp`) to `entry` through `code`.
    fn far_transfer(&mut self, code: SegmentSelector<CodeSel>, entry: u64);

    /// Load `DS`, `ES`, `FS`, `GS` and `SS`.
    fn load_data_segments(&mut self, data: SegmentSelector<DataSel>);
}

/// Physical placement of what the preamble writes and jumps to.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct PreambleLayout {
    /// The PML4.
    pub root_table: u64,
    /// The PDPT holding the 1 GiB leaf.
    pub second_table: u64,
    /// The boot GDT.
    pub gdt: u64,
    /// First 64-bit instruction.
    pub long_mode_entry: u64,
}

impl PreambleLayout {
    #[must_use]
    pub const fn gdt_pointer(&self) -> DescriptorTablePointer {
        DescriptorTablePointer {
            limit: BootGdt::LIMIT,
            base: self.gdt,
        }
    }
}

/// State markers.
pub mod state {
    /// Interrupts masked, nothing else touched.
    pub enum Protected {}
    /// Loader magic accepted.
    pub enum ProtocolConfirmed {}
    /// PML4[0] → PDPT, PDPT[0] = 1 GiB identity leaf.
    pub enum IdentityMapped {}
    /// `CR4.PAE` set.
    pub enum AddressExtended {}
    /// `CR3` points at the PML4.
    pub enum TablesInstalled {}
    /// `EFER.LME` set.
    pub enum LongModeArmed {}
    /// `CR0.PE | CR0.PG` set; long mode active, compatibility submode.
    pub enum PagingEnabled {}
    /// Boot GDT loaded.
    pub enum DescriptorsLoaded {}
    /// Executing 64-bit code.
    pub enum Long64 {}
    /// Data segments reloaded; ready for the entry contract.
    pub enum Ready {}
}

use state::{
    AddressExtended, DescriptorsLoaded, IdentityMapped, Long64, LongModeArmed, PagingEnabled,
    Protected, ProtocolConfirmed, Ready, TablesInstalled,
};

/// The preamble in state `S`, driving processor `C`.
pub struct LongModeSwitch<'c, C, S> {
    cpu: &'c mut C,
    layout: PreambleLayout,
    _state: PhantomData<S>,
}

impl<'c, C, S> LongModeSwitch<'c, C, S> {
    fn advance<T>(self) -> LongModeSwitch<'c, C, T> {
        LongModeSwitch {
            cpu: self.cpu,
            layout: self.layout,
            _state: PhantomData,
        }
    }

    /// The processor being driven.
    pub fn cpu(&self) -> &C {
        &*self.cpu
    }
}

impl<'c, C: ProtectedModeCpu> LongModeSwitch<'c, C, Protected> {
    /// Masks interrupts; nothing else is touched until the protocol is confirmed.
    pub fn begin(cpu: &'c mut C, layout: PreambleLayout) -> Self {
        cpu.disable_interrupts();
        Self {
            cpu,
            layout,
            _state: PhantomData,
        }
    }

    /// Accepts the loader only if `magic` identifies the expected boot protocol.
    ///
    /// # Errors
    /// [`EntryFault::ProtocolViolation`] on any other value. No table or
    /// control register has been written at that point.
    pub fn confirm_protocol(
        self,
        magic: u32,
    ) -> Result<LongModeSwitch<'c, C, ProtocolConfirmed>, EntryFault> {
        if magic != EXPECTED_MAGIC {
            return Err(EntryFault::ProtocolViolation {
                found: magic,
                expected: EXPECTED_MAGIC,
            });
        }
        trace!("preamble: loader magic {magic:#010x} accepted");
        Ok(self.advance())
    }
}

impl<'c, C: ProtectedModeCpu> LongModeSwitch<'c, C, ProtocolConfirmed> {
    /// Writes the one PML4 entry and the one 1 GiB PDPT leaf.
    pub fn build_identity_map(self) -> LongModeSwitch<'c, C, IdentityMapped> {
        let PreambleLayout {
            root_table,
            second_table,
            ..
        } = self.layout;
        let root = Pml4Entry::pointing_to(second_table);
        let leaf = Pdpte1G::IDENTITY_FIRST_GIB;
        self.cpu.write_physical(root_table, root.into_bits());
        self.cpu.write_physical(second_table, leaf.into_bits());
        self.advance()
    }
}

impl<'c, C: ProtectedModeCpu> LongModeSwitch<'c, C, IdentityMapped> {
    pub fn enable_address_extension(self) -> LongModeSwitch<'c, C, AddressExtended> {
        let cr4 = self.cpu.cr4().union(Cr4::PHYSICAL_ADDRESS_EXTENSION);
        self.cpu.write_cr4(cr4);
        self.advance()
    }
}

impl<'c, C: ProtectedModeCpu> LongModeSwitch<'c, C, AddressExtended> {
    pub fn install_page_tables(self) -> LongModeSwitch<'c, C, TablesInstalled> {
        let cr3 = Cr3::from_root_phys(self.layout.root_table);
        self.cpu.write_cr3(cr3);
        self.advance()
    }
}

impl<'c, C: ProtectedModeCpu> LongModeSwitch<'c, C, TablesInstalled> {
    pub fn arm_long_mode(self) -> LongModeSwitch<'c, C, LongModeArmed> {
        let efer = self.cpu.efer().union(Efer::LONG_MODE_ENABLE);
        self.cpu.write_efer(efer);
        self.advance()
    }
}

impl<'c, C: ProtectedModeCpu> LongModeSwitch<'c, C, LongModeArmed> {
    pub fn enable_paging(self) -> LongModeSwitch<'c, C, PagingEnabled> {
        let cr0 = self.cpu.cr0().union(Cr0::PROTECTED_PAGING);
        self.cpu.write_cr0(cr0);
        self.advance()
    }
}

impl<'c, C: ProtectedModeCpu> LongModeSwitch<'c, C, PagingEnabled> {
    pub fn load_descriptor_table(self) -> LongModeSwitch<'c, C, DescriptorsLoaded> {
        self.cpu.load_gdt(self.layout.gdt_pointer());
        self.advance()
    }
}

impl<'c, C: ProtectedModeCpu> LongModeSwitch<'c, C, DescriptorsLoaded> {
    pub fn jump_to_long_mode(self) -> LongModeSwitch<'c, C, Long64> {
        let entry = self.layout.long_mode_entry;
        self.cpu.far_transfer(CODE64_SELECTOR, entry);
        self.advance()
    }
}

impl<'c, C: ProtectedModeCpu> LongModeSwitch<'c, C, Long64> {
    pub fn reload_data_segments(self) -> LongModeSwitch<'c, C, Ready> {
        self.cpu.load_data_segments(DATA_SELECTOR);
        self.advance()
    }
}

impl<'c, C> LongModeSwitch<'c, C, Ready> {
    /// Releases the processor.
    pub fn finish(self) -> &'c mut C {
        self.cpu
    }
}

/// Runs the whole preamble.
///
/// # Errors
/// If `magic` does not identify the expected boot protocol.
pub fn run<C: ProtectedModeCpu>(
    cpu: &mut C,
    layout: PreambleLayout,
    magic: u32,
) -> Result<(), EntryFault> {
    LongModeSwitch::begin(cpu, layout)
        .confirm_protocol(magic)?
        .build_identity_map()
        .enable_address_extension()
        .install_page_tables()
        .arm_long_mode()
        .enable_paging()
        .load_descriptor_table()
        .jump_to_long_mode()
        .reload_data_segments()
        .finish();
    debug!("preamble: long mode reached");
    Ok(())
}

/// [`ModeSwitch`] adapter: reads the loader magic from `EAX` of the entry state.
pub struct LongModePreamble<'c, C> {
    cpu: &'c mut C,
    layout: PreambleLayout,
}

impl<'c, C: ProtectedModeCpu> LongModePreamble<'c, C> {
    pub fn new(cpu: &'c mut C, layout: PreambleLayout) -> Self {
        Self { cpu, layout }
    }
}

impl<C: ProtectedModeCpu> ModeSwitch<Registers<16>> for LongModePreamble<'_, C> {
    #[allow(clippy::cast_possible_truncation)]
    fn switch(&mut self, entry: &EntryState<Registers<16>>) -> Result<(), EntryFault> {
        let magic = entry.registers.get(RAX) as u32;
        run(self.cpu, self.layout, magic)
    }
}
