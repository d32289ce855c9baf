//! # Modelled register files
//!
//! A backend describes its general-purpose register file as a fixed-size
//! array of machine words. Slot numbering follows the architecture's own
//! encoding where it has one (`rax=0 … r15=15`, `x0 … x31`), with registers
//! that live outside the numbered file (the AArch64 `sp`, the PowerPC `lr`)
//! appended at the end.
//!
//! Register files are `Copy` values: every contract step takes one by value
//! and returns the next one, so no step can observe ambient mutable state.

use core::fmt;

/// A slot in an architecture's register file.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct Reg(u8);

impl Reg {
    #[must_use]
    pub const fn new(index: u8) -> Self {
        Self(index)
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A complete general-purpose register file.
pub trait RegisterFile: Copy + Eq + fmt::Debug {
    /// Number of modelled slots.
    const SLOTS: usize;

    /// A file with every slot cleared.
    fn zeroed() -> Self;

    /// Value held in `reg`.
    ///
    /// # Panics
    /// If `reg` is not a slot of this file.
    fn get(&self, reg: Reg) -> u64;

    /// Overwrite `reg`.
    ///
    /// # Panics
    /// If `reg` is not a slot of this file.
    fn set(&mut self, reg: Reg, value: u64);

    /// By-value variant of [`set`](Self::set).
    #[must_use]
    fn with(mut self, reg: Reg, value: u64) -> Self {
        self.set(reg, value);
        self
    }

    /// Whether `reg` is a slot of this file.
    fn contains(reg: Reg) -> bool {
        reg.index() < Self::SLOTS
    }

    /// Every slot, in order.
    fn slots() -> impl Iterator<Item = Reg> {
        (0..Self::SLOTS)
            .filter_map(|index| u8::try_from(index).ok())
            .map(Reg::new)
    }
}

/// Register file of `N` machine words.
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct Registers<const N: usize> {
    words: [u64; N],
}

impl<const N: usize> Registers<N> {
    #[must_use]
    pub const fn from_words(words: [u64; N]) -> Self {
        Self { words }
    }

    #[must_use]
    pub const fn words(&self) -> &[u64; N] {
        &self.words
    }

    /// Slots holding a non-zero value, in slot order.
    pub fn nonzero(&self) -> impl Iterator<Item = (Reg, u64)> + '_ {
        self.words
            .iter()
            .enumerate()
            .filter(|(_, value)| **value != 0)
            .filter_map(|(index, value)| Some((Reg::new(u8::try_from(index).ok()?), *value)))
    }
}

impl<const N: usize> RegisterFile for Registers<N> {
    const SLOTS: usize = N;

    fn zeroed() -> Self {
        Self { words: [0; N] }
    }

    fn get(&self, reg: Reg) -> u64 {
        self.words[reg.index()]
    }

    fn set(&mut self, reg: Reg, value: u64) {
        self.words[reg.index()] = value;
    }
}

impl<const N: usize> fmt::Debug for Registers<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (reg, value) in self.nonzero() {
            map.entry(&reg.index(), &format_args!("{value:#x}"));
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get_by_slot() {
        let file = Registers::<4>::zeroed().with(Reg::new(2), 0xdead_beef);
        assert_eq!(file.get(Reg::new(2)), 0xdead_beef);
        assert_eq!(file.get(Reg::new(0)), 0);
        assert_eq!(file.words(), &[0, 0, 0xdead_beef, 0]);
    }

    #[test]
    fn nonzero_lists_only_live_slots() {
        let file = Registers::from_words([0, 7, 0, 9]);
        let live: Vec<_> = file.nonzero().collect();
        assert_eq!(live, vec![(Reg::new(1), 7), (Reg::new(3), 9)]);
    }

    #[test]
    fn contains_respects_file_size() {
        assert!(Registers::<16>::contains(Reg::new(15)));
        assert!(!Registers::<16>::contains(Reg::new(16)));
    }

    #[test]
    #[should_panic(expected = "index out of bounds")]
    fn foreign_slot_panics() {
        let _ = Registers::<2>::zeroed().get(Reg::new(5));
    }
}
