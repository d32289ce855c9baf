//! Boot argument words.
//!
//! Firmware passes at most three machine words (a hart/CPU id, a device tree
//! pointer, a Multiboot info pointer and magic, ...). Their meaning is the
//! kernel's business; the entry layer only guarantees they arrive unchanged.

use crate::registers::{Reg, RegisterFile};

/// Upper bound on the number of boot argument words any backend forwards.
pub const MAX_BOOT_ARGS: usize = 3;

/// Up to [`MAX_BOOT_ARGS`] opaque boot argument words, in argument order.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct BootArgs {
    words: [u64; MAX_BOOT_ARGS],
    len: usize,
}

impl BootArgs {
    /// Arguments from a slice of words.
    ///
    /// # Panics
    /// If more than [`MAX_BOOT_ARGS`] words are given.
    #[must_use]
    pub fn new(words: &[u64]) -> Self {
        assert!(words.len() <= MAX_BOOT_ARGS, "too many boot arguments");
        let mut args = Self {
            words: [0; MAX_BOOT_ARGS],
            len: words.len(),
        };
        args.words[..words.len()].copy_from_slice(words);
        args
    }

    /// Read the arguments held in `regs`, in order.
    #[must_use]
    pub fn read<F: RegisterFile>(file: &F, regs: &[Reg]) -> Self {
        let mut args = Self {
            words: [0; MAX_BOOT_ARGS],
            len: regs.len().min(MAX_BOOT_ARGS),
        };
        for (word, reg) in args.words.iter_mut().zip(regs) {
            *word = file.get(*reg);
        }
        args
    }

    /// Place the arguments into `regs`, in order.
    #[must_use]
    pub fn write<F: RegisterFile>(&self, mut file: F, regs: &[Reg]) -> F {
        for (word, reg) in self.as_slice().iter().zip(regs) {
            file.set(*reg, *word);
        }
        file
    }

    /// Keeps the low `bits` of every word, as a register narrower than the
    /// modelled file would.
    #[must_use]
    pub const fn truncated(mut self, bits: u32) -> Self {
        if bits >= u64::BITS {
            return self;
        }
        let mask = (1u64 << bits) - 1;
        let mut i = 0;
        while i < self.len {
            self.words[i] &= mask;
            i += 1;
        }
        self
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u64] {
        &self.words[..self.len]
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<u64> {
        self.as_slice().get(index).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::Registers;

    #[test]
    fn read_then_write_moves_words_between_register_sets() {
        let from = [Reg::new(0), Reg::new(1)];
        let to = [Reg::new(6), Reg::new(7)];
        let file = Registers::<8>::from_words([11, 22, 0, 0, 0, 0, 0, 0]);

        let args = BootArgs::read(&file, &from);
        assert_eq!(args.as_slice(), &[11, 22]);

        let file = args.write(Registers::<8>::zeroed(), &to);
        assert_eq!(file.words(), &[0, 0, 0, 0, 0, 0, 11, 22]);
    }

    #[test]
    fn truncation_clears_upper_bits_only() {
        let args = BootArgs::new(&[0xFFFF_FFFF_36D7_6289, 0x0009_5000]).truncated(32);
        assert_eq!(args.as_slice(), &[0x36D7_6289, 0x0009_5000]);

        let full = BootArgs::new(&[u64::MAX]);
        assert_eq!(full.truncated(64), full);
    }

    #[test]
    fn empty_arguments() {
        let args = BootArgs::default();
        assert!(args.is_empty());
        assert_eq!(args.get(0), None);
    }

    #[test]
    #[should_panic(expected = "too many boot arguments")]
    fn rejects_a_fourth_word() {
        let _ = BootArgs::new(&[1, 2, 3, 4]);
    }
}
