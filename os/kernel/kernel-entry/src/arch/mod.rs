//! Entry backends, one per supported architecture.
//!
//! Each backend is a zero-sized type implementing
//! [`Architecture`](crate::contract::Architecture) plus, behind the `entry`
//! feature on a matching bare-metal target, the naked `_start` routine that
//! performs the same steps in assembly. All backends are compiled on every
//! host so the model can be tested for all of them at once.
//!
//! PowerPC 64, MIPS64 and SPARC V9 have no `*-none` target in rustc; build
//! them with a custom target specification whose `os` is `"none"`.

pub mod aarch64;
pub mod loongarch64;
pub mod mips64;
pub mod powerpc64;
pub mod riscv64;
pub mod sparc64;
pub mod x86_64;

#[cfg(all(feature = "entry", target_os = "none"))]
unsafe extern "C" {
    /// The kernel's first high-level routine, provided by the kernel image.
    /// Takes up to three boot words; must not return.
    pub(crate) fn kernel_main(arg0: usize, arg1: usize, arg2: usize);
}
