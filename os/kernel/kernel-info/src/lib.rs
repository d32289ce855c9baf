//! # Boot Layout and Protocol Constants
//!
//! This crate is the single source of truth for everything the boot entry
//! layer, the kernel harness and its `build.rs` must agree on at build time.
//! Nothing here is computed at runtime: the entry routines run before any
//! memory is initialized, so every size, alignment and magic value they use is
//! a `const` that ends up as an immediate in the generated assembly.
//!
//! ## Modules
//!
//! ### Layout ([`layout`])
//! * **Boot stack**: size and alignment of the statically reserved stack
//! * **Paging**: page size and the extent of the x86-64 identity map
//! * **Load addresses**: where each supported architecture's image is linked
//!
//! ### Protocol ([`protocol`])
//! * **Multiboot magic**: the value a compliant loader leaves in `EAX`
//! * **Header magic**: the value the loader scans the image for
//! * **Kernel entry symbol**: the name the entry layer calls into
//!
//! ## Build Integration
//!
//! ```rust
//! use kernel_info::layout::TargetArch;
//!
//! let arch = TargetArch::from_cfg("riscv64").expect("supported target");
//! println!("cargo:rustc-link-arg-bins=--defsym=LOAD_ADDRESS={:#x}", arch.load_address());
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod layout;
pub mod protocol;
