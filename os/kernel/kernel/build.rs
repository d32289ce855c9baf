use kernel_info::layout::{IDENTITY_MAP_BYTES, PAGE_SIZE, TargetArch};
use kernel_info::protocol::KERNEL_ENTRY_SYMBOL;
use std::{env, path::PathBuf};

fn main() {
    // Hosted builds only check the crate; there is nothing to link.
    if env::var("CARGO_CFG_TARGET_OS").as_deref() != Ok("none") {
        return;
    }

    // Point to the linker script
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").expect("set by cargo"));
    let ld = manifest_dir.join("kernel.ld");

    let target_arch = env::var("CARGO_CFG_TARGET_ARCH").expect("set by cargo");
    let Some(arch) = TargetArch::from_cfg(&target_arch) else {
        panic!("no entry backend for target_arch {target_arch:?}");
    };

    // Sanity checks (fail fast during build)
    let load_address = arch.load_address();
    assert_eq!(
        load_address % PAGE_SIZE as u64,
        0,
        "LOAD_ADDRESS must be 4 KiB aligned (got {load_address:#x})"
    );
    if arch == TargetArch::X86_64 {
        assert!(
            load_address < IDENTITY_MAP_BYTES,
            "x86-64 image must sit inside the boot identity map (got {load_address:#x})"
        );
        // The 32-bit preamble takes absolute addresses of its own symbols.
        println!("cargo:rustc-link-arg-bins=--no-pie");
    }

    // Rebuild when inputs change
    println!("cargo:rerun-if-changed={}", ld.display());
    println!("cargo:rerun-if-changed=build.rs");

    // Linker script
    println!("cargo:rustc-link-arg-bins=-T{}", ld.display());

    // Provide symbols to the linker script
    println!("cargo:rustc-link-arg-bins=--defsym=LOAD_ADDRESS={load_address:#x}");
    // Keep the routine the entry layer calls even though nothing in Rust names it.
    println!("cargo:rustc-link-arg-bins=--undefined={KERNEL_ENTRY_SYMBOL}");
}
