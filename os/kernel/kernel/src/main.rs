//! # Kernel Image
//!
//! Links the boot entry layer into a bootable image. The architecture's
//! `_start` (from `kernel-entry`) normalizes the processor state and calls
//! [`kernel_main`] with the boot words on a fresh stack; this image has
//! nothing further to do and parks the processor.
//!
//! Only bare-metal targets produce an image. Hosted builds compile an empty
//! `main` so the workspace can be checked as a whole.

#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]
#![allow(unsafe_code)]

#[cfg(target_os = "none")]
mod image {
    use kernel_entry::halt;

    #[panic_handler]
    fn panic(_info: &core::panic::PanicInfo) -> ! {
        halt::park()
    }

    /// The kernel's first high-level routine.
    ///
    /// # Arguments
    /// The boot words in firmware order. On x86-64 these are the boot
    /// information pointer and the loader magic; unused slots are zero.
    #[unsafe(no_mangle)]
    pub extern "C" fn kernel_main(arg0: usize, arg1: usize, arg2: usize) -> ! {
        log::info!("kernel_main({arg0:#x}, {arg1:#x}, {arg2:#x})");

        #[cfg(target_arch = "x86_64")]
        {
            // SAFETY: CPL 0 after the long-mode preamble.
            let status = unsafe { kernel_entry::arch::x86_64::long_mode_status() };
            if !status.is_long_mode() {
                log::error!("not in long mode: {status:?}");
            }
        }

        halt::park()
    }
}

#[cfg(not(target_os = "none"))]
fn main() {}
