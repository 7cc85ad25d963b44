//! Tercio kernel library.
//!
//! This crate holds every subsystem. The raw `_start` assembly trampoline
//! and `.multiboot_header` section live in the `tercio-kernel` binary
//! (`main.rs`) instead of here, so that linking this library into a
//! `tests/*.rs` integration binary (which defines its own `_start`) never
//! collides with it. The trampoline calls [`arch::x86::multiboot::boot`],
//! which locates the boot module holding the filesystem image and calls
//! [`kernel_main_impl`].

#![no_std]
#![cfg_attr(all(test, target_os = "none"), no_main)]
#![feature(custom_test_frameworks)]
#![feature(abi_x86_interrupt)]
#![cfg_attr(target_os = "none", feature(alloc_error_handler))]
#![cfg_attr(target_os = "none", test_runner(crate::test_runner))]
#![cfg_attr(target_os = "none", reexport_test_harness_main = "test_main")]

#[cfg(feature = "alloc")]
extern crate alloc;

// On bare metal, a small bump-free linked-list heap backs `alloc`. On the
// host target (used for `cargo test`'s unit-test harness), delegate to the
// system allocator instead so Vec/String compile and run normally there.
#[cfg(all(target_arch = "x86", target_os = "none"))]
use linked_list_allocator::LockedHeap;

#[cfg(all(target_arch = "x86", target_os = "none"))]
#[global_allocator]
static ALLOCATOR: LockedHeap = LockedHeap::empty();

#[cfg(not(target_os = "none"))]
extern crate std;
#[cfg(not(target_os = "none"))]
#[global_allocator]
static SYSTEM_ALLOCATOR: std::alloc::System = std::alloc::System;

/// Get a reference to the global allocator, for diagnostics and tests.
#[cfg(all(target_arch = "x86", target_os = "none"))]
pub fn get_allocator() -> &'static LockedHeap {
    &ALLOCATOR
}

const HEAP_START: usize = 0x0044_0000;
const HEAP_SIZE: usize = 0x0010_0000; // 1 MiB, carved out of the 4 MiB kernel page.

/// Initialize the heap allocator over a fixed range inside the kernel's
/// identity-mapped 4 MiB page (see [`arch::x86::paging`]). There is no
/// virtual memory manager to negotiate this range with, so it is a
/// compile-time constant rather than something discovered from the
/// multiboot memory map.
#[cfg(all(target_arch = "x86", target_os = "none"))]
fn init_heap() {
    // SAFETY: [HEAP_START, HEAP_START + HEAP_SIZE) falls inside the 4 MiB
    // kernel page mapped present/writable by `paging::init`, and is used
    // for nothing else.
    unsafe {
        ALLOCATOR.lock().init(HEAP_START as *mut u8, HEAP_SIZE);
    }
}

#[macro_use]
pub mod print;

pub mod arch;
pub mod error;
pub mod fs;
pub mod process;
pub mod sched;
pub mod syscall;
pub mod terminal;

mod test_framework;

pub use test_framework::{
    exit_qemu, test_panic_handler, BenchmarkRunner, QemuExitCode, Testable,
};
#[cfg(test)]
pub use test_framework::test_runner;

/// Kernel entry point proper, reached from [`arch::x86::multiboot::boot`]
/// with the boot module's `(start, end)` physical address range, if GRUB
/// supplied one.
#[cfg(target_os = "none")]
pub fn kernel_main_impl(fs_image: Option<(u32, u32)>) -> ! {
    arch::x86::init();

    #[cfg(feature = "alloc")]
    init_heap();

    match fs_image {
        Some((start, _end)) => fs::init(start as usize),
        None => panic!("no boot module supplied: filesystem image missing"),
    }

    log::info!(
        "tercio-kernel {} ({}) booting",
        env!("CARGO_PKG_VERSION"),
        option_env!("GIT_HASH").unwrap_or("unknown")
    );

    #[cfg(test)]
    test_main();

    // Terminal 0's shell. This call does not return under normal operation:
    // `syscall::halt`'s root-process case re-launches `shell` in place
    // rather than unwinding, and terminals 1/2 get their own shells lazily
    // from the scheduler's PIT tick the first time round-robin reaches them.
    syscall::execute(b"shell\0".as_ptr());

    loop {
        // SAFETY: just parks the CPU between interrupts; nothing else runs.
        unsafe { core::arch::asm!("hlt", options(nomem, nostack)) };
    }
}

#[cfg(all(test, target_os = "none"))]
#[no_mangle]
pub extern "C" fn _start() -> ! {
    test_main();
    loop {
        core::hint::spin_loop();
    }
}

#[cfg(all(test, target_os = "none"))]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    test_framework::test_panic_handler(info)
}

/// Heap allocation error handler.
///
/// Panic is intentional: heap allocation failure in a no_std kernel is
/// unrecoverable. The alloc_error_handler ABI requires `-> !`.
#[cfg(target_os = "none")]
#[alloc_error_handler]
fn alloc_error_handler(layout: core::alloc::Layout) -> ! {
    panic!("allocation error: {:?}", layout);
}
