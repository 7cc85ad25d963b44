//! The `tercio-kernel` binary.
//!
//! Everything the kernel does lives in the library crate. This file holds
//! the one thing that can't: the Multiboot `.multiboot_header` section and
//! the `_start` assembly trampoline that `link.ld`'s `ENTRY(_start)` anchors
//! to. Both belong to the final linked executable, not the library -- the
//! library is also linked into every `tests/*.rs` integration test binary,
//! each of which brings its own `_start`, so defining the symbol here rather
//! than in the library is what keeps the two from colliding. A freestanding
//! binary also needs its own panic handler, for the same reason.

#![no_std]
#![no_main]

use core::arch::global_asm;
use core::panic::PanicInfo;

use tercio_kernel::arch::x86::multiboot::{CHECKSUM, FLAGS, MAGIC};

const BOOT_STACK_SIZE: usize = 16 * 1024;

#[repr(align(16))]
struct BootStack([u8; BOOT_STACK_SIZE]);

static mut BOOT_STACK: BootStack = BootStack([0; BOOT_STACK_SIZE]);

global_asm!(
    r#"
.section .multiboot_header, "a"
.align 4
multiboot_header_start:
    .long {magic}
    .long {flags}
    .long {checksum}
multiboot_header_end:

.section .text
.global _start
_start:
    lea esp, [{stack} + {stack_size}]
    push ebx
    push eax
    call {entry}
2:
    hlt
    jmp 2b
"#,
    magic = const MAGIC,
    flags = const FLAGS,
    checksum = const CHECKSUM,
    stack = sym BOOT_STACK,
    stack_size = const BOOT_STACK_SIZE,
    entry = sym tercio_kernel::arch::x86::multiboot::boot,
);

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    tercio_kernel::serial_println!("[KERNEL PANIC] {}", info);
    tercio_kernel::println!("[KERNEL PANIC] {}", info);
    loop {
        // SAFETY: parks the CPU; a panicked kernel has nothing left to do.
        unsafe { core::arch::asm!("cli", "hlt", options(nomem, nostack)) };
    }
}
