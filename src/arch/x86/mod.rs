//! Architecture support for 32-bit protected-mode x86 (`target_arch = "x86"`).
//!
//! `target_arch = "x86"` rather than `"x86_64"`: this kernel runs in plain
//! 32-bit protected mode (no long mode, no 4-level paging), so it targets a
//! genuine i686 triple and does not pull in the `x86_64` crate, whose
//! descriptor/TSS types are long-mode-shaped.

pub mod gdt;
pub mod idt;
pub mod keyboard;
pub mod logger;
pub mod multiboot;
pub mod paging;
pub mod pic;
pub mod pit;
pub mod port;
pub mod rtc;
pub mod serial;
pub mod usermode;
pub mod vga;

/// Boot-time subsystem bring-up, in strict dependency order: the logger
/// first so every later step can report itself, then descriptor tables
/// before anything that can fault or interrupt, then paging, then the
/// timer/input/clock drivers, then the shared terminal state each of them
/// writes into.
pub fn init() {
    logger::init();
    gdt::init();
    idt::init();
    pic::init();
    paging::init();
    pit::init();
    rtc::init();
    keyboard::init();
    crate::terminal::init();
}
