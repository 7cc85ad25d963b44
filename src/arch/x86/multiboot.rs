//! Multiboot v1 info parsing and the kernel's Rust-level boot entry.
//!
//! Multiboot v1 (not v2): the classic GRUB-compatible header checked by
//! GRUB Legacy and GRUB2's `multiboot` (as opposed to `multiboot2`) loader
//! directive, matching the flat 1 MiB load address in `link.ld`. The raw
//! `.multiboot_header` section and the `_start` assembly trampoline that
//! jumps to [`boot`] live in the `tercio-kernel` binary crate (`src/main.rs`),
//! not here: a `global_asm!`-defined `_start` belongs to the final linked
//! executable, and the library is also linked into every `tests/*.rs`
//! integration test binary, each of which defines its own `_start`. Keeping
//! the symbol out of the library is what lets both coexist.
//!
//! The filesystem image ships as the single boot module GRUB loads alongside
//! the kernel; `boot` locates it from the multiboot info structure and hands
//! its address to [`crate::fs::init`] via [`crate::kernel_main_impl`].

pub const MAGIC: u32 = 0x1BAD_B002;
const FLAG_ALIGN_MODULES: u32 = 1 << 0;
const FLAG_MEMORY_INFO: u32 = 1 << 1;
pub const FLAGS: u32 = FLAG_ALIGN_MODULES | FLAG_MEMORY_INFO;
pub const CHECKSUM: u32 = (0u32).wrapping_sub(MAGIC.wrapping_add(FLAGS));

const BOOTLOADER_MAGIC: u32 = 0x2BAD_B002;

#[repr(C)]
struct MultibootInfo {
    flags: u32,
    mem_lower: u32,
    mem_upper: u32,
    boot_device: u32,
    cmdline: u32,
    mods_count: u32,
    mods_addr: u32,
    // remaining fields (syms, mmap, drives, config_table, ...) are unused.
}

#[repr(C)]
struct ModuleEntry {
    mod_start: u32,
    mod_end: u32,
    string: u32,
    reserved: u32,
}

/// Entry point reached from the `_start` assembly trampoline in `main.rs`,
/// with `eax` = bootloader magic and `ebx` = physical address of the
/// multiboot info structure.
///
/// # Safety
/// Must only be called once, immediately after the trampoline switches onto
/// the boot stack, with `info_addr` still pointing at the untouched
/// multiboot info structure GRUB built.
pub unsafe extern "C" fn boot(magic: u32, info_addr: u32) -> ! {
    if magic != BOOTLOADER_MAGIC {
        panic!("invalid multiboot magic: {magic:#x}");
    }

    // SAFETY: info_addr is the physical address GRUB passes in ebx, valid
    // for the lifetime of this call since nothing has been remapped yet.
    let info = unsafe { &*(info_addr as *const MultibootInfo) };

    let fs_image = if info.mods_count >= 1 {
        // SAFETY: mods_addr points at mods_count ModuleEntry records,
        // guaranteed present since mods_count >= 1.
        let module = unsafe { &*(info.mods_addr as *const ModuleEntry) };
        Some((module.mod_start, module.mod_end))
    } else {
        None
    };

    crate::kernel_main_impl(fs_image)
}
