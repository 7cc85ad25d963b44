//! Address space setup: a single page directory shared by every process.
//!
//! Grounded on `paging.c`/`paging.h`: entry 0 of the page directory points
//! at a 4 KiB-granularity page table covering the first 4 MiB (used for the
//! VGA frame and the three terminal backing pages); entry 1 is a single
//! 4 MiB page covering kernel memory; the program-image page (virtual
//! `0x08000000`, the slot `USER_PAGE` computes to) is remapped per process
//! by [`set_user_page`]; and one more page directory entry maps a
//! `user_video_page_table` so user code's `vidmap` mapping can point either
//! at the live frame or a terminal's backing page depending on whether that
//! terminal is foreground.

use core::arch::asm;

const MAX_ENTRIES: usize = 1024;
const PAGE_SIZE: u32 = 4096;

const PRESENT: u32 = 0x1;
const RW: u32 = 0x2;
const USER: u32 = 0x4;
const FOUR_MB_PAGE: u32 = 0x80;

pub const VIDEO_MEM_BASE: u32 = 0xB8000;
const VIDEO_MEM_PAGE: usize = (VIDEO_MEM_BASE >> 12) as usize;
const KERNEL_MEM_START: u32 = 0x0040_0000;
const PAGE_BASE_ADDR_OFFSET: u32 = 22;

pub const PROGRAM_IMAGE_ADDR: u32 = 0x0804_8000;
pub const USER_STACK: u32 = 0x083F_FFFC;
const USER_PAGE: usize = (PROGRAM_IMAGE_ADDR >> PAGE_BASE_ADDR_OFFSET) as usize;
const USER_VID_MEM_PAGE: usize = USER_PAGE + 1;
/// Base virtual address of the 4 MiB window `USER_PAGE` covers -- masks off
/// everything below the page-directory granularity.
const PAGE_DIR_MASK: u32 = 0xFFC0_0000;

/// Number of terminal backing pages (plus the live frame) identity-mapped
/// in the first 4 MiB and remapped into user video space.
const TERMINAL_COUNT: u32 = crate::terminal::TERMINAL_COUNT as u32;

#[repr(C, align(4096))]
struct Table([u32; MAX_ENTRIES]);

static mut PAGE_DIRECTORY: Table = Table([0; MAX_ENTRIES]);
static mut PAGE_TABLE: Table = Table([0; MAX_ENTRIES]);
static mut USER_VIDEO_PAGE_TABLE: Table = Table([0; MAX_ENTRIES]);

/// Build the page directory/tables and enable paging (PSE + PG + WP).
/// Must run once, before any user process is executed.
pub fn init() {
    // SAFETY: runs once at boot, before any other CPU activity touches
    // these statics; the tables are never resized, only entries rewritten.
    unsafe {
        for i in 0..MAX_ENTRIES {
            PAGE_DIRECTORY.0[i] = RW & !PRESENT;
            PAGE_TABLE.0[i] = (i as u32 * PAGE_SIZE) | (RW & !PRESENT);
            USER_VIDEO_PAGE_TABLE.0[i] = (i as u32 * PAGE_SIZE) | (RW & !PRESENT);
        }

        PAGE_DIRECTORY.0[0] = (&raw const PAGE_TABLE as *const _ as u32) | RW | PRESENT;

        for i in 0..=TERMINAL_COUNT {
            PAGE_TABLE.0[VIDEO_MEM_PAGE + i as usize] |= RW | PRESENT;
        }

        PAGE_DIRECTORY.0[1] = KERNEL_MEM_START | FOUR_MB_PAGE | RW | PRESENT;

        PAGE_DIRECTORY.0[USER_VID_MEM_PAGE] =
            (&raw const USER_VIDEO_PAGE_TABLE as *const _ as u32) | USER | RW | PRESENT;

        for i in 0..=TERMINAL_COUNT {
            USER_VIDEO_PAGE_TABLE.0[i as usize] =
                (VIDEO_MEM_BASE + i * PAGE_SIZE) | USER | RW | PRESENT;
        }

        enable_paging();
    }
}

/// Remap the program-image page directory entry to `pid`'s 4 MiB-aligned
/// physical frame (`KERNEL_MEM_END + pid * 4MiB`), then flush the TLB.
pub fn set_user_page(pid: usize) {
    let phys = 0x0080_0000u32 + (pid as u32) * 0x0040_0000;
    // SAFETY: single page-directory entry rewrite, always followed by a
    // full TLB flush via CR3 reload before any instruction touches the
    // remapped range.
    unsafe {
        PAGE_DIRECTORY.0[USER_PAGE] = phys | USER | RW | FOUR_MB_PAGE | PRESENT;
        flush_tlb();
    }
}

/// Retarget the user video page table's entry 0 (the `vidmap` mapping) at
/// either the live VGA frame or `terminal_id`'s backing page.
pub fn set_user_video(live: bool, terminal_id: usize) {
    let phys = if live {
        VIDEO_MEM_BASE
    } else {
        VIDEO_MEM_BASE + (terminal_id as u32 + 1) * PAGE_SIZE
    };
    // SAFETY: entry 0 of a page table already mapped present; rewriting it
    // is followed by a TLB flush.
    unsafe {
        USER_VIDEO_PAGE_TABLE.0[0] = phys | USER | RW | PRESENT;
        flush_tlb();
    }
}

/// Virtual address `vidmap` hands back: the base of the user-video page.
pub const fn user_video_addr() -> u32 {
    (USER_VID_MEM_PAGE as u32) << PAGE_BASE_ADDR_OFFSET
}

/// `vidmap`'s range check: does `addr` fall within the 4 MiB window the
/// program-image page directory entry covers?
pub fn program_image_contains(addr: u32) -> bool {
    (addr & PAGE_DIR_MASK) == (PROGRAM_IMAGE_ADDR & PAGE_DIR_MASK)
}

unsafe fn enable_paging() {
    // SAFETY: standard PSE+paging enable sequence: load CR3 with the page
    // directory's physical address, set CR4.PSE for 4 MiB pages, then set
    // CR0.PG (and CR0.WP so the kernel cannot write read-only user pages).
    unsafe {
        let pd_addr = &raw const PAGE_DIRECTORY as *const _ as u32;
        asm!("mov cr3, {0}", in(reg) pd_addr, options(nostack, preserves_flags));

        let mut cr4: u32;
        asm!("mov {0}, cr4", out(reg) cr4, options(nostack, preserves_flags));
        cr4 |= 1 << 4; // PSE
        asm!("mov cr4, {0}", in(reg) cr4, options(nostack, preserves_flags));

        let mut cr0: u32;
        asm!("mov {0}, cr0", out(reg) cr0, options(nostack, preserves_flags));
        cr0 |= (1 << 31) | (1 << 16); // PG | WP
        asm!("mov cr0, {0}", in(reg) cr0, options(nostack, preserves_flags));
    }
}

pub fn flush_tlb() {
    // SAFETY: reloading CR3 with its own current value is always valid and
    // simply discards all TLB entries.
    unsafe {
        let pd_addr = &raw const PAGE_DIRECTORY as *const _ as u32;
        asm!("mov cr3, {0}", in(reg) pd_addr, options(nostack, preserves_flags));
    }
}
