//! Global descriptor table and task-state segment.
//!
//! Hand-rolled rather than built with the `x86_64` crate's descriptor types,
//! which model the 64-bit long-mode GDT/TSS shapes (no `esp0`/`ss0`, 8-byte
//! code/data descriptors with different flag semantics). This kernel runs
//! in 32-bit protected mode, so the six-entry layout below (null, kernel
//! code, kernel data, user code, user data, TSS) and the 32-bit TSS layout
//! are written out directly, matching how the source this kernel was
//! ported from lays out `x86_desc.S`/`x86_desc.h`.

use core::arch::asm;
use core::mem::size_of;

pub const KERNEL_CS: u16 = 0x08;
pub const KERNEL_DS: u16 = 0x10;
pub const USER_CS: u16 = 0x23; // index 3, RPL 3
pub const USER_DS: u16 = 0x2B; // index 5, RPL 3
const TSS_SELECTOR: u16 = 0x30;

const GDT_ENTRIES: usize = 7;

#[repr(C, packed)]
#[derive(Clone, Copy)]
struct GdtEntry {
    limit_low: u16,
    base_low: u16,
    base_mid: u8,
    access: u8,
    limit_high_flags: u8,
    base_high: u8,
}

impl GdtEntry {
    const fn null() -> Self {
        GdtEntry {
            limit_low: 0,
            base_low: 0,
            base_mid: 0,
            access: 0,
            limit_high_flags: 0,
            base_high: 0,
        }
    }

    const fn flat(access: u8, flags: u8) -> Self {
        GdtEntry {
            limit_low: 0xFFFF,
            base_low: 0,
            base_mid: 0,
            access,
            limit_high_flags: 0xF | (flags << 4),
            base_high: 0,
        }
    }

    fn tss(base: u32, limit: u32) -> Self {
        GdtEntry {
            limit_low: (limit & 0xFFFF) as u16,
            base_low: (base & 0xFFFF) as u16,
            base_mid: ((base >> 16) & 0xFF) as u8,
            access: 0x89, // present, ring 0, 32-bit TSS (available)
            limit_high_flags: (((limit >> 16) & 0xF) as u8) | 0x00,
            base_high: ((base >> 24) & 0xFF) as u8,
        }
    }
}

/// 32-bit task-state segment. Only `ss0`/`esp0` are meaningful to this
/// kernel (loaded fresh on every ring3->ring0 transition); the rest of the
/// fields exist because the hardware TSS format requires them.
#[repr(C, packed)]
pub struct Tss {
    link: u16,
    _r0: u16,
    pub esp0: u32,
    pub ss0: u16,
    _r1: u16,
    esp1: u32,
    ss1: u16,
    _r2: u16,
    esp2: u32,
    ss2: u16,
    _r3: u16,
    cr3: u32,
    eip: u32,
    eflags: u32,
    eax: u32,
    ecx: u32,
    edx: u32,
    ebx: u32,
    esp: u32,
    ebp: u32,
    esi: u32,
    edi: u32,
    es: u16,
    _r4: u16,
    cs: u16,
    _r5: u16,
    ss: u16,
    _r6: u16,
    ds: u16,
    _r7: u16,
    fs: u16,
    _r8: u16,
    gs: u16,
    _r9: u16,
    ldt: u16,
    _r10: u16,
    trap: u16,
    iomap_base: u16,
}

impl Tss {
    const fn new() -> Self {
        // SAFETY: all-zero is a valid bit pattern for every field above.
        unsafe { core::mem::zeroed() }
    }
}

static mut TSS: Tss = Tss::new();
static mut GDT: [GdtEntry; GDT_ENTRIES] = [GdtEntry::null(); GDT_ENTRIES];

#[repr(C, packed)]
struct DescriptorTablePointer {
    limit: u16,
    base: u32,
}

/// Build the GDT (null, kernel code/data, user code/data, TSS) and load it,
/// then load the TSS selector.
pub fn init() {
    // SAFETY: single-threaded boot-time setup of the static GDT/TSS, before
    // any ring-3 transition can race it.
    unsafe {
        GDT[0] = GdtEntry::null();
        GDT[1] = GdtEntry::flat(0x9A, 0xC); // kernel code: present,ring0,code,exec/read
        GDT[2] = GdtEntry::flat(0x92, 0xC); // kernel data: present,ring0,data,read/write
        GDT[3] = GdtEntry::flat(0xFA, 0xC); // user code: present,ring3,code,exec/read
        GDT[4] = GdtEntry::flat(0xF2, 0xC); // user data: present,ring3,data,read/write
        GDT[5] = GdtEntry::tss(&raw const TSS as u32, (size_of::<Tss>() - 1) as u32);

        let ptr = DescriptorTablePointer {
            limit: (size_of::<[GdtEntry; GDT_ENTRIES]>() - 1) as u16,
            base: &raw const GDT as *const _ as u32,
        };
        asm!("lgdt [{}]", in(reg) &ptr, options(readonly, nostack, preserves_flags));

        asm!(
            "mov ax, {kds:x}",
            "mov ds, ax",
            "mov es, ax",
            "mov fs, ax",
            "mov gs, ax",
            "mov ss, ax",
            "push {kcs}",
            "lea eax, [2f]",
            "push eax",
            "retf",
            "2:",
            kds = in(reg) KERNEL_DS as u32,
            kcs = in(reg) KERNEL_CS as u32,
            out("eax") _,
            options(nostack),
        );

        asm!("ltr {0:x}", in(reg) TSS_SELECTOR, options(nostack, preserves_flags));
    }
}

/// Set the kernel-mode stack the CPU switches to on a ring3->ring0
/// transition (interrupt or `int 0x80`). Call with interrupts disabled.
pub fn set_kernel_stack(esp0: u32) {
    // SAFETY: TSS is only mutated here, always under the caller's CLI
    // section (execute/halt/scheduler), never concurrently.
    unsafe {
        TSS.esp0 = esp0;
        TSS.ss0 = KERNEL_DS;
    }
}

pub fn kernel_stack() -> u32 {
    // SAFETY: read-only snapshot of a field only ever written under CLI.
    unsafe { TSS.esp0 }
}
