//! 256-entry interrupt descriptor table.
//!
//! Grounded on `idt.c`'s vector-assignment policy: the 32 Intel-reserved
//! exception vectors are interrupt gates at DPL 0, vector `0x80` is a trap
//! gate at DPL 3 (so user mode's `int 0x80` is permitted), and the PIC's
//! remapped IRQ vectors (0x20-0x2F) are interrupt gates at DPL 0. Unassigned
//! vectors get a generic "unhandled interrupt" gate so a stray vector does
//! not triple-fault.

use core::arch::{asm, naked_asm};
use core::mem::size_of;

use super::gdt::KERNEL_CS;

const IDT_ENTRIES: usize = 256;
pub const PIC1_OFFSET: u8 = 0x20;
pub const PIC2_OFFSET: u8 = 0x28;
pub const SYSCALL_VECTOR: u8 = 0x80;

#[repr(C, packed)]
#[derive(Clone, Copy)]
struct IdtEntry {
    offset_low: u16,
    selector: u16,
    zero: u8,
    type_attr: u8,
    offset_high: u16,
}

impl IdtEntry {
    const fn missing() -> Self {
        IdtEntry {
            offset_low: 0,
            selector: 0,
            zero: 0,
            type_attr: 0,
            offset_high: 0,
        }
    }

    fn new(handler: u32, dpl: u8, gate_type: u8) -> Self {
        IdtEntry {
            offset_low: (handler & 0xFFFF) as u16,
            selector: KERNEL_CS,
            zero: 0,
            type_attr: 0x80 | (dpl << 5) | gate_type, // present | dpl | gate
            offset_high: ((handler >> 16) & 0xFFFF) as u16,
        }
    }
}

const INTERRUPT_GATE: u8 = 0x0E;
const TRAP_GATE: u8 = 0x0F;

static mut IDT: [IdtEntry; IDT_ENTRIES] = [IdtEntry::missing(); IDT_ENTRIES];

#[repr(C, packed)]
struct DescriptorTablePointer {
    limit: u16,
    base: u32,
}

/// Exception names for vectors 0-19, in the order Intel assigns them.
/// Used only for the one-line diagnostic each exception handler prints.
const EXCEPTION_NAMES: [&str; 20] = [
    "Divide Error",
    "Debug",
    "NMI Interrupt",
    "Breakpoint",
    "Overflow",
    "BOUND Range Exceeded",
    "Invalid Opcode",
    "Device Not Available",
    "Double Fault",
    "Coprocessor Segment Overrun",
    "Invalid TSS",
    "Segment Not Present",
    "Stack-Segment Fault",
    "General Protection Fault",
    "Page Fault",
    "Reserved",
    "x87 FPU Floating-Point Error",
    "Alignment Check",
    "Machine Check",
    "SIMD Floating-Point Exception",
];

macro_rules! exception_handler {
    ($name:ident, $vector:expr) => {
        #[unsafe(naked)]
        extern "C" fn $name() {
            naked_asm!(
                "push {vector}",
                "jmp {common}",
                vector = const $vector,
                common = sym exception_common,
            );
        }
    };
}

exception_handler!(exc_00, 0);
exception_handler!(exc_01, 1);
exception_handler!(exc_02, 2);
exception_handler!(exc_03, 3);
exception_handler!(exc_04, 4);
exception_handler!(exc_05, 5);
exception_handler!(exc_06, 6);
exception_handler!(exc_07, 7);
exception_handler!(exc_08, 8);
exception_handler!(exc_09, 9);
exception_handler!(exc_10, 10);
exception_handler!(exc_11, 11);
exception_handler!(exc_12, 12);
exception_handler!(exc_13, 13);
exception_handler!(exc_14, 14);
exception_handler!(exc_15, 15);
exception_handler!(exc_16, 16);
exception_handler!(exc_17, 17);
exception_handler!(exc_18, 18);
exception_handler!(exc_19, 19);

#[unsafe(naked)]
extern "C" fn exception_common() {
    naked_asm!(
        "pusha",
        "mov eax, [esp + 32]", // the vector pushed by the per-vector stub
        "push eax",
        "call {handler}",
        "add esp, 4",
        "popa",
        "add esp, 4", // discard the pushed vector
        "iretd",
        handler = sym handle_exception,
    );
}

extern "C" fn handle_exception(vector: u32) {
    let name = EXCEPTION_NAMES
        .get(vector as usize)
        .copied()
        .unwrap_or("Reserved");
    log::error!("CPU exception {vector}: {name}");
    crate::syscall::halt_current_process(255);
}

/// `int 0x80` entry point: saves caller-saved registers, dispatches on
/// `eax`, and leaves the return value in `eax` across the `iretd`.
#[unsafe(naked)]
extern "C" fn syscall_entry() {
    naked_asm!(
        "push ebp",
        "push edi",
        "push esi",
        "push edx",
        "push ecx",
        "push ebx",
        "push eax",
        "call {dispatch}",
        "add esp, 4", // drop the saved eax (syscall number), keep the rest
        "mov [esp + 20], eax", // overwrite saved eax slot with the return value
        "pop ebx",
        "pop ecx",
        "pop edx",
        "pop esi",
        "pop edi",
        "pop ebp",
        "iretd",
        dispatch = sym syscall_dispatch_trampoline,
    );
}

extern "C" fn syscall_dispatch_trampoline(
    num: u32,
    arg1: u32,
    arg2: u32,
    arg3: u32,
) -> i32 {
    crate::syscall::dispatch(num, arg1, arg2, arg3)
}

extern "x86-interrupt" fn irq_pit() {
    crate::sched::on_pit_tick();
}

extern "x86-interrupt" fn irq_keyboard() {
    super::keyboard::handle_interrupt();
}

extern "x86-interrupt" fn irq_rtc() {
    super::rtc::handle_interrupt();
}

extern "x86-interrupt" fn irq_spurious() {
    super::pic::send_eoi(7);
}

extern "x86-interrupt" fn unhandled_interrupt() {
    log::warn!("unhandled interrupt vector fired");
}

/// Build the IDT and load it. Must run after [`super::gdt::init`], since
/// gate descriptors reference the kernel code selector.
pub fn init() {
    // SAFETY: single-threaded boot-time construction of the static IDT.
    unsafe {
        let handlers: [unsafe extern "C" fn(); 20] = [
            exc_00, exc_01, exc_02, exc_03, exc_04, exc_05, exc_06, exc_07, exc_08, exc_09,
            exc_10, exc_11, exc_12, exc_13, exc_14, exc_15, exc_16, exc_17, exc_18, exc_19,
        ];
        for (vector, handler) in handlers.iter().enumerate() {
            IDT[vector] = IdtEntry::new(*handler as u32, 0, INTERRUPT_GATE);
        }
        for vector in 20..32 {
            IDT[vector] = IdtEntry::new(unhandled_interrupt as u32, 0, INTERRUPT_GATE);
        }

        IDT[(PIC1_OFFSET + 0) as usize] = IdtEntry::new(irq_pit as u32, 0, INTERRUPT_GATE);
        IDT[(PIC1_OFFSET + 1) as usize] = IdtEntry::new(irq_keyboard as u32, 0, INTERRUPT_GATE);
        IDT[(PIC1_OFFSET + 7) as usize] = IdtEntry::new(irq_spurious as u32, 0, INTERRUPT_GATE);
        IDT[(PIC2_OFFSET + 0) as usize] = IdtEntry::new(irq_rtc as u32, 0, INTERRUPT_GATE);

        IDT[SYSCALL_VECTOR as usize] = IdtEntry::new(syscall_entry as u32, 3, TRAP_GATE);

        let ptr = DescriptorTablePointer {
            limit: (size_of::<[IdtEntry; IDT_ENTRIES]>() - 1) as u16,
            base: &raw const IDT as *const _ as u32,
        };
        asm!("lidt [{}]", in(reg) &ptr, options(readonly, nostack, preserves_flags));
    }
}
