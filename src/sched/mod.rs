//! Round-robin scheduler: one PIT tick advances which of the three
//! terminals owns the CPU.
//!
//! Grounded on the scheduler tick described alongside `execute_context_switch`
//! in `systemcalls.c` (the same save/restore of `esp`/`ebp` and TSS/paging
//! retargeting `execute` and `halt` use, just triggered by a timer instead
//! of a syscall). There is no run queue or priority: with exactly one
//! process per terminal, "schedule" always means "the next terminal in
//! round-robin order."

use crate::arch::x86::{gdt, paging, pic, usermode};
use crate::process::pcb::initial_kernel_esp;
use crate::process::Pcb;
use crate::syscall;
use crate::terminal;

const PIT_IRQ: u8 = 0;

/// IRQ0 handler body, called from the naked PIT stub in `idt.rs`.
pub fn on_pit_tick() {
    let prev = terminal::sched_term();
    if terminal::current_pid(prev).is_none() {
        // No shell has been launched on any terminal yet; nothing to
        // switch away from.
        pic::send_eoi(PIT_IRQ);
        return;
    }
    let next = (prev + 1) % terminal::TERMINAL_COUNT;
    schedule(prev, next);
    pic::send_eoi(PIT_IRQ);
}

/// Save `prev`'s context (if its terminal is active), advance `sched_term`
/// to `next`, and resume whatever `next` was doing -- spawning its shell
/// first if this is the first time the round-robin reaches it.
fn schedule(prev: usize, next: usize) {
    if prev == next {
        return;
    }

    if terminal::is_active(prev) {
        if let Some(pid) = terminal::current_pid(prev) {
            // SAFETY: current_pid(prev) is Some only while pid's PCB is live.
            let pcb = unsafe { Pcb::at(pid) };
            let (esp, ebp) = usermode::capture_stack();
            pcb.saved_esp = esp;
            pcb.saved_ebp = ebp;
        }
    }

    terminal::set_sched_term(next);

    if !terminal::is_active(next) {
        // First visit to this terminal: bring its shell up. `execute`
        // never returns until that shell's terminal halts its root
        // process (which immediately respawns it) -- it diverts straight
        // to ring 3 and never comes back up through this call stack, so
        // `on_pit_tick`'s trailing EOI below is never reached for this
        // tick. EOI here, before the call, or IRQ0's in-service bit never
        // clears and the PIC stops delivering it forever.
        pic::send_eoi(PIT_IRQ);
        syscall::execute(b"shell\0".as_ptr());
        return;
    }

    let Some(pid) = terminal::current_pid(next) else {
        return;
    };
    paging::set_user_page(pid);
    gdt::set_kernel_stack(initial_kernel_esp(pid));
    paging::set_user_video(next == terminal::curr_term(), next);

    // SAFETY: pid's PCB is live (current_pid(next) was Some) and its
    // saved_esp/saved_ebp were captured either by this same function on a
    // prior tick, or by `execute`/`halt` switching away from it.
    let pcb = unsafe { Pcb::at(pid) };
    resume_saved_context(pcb.saved_esp, pcb.saved_ebp);
}

/// Switch onto `next`'s saved kernel stack and return normally: the
/// interrupt epilogue the compiler generates for `irq_pit` then `iretd`s
/// using whatever frame is now on top of that stack -- the exact point
/// `next` was itself interrupted at on some earlier tick.
fn resume_saved_context(esp: u32, ebp: u32) {
    // SAFETY: esp/ebp point at a stack frame this same process was parked
    // on (interrupted, or freshly launched by `execute`), untouched since
    // nothing else runs on this single CPU between ticks.
    unsafe {
        core::arch::asm!(
            "mov esp, {esp}",
            "mov ebp, {ebp}",
            esp = in(reg) esp,
            ebp = in(reg) ebp,
            options(nostack, preserves_flags),
        );
    }
}
