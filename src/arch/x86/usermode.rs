//! The execute/halt continuation: a hand-rolled, non-reentrant handoff
//! between a parent blocked in `execute` and the child it launched into
//! ring 3.
//!
//! Grounded on `execute_context_switch`/`halt` in `systemcalls.c`. The
//! original captures the parent's `esp`/`ebp` with inline asm right before
//! calling into the child, then has `halt` restore those exact values and
//! `jmp` to a label (`EXEC_FIN`) physically inside `execute`'s own body,
//! which `leave; ret`s back to whoever called `execute`. Rust's
//! `#[unsafe(naked)]` functions cannot expose an internal label as a
//! jump target from another function, so the same contract -- parent
//! blocks, child's `halt` resumes it with a status code in the return
//! register -- is expressed instead as two global assembly symbols wired
//! together with `sym`: [`enter_user_mode`] is the "call", and
//! `tercio_exec_fin` is the shared resume point `resume_parent` jumps to.

use core::arch::{asm, global_asm};

use super::gdt::{USER_CS, USER_DS};

global_asm!(
    r#"
.global tercio_enter_user_mode
tercio_enter_user_mode:
    mov eax, [esp + 4]
    mov ecx, [esp + 8]
    push {user_ds}
    push ecx
    sti
    pushfd
    push {user_cs}
    push eax
    iretd

.global tercio_exec_fin
tercio_exec_fin:
    ret
"#,
    user_ds = const USER_DS,
    user_cs = const USER_CS,
);

unsafe extern "C" {
    /// `extern "C" fn(entry: u32, user_esp: u32) -> u32`. Never actually
    /// returns via its own `ret`; control instead re-enters at
    /// `tercio_exec_fin` when [`resume_parent`] is called from the child's
    /// `halt`, with `eax` already holding the exit status.
    fn tercio_enter_user_mode(entry: u32, user_esp: u32) -> u32;
    fn tercio_exec_fin();
}

/// Build the ring3 IRET frame and transfer control to `entry` running on
/// `user_esp`. Returns the exit status once some descendant process halts
/// back up to this call (via [`resume_parent`]), exactly mirroring
/// `execute`'s blocking return value.
///
/// # Safety
/// The caller must have already: written the process's CR3-equivalent
/// page-directory entry ([`super::paging::set_user_page`]), loaded
/// `USER_CS`/`USER_DS` as valid ring-3 GDT selectors, and set
/// `tss.esp0`/`tss.ss0` for this process's *next* ring3->ring0 transition.
pub unsafe fn enter_user_mode(entry: u32, user_esp: u32) -> u32 {
    // SAFETY: forwarded to the caller's safety contract above.
    unsafe { tercio_enter_user_mode(entry, user_esp) }
}

/// `halt`'s side of the handoff: restore the parent's saved stack/frame
/// pointers, place `status` where [`enter_user_mode`]'s caller expects its
/// return value, and resume it.
///
/// # Safety
/// `esp`/`ebp` must be values previously captured from a live,
/// still-on-stack invocation of [`enter_user_mode`] (i.e. the parent's PCB
/// fields, untouched since that call was made).
pub unsafe fn resume_parent(esp: u32, ebp: u32, status: u32) -> ! {
    // SAFETY: contract described above; this never returns.
    unsafe {
        asm!(
            "mov esp, {esp}",
            "mov ebp, {ebp}",
            "mov eax, {status}",
            "jmp {target}",
            esp = in(reg) esp,
            ebp = in(reg) ebp,
            status = in(reg) status,
            target = sym tercio_exec_fin,
            options(noreturn),
        );
    }
}

/// Snapshot the current `esp`/`ebp`, to be stashed in a PCB right before
/// calling [`enter_user_mode`] for a child.
pub fn capture_stack() -> (u32, u32) {
    let esp: u32;
    let ebp: u32;
    // SAFETY: reads-only, no side effects.
    unsafe {
        asm!("mov {0}, esp", out(reg) esp, options(nomem, nostack, preserves_flags));
        asm!("mov {0}, ebp", out(reg) ebp, options(nomem, nostack, preserves_flags));
    }
    (esp, ebp)
}
