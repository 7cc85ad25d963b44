//! `int 0x80` dispatcher and its ten handlers.
//!
//! Grounded on `systemcalls.c`: `dispatch` mirrors the static jump table
//! indexed `[1..10]`, and each handler below follows that file's control
//! flow closely enough to preserve its two documented quirks verbatim --
//! `open`'s fd-slot leak on a failed type-specific open, and the
//! executable-magic check that never reads byte 0 (see [`crate::fs`]).

use spin::Mutex;

use crate::arch::x86::{gdt, paging, rtc, usermode};
use crate::fs::{self, FileType};
use crate::process::pcb::{initial_kernel_esp, FdEntry, FdKind};
use crate::process::{self, Pcb};
use crate::terminal;

pub const MAX_FILE_SIZE: usize = 36_164;

/// A single un-scoped flag, matching `exception_flag` in
/// `exception_handler.h`: set by [`halt_current_process`] from whichever
/// terminal's exception handler fired, and consumed by the next
/// `halt`/`execute` return, on whichever terminal happens to read it first.
/// Not per-terminal state -- an exception on one terminal can promote the
/// status of a `halt` on a different one, matching the original exactly.
static EXCEPTION_FLAG: Mutex<bool> = Mutex::new(false);

fn set_exception_flag(value: bool) {
    *EXCEPTION_FLAG.lock() = value;
}

fn take_exception_flag() -> bool {
    core::mem::replace(&mut *EXCEPTION_FLAG.lock(), false)
}

/// `int 0x80` jump table. Unknown call numbers return `-1`.
pub fn dispatch(num: u32, arg1: u32, arg2: u32, arg3: u32) -> i32 {
    match num {
        1 => halt(arg1 as u8) as i32,
        2 => execute(arg1 as *const u8),
        3 => read(arg1 as i32, arg2 as *mut u8, arg3 as usize),
        4 => write(arg1 as i32, arg2 as *const u8, arg3 as usize),
        5 => open(arg1 as *const u8),
        6 => close(arg1 as i32),
        7 => getargs(arg1 as *mut u8, arg2 as usize),
        8 => vidmap(arg1 as *mut u32),
        9 => set_handler(),
        10 => sigreturn(),
        _ => -1,
    }
}

/// Borrow the PCB of whichever process is current on `terminal_id`, if any.
///
/// # Safety
/// Valid any time `terminal::current_pid` reports `Some` for this terminal,
/// since that is only ever true while the named pid's PCB is live.
unsafe fn current_pcb(terminal_id: usize) -> Option<&'static mut Pcb> {
    let pid = terminal::current_pid(terminal_id)?;
    // SAFETY: forwarded from the caller.
    Some(unsafe { Pcb::at(pid) })
}

/// Split a command into `(filename, args)`: strip leading spaces, copy up
/// to 32 non-space bytes as the filename, strip the spaces that follow it,
/// then copy the remainder (capped at [`process::ARGS_BUF_SIZE`]) as args.
fn parse_command(command: &[u8]) -> Option<([u8; 32], usize, [u8; process::ARGS_BUF_SIZE], usize)> {
    let mut i = 0;
    while i < command.len() && command[i] == b' ' {
        i += 1;
    }
    if i >= command.len() {
        return None;
    }

    let mut filename = [0u8; 32];
    let mut flen = 0;
    while i < command.len() && command[i] != b' ' && flen < 32 {
        filename[flen] = command[i];
        flen += 1;
        i += 1;
    }

    while i < command.len() && command[i] == b' ' {
        i += 1;
    }

    let mut args = [0u8; process::ARGS_BUF_SIZE];
    let mut alen = 0;
    while i < command.len() && command[i] != 0 && alen < process::ARGS_BUF_SIZE {
        args[alen] = command[i];
        alen += 1;
        i += 1;
    }

    Some((filename, flen, args, alen))
}

/// Copy a NUL-terminated user string into a fixed-size stack buffer. User
/// pointers are trusted, as throughout this dispatcher -- the source this
/// kernel was ported from has no separate copy-from-user validation layer.
fn copy_cstr(ptr: *const u8, out: &mut [u8]) -> usize {
    if ptr.is_null() {
        return 0;
    }
    let mut n = 0;
    while n < out.len() {
        // SAFETY: trusted user pointer, as documented above.
        let b = unsafe { *ptr.add(n) };
        if b == 0 {
            break;
        }
        out[n] = b;
        n += 1;
    }
    n
}

/// §4.4: the central act of the kernel. Blocks until some descendant halts.
pub fn execute(command: *const u8) -> i32 {
    let mut raw = [0u8; 128];
    let raw_len = copy_cstr(command, &mut raw);
    if raw_len == 0 {
        return -1;
    }
    execute_command(&raw[..raw_len])
}

fn execute_command(command: &[u8]) -> i32 {
    // SAFETY: cli for the entire setup sequence, matching execute's contract.
    unsafe { core::arch::asm!("cli", options(nomem, nostack)) };

    let term = terminal::sched_term();
    set_exception_flag(false);

    let parent_pid = if terminal::is_active(term) {
        // SAFETY: is_active(term) implies current_pid(term) is Some.
        if let Some(pcb) = unsafe { current_pcb(term) } {
            let (esp, ebp) = usermode::capture_stack();
            pcb.saved_esp = esp;
            pcb.saved_ebp = ebp;
        }
        terminal::current_pid(term)
    } else {
        None
    };
    terminal::set_active(term, true);

    let Some((filename, flen, args, alen)) = parse_command(command) else {
        unsafe { core::arch::asm!("sti", options(nomem, nostack)) };
        return -1;
    };
    let name = &filename[..flen];

    if fs::dentry_by_name(name).is_err() || !fs::is_executable(name) {
        unsafe { core::arch::asm!("sti", options(nomem, nostack)) };
        return -1;
    }

    let new_pid = match process::find_free_pid() {
        Ok(pid) => pid,
        Err(_) => {
            log::warn!("PID Array is Full");
            unsafe { core::arch::asm!("sti", options(nomem, nostack)) };
            return -1;
        }
    };

    paging::set_user_page(new_pid);

    // SAFETY: `set_user_page` just remapped the program-image page to this
    // pid's frame, which is identity-backed kernel-writable memory until
    // the IRET below drops to ring 3. Loading straight into it (rather
    // than staging through a kernel-stack buffer) avoids putting a
    // MAX_FILE_SIZE-byte object on the 8 KiB kernel stack.
    let dest = unsafe {
        core::slice::from_raw_parts_mut(paging::PROGRAM_IMAGE_ADDR as *mut u8, MAX_FILE_SIZE)
    };
    let _loaded = fs::load_program(name, dest).unwrap_or(0);

    let Ok(entry) = fs::entry_point(name) else {
        process::release_pid(new_pid);
        unsafe { core::arch::asm!("sti", options(nomem, nostack)) };
        return -1;
    };

    let pcb = Pcb::new(new_pid, parent_pid, term, &args[..alen]);
    // SAFETY: new_pid was just allocated by find_free_pid, so its slot
    // holds no live PCB.
    unsafe { pcb.store() };
    terminal::set_current_pid(term, Some(new_pid));
    gdt::set_kernel_stack(initial_kernel_esp(new_pid));

    // SAFETY: page directory, TSS, and PCB are all set up for new_pid --
    // the documented precondition of `enter_user_mode`.
    let status = unsafe { usermode::enter_user_mode(entry, paging::USER_STACK) };

    if take_exception_flag() {
        256
    } else {
        (status & 0xFF) as i32
    }
}

/// §4.5: close every fd, free the pid, and either respawn `shell` (root
/// process of a terminal) or resume the parent.
pub fn halt(status: u8) -> u32 {
    let term = terminal::sched_term();
    let Some(pid) = terminal::current_pid(term) else {
        return 0;
    };
    // SAFETY: current_pid(term) is Some only while pid's PCB is live.
    let pcb = unsafe { Pcb::at(pid) };

    for fd in &mut pcb.fd_table {
        *fd = FdEntry::closed();
    }
    process::release_pid(pid);

    let promoted_status = if take_exception_flag() {
        status as u32 + 1
    } else {
        status as u32
    };

    match pcb.parent_pid {
        None => {
            terminal::set_current_pid(term, None);
            execute_command(b"shell");
            promoted_status
        }
        Some(parent_pid) => {
            terminal::set_current_pid(term, Some(parent_pid));
            paging::set_user_page(parent_pid);
            gdt::set_kernel_stack(initial_kernel_esp(parent_pid));

            // SAFETY: parent_pid was running before this child's execute
            // call and still holds a live PCB.
            let parent = unsafe { Pcb::at(parent_pid) };
            let esp = parent.saved_esp;
            let ebp = parent.saved_ebp;
            // SAFETY: esp/ebp were captured by this parent's own execute
            // call right before it entered user mode for this child, and
            // have not been touched since.
            unsafe { usermode::resume_parent(esp, ebp, promoted_status) }
        }
    }
}

/// Invoked from the exception handler: an unhandled fault in the running
/// process is equivalent to that process calling `halt(255)`, except the
/// exception flag is set first so `execute` promotes the status to 256.
pub fn halt_current_process(status: u8) -> ! {
    set_exception_flag(true);
    halt(status);
    unreachable!("halt never returns")
}

fn valid_fd(fd: i32) -> Option<usize> {
    if fd < 0 || fd as usize >= process::FD_TABLE_SIZE {
        None
    } else {
        Some(fd as usize)
    }
}

pub fn read(fd: i32, buf: *mut u8, nbytes: usize) -> i32 {
    let Some(fd) = valid_fd(fd) else {
        return -1;
    };
    if fd == 1 {
        return -1; // can't read stdout
    }
    let term = terminal::sched_term();
    // SAFETY: the dispatcher only runs while some process is current.
    let Some(pcb) = (unsafe { current_pcb(term) }) else {
        return -1;
    };
    let entry = pcb.fd_table[fd];
    if !entry.in_use {
        return -1;
    }

    // SAFETY: user pointer trusted, as throughout this dispatcher.
    let out = unsafe { core::slice::from_raw_parts_mut(buf, nbytes) };

    let n = match entry.kind {
        Some(FdKind::Terminal) => terminal::read(term, out),
        Some(FdKind::Rtc) => {
            rtc::read(term);
            0
        }
        Some(FdKind::Directory) => fs::read_directory(out),
        Some(FdKind::File) => fs::read_data(entry.inode, entry.file_position, out),
        None => return -1,
    };

    if n > 0 {
        pcb.fd_table[fd].file_position += n as u32;
    }
    n as i32
}

pub fn write(fd: i32, buf: *const u8, nbytes: usize) -> i32 {
    let Some(fd) = valid_fd(fd) else {
        return -1;
    };
    if fd == 0 {
        return -1; // can't write stdin
    }
    let term = terminal::sched_term();
    // SAFETY: the dispatcher only runs while some process is current.
    let Some(pcb) = (unsafe { current_pcb(term) }) else {
        return -1;
    };
    let entry = pcb.fd_table[fd];
    if !entry.in_use {
        return -1;
    }

    // SAFETY: user pointer trusted, as throughout this dispatcher.
    let data = unsafe { core::slice::from_raw_parts(buf, nbytes) };

    match entry.kind {
        Some(FdKind::Terminal) => terminal::write(term, data) as i32,
        Some(FdKind::Rtc) => rtc_write(term, data),
        _ => -1, // files and directories are read-only
    }
}

/// `rtc_write`: the 4-byte buffer is a little-endian rate in Hz; any other
/// length is rejected, matching the original's exact `nbytes != 4` check.
fn rtc_write(term: usize, data: &[u8]) -> i32 {
    if data.len() != 4 {
        return -1;
    }
    let rate = i32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    match rtc::write(term, rate) {
        Ok(()) => 0,
        Err(_) => -1,
    }
}

/// §4.8: resolve the dentry, claim the lowest free fd slot, and mark it
/// in-use *before* the type-specific open hook runs.
///
/// Preserved quirk: if that hook fails, this still returns `-1` without
/// clearing `in_use` on the slot it just claimed -- the slot is lost for
/// the rest of the process's lifetime, matching `open()` in
/// `systemcalls.c`, which sets the fd's flags unconditionally before the
/// per-type open call and never rolls them back on failure.
pub fn open(filename: *const u8) -> i32 {
    let mut name = [0u8; 32];
    let len = copy_cstr(filename, &mut name);
    if len == 0 {
        return -1;
    }
    let Ok(dentry) = fs::dentry_by_name(&name[..len]) else {
        return -1;
    };

    let term = terminal::sched_term();
    // SAFETY: the dispatcher only runs while some process is current.
    let Some(pcb) = (unsafe { current_pcb(term) }) else {
        return -1;
    };

    let Some(fd) = (0..process::FD_TABLE_SIZE).find(|&i| !pcb.fd_table[i].in_use) else {
        return -1;
    };

    pcb.fd_table[fd] = FdEntry {
        kind: Some(FdKind::from_file_type(dentry.file_type)),
        inode: dentry.inode_num,
        file_position: 0,
        in_use: true,
    };

    let hook_ok = match dentry.file_type {
        FileType::Rtc => {
            rtc::open(term);
            true
        }
        FileType::Directory | FileType::Regular => true,
    };

    if !hook_ok {
        return -1;
    }
    fd as i32
}

pub fn close(fd: i32) -> i32 {
    let Some(fd) = valid_fd(fd) else {
        return -1;
    };
    if fd == 0 || fd == 1 {
        return -1;
    }
    let term = terminal::sched_term();
    // SAFETY: the dispatcher only runs while some process is current.
    let Some(pcb) = (unsafe { current_pcb(term) }) else {
        return -1;
    };
    if !pcb.fd_table[fd].in_use {
        return -1;
    }
    pcb.fd_table[fd] = FdEntry::closed();
    0
}

/// Fails if `buf` is null, `nbytes == 0`, the stored args string is empty,
/// or its length exceeds `nbytes` -- matching `getargs` exactly.
pub fn getargs(buf: *mut u8, nbytes: usize) -> i32 {
    if buf.is_null() || nbytes == 0 {
        return -1;
    }
    let term = terminal::sched_term();
    // SAFETY: the dispatcher only runs while some process is current.
    let Some(pcb) = (unsafe { current_pcb(term) }) else {
        return -1;
    };
    if pcb.args_len == 0 || pcb.args_len > nbytes {
        return -1;
    }
    // SAFETY: user pointer trusted, as throughout this dispatcher.
    unsafe { core::ptr::copy_nonoverlapping(pcb.args.as_ptr(), buf, pcb.args_len) };
    0
}

/// §4.9: writes the user-video page's virtual address through
/// `screen_start`, after checking it falls within the program-image page.
pub fn vidmap(screen_start: *mut u32) -> i32 {
    if screen_start.is_null() || !paging::program_image_contains(screen_start as u32) {
        return -1;
    }
    // SAFETY: pointer checked non-null and range-validated above.
    unsafe { *screen_start = paging::user_video_addr() };
    paging::flush_tlb();
    0
}

/// Unimplemented; matches the stub in `systemcalls.c`.
pub fn set_handler() -> i32 {
    log::info!("set_handler is not implemented");
    0
}

/// Unimplemented; matches the stub in `systemcalls.c`.
pub fn sigreturn() -> i32 {
    log::info!("sigreturn is not implemented");
    0
}

