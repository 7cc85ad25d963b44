//! Terminal state table: three fixed slots multiplexing the single VGA
//! frame, a PS/2 keyboard line buffer, and RTC virtualization counters.
//!
//! Grounded on `term_t`/`terminal_init`/`terminal_switch` in the source this
//! kernel was ported from. `curr_term` (foreground, i.e. "owns the real VGA
//! frame") and `sched_term` (currently running process) are tracked
//! separately, matching that source exactly -- they differ whenever a
//! background terminal's process is on the CPU.

use spin::Mutex;

use crate::arch::x86::vga::{self, Screen, BUFFER_HEIGHT, BUFFER_WIDTH, VIDEO_MEM_BASE};

pub const TERMINAL_COUNT: usize = 3;
pub const LINE_BUFFER_SIZE: usize = 128;
const SCREEN_BYTES: usize = BUFFER_HEIGHT * BUFFER_WIDTH * 2;

struct TerminalState {
    screen: Screen,
    line_buf: [u8; LINE_BUFFER_SIZE],
    line_len: usize,
    enter_pressed: bool,
    ctrl_l_replay: Option<([u8; LINE_BUFFER_SIZE], usize)>,
    rtc_period: u32,
    rtc_remaining: u32,
    active: bool,
    current_pid: Option<usize>,
}

impl TerminalState {
    const fn new(backing_base: usize) -> Self {
        TerminalState {
            // SAFETY: backing_base is one of the three fixed per-terminal
            // pages reserved by the paging module; see `backing_base_for`.
            screen: unsafe { Screen::at(backing_base) },
            line_buf: [0; LINE_BUFFER_SIZE],
            line_len: 0,
            enter_pressed: false,
            ctrl_l_replay: None,
            rtc_period: 0,
            rtc_remaining: 0,
            active: false,
            current_pid: None,
        }
    }
}

fn backing_base_for(terminal_id: usize) -> usize {
    VIDEO_MEM_BASE + (terminal_id + 1) * 0x1000
}

static TERMINALS: Mutex<[TerminalState; TERMINAL_COUNT]> = Mutex::new([
    TerminalState::new(VIDEO_MEM_BASE + 0x1000),
    TerminalState::new(VIDEO_MEM_BASE + 0x2000),
    TerminalState::new(VIDEO_MEM_BASE + 0x3000),
]);

/// The live hardware frame, always at `0xB8000`. Kernel diagnostics
/// (`print!`/`println!`) and the foreground terminal's own output both
/// ultimately land here.
static LIVE_SCREEN: Mutex<Screen> = Mutex::new(unsafe { Screen::at(VIDEO_MEM_BASE) });

static CURR_TERM: Mutex<usize> = Mutex::new(0);
static SCHED_TERM: Mutex<usize> = Mutex::new(0);

/// Reset all terminal slots to their boot state.
pub fn init() {
    let mut terms = TERMINALS.lock();
    for (i, t) in terms.iter_mut().enumerate() {
        t.line_len = 0;
        t.line_buf = [0; LINE_BUFFER_SIZE];
        t.enter_pressed = false;
        t.ctrl_l_replay = None;
        t.rtc_period = 0;
        t.rtc_remaining = 0;
        t.active = false;
        t.current_pid = None;
        t.screen.x = 0;
        t.screen.y = 0;
        let _ = i;
    }
    drop(terms);
    *CURR_TERM.lock() = 0;
    *SCHED_TERM.lock() = 0;
    LIVE_SCREEN.lock().clear();
}

pub fn curr_term() -> usize {
    *CURR_TERM.lock()
}

pub fn sched_term() -> usize {
    *SCHED_TERM.lock()
}

pub fn set_sched_term(t: usize) {
    *SCHED_TERM.lock() = t;
}

pub fn is_active(terminal_id: usize) -> bool {
    TERMINALS.lock()[terminal_id].active
}

pub fn set_active(terminal_id: usize, active: bool) {
    TERMINALS.lock()[terminal_id].active = active;
}

pub fn current_pid(terminal_id: usize) -> Option<usize> {
    TERMINALS.lock()[terminal_id].current_pid
}

pub fn set_current_pid(terminal_id: usize, pid: Option<usize>) {
    TERMINALS.lock()[terminal_id].current_pid = pid;
}

/// Run `f` against whichever screen currently represents the live VGA
/// frame. Used by `print!`/`println!` for kernel diagnostics: these always
/// target the real frame, independent of which process is scheduled.
pub fn with_foreground_screen<R>(f: impl FnOnce(&mut Screen) -> R) -> R {
    f(&mut LIVE_SCREEN.lock())
}

/// Write one byte of user process output to the screen actually backing
/// `terminal_id` right now: the live frame if it is foreground, otherwise
/// its own backing page. This is the multiplexing behavior implied by the
/// user-video page retargeting in the scheduler (§4.6/§4.2 of the design
/// spec); the exact body of the original driver's `putc` was not present in
/// the retrieved source, so this is reconstructed from that contract.
pub fn write_user_byte(terminal_id: usize, byte: u8) {
    if terminal_id == curr_term() {
        LIVE_SCREEN.lock().write_byte(byte);
    } else {
        TERMINALS.lock()[terminal_id].screen.write_byte(byte);
    }
}

/// Keyboard ISR entry point for a printable character: append to the
/// foreground terminal's line buffer (dropping once full) and echo it.
pub fn push_char(c: u8) {
    let term = curr_term();
    let mut terms = TERMINALS.lock();
    let t = &mut terms[term];
    if t.line_len < LINE_BUFFER_SIZE {
        t.line_buf[t.line_len] = c;
        t.line_len += 1;
        drop(terms);
        LIVE_SCREEN.lock().write_byte(c);
    }
}

/// Insert four spaces (Tab), each individually capped by remaining room.
pub fn push_tab() {
    for _ in 0..4 {
        let term = curr_term();
        let full = TERMINALS.lock()[term].line_len >= LINE_BUFFER_SIZE - 1;
        if full {
            break;
        }
        push_char(b' ');
    }
}

/// Erase the last buffered character, if any.
pub fn backspace() {
    let term = curr_term();
    let mut terms = TERMINALS.lock();
    let t = &mut terms[term];
    if t.line_len == 0 {
        return;
    }
    t.line_len -= 1;
    drop(terms);
    LIVE_SCREEN.lock().backspace();
}

/// Enter key: mark the line complete and advance the cursor.
pub fn press_enter() {
    let term = curr_term();
    TERMINALS.lock()[term].enter_pressed = true;
    LIVE_SCREEN.lock().write_byte(b'\n');
}

/// Ctrl+L: snapshot the current line, clear the screen, and arm a replay
/// flag consumed by the next `terminal_read`. Also sets `enter_pressed` so
/// a blocked `terminal_read` unblocks immediately and performs the replay.
pub fn ctrl_l() {
    let term = curr_term();
    let mut terms = TERMINALS.lock();
    let t = &mut terms[term];
    let mut snapshot = [0u8; LINE_BUFFER_SIZE];
    snapshot[..t.line_len].copy_from_slice(&t.line_buf[..t.line_len]);
    t.ctrl_l_replay = Some((snapshot, t.line_len));
    t.line_len = 0;
    t.enter_pressed = true;
    drop(terms);
    LIVE_SCREEN.lock().clear();
}

/// Switch the foreground terminal, copying video memory both ways and
/// relocating the hardware cursor. No-op if `target` is already foreground.
pub fn switch_foreground(target: usize) {
    let mut curr = CURR_TERM.lock();
    if *curr == target {
        return;
    }
    let mut terms = TERMINALS.lock();
    let mut live = LIVE_SCREEN.lock();

    // SAFETY: both the live frame and each terminal's backing page are
    // fixed, kernel-mapped 4 KiB regions for the kernel's lifetime.
    unsafe {
        let outgoing = &mut terms[*curr].screen;
        live.copy_into(outgoing.buffer_ptr());
        outgoing.x = live.x;
        outgoing.y = live.y;

        let incoming = &mut terms[target].screen;
        live.copy_from(incoming.buffer_ptr());
        live.x = incoming.x;
        live.y = incoming.y;
    }
    *curr = target;
    vga::set_hardware_cursor(live.x, live.y);
}

/// `terminal_read`: block until Enter (or a pending Ctrl+L replay fires),
/// then copy the buffered line into `buf` with a trailing newline.
///
/// Returns the number of bytes written, which always includes the
/// appended `'\n'`.
pub fn read(terminal_id: usize, buf: &mut [u8]) -> usize {
    {
        let mut terms = TERMINALS.lock();
        let t = &mut terms[terminal_id];
        if let Some((saved, len)) = t.ctrl_l_replay.take() {
            t.line_buf[..len].copy_from_slice(&saved[..len]);
            t.line_len = len;
            drop(terms);
            for &b in &saved[..len] {
                LIVE_SCREEN.lock().write_byte(b);
            }
        }
    }

    loop {
        if TERMINALS.lock()[terminal_id].enter_pressed {
            break;
        }
        core::hint::spin_loop();
    }

    let mut terms = TERMINALS.lock();
    let t = &mut terms[terminal_id];
    t.enter_pressed = false;
    let copy_len = core::cmp::min(t.line_len, buf.len().saturating_sub(1));
    buf[..copy_len].copy_from_slice(&t.line_buf[..copy_len]);
    let mut n = copy_len;
    if n < buf.len() {
        buf[n] = b'\n';
        n += 1;
    }
    t.line_len = 0;
    t.line_buf = [0; LINE_BUFFER_SIZE];
    n
}

/// `terminal_write`: emit `buf` to the screen backing `terminal_id` right
/// now, skipping (and not counting) NUL bytes.
pub fn write(terminal_id: usize, buf: &[u8]) -> usize {
    let mut count = 0;
    for &b in buf {
        if b == 0 {
            continue;
        }
        write_user_byte(terminal_id, b);
        count += 1;
    }
    count
}

// ----- RTC virtualization -----

pub fn set_rtc_period(terminal_id: usize, period: u32) {
    TERMINALS.lock()[terminal_id].rtc_period = period;
}

pub fn arm_rtc_wait(terminal_id: usize) {
    let mut terms = TERMINALS.lock();
    let period = terms[terminal_id].rtc_period;
    terms[terminal_id].rtc_remaining = period;
}

pub fn rtc_wait_elapsed(terminal_id: usize) -> bool {
    TERMINALS.lock()[terminal_id].rtc_remaining == 0
}

/// IRQ8 handler callback: decrement the *scheduled* terminal's counter, if
/// it is active and not already drained.
pub fn rtc_tick_scheduled_terminal() {
    let term = sched_term();
    let mut terms = TERMINALS.lock();
    let t = &mut terms[term];
    if t.active && t.rtc_remaining != 0 {
        t.rtc_remaining -= 1;
    }
}

const _: () = assert!(SCREEN_BYTES == 4000);
