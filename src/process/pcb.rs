//! Process control block and file-descriptor table.
//!
//! Grounded on `pcb_t`/`fd_t` in `systemcalls.h` (not directly read, but
//! implied by every field `systemcalls.c` touches: `fd_array`, `parent_pcb`,
//! `pid`, `terminal_id`, `esp`/`ebp`, `args`). The PCB lives at a fixed,
//! computable physical address -- `KERNEL_END - (pid+1) * 8 KiB` -- which
//! doubles as the base of that process's kernel-mode stack, so no
//! allocator is involved in creating or destroying one.

use crate::fs::FileType;

pub const MAX_PROC: usize = 6;
pub const FD_TABLE_SIZE: usize = 8;
pub const ARGS_BUF_SIZE: usize = 128;

pub const KERNEL_MEM_END: u32 = 0x0080_0000;
const PCB_SLOT_SIZE: u32 = 0x2000; // 8 KiB

/// Physical address of pid's PCB, which also serves as the top of its
/// 8 KiB kernel stack (the PCB sits at the *bottom* of that stack's range).
pub const fn pcb_address(pid: usize) -> u32 {
    KERNEL_MEM_END - (pid as u32 + 1) * PCB_SLOT_SIZE
}

/// Kernel-stack pointer used for a freshly-created process: 4 bytes below
/// the top of its 8 KiB slot, matching `tss.esp0` at `execute_context_switch`.
pub const fn initial_kernel_esp(pid: usize) -> u32 {
    KERNEL_MEM_END - (pid as u32) * PCB_SLOT_SIZE - 4
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FdKind {
    Terminal,
    Rtc,
    Directory,
    File,
}

impl FdKind {
    pub fn from_file_type(file_type: FileType) -> Self {
        match file_type {
            FileType::Rtc => FdKind::Rtc,
            FileType::Directory => FdKind::Directory,
            FileType::Regular => FdKind::File,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FdEntry {
    pub kind: Option<FdKind>,
    pub inode: u32,
    pub file_position: u32,
    pub in_use: bool,
}

impl FdEntry {
    pub const fn closed() -> Self {
        FdEntry {
            kind: None,
            inode: 0,
            file_position: 0,
            in_use: false,
        }
    }
}

impl Default for FdEntry {
    fn default() -> Self {
        Self::closed()
    }
}

/// One process's control block.
pub struct Pcb {
    pub fd_table: [FdEntry; FD_TABLE_SIZE],
    pub parent_pid: Option<usize>,
    pub pid: usize,
    pub terminal_id: usize,
    /// Saved kernel stack/frame pointers, captured right before this
    /// process's own `execute` call handed control to a child. Consumed by
    /// that child's `halt` to resume this process.
    pub saved_esp: u32,
    pub saved_ebp: u32,
    pub args: [u8; ARGS_BUF_SIZE],
    pub args_len: usize,
}

impl Pcb {
    /// Construct a fresh PCB for `pid`, with fds 0/1 pre-opened on the
    /// terminal (stdin/stdout), matching `execute_create_pcb`.
    pub fn new(pid: usize, parent_pid: Option<usize>, terminal_id: usize, args: &[u8]) -> Self {
        let mut fd_table = [FdEntry::closed(); FD_TABLE_SIZE];
        fd_table[0] = FdEntry {
            kind: Some(FdKind::Terminal),
            inode: 0,
            file_position: 0,
            in_use: true,
        };
        fd_table[1] = fd_table[0];

        let mut args_buf = [0u8; ARGS_BUF_SIZE];
        let copy_len = core::cmp::min(args.len(), ARGS_BUF_SIZE);
        args_buf[..copy_len].copy_from_slice(&args[..copy_len]);

        Pcb {
            fd_table,
            parent_pid,
            pid,
            terminal_id,
            // `execute_create_pcb`'s initial value: the top of the user
            // stack, matching `paging::USER_STACK`, not zero.
            saved_esp: crate::arch::x86::paging::USER_STACK,
            saved_ebp: crate::arch::x86::paging::USER_STACK,
            args: args_buf,
            args_len: copy_len,
        }
    }

    /// Write this PCB to its fixed physical address.
    ///
    /// # Safety
    /// `pid` must not already have a live PCB at that address (i.e. the
    /// slot was freed by a prior `halt`, or never used).
    pub unsafe fn store(self) -> &'static mut Pcb {
        let addr = pcb_address(self.pid) as *mut Pcb;
        // SAFETY: forwarded from the caller; addr is always 8 KiB-aligned
        // and large enough for a Pcb by construction of PCB_SLOT_SIZE.
        unsafe {
            addr.write(self);
            &mut *addr
        }
    }

    /// Borrow the live PCB at `pid`'s fixed address.
    ///
    /// # Safety
    /// `pid` must currently hold a PCB written by [`Pcb::store`].
    pub unsafe fn at(pid: usize) -> &'static mut Pcb {
        // SAFETY: forwarded from the caller.
        unsafe { &mut *(pcb_address(pid) as *mut Pcb) }
    }
}
