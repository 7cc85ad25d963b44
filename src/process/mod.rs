//! Process control blocks and the fixed-size PID table.
//!
//! This kernel runs at most [`pcb::MAX_PROC`] processes, each with exactly
//! one thread of execution; there is no fork, no virtual memory beyond the
//! single remapped program-image page, and no capability system. The PCB
//! lives at a fixed physical address computed from its pid rather than
//! being heap-allocated -- see [`pcb::pcb_address`].

pub mod pcb;
pub mod table;

pub use pcb::{FdEntry, FdKind, Pcb, ARGS_BUF_SIZE, FD_TABLE_SIZE, MAX_PROC};
pub use table::{find_free_pid, release_pid};
