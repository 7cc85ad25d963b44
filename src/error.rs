//! Kernel error types.
//!
//! One enum per subsystem rather than a single flat list, matching the
//! seams this kernel actually has: filesystem, process/pid table, paging,
//! and the syscall dispatcher. [`KernelError`] wraps all of them for call
//! sites (like the test harness) that just need a single `Result` type.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "kernel errors must be handled, not silently discarded"]
pub enum KernelError {
    Fs(FsError),
    Process(ProcessError),
    Paging(PagingError),
    Syscall(SyscallError),
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },
}

/// Filesystem-specific errors, grounded on the handful of failure paths
/// `filesystem.c` actually has: a missing dentry/inode and a write attempt
/// against the read-only image (surfaced by the RTC rate-write wrapper in
/// [`crate::arch::x86::rtc`], which borrows this type rather than defining
/// its own).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    /// No dentry matches the requested name or index.
    NoSuchFile,
    /// Filesystem is read-only; the operation requires a write.
    InvalidPath,
}

/// Process/pid-table errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessError {
    /// `execute_find_pid` found every slot in `pid_array` occupied.
    NoFreePid,
    /// Command name did not resolve to a dentry, or its executable check failed.
    NotExecutable,
}

/// Paging-related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagingError {
    /// `vidmap`'s output pointer fell outside the program-image page.
    PointerOutOfRange,
}

/// System-call-level errors, returned to userspace as a negative `i32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallError {
    BadFileDescriptor,
    NotImplemented,
    InvalidArgument,
}

pub type KernelResult<T> = Result<T, KernelError>;

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fs(e) => write!(f, "filesystem error: {:?}", e),
            Self::Process(e) => write!(f, "process error: {:?}", e),
            Self::Paging(e) => write!(f, "paging error: {:?}", e),
            Self::Syscall(e) => write!(f, "syscall error: {:?}", e),
            Self::InvalidState { expected, actual } => {
                write!(f, "invalid state: expected {}, got {}", expected, actual)
            }
        }
    }
}

impl From<FsError> for KernelError {
    fn from(err: FsError) -> Self {
        Self::Fs(err)
    }
}

impl From<ProcessError> for KernelError {
    fn from(err: ProcessError) -> Self {
        Self::Process(err)
    }
}

impl From<PagingError> for KernelError {
    fn from(err: PagingError) -> Self {
        Self::Paging(err)
    }
}

impl From<SyscallError> for KernelError {
    fn from(err: SyscallError) -> Self {
        Self::Syscall(err)
    }
}
