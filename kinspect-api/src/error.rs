//! Error handling module for the introspection primitives
//!
//! Only [`Error::OutOfRange`] and [`Error::CopyFault`] can come out of
//! `pgaccess`, `sysinfo` and `trace`. The remaining variants belong to the
//! hosted process/memory model and the dispatcher. Whatever the variant, a
//! failed syscall returns [`SYSCALL_FAILURE`] to user space.

use core::fmt;

use crate::types::{Pid, VirtAddr};

/// Value every failed syscall returns to user space
pub const SYSCALL_FAILURE: isize = -1;

/// Common error type used throughout kinspect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Requested page count is negative or above the scan limit
    OutOfRange {
        /// Count as passed by the caller
        requested: i64,
        /// Largest count the scanner accepts
        max: usize,
    },
    /// Destination is not writably mapped in the caller's address space
    CopyFault(VirtAddr),
    /// A simulated user access hit an unmapped or forbidden page
    PageFault(VirtAddr),
    /// No free physical frame or process slot
    OutOfMemory,
    /// No live process with this pid
    NoProcess(Pid),
    /// `wait` called by a process without children
    NoChildren,
    /// Children exist but none has exited yet
    WouldBlock,
    /// No handler registered for this syscall number
    UnknownSyscall(u32),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::OutOfRange { requested, max } => {
                write!(f, "Page count out of range: {} (max {})", requested, max)
            }
            Error::CopyFault(va) => write!(f, "Copy-out fault at {}", va),
            Error::PageFault(va) => write!(f, "Page fault at {}", va),
            Error::OutOfMemory => write!(f, "Out of memory"),
            Error::NoProcess(pid) => write!(f, "No such process: {}", pid),
            Error::NoChildren => write!(f, "No child processes"),
            Error::WouldBlock => write!(f, "Operation would block"),
            Error::UnknownSyscall(id) => write!(f, "Unknown system call {}", id),
        }
    }
}

impl Error {
    /// Collapses the error to the value seen at the syscall boundary.
    ///
    /// Callers cannot tell a bad argument from a bad output pointer.
    pub const fn to_syscall_return(self) -> isize {
        SYSCALL_FAILURE
    }
}

/// Result type for operations that can fail
pub type Result<T> = core::result::Result<T, Error>;

/// Converts a handler result into the raw value returned to user space
pub fn into_syscall_return(result: Result<isize>) -> isize {
    result.unwrap_or_else(Error::to_syscall_return)
}
