//! Kinspect API - Shared types and interfaces for kernel introspection
//!
//! This crate provides the types and collaborator interfaces used by the
//! introspection primitives (`pgaccess`, `sysinfo`, `trace`). The primitives
//! themselves live in `kinspect-mm` and `kinspect-syscalls`; everything they
//! need from the rest of the kernel is reached through the traits here.
//!
//! # Architecture
//!
//! - **Error**: the error type and its collapse to a syscall return value
//! - **Types**: addresses, process ids and the `sysinfo` wire layout
//! - **Memory**: page-table entry handles, the non-allocating walker, copy-out
//! - **Process**: the process directory and per-process trace mask
//! - **Syscall**: positional argument fetching
//!
//! # Usage
//!
//! ```rust
//! use kinspect_api::{ArgFetcher, SyscallArgs, VirtAddr};
//!
//! let args = SyscallArgs::with3(0x4000, 32, 0x9000);
//! assert_eq!(args.arg_addr(0), VirtAddr::new(0x4000));
//! assert_eq!(args.arg_int(1), 32);
//! ```

#![no_std]
#![warn(missing_docs)]

pub mod error;
pub mod memory;
pub mod process;
pub mod syscall;
pub mod types;

// Re-export commonly used types
pub use crate::error::{Error, Result, SYSCALL_FAILURE, into_syscall_return};
pub use crate::memory::{FreeMemorySource, PageTableEntry, PageTableWalker, UserCopier};
pub use crate::process::{ProcessDirectory, TRACE_DISABLED, TraceMask, is_traced};
pub use crate::syscall::{ArgFetcher, SyscallArgs};
pub use crate::types::{Pid, SystemSnapshot, VirtAddr};
