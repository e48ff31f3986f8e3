//! Syscall dispatch
//!
//! Routes a syscall number to its handler, collapses errors to `-1` and
//! reports the return value of every call the caller's trace mask selects.

pub mod dispatcher;
pub mod traits;

pub use dispatcher::{SyscallDispatcher, SyscallStats};
pub use traits::{SyscallContext, SyscallHandler};
