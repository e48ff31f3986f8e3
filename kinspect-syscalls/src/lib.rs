//! Kinspect System Calls
//!
//! This crate provides the introspection system calls and the dispatch path
//! that runs them on a hosted [`Kernel`].
//!
//! # Architecture
//!
//! - **Dispatch**: handler registry, error collapse to `-1`, trace reporting
//! - **Memory**: `pgaccess` and `sbrk`
//! - **Sysinfo**: free memory and live process count snapshot
//! - **Trace**: per-process syscall trace mask
//! - **Process**: process table, `fork`, `exit`, `wait`, `getpid`
//!
//! # Usage
//!
//! ```rust
//! use kinspect_syscalls::{Kernel, LogTracer, SyscallDispatcher, SyscallArgs, SYS_TRACE};
//!
//! let kernel = Kernel::default();
//! let init = kernel.spawn_init().unwrap();
//! let dispatcher = SyscallDispatcher::with_default_handlers(Box::new(LogTracer)).unwrap();
//!
//! let ret = dispatcher.dispatch(&kernel, init, SYS_TRACE, &SyscallArgs::with1(1 << SYS_TRACE));
//! assert_eq!(ret, 0);
//! ```

#![no_std]
#![warn(missing_docs)]

extern crate alloc;

mod logging;

pub mod config;
pub mod dispatch;
pub mod kernel;
pub mod memory;
pub mod process;
pub mod sysinfo;
pub mod trace;
pub mod types;

// Re-export API types
pub use kinspect_api::*;

// Re-export commonly used items
pub use config::KernelConfig;
pub use dispatch::{SyscallContext, SyscallDispatcher, SyscallHandler, SyscallStats};
pub use kernel::{Kernel, UserSpace};
pub use process::{Proc, ProcState, ProcessTable};
pub use trace::{LogTracer, SyscallTracer, TraceRecord};
pub use types::*;

/// Registers every handler of this crate
pub fn register_handlers(dispatcher: &mut SyscallDispatcher) -> Result<()> {
    process::register_handlers(dispatcher)?;
    memory::register_handlers(dispatcher)?;
    sysinfo::register_handlers(dispatcher)?;
    trace::register_handlers(dispatcher)?;
    Ok(())
}
