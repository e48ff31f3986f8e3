//! System call traits
//!
//! This module provides common traits for system calls.

use kinspect_api::{ArgFetcher, Pid, Result};

use crate::kernel::Kernel;

/// Caller of a system call
#[derive(Clone, Copy)]
pub struct SyscallContext<'k> {
    /// Machine the call runs on
    pub kernel: &'k Kernel,
    /// Calling process
    pub pid: Pid,
}

impl<'k> SyscallContext<'k> {
    /// Creates a context for `pid` on `kernel`
    pub fn new(kernel: &'k Kernel, pid: Pid) -> Self {
        Self { kernel, pid }
    }
}

/// System call handler trait
pub trait SyscallHandler: Send + Sync {
    /// Execute the system call
    fn execute(&self, cx: &SyscallContext<'_>, args: &dyn ArgFetcher) -> Result<isize>;

    /// Get the system call name
    fn name(&self) -> &'static str;

    /// Get the system call ID
    fn id(&self) -> u32;
}
