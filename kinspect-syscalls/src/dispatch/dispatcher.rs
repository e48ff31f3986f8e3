//! System call dispatcher
//!
//! This module provides the core system call dispatch mechanism.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;

use kinspect_api::{ArgFetcher, Error, Pid, Result, into_syscall_return, is_traced};
use spin::Mutex;

use super::traits::{SyscallContext, SyscallHandler};
use crate::kernel::Kernel;
use crate::sys_debug;
use crate::trace::{LogTracer, SyscallTracer, TraceRecord};

/// System call dispatcher
pub struct SyscallDispatcher {
    /// Registered system call handlers
    handlers: BTreeMap<u32, Box<dyn SyscallHandler>>,
    /// System call statistics
    stats: Mutex<SyscallStats>,
    /// Where traced returns are reported
    tracer: Box<dyn SyscallTracer>,
}

impl SyscallDispatcher {
    /// Create a dispatcher with no handlers that traces to the log
    pub fn new() -> Self {
        Self::with_tracer(Box::new(LogTracer))
    }

    /// Create a dispatcher with no handlers and a custom tracer
    pub fn with_tracer(tracer: Box<dyn SyscallTracer>) -> Self {
        Self {
            handlers: BTreeMap::new(),
            stats: Mutex::new(SyscallStats::default()),
            tracer,
        }
    }

    /// Create a dispatcher with every handler of this crate registered
    pub fn with_default_handlers(tracer: Box<dyn SyscallTracer>) -> Result<Self> {
        let mut dispatcher = Self::with_tracer(tracer);
        crate::register_handlers(&mut dispatcher)?;
        Ok(dispatcher)
    }

    /// Register a system call handler
    pub fn register_handler(&mut self, id: u32, handler: Box<dyn SyscallHandler>) {
        debug_assert_eq!(id, handler.id());
        self.handlers.insert(id, handler);
    }

    /// Get a system call handler
    pub fn get_handler(&self, id: u32) -> Option<&dyn SyscallHandler> {
        self.handlers.get(&id).map(|handler| handler.as_ref())
    }

    /// Runs syscall `id` for `pid` and returns what user space sees.
    ///
    /// Any error becomes `-1`. Afterwards the caller's trace mask is read,
    /// so a `trace` call that sets its own bit is reported too.
    pub fn dispatch(&self, kernel: &Kernel, pid: Pid, id: u32, args: &dyn ArgFetcher) -> isize {
        let handler = self.handlers.get(&id);
        let result = match handler {
            Some(handler) => handler.execute(&SyscallContext::new(kernel, pid), args),
            None => Err(Error::UnknownSyscall(id)),
        };

        {
            let mut stats = self.stats.lock();
            stats.total_calls += 1;
            *stats.calls_by_type.entry(id).or_insert(0) += 1;
            if let Err(error) = &result {
                stats.error_count += 1;
                sys_debug!("{}: syscall {} failed: {}", pid, id, error);
            }
        }

        let ret = into_syscall_return(result);

        if let (Some(handler), Ok(mask)) = (handler, kernel.trace_mask(pid)) {
            if is_traced(mask, id) {
                self.tracer.record(&TraceRecord {
                    pid,
                    name: handler.name(),
                    ret,
                });
            }
        }
        ret
    }

    /// Get system call statistics
    pub fn stats(&self) -> SyscallStats {
        self.stats.lock().clone()
    }
}

impl Default for SyscallDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// System call statistics
#[derive(Debug, Clone, Default)]
pub struct SyscallStats {
    /// Total number of system calls
    pub total_calls: u64,
    /// Number of calls by type
    pub calls_by_type: BTreeMap<u32, u64>,
    /// Number of errors
    pub error_count: u64,
}
