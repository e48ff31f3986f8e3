//! Syscall tracing
//!
//! Each process carries a [`TraceMask`]; bit `n` asks for syscall `n` to be
//! reported when it returns. `trace` replaces the whole mask, so
//! `trace(0)` switches tracing off. Reports go to a [`SyscallTracer`], by
//! default [`LogTracer`].

use alloc::boxed::Box;

use kinspect_api::{ArgFetcher, Pid, Result, TraceMask};

use crate::dispatch::{SyscallContext, SyscallDispatcher, SyscallHandler};
use crate::kernel::Kernel;
use crate::sys_info;
use crate::types::SYS_TRACE;

/// One traced syscall return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceRecord {
    /// Calling process
    pub pid: Pid,
    /// Syscall name
    pub name: &'static str,
    /// Value returned to user space
    pub ret: isize,
}

/// Sink for traced syscall returns
pub trait SyscallTracer: Send + Sync {
    /// Reports one return
    fn record(&self, record: &TraceRecord);
}

/// Writes `"<pid>: syscall <name> -> <ret>"` at info level
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTracer;

impl SyscallTracer for LogTracer {
    fn record(&self, record: &TraceRecord) {
        sys_info!("{}: syscall {} -> {}", record.pid, record.name, record.ret);
        #[cfg(not(feature = "log"))]
        let _ = record;
    }
}

impl Kernel {
    /// Replaces `pid`'s trace mask
    pub fn set_trace(&self, pid: Pid, mask: TraceMask) -> Result<()> {
        self.with_procs(|procs| {
            procs.get_mut(pid)?.set_trace_mask(mask);
            Ok(())
        })
    }

    /// Current trace mask of `pid`
    pub fn trace_mask(&self, pid: Pid) -> Result<TraceMask> {
        self.with_procs(|procs| procs.get(pid).map(|proc| proc.trace_mask()))
    }
}

/// Register trace system call handler
pub fn register_handlers(dispatcher: &mut SyscallDispatcher) -> Result<()> {
    dispatcher.register_handler(SYS_TRACE, Box::new(TraceHandler));
    Ok(())
}

/// Trace system call handler
struct TraceHandler;

impl SyscallHandler for TraceHandler {
    fn execute(&self, cx: &SyscallContext<'_>, args: &dyn ArgFetcher) -> Result<isize> {
        let mask = args.arg_int(0) as TraceMask;
        cx.kernel.set_trace(cx.pid, mask)?;
        Ok(0)
    }

    fn name(&self) -> &'static str {
        "trace"
    }

    fn id(&self) -> u32 {
        SYS_TRACE
    }
}
