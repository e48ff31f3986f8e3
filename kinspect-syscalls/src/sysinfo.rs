//! System information
//!
//! A `sysinfo` snapshot is two independent readings: free memory from the
//! physical allocator and the number of occupied process slots. Each reading
//! takes only its own lock and neither is held across the copy-out, so the
//! pair is not consistent with any single instant.

use alloc::boxed::Box;

use kinspect_api::{
    ArgFetcher, FreeMemorySource, Pid, ProcessDirectory, Result, SystemSnapshot, UserCopier,
    VirtAddr,
};

use crate::dispatch::{SyscallContext, SyscallDispatcher, SyscallHandler};
use crate::kernel::Kernel;
use crate::sys_trace;
use crate::types::SYS_SYSINFO;

/// Takes both readings
pub fn collect<M, P>(memory: &M, procs: &P) -> SystemSnapshot
where
    M: FreeMemorySource + ?Sized,
    P: ProcessDirectory + ?Sized,
{
    SystemSnapshot {
        free_memory_bytes: memory.free_bytes(),
        live_process_count: procs.count_live(),
    }
}

/// Takes a snapshot and copies it to `dst`.
///
/// Fails only if the copy-out does.
pub fn snapshot<M, P, C>(memory: &M, procs: &P, copier: &mut C, dst: VirtAddr) -> Result<()>
where
    M: FreeMemorySource + ?Sized,
    P: ProcessDirectory + ?Sized,
    C: UserCopier + ?Sized,
{
    let info = collect(memory, procs);
    sys_trace!(
        "sysinfo: freemem={} nproc={}",
        info.free_memory_bytes,
        info.live_process_count
    );
    copier.copy_out(dst, &info.to_ne_bytes())
}

impl Kernel {
    /// Writes a [`SystemSnapshot`] to `dst` in `pid`'s address space
    pub fn sysinfo(&self, pid: Pid, dst: VirtAddr) -> Result<()> {
        snapshot(self, self, &mut self.user_space(pid), dst)
    }
}

/// Register sysinfo system call handler
pub fn register_handlers(dispatcher: &mut SyscallDispatcher) -> Result<()> {
    dispatcher.register_handler(SYS_SYSINFO, Box::new(SysinfoHandler));
    Ok(())
}

/// Sysinfo system call handler
struct SysinfoHandler;

impl SyscallHandler for SysinfoHandler {
    fn execute(&self, cx: &SyscallContext<'_>, args: &dyn ArgFetcher) -> Result<isize> {
        cx.kernel.sysinfo(cx.pid, args.arg_addr(0))?;
        Ok(0)
    }

    fn name(&self) -> &'static str {
        "sysinfo"
    }

    fn id(&self) -> u32 {
        SYS_SYSINFO
    }
}
