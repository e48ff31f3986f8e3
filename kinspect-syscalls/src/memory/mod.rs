//! Memory system calls
//!
//! `sbrk` resizes the caller's image; `pgaccess` runs the access-bit scanner
//! over it. The scan holds the process table lock and then the memory lock
//! for its whole duration, so the page table cannot change under it.

use alloc::boxed::Box;

use kinspect_api::{ArgFetcher, Error, Pid, Result, VirtAddr};
use kinspect_mm::{Mmu, scan};

use crate::dispatch::{SyscallContext, SyscallDispatcher, SyscallHandler};
use crate::kernel::Kernel;
use crate::sys_trace;
use crate::types::{SYS_PGACCESS, SYS_SBRK};

impl Kernel {
    /// Grows or shrinks `pid`'s image by `delta` bytes and returns the old size
    pub fn sbrk(&self, pid: Pid, delta: isize) -> Result<usize> {
        self.with_procs_and_memory(|procs, mem| {
            let proc = procs.get_mut(pid)?;
            let space = proc.space_mut().ok_or(Error::NoProcess(pid))?;
            let old = space.grow(mem, delta)?;
            sys_trace!("sbrk: pid {} {:#x} -> {:#x}", pid, old, space.size());
            Ok(old)
        })
    }

    /// Reports which of `count` pages from `base` were accessed since the last
    /// scan and writes the bitmap to `dst` in `pid`'s address space.
    ///
    /// Rejects a negative count or one above [`kinspect_mm::MAX_SCAN_PAGES`]
    /// before looking at any page.
    pub fn pgaccess(&self, pid: Pid, base: VirtAddr, count: i64, dst: VirtAddr) -> Result<()> {
        self.with_procs_and_memory(|procs, mem| {
            let root = Kernel::root_in(procs, pid)?;
            scan(&mut Mmu::new(mem, root), base, count, dst)
        })
    }
}

/// Register memory system call handlers
pub fn register_handlers(dispatcher: &mut SyscallDispatcher) -> Result<()> {
    dispatcher.register_handler(SYS_SBRK, Box::new(SbrkHandler));
    dispatcher.register_handler(SYS_PGACCESS, Box::new(PgaccessHandler));
    Ok(())
}

/// Sbrk system call handler
struct SbrkHandler;

impl SyscallHandler for SbrkHandler {
    fn execute(&self, cx: &SyscallContext<'_>, args: &dyn ArgFetcher) -> Result<isize> {
        let delta = args.arg_int(0) as isize;
        cx.kernel.sbrk(cx.pid, delta).map(|old| old as isize)
    }

    fn name(&self) -> &'static str {
        "sbrk"
    }

    fn id(&self) -> u32 {
        SYS_SBRK
    }
}

/// Pgaccess system call handler
///
/// Arguments: base address, page count, result address.
struct PgaccessHandler;

impl SyscallHandler for PgaccessHandler {
    fn execute(&self, cx: &SyscallContext<'_>, args: &dyn ArgFetcher) -> Result<isize> {
        let base = args.arg_addr(0);
        let count = i64::from(args.arg_int(1));
        let dst = args.arg_addr(2);
        cx.kernel.pgaccess(cx.pid, base, count, dst)?;
        Ok(0)
    }

    fn name(&self) -> &'static str {
        "pgaccess"
    }

    fn id(&self) -> u32 {
        SYS_PGACCESS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KernelConfig;
    use kinspect_api::FreeMemorySource;
    use kinspect_mm::{AccessBitmap, PAGE_SIZE};

    fn boot() -> (Kernel, Pid) {
        let kernel = Kernel::new(KernelConfig {
            phys_pages: 128,
            max_procs: 4,
        });
        let init = kernel.spawn_init().unwrap();
        (kernel, init)
    }

    #[test]
    fn test_sbrk_returns_old_size() {
        let (kernel, init) = boot();
        let free = kernel.free_bytes();
        assert_eq!(kernel.sbrk(init, (3 * PAGE_SIZE) as isize), Ok(PAGE_SIZE));
        assert_eq!(kernel.free_bytes(), free - 3 * PAGE_SIZE as u64);
        assert_eq!(kernel.sbrk(init, -((3 * PAGE_SIZE) as isize)), Ok(4 * PAGE_SIZE));
        assert_eq!(kernel.free_bytes(), free);
    }

    #[test]
    fn test_sbrk_below_zero() {
        let (kernel, init) = boot();
        assert_eq!(kernel.sbrk(init, -(2 * PAGE_SIZE as isize)), Err(Error::OutOfMemory));
    }

    #[test]
    fn test_pgaccess_on_own_image() {
        let (kernel, init) = boot();
        kernel.sbrk(init, (4 * PAGE_SIZE) as isize).unwrap();
        kernel
            .with_user_memory(init, |mmu| mmu.store(VirtAddr::new(2 * PAGE_SIZE), &[1]))
            .unwrap()
            .unwrap();

        let dst = VirtAddr::new(4 * PAGE_SIZE);
        kernel.pgaccess(init, VirtAddr::new(0), 4, dst).unwrap();

        let mut raw = [0u8; core::mem::size_of::<AccessBitmap>()];
        kernel
            .with_user_memory(init, |mmu| mmu.copy_in(dst, &mut raw))
            .unwrap()
            .unwrap();
        assert_eq!(AccessBitmap::from_ne_bytes(raw), 1 << 2);
    }

    #[test]
    fn test_pgaccess_unknown_process() {
        let (kernel, init) = boot();
        let result = kernel.pgaccess(init + 1, VirtAddr::new(0), 1, VirtAddr::new(0));
        assert_eq!(result, Err(Error::NoProcess(init + 1)));
    }
}
