//! Process system calls
//!
//! `fork`, `exit`, `wait` and `getpid` on the hosted process table. There is
//! no scheduler: a fork returns the child's pid to the parent and the child
//! simply sits in the table until something acts on its behalf.

use alloc::boxed::Box;

use kinspect_api::{ArgFetcher, Error, Pid, Result, UserCopier, VirtAddr};

use crate::dispatch::{SyscallContext, SyscallDispatcher, SyscallHandler};
use crate::kernel::Kernel;
use crate::types::{SYS_EXIT, SYS_FORK, SYS_GETPID, SYS_WAIT};
use crate::{sys_debug, sys_warn};

pub mod table;

pub use table::{Proc, ProcState, ProcessTable};

impl Kernel {
    /// Creates a copy of `parent` and returns the child's pid.
    ///
    /// The child gets its own copy of the parent's memory and inherits its
    /// trace mask. A failed fork leaves no trace in the process table.
    pub fn fork(&self, parent: Pid) -> Result<Pid> {
        self.with_procs_and_memory(|procs, mem| {
            let (space, mask) = {
                let proc = procs.get(parent)?;
                let space = proc.space().ok_or(Error::NoProcess(parent))?.duplicate(mem)?;
                (space, proc.trace_mask())
            };

            let child = match procs.allocate() {
                Ok(child) => child,
                Err(error) => {
                    space.destroy(mem);
                    return Err(error);
                }
            };

            let proc = procs.get_mut(child)?;
            proc.install_space(space);
            proc.set_parent(Some(parent));
            proc.set_trace_mask(mask);
            proc.set_state(ProcState::Runnable);
            sys_debug!("fork: {} -> {}", parent, child);
            Ok(child)
        })
    }

    /// Marks `pid` as exited.
    ///
    /// Its children are handed to the first process. Memory is reclaimed
    /// when the parent reaps it with [`Kernel::wait`].
    pub fn exit(&self, pid: Pid, status: i32) -> Result<()> {
        self.with_procs(|procs| {
            let init = procs.init();
            if init == Some(pid) {
                sys_warn!("exit: init exiting with status {}", status);
            }

            let orphans: alloc::vec::Vec<Pid> = procs.children_of(pid).map(Proc::pid).collect();
            let heir = init.filter(|&init| init != pid);
            for orphan in orphans {
                procs.get_mut(orphan)?.set_parent(heir);
            }

            let proc = procs.get_mut(pid)?;
            proc.set_exit_status(status);
            proc.set_state(ProcState::Zombie);
            Ok(())
        })
    }

    /// Reaps an exited child of `pid` and returns its pid.
    ///
    /// The exit status is copied to `status` unless it is null. Fails with
    /// [`Error::NoChildren`] if `pid` has no children and with
    /// [`Error::WouldBlock`] if none of them has exited yet.
    pub fn wait(&self, pid: Pid, status: VirtAddr) -> Result<Pid> {
        self.with_procs_and_memory(|procs, mem| {
            let mut has_children = false;
            let mut zombie = None;
            for child in procs.children_of(pid) {
                has_children = true;
                if child.state() == ProcState::Zombie {
                    zombie = Some((child.pid(), child.exit_status()));
                    break;
                }
            }

            let Some((child, exit_status)) = zombie else {
                return Err(if has_children { Error::WouldBlock } else { Error::NoChildren });
            };

            if !status.is_null() {
                let root = Kernel::root_in(procs, pid)?;
                kinspect_mm::Mmu::new(mem, root).copy_out(status, &exit_status.to_ne_bytes())?;
            }

            if let Some(space) = procs.release(child) {
                space.destroy(mem);
            }
            sys_debug!("wait: {} reaped {}", pid, child);
            Ok(child)
        })
    }

    /// Returns `pid` if it names a live process
    pub fn getpid(&self, pid: Pid) -> Result<Pid> {
        self.with_procs(|procs| procs.get(pid).map(Proc::pid))
    }
}

/// Register process system call handlers
pub fn register_handlers(dispatcher: &mut SyscallDispatcher) -> Result<()> {
    dispatcher.register_handler(SYS_FORK, Box::new(ForkHandler));
    dispatcher.register_handler(SYS_EXIT, Box::new(ExitHandler));
    dispatcher.register_handler(SYS_WAIT, Box::new(WaitHandler));
    dispatcher.register_handler(SYS_GETPID, Box::new(GetpidHandler));
    Ok(())
}

/// Fork system call handler
struct ForkHandler;

impl SyscallHandler for ForkHandler {
    fn execute(&self, cx: &SyscallContext<'_>, _args: &dyn ArgFetcher) -> Result<isize> {
        cx.kernel.fork(cx.pid).map(|child| child as isize)
    }

    fn name(&self) -> &'static str {
        "fork"
    }

    fn id(&self) -> u32 {
        SYS_FORK
    }
}

/// Exit system call handler
struct ExitHandler;

impl SyscallHandler for ExitHandler {
    fn execute(&self, cx: &SyscallContext<'_>, args: &dyn ArgFetcher) -> Result<isize> {
        cx.kernel.exit(cx.pid, args.arg_int(0))?;
        Ok(0)
    }

    fn name(&self) -> &'static str {
        "exit"
    }

    fn id(&self) -> u32 {
        SYS_EXIT
    }
}

/// Wait system call handler
struct WaitHandler;

impl SyscallHandler for WaitHandler {
    fn execute(&self, cx: &SyscallContext<'_>, args: &dyn ArgFetcher) -> Result<isize> {
        cx.kernel.wait(cx.pid, args.arg_addr(0)).map(|child| child as isize)
    }

    fn name(&self) -> &'static str {
        "wait"
    }

    fn id(&self) -> u32 {
        SYS_WAIT
    }
}

/// Getpid system call handler
struct GetpidHandler;

impl SyscallHandler for GetpidHandler {
    fn execute(&self, cx: &SyscallContext<'_>, _args: &dyn ArgFetcher) -> Result<isize> {
        cx.kernel.getpid(cx.pid).map(|pid| pid as isize)
    }

    fn name(&self) -> &'static str {
        "getpid"
    }

    fn id(&self) -> u32 {
        SYS_GETPID
    }
}
