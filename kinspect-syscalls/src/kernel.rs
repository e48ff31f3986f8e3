//! Hosted kernel state
//!
//! [`Kernel`] owns the two pieces of shared state the syscalls work on: the
//! process table and physical memory, each behind its own spin lock. When
//! both are needed the process table is locked first.

use kinspect_api::{
    Error, FreeMemorySource, Pid, ProcessDirectory, Result, UserCopier, VirtAddr,
};
use kinspect_mm::{AddressSpace, Mmu, PAGE_SIZE, PhysAddr, PhysMemory};
use spin::Mutex;

use crate::config::KernelConfig;
use crate::process::{ProcState, ProcessTable};
use crate::sys_debug;

/// Process table and physical memory of one hosted machine
pub struct Kernel {
    config: KernelConfig,
    procs: Mutex<ProcessTable>,
    mem: Mutex<PhysMemory>,
}

impl Kernel {
    /// Boots an empty machine
    pub fn new(config: KernelConfig) -> Self {
        sys_debug!(
            "kernel: {} pages of memory, {} process slots",
            config.phys_pages,
            config.max_procs
        );
        Self {
            config,
            procs: Mutex::new(ProcessTable::new(config.max_procs)),
            mem: Mutex::new(PhysMemory::new(config.phys_pages)),
        }
    }

    /// Machine sizing
    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Creates the first process with a one-page image.
    ///
    /// Orphans are reparented to it.
    pub fn spawn_init(&self) -> Result<Pid> {
        let mut procs = self.procs.lock();
        let pid = procs.allocate()?;

        let space = {
            let mut mem = self.mem.lock();
            AddressSpace::new(&mut mem).and_then(|mut space| match space.grow(&mut mem, PAGE_SIZE as isize) {
                Ok(_) => Ok(space),
                Err(error) => {
                    space.destroy(&mut mem);
                    Err(error)
                }
            })
        };
        let space = match space {
            Ok(space) => space,
            Err(error) => {
                procs.release(pid);
                return Err(error);
            }
        };

        let proc = procs.get_mut(pid)?;
        proc.install_space(space);
        proc.set_state(ProcState::Runnable);
        procs.set_init(pid);
        Ok(pid)
    }

    /// Runs `f` on the process table
    pub fn with_procs<R>(&self, f: impl FnOnce(&mut ProcessTable) -> R) -> R {
        f(&mut *self.procs.lock())
    }

    /// Runs `f` with both locks held, in order
    pub(crate) fn with_procs_and_memory<R>(
        &self,
        f: impl FnOnce(&mut ProcessTable, &mut PhysMemory) -> R,
    ) -> R {
        let mut procs = self.procs.lock();
        let mut mem = self.mem.lock();
        f(&mut *procs, &mut *mem)
    }

    /// Runs `f` on a translation view of `pid`'s address space.
    ///
    /// User-mode loads and stores made through the view latch access flags.
    pub fn with_user_memory<R>(&self, pid: Pid, f: impl FnOnce(&mut Mmu<'_>) -> R) -> Result<R> {
        self.with_procs_and_memory(|procs, mem| {
            let root = Self::root_in(procs, pid)?;
            Ok(f(&mut Mmu::new(mem, root)))
        })
    }

    /// Copier into `pid`'s address space that takes the locks per copy
    pub fn user_space(&self, pid: Pid) -> UserSpace<'_> {
        UserSpace { kernel: self, pid }
    }

    pub(crate) fn root_in(procs: &ProcessTable, pid: Pid) -> Result<PhysAddr> {
        procs
            .get(pid)?
            .space()
            .map(AddressSpace::root)
            .ok_or(Error::NoProcess(pid))
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new(KernelConfig::default())
    }
}

impl FreeMemorySource for Kernel {
    fn free_bytes(&self) -> u64 {
        self.mem.lock().free_bytes()
    }
}

impl ProcessDirectory for Kernel {
    fn count_live(&self) -> u64 {
        self.procs.lock().count_live()
    }
}

/// Copy-out target for one process
///
/// Unlike [`Mmu`], it holds no lock between copies.
pub struct UserSpace<'k> {
    kernel: &'k Kernel,
    pid: Pid,
}

impl UserCopier for UserSpace<'_> {
    fn copy_out(&mut self, dst: VirtAddr, src: &[u8]) -> Result<()> {
        self.kernel
            .with_user_memory(self.pid, |mmu| mmu.copy_out(dst, src))
            .and_then(|copied| copied)
            .map_err(|error| match error {
                Error::NoProcess(_) => Error::CopyFault(dst),
                other => other,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> Kernel {
        Kernel::new(KernelConfig {
            phys_pages: 32,
            max_procs: 4,
        })
    }

    #[test]
    fn test_spawn_init() {
        let kernel = small();
        let free = kernel.free_bytes();
        let pid = kernel.spawn_init().unwrap();
        assert_eq!(kernel.count_live(), 1);
        // Root, two intermediate tables and the image page
        assert_eq!(kernel.free_bytes(), free - 4 * PAGE_SIZE as u64);
        assert_eq!(kernel.with_procs(|procs| procs.init()), Some(pid));
    }

    #[test]
    fn test_spawn_init_out_of_memory_frees_slot() {
        let kernel = Kernel::new(KernelConfig {
            phys_pages: 2,
            max_procs: 4,
        });
        assert_eq!(kernel.spawn_init(), Err(Error::OutOfMemory));
        assert_eq!(kernel.count_live(), 0);
        assert_eq!(kernel.free_bytes(), 2 * PAGE_SIZE as u64);
    }

    #[test]
    fn test_user_space_copy() {
        let kernel = small();
        let pid = kernel.spawn_init().unwrap();
        kernel.user_space(pid).copy_out(VirtAddr::new(16), &[9, 8]).unwrap();

        let mut back = [0u8; 2];
        kernel
            .with_user_memory(pid, |mmu| mmu.copy_in(VirtAddr::new(16), &mut back))
            .unwrap()
            .unwrap();
        assert_eq!(back, [9, 8]);
    }

    #[test]
    fn test_user_space_faults() {
        let kernel = small();
        let pid = kernel.spawn_init().unwrap();
        let dst = VirtAddr::new(PAGE_SIZE);
        assert_eq!(kernel.user_space(pid).copy_out(dst, &[0]), Err(Error::CopyFault(dst)));
        assert_eq!(kernel.user_space(pid + 1).copy_out(dst, &[0]), Err(Error::CopyFault(dst)));
    }
}
