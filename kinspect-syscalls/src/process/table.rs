//! Process table
//!
//! Fixed number of slots, as in xv6's `proc[NPROC]`, plus a pid index so
//! lookups don't scan the table.

use alloc::vec::Vec;

use hashbrown::HashMap;
use kinspect_api::{Error, Pid, Result, TRACE_DISABLED, TraceMask};
use kinspect_mm::AddressSpace;

/// Process state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcState {
    /// Free slot
    Unused,
    /// Allocated, not yet runnable
    Used,
    /// Ready to run
    Runnable,
    /// Exited, waiting to be reaped by its parent
    Zombie,
}

/// Process control block
#[derive(Debug)]
pub struct Proc {
    pid: Pid,
    state: ProcState,
    parent: Option<Pid>,
    exit_status: i32,
    space: Option<AddressSpace>,
    trace_mask: TraceMask,
}

impl Proc {
    fn unused() -> Self {
        Self {
            pid: 0,
            state: ProcState::Unused,
            parent: None,
            exit_status: 0,
            space: None,
            trace_mask: TRACE_DISABLED,
        }
    }

    /// Process id
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Current state
    pub fn state(&self) -> ProcState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: ProcState) {
        self.state = state;
    }

    /// Parent pid; `None` for the first process
    pub fn parent(&self) -> Option<Pid> {
        self.parent
    }

    pub(crate) fn set_parent(&mut self, parent: Option<Pid>) {
        self.parent = parent;
    }

    /// Status passed to `exit`
    pub fn exit_status(&self) -> i32 {
        self.exit_status
    }

    pub(crate) fn set_exit_status(&mut self, status: i32) {
        self.exit_status = status;
    }

    /// User address space, once one has been installed
    pub fn space(&self) -> Option<&AddressSpace> {
        self.space.as_ref()
    }

    pub(crate) fn space_mut(&mut self) -> Option<&mut AddressSpace> {
        self.space.as_mut()
    }

    pub(crate) fn install_space(&mut self, space: AddressSpace) {
        self.space = Some(space);
    }

    /// Syscalls whose bit is set here are reported on return
    pub fn trace_mask(&self) -> TraceMask {
        self.trace_mask
    }

    pub(crate) fn set_trace_mask(&mut self, mask: TraceMask) {
        self.trace_mask = mask;
    }
}

/// Process table
pub struct ProcessTable {
    slots: Vec<Proc>,
    pid_to_index: HashMap<Pid, usize>,
    next_pid: Pid,
    init: Option<Pid>,
}

impl ProcessTable {
    /// Creates a table with `capacity` unused slots
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, Proc::unused);
        Self {
            slots,
            pid_to_index: HashMap::new(),
            next_pid: 1,
            init: None,
        }
    }

    /// Claims an unused slot and gives it a fresh pid.
    ///
    /// The new process starts in [`ProcState::Used`] with tracing disabled
    /// and no address space.
    pub fn allocate(&mut self) -> Result<Pid> {
        let index = self
            .slots
            .iter()
            .position(|p| p.state == ProcState::Unused)
            .ok_or(Error::OutOfMemory)?;

        let pid = self.next_pid;
        self.next_pid += 1;

        let slot = &mut self.slots[index];
        *slot = Proc::unused();
        slot.pid = pid;
        slot.state = ProcState::Used;
        self.pid_to_index.insert(pid, index);
        Ok(pid)
    }

    /// Looks up a process that holds a slot
    pub fn get(&self, pid: Pid) -> Result<&Proc> {
        let index = *self.pid_to_index.get(&pid).ok_or(Error::NoProcess(pid))?;
        Ok(&self.slots[index])
    }

    /// Mutable lookup of a process that holds a slot
    pub fn get_mut(&mut self, pid: Pid) -> Result<&mut Proc> {
        let index = *self.pid_to_index.get(&pid).ok_or(Error::NoProcess(pid))?;
        Ok(&mut self.slots[index])
    }

    /// Frees the slot of `pid` and hands back its address space.
    ///
    /// The trace mask goes with the slot.
    pub fn release(&mut self, pid: Pid) -> Option<AddressSpace> {
        let index = self.pid_to_index.remove(&pid)?;
        let slot = core::mem::replace(&mut self.slots[index], Proc::unused());
        if self.init == Some(pid) {
            self.init = None;
        }
        slot.space
    }

    /// Processes whose parent is `pid`
    pub fn children_of(&self, pid: Pid) -> impl Iterator<Item = &Proc> + '_ {
        self.slots
            .iter()
            .filter(move |p| p.state != ProcState::Unused && p.parent == Some(pid))
    }

    /// Number of slots in use, zombies included
    pub fn count_live(&self) -> u64 {
        self.slots.iter().filter(|p| p.state != ProcState::Unused).count() as u64
    }

    /// Pid that orphans are handed to
    pub fn init(&self) -> Option<Pid> {
        self.init
    }

    pub(crate) fn set_init(&mut self, pid: Pid) {
        self.init = Some(pid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_until_full() {
        let mut table = ProcessTable::new(2);
        let a = table.allocate().unwrap();
        let b = table.allocate().unwrap();
        assert_ne!(a, b);
        assert_eq!(table.allocate(), Err(Error::OutOfMemory));
        assert_eq!(table.count_live(), 2);
    }

    #[test]
    fn test_new_process_is_not_traced() {
        let mut table = ProcessTable::new(4);
        let pid = table.allocate().unwrap();
        assert_eq!(table.get(pid).unwrap().trace_mask(), TRACE_DISABLED);
        assert_eq!(table.get(pid).unwrap().state(), ProcState::Used);
    }

    #[test]
    fn test_release_discards_mask_and_reuses_slot() {
        let mut table = ProcessTable::new(1);
        let pid = table.allocate().unwrap();
        table.get_mut(pid).unwrap().set_trace_mask(0xffff);
        assert!(table.release(pid).is_none());
        assert_eq!(table.get(pid).unwrap_err(), Error::NoProcess(pid));
        assert_eq!(table.count_live(), 0);

        let next = table.allocate().unwrap();
        assert_ne!(next, pid);
        assert_eq!(table.get(next).unwrap().trace_mask(), TRACE_DISABLED);
    }

    #[test]
    fn test_children_of() {
        let mut table = ProcessTable::new(4);
        let parent = table.allocate().unwrap();
        let child = table.allocate().unwrap();
        let other = table.allocate().unwrap();
        table.get_mut(child).unwrap().set_parent(Some(parent));

        let children: Vec<Pid> = table.children_of(parent).map(Proc::pid).collect();
        assert_eq!(children, [child]);
        assert_eq!(table.children_of(other).count(), 0);
    }

    #[test]
    fn test_zombies_count_as_live() {
        let mut table = ProcessTable::new(4);
        let pid = table.allocate().unwrap();
        table.get_mut(pid).unwrap().set_state(ProcState::Zombie);
        assert_eq!(table.count_live(), 1);
    }
}
