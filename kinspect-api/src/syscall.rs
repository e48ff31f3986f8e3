//! System call argument types

use crate::types::VirtAddr;

/// System call arguments
#[derive(Debug, Clone, Default)]
pub struct SyscallArgs {
    /// First argument
    pub arg0: usize,
    /// Second argument
    pub arg1: usize,
    /// Third argument
    pub arg2: usize,
    /// Fourth argument
    pub arg3: usize,
    /// Fifth argument
    pub arg4: usize,
    /// Sixth argument
    pub arg5: usize,
}

impl SyscallArgs {
    /// Creates new system call arguments
    pub fn new(
        arg0: usize,
        arg1: usize,
        arg2: usize,
        arg3: usize,
        arg4: usize,
        arg5: usize,
    ) -> Self {
        Self {
            arg0,
            arg1,
            arg2,
            arg3,
            arg4,
            arg5,
        }
    }

    /// Creates empty system call arguments
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates system call arguments with one argument
    pub fn with1(arg0: usize) -> Self {
        Self::new(arg0, 0, 0, 0, 0, 0)
    }

    /// Creates system call arguments with two arguments
    pub fn with2(arg0: usize, arg1: usize) -> Self {
        Self::new(arg0, arg1, 0, 0, 0, 0)
    }

    /// Creates system call arguments with three arguments
    pub fn with3(arg0: usize, arg1: usize, arg2: usize) -> Self {
        Self::new(arg0, arg1, arg2, 0, 0, 0)
    }

    /// Creates system call arguments from a register slice; missing registers read as 0
    pub fn from_slice(regs: &[usize]) -> Self {
        let reg = |n: usize| regs.get(n).copied().unwrap_or(0);
        Self::new(reg(0), reg(1), reg(2), reg(3), reg(4), reg(5))
    }
}

/// Trait for positional syscall argument fetching
pub trait ArgFetcher {
    /// Returns the raw register value of argument `n`
    fn arg_raw(&self, n: usize) -> usize;

    /// Returns argument `n` as a C `int`, truncating the register
    fn arg_int(&self, n: usize) -> i32 {
        self.arg_raw(n) as i32
    }

    /// Returns argument `n` as a user address
    fn arg_addr(&self, n: usize) -> VirtAddr {
        VirtAddr::new(self.arg_raw(n))
    }
}

impl ArgFetcher for SyscallArgs {
    fn arg_raw(&self, n: usize) -> usize {
        match n {
            0 => self.arg0,
            1 => self.arg1,
            2 => self.arg2,
            3 => self.arg3,
            4 => self.arg4,
            5 => self.arg5,
            _ => 0,
        }
    }
}
