//! Hosted machine configuration

/// Maximum number of processes (xv6 `NPROC`)
pub const NPROC: usize = 64;

/// Physical pages of the default machine (8 MiB)
pub const DEFAULT_PHYS_PAGES: usize = 2048;

/// Sizing of a hosted [`crate::Kernel`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelConfig {
    /// Number of physical page frames
    pub phys_pages: usize,
    /// Number of process table slots
    pub max_procs: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            phys_pages: DEFAULT_PHYS_PAGES,
            max_procs: NPROC,
        }
    }
}
