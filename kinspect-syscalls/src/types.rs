//! System call numbers
//!
//! Numbers follow the xv6 table so user programs built against it keep
//! working. Only syscalls with a handler in this crate are listed.

/// Create a child process
pub const SYS_FORK: u32 = 1;
/// Terminate the calling process
pub const SYS_EXIT: u32 = 2;
/// Reap an exited child
pub const SYS_WAIT: u32 = 3;
/// Return the caller's pid
pub const SYS_GETPID: u32 = 11;
/// Grow or shrink the caller's memory
pub const SYS_SBRK: u32 = 12;
/// Set the caller's trace mask
pub const SYS_TRACE: u32 = 22;
/// Copy a free memory / process count snapshot to user space
pub const SYS_SYSINFO: u32 = 23;
/// Report and clear page access flags
pub const SYS_PGACCESS: u32 = 30;

/// Name printed for a traced syscall
pub const fn syscall_name(id: u32) -> Option<&'static str> {
    Some(match id {
        SYS_FORK => "fork",
        SYS_EXIT => "exit",
        SYS_WAIT => "wait",
        SYS_GETPID => "getpid",
        SYS_SBRK => "sbrk",
        SYS_TRACE => "trace",
        SYS_SYSINFO => "sysinfo",
        SYS_PGACCESS => "pgaccess",
        _ => return None,
    })
}
