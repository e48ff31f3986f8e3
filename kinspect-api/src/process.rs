//! Process collaborator interfaces

/// Per-process syscall trace mask
///
/// Bit `n` selects syscall number `n`.
pub type TraceMask = u32;

/// Mask of a freshly created process
pub const TRACE_DISABLED: TraceMask = 0;

/// Trait for the process table as seen by `sysinfo`
pub trait ProcessDirectory {
    /// Returns the number of process slots that are not unused
    fn count_live(&self) -> u64;
}

/// Returns true if `mask` selects syscall `number`.
///
/// Numbers that do not fit the mask width are never traced.
pub const fn is_traced(mask: TraceMask, number: u32) -> bool {
    match 1u32.checked_shl(number) {
        Some(bit) => mask & bit != 0,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_traced() {
        let mask = (1 << 22) | (1 << 1);
        assert!(is_traced(mask, 22));
        assert!(is_traced(mask, 1));
        assert!(!is_traced(mask, 2));
        assert!(!is_traced(TRACE_DISABLED, 22));
        assert!(!is_traced(TraceMask::MAX, 32));
    }
}
