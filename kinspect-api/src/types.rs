//! Core types shared by the introspection crates

use core::fmt;
use core::mem::size_of;

use static_assertions::const_assert_eq;

/// Process identifier type
pub type Pid = u32;

/// A user virtual address
///
/// No alignment is implied; `pgaccess` accepts any base address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct VirtAddr(pub usize);

impl VirtAddr {
    /// Creates a new virtual address from a raw usize value.
    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }

    /// Returns the virtual address as a raw usize value.
    pub const fn as_usize(self) -> usize {
        self.0
    }

    /// Returns true for the null address.
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Returns the address `bytes` further on, or `None` on overflow.
    pub const fn checked_add(self, bytes: usize) -> Option<Self> {
        match self.0.checked_add(bytes) {
            Some(addr) => Some(Self(addr)),
            None => None,
        }
    }
}

impl From<usize> for VirtAddr {
    fn from(addr: usize) -> Self {
        Self(addr)
    }
}

impl From<VirtAddr> for usize {
    fn from(addr: VirtAddr) -> Self {
        addr.0
    }
}

impl fmt::Display for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// System resource snapshot written by `sysinfo`
///
/// Two native-endian `u64` fields, free memory first, no padding. The fields
/// are read independently and need not describe the same instant.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SystemSnapshot {
    /// Free physical memory in bytes
    pub free_memory_bytes: u64,
    /// Number of process slots in use
    pub live_process_count: u64,
}

const_assert_eq!(size_of::<SystemSnapshot>(), SystemSnapshot::SIZE);

impl SystemSnapshot {
    /// Size of the user-visible layout in bytes
    pub const SIZE: usize = 16;

    /// Serializes the snapshot into its user-visible layout.
    pub fn to_ne_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[..8].copy_from_slice(&self.free_memory_bytes.to_ne_bytes());
        out[8..].copy_from_slice(&self.live_process_count.to_ne_bytes());
        out
    }

    /// Reads a snapshot back from its user-visible layout.
    pub fn from_ne_bytes(bytes: [u8; Self::SIZE]) -> Self {
        let mut free = [0u8; 8];
        let mut live = [0u8; 8];
        free.copy_from_slice(&bytes[..8]);
        live.copy_from_slice(&bytes[8..]);
        Self {
            free_memory_bytes: u64::from_ne_bytes(free),
            live_process_count: u64::from_ne_bytes(live),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_field_order() {
        let snapshot = SystemSnapshot {
            free_memory_bytes: 0x1122_3344,
            live_process_count: 3,
        };
        let bytes = snapshot.to_ne_bytes();
        assert_eq!(&bytes[..8], &0x1122_3344u64.to_ne_bytes());
        assert_eq!(&bytes[8..], &3u64.to_ne_bytes());
    }

    #[test]
    fn test_checked_add_overflow() {
        assert_eq!(VirtAddr::new(usize::MAX).checked_add(1), None);
        assert_eq!(VirtAddr::new(0x1000).checked_add(0x1000), Some(VirtAddr::new(0x2000)));
    }
}
