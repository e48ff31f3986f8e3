//! Memory collaborator interfaces
//!
//! The scanner never touches raw page-table words. It asks a
//! [`PageTableWalker`] for a leaf entry handle, inspects it, and drops it
//! before moving on to the next page. Results leave the kernel through a
//! [`UserCopier`].

use crate::error::Result;
use crate::types::VirtAddr;

/// Trait for a leaf page-table entry handle
///
/// A handle borrows the page table for a single scan step.
pub trait PageTableEntry {
    /// Returns true if the entry maps a page
    fn is_valid(&self) -> bool;

    /// Returns true if hardware latched the access flag since the last clear
    fn is_accessed(&self) -> bool;

    /// Clears the access flag
    ///
    /// This is the only mutation the introspection layer performs on an entry.
    fn clear_accessed(&mut self);

    /// Returns the raw permission bits of the entry
    fn permissions(&self) -> u64;
}

/// Trait for non-allocating page-table lookup
///
/// `walk` must be a pure lookup: it never allocates intermediate tables,
/// never creates mappings and never enters page-fault handling.
pub trait PageTableWalker {
    /// Entry handle type, borrowed from the walker
    type Entry<'a>: PageTableEntry
    where
        Self: 'a;

    /// Returns the leaf entry for `va`, or `None` if nothing maps it
    fn walk(&mut self, va: VirtAddr) -> Option<Self::Entry<'_>>;
}

/// Trait for copying kernel bytes into a process address space
pub trait UserCopier {
    /// Copies `src` to `dst`
    ///
    /// Fails with [`crate::Error::CopyFault`] if any destination page is not
    /// writably user-mapped.
    fn copy_out(&mut self, dst: VirtAddr, src: &[u8]) -> Result<()>;
}

/// Trait for the physical allocator's free-memory counter
pub trait FreeMemorySource {
    /// Returns the number of free bytes
    fn free_bytes(&self) -> u64;
}
