//! Sv39 page table module
//!
//! Three levels of 512 eight-byte entries, each table one physical frame.
//! [`walk`] is the pure lookup the scanner relies on; [`walk_create`] is the
//! allocating variant used only when building mappings.

use bitflags::bitflags;

use kinspect_api::{Error, PageTableEntry, Result, VirtAddr};

use crate::config::ACCESS_FLAG;
use crate::physical::{PAGE_SHIFT, PhysAddr, PhysMemory};

bitflags! {
    /// Page table entry flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PteFlags: u64 {
        /// Valid
        const V = 1 << 0;
        /// Readable
        const R = 1 << 1;
        /// Writable
        const W = 1 << 2;
        /// Executable
        const X = 1 << 3;
        /// User accessible
        const U = 1 << 4;
        /// Global
        const G = 1 << 5;
        /// Accessed
        const A = 1 << 6;
        /// Dirty
        const D = 1 << 7;
    }
}

/// Permission bits carried over when a mapping is duplicated
pub const PERMISSION_MASK: PteFlags = PteFlags::R
    .union(PteFlags::W)
    .union(PteFlags::X)
    .union(PteFlags::U);

/// One past the highest user virtual address (Sv39, sign bit excluded)
pub const MAXVA: usize = 1 << (9 + 9 + 9 + PAGE_SHIFT - 1);

/// Bytes per page table entry
pub const PTE_SIZE: usize = 8;

const PPN_MASK: u64 = (1 << 44) - 1;

/// Index into the level-`level` table for `va`
#[inline]
const fn px(level: usize, va: usize) -> usize {
    (va >> (PAGE_SHIFT + 9 * level)) & 0x1FF
}

/// A raw Sv39 page table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(transparent)]
pub struct Pte(u64);

impl Pte {
    /// Wraps a raw entry value
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Returns the raw entry value
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Builds an entry pointing at `pa`
    pub fn new(pa: PhysAddr, flags: PteFlags) -> Self {
        Self((((pa.as_usize() >> PAGE_SHIFT) as u64) << 10) | flags.bits())
    }

    /// Physical address the entry points at
    pub fn pa(self) -> PhysAddr {
        PhysAddr::new((((self.0 >> 10) & PPN_MASK) as usize) << PAGE_SHIFT)
    }

    /// Flag bits of the entry
    pub fn flags(self) -> PteFlags {
        PteFlags::from_bits_truncate(self.0)
    }

    /// Returns the entry with `flags` added
    pub fn with(self, flags: PteFlags) -> Self {
        Self(self.0 | flags.bits())
    }

    /// Returns the entry with `flags` removed
    pub fn without(self, flags: PteFlags) -> Self {
        Self(self.0 & !flags.bits())
    }

    /// Returns true if the valid bit is set
    pub fn is_valid(self) -> bool {
        self.flags().contains(PteFlags::V)
    }

    /// Returns true for a leaf; non-leaf entries carry no R/W/X bits
    pub fn is_leaf(self) -> bool {
        self.flags().intersects(PteFlags::R | PteFlags::W | PteFlags::X)
    }
}

/// Returns the physical address of the leaf entry slot for `va`.
///
/// Never allocates. A missing intermediate table means `va` is unmapped. A
/// leaf met above level 0 is a superpage and its slot is returned.
pub fn walk(mem: &PhysMemory, root: PhysAddr, va: VirtAddr) -> Option<PhysAddr> {
    let va = va.as_usize();
    if va >= MAXVA {
        return None;
    }

    let mut table = root;
    for level in [2, 1] {
        let slot = table.offset(px(level, va) * PTE_SIZE);
        let pte = Pte::from_bits(mem.read_u64(slot)?);
        if !pte.is_valid() {
            return None;
        }
        if pte.is_leaf() {
            return Some(slot);
        }
        table = pte.pa();
    }
    Some(table.offset(px(0, va) * PTE_SIZE))
}

/// Like [`walk`], but allocates missing intermediate tables.
pub fn walk_create(mem: &mut PhysMemory, root: PhysAddr, va: VirtAddr) -> Result<PhysAddr> {
    let raw = va.as_usize();
    if raw >= MAXVA {
        return Err(Error::PageFault(va));
    }

    let mut table = root;
    for level in [2, 1] {
        let slot = table.offset(px(level, raw) * PTE_SIZE);
        let pte = Pte::from_bits(mem.read_u64(slot).ok_or(Error::PageFault(va))?);
        if pte.is_valid() {
            if pte.is_leaf() {
                return Err(Error::PageFault(va));
            }
            table = pte.pa();
        } else {
            let next = mem.alloc_frame().ok_or(Error::OutOfMemory)?;
            mem.write_u64(slot, Pte::new(next, PteFlags::V).bits())
                .ok_or(Error::PageFault(va))?;
            table = next;
        }
    }
    Ok(table.offset(px(0, raw) * PTE_SIZE))
}

/// Frees every page-table frame reachable from `root`, including `root`.
///
/// Leaf mappings must already be gone.
pub fn free_tables(mem: &mut PhysMemory, root: PhysAddr) {
    for index in 0..512 {
        let slot = root.offset(index * PTE_SIZE);
        let pte = Pte::from_bits(mem.read_u64(slot).unwrap_or(0));
        if pte.is_valid() {
            debug_assert!(!pte.is_leaf(), "free_tables: leaf still mapped");
            if !pte.is_leaf() {
                free_tables(mem, pte.pa());
            }
            let _ = mem.write_u64(slot, 0);
        }
    }
    mem.free_frame(root);
}

/// Handle on one leaf entry slot, valid for a single scan step
pub struct PteRef<'a> {
    mem: &'a mut PhysMemory,
    slot: PhysAddr,
}

impl<'a> PteRef<'a> {
    /// Borrows the entry stored at `slot`
    pub fn new(mem: &'a mut PhysMemory, slot: PhysAddr) -> Self {
        Self { mem, slot }
    }

    /// Current entry value
    pub fn load(&self) -> Pte {
        Pte::from_bits(self.mem.read_u64(self.slot).unwrap_or(0))
    }

    fn store(&mut self, pte: Pte) {
        let _ = self.mem.write_u64(self.slot, pte.bits());
    }
}

impl PageTableEntry for PteRef<'_> {
    fn is_valid(&self) -> bool {
        self.load().is_valid()
    }

    fn is_accessed(&self) -> bool {
        self.load().flags().contains(ACCESS_FLAG)
    }

    fn clear_accessed(&mut self) {
        let pte = self.load();
        self.store(pte.without(ACCESS_FLAG));
    }

    fn permissions(&self) -> u64 {
        (self.load().flags() & PERMISSION_MASK).bits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> (PhysMemory, PhysAddr) {
        let mut mem = PhysMemory::new(16);
        let root = mem.alloc_frame().unwrap();
        (mem, root)
    }

    #[test]
    fn test_pte_encoding() {
        let pa = PhysAddr::new(0x8020_3000);
        let pte = Pte::new(pa, PteFlags::V | PteFlags::R | PteFlags::U);
        assert_eq!(pte.pa(), pa);
        assert!(pte.is_valid());
        assert!(pte.is_leaf());
        assert!(!Pte::new(pa, PteFlags::V).is_leaf());
        assert_eq!(pte.with(PteFlags::A).without(PteFlags::A), pte);
    }

    #[test]
    fn test_walk_does_not_allocate() {
        let (mem, root) = machine();
        let free = mem.free_pages();
        assert_eq!(walk(&mem, root, VirtAddr::new(0x4000)), None);
        assert_eq!(mem.free_pages(), free);
    }

    #[test]
    fn test_walk_finds_created_slot() {
        let (mut mem, root) = machine();
        let va = VirtAddr::new(0x40_3000);
        let slot = walk_create(&mut mem, root, va).unwrap();
        assert_eq!(walk(&mem, root, va), Some(slot));
        // Same level-0 table, neighbouring slot
        let next = walk(&mem, root, VirtAddr::new(0x40_4000)).unwrap();
        assert_eq!(next.as_usize(), slot.as_usize() + PTE_SIZE);
    }

    #[test]
    fn test_walk_rejects_addresses_above_maxva() {
        let (mut mem, root) = machine();
        assert_eq!(walk(&mem, root, VirtAddr::new(MAXVA)), None);
        assert!(walk_create(&mut mem, root, VirtAddr::new(MAXVA)).is_err());
    }

    #[test]
    fn test_superpage_leaf_is_returned() {
        let (mut mem, root) = machine();
        let frame = mem.alloc_frame().unwrap();
        let slot = root.offset(px(2, 0x4000_0000) * PTE_SIZE);
        mem.write_u64(slot, Pte::new(frame, PteFlags::V | PteFlags::R).bits()).unwrap();
        assert_eq!(walk(&mem, root, VirtAddr::new(0x4000_1234)), Some(slot));
    }

    #[test]
    fn test_pte_ref_clears_only_access_flag() {
        let (mut mem, root) = machine();
        let frame = mem.alloc_frame().unwrap();
        let slot = walk_create(&mut mem, root, VirtAddr::new(0x1000)).unwrap();
        let flags = PteFlags::V | PteFlags::R | PteFlags::W | PteFlags::U | PteFlags::A | PteFlags::D;
        mem.write_u64(slot, Pte::new(frame, flags).bits()).unwrap();

        let mut entry = PteRef::new(&mut mem, slot);
        assert!(entry.is_accessed());
        entry.clear_accessed();
        assert!(!entry.is_accessed());
        assert_eq!(entry.load().flags(), flags - PteFlags::A);
        assert_eq!(entry.load().pa(), frame);
    }

    #[test]
    fn test_free_tables_returns_every_frame() {
        let (mut mem, root) = machine();
        let before = mem.free_pages();
        walk_create(&mut mem, root, VirtAddr::new(0x1000)).unwrap();
        walk_create(&mut mem, root, VirtAddr::new(0x8000_0000)).unwrap();
        assert_eq!(mem.free_pages(), before - 4);
        free_tables(&mut mem, root);
        assert_eq!(mem.free_pages(), before + 1);
    }
}
