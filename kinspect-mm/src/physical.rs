//! Physical memory management module
//!
//! [`PhysMemory`] is the hosted machine's RAM: a run of page frames starting
//! at [`PHYS_BASE`] plus a free list of frame numbers. The free list is the
//! only source of the free-memory figure reported by `sysinfo`.

use alloc::vec;
use alloc::vec::Vec;

use kinspect_api::FreeMemorySource;

use crate::logging::mm_debug;

/// Page size (4KB)
pub const PAGE_SIZE: usize = 4096;
/// Page shift (log2 of PAGE_SIZE)
pub const PAGE_SHIFT: usize = 12;
/// Physical address of the first frame
pub const PHYS_BASE: usize = 0x8000_0000;

/// Align address down to page boundary
#[inline]
pub const fn page_round_down(addr: usize) -> usize {
    addr & !(PAGE_SIZE - 1)
}

/// Align address up to page boundary
#[inline]
pub const fn page_round_up(addr: usize) -> usize {
    (addr + PAGE_SIZE - 1) & !(PAGE_SIZE - 1)
}

/// A physical address
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct PhysAddr(pub usize);

impl PhysAddr {
    /// Creates a new physical address from a raw usize value.
    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }

    /// Returns the physical address as a raw usize value.
    pub const fn as_usize(self) -> usize {
        self.0
    }

    /// Returns the offset within the current page.
    pub const fn page_offset(self) -> usize {
        self.0 & (PAGE_SIZE - 1)
    }

    /// Checks if the physical address is page-aligned.
    pub const fn is_page_aligned(self) -> bool {
        self.page_offset() == 0
    }

    /// Returns the address `bytes` further on.
    pub const fn offset(self, bytes: usize) -> Self {
        Self(self.0 + bytes)
    }
}

/// One page frame
type Frame = [u8; PAGE_SIZE];

/// Hosted physical memory with a page-granular free list
pub struct PhysMemory {
    frames: Vec<Frame>,
    free_list: Vec<usize>,
}

impl PhysMemory {
    /// Creates `pages` frames of RAM, all of them free
    pub fn new(pages: usize) -> Self {
        // Pop order hands out low frames first.
        let free_list = (0..pages).rev().collect();
        Self {
            frames: vec![[0u8; PAGE_SIZE]; pages],
            free_list,
        }
    }

    /// Allocates a zeroed frame, or `None` when memory is exhausted
    pub fn alloc_frame(&mut self) -> Option<PhysAddr> {
        let index = self.free_list.pop()?;
        self.frames[index].fill(0);
        Some(Self::frame_addr(index))
    }

    /// Returns a frame to the free list
    ///
    /// # Panics
    ///
    /// Panics on an unaligned or foreign address, like `kfree`.
    pub fn free_frame(&mut self, pa: PhysAddr) {
        let index = match self.frame_index(pa) {
            Some(index) if pa.is_page_aligned() => index,
            _ => panic!("free_frame: bad frame {:#x}", pa.as_usize()),
        };
        debug_assert!(!self.free_list.contains(&index), "free_frame: double free");
        self.free_list.push(index);
    }

    /// Number of frames on the free list
    pub fn free_pages(&self) -> usize {
        self.free_list.len()
    }

    /// Number of frames in the machine
    pub fn total_pages(&self) -> usize {
        self.frames.len()
    }

    /// Reads a 64-bit word at `pa`; `None` if it falls outside RAM
    pub fn read_u64(&self, pa: PhysAddr) -> Option<u64> {
        let mut word = [0u8; 8];
        self.read_bytes(pa, &mut word)?;
        Some(u64::from_ne_bytes(word))
    }

    /// Writes a 64-bit word at `pa`; `None` if it falls outside RAM
    pub fn write_u64(&mut self, pa: PhysAddr, value: u64) -> Option<()> {
        self.write_bytes(pa, &value.to_ne_bytes())
    }

    /// Copies bytes out of a single frame
    pub fn read_bytes(&self, pa: PhysAddr, dst: &mut [u8]) -> Option<()> {
        let (index, offset) = self.locate(pa, dst.len())?;
        dst.copy_from_slice(&self.frames[index][offset..offset + dst.len()]);
        Some(())
    }

    /// Copies bytes into a single frame
    pub fn write_bytes(&mut self, pa: PhysAddr, src: &[u8]) -> Option<()> {
        let (index, offset) = self.locate(pa, src.len())?;
        self.frames[index][offset..offset + src.len()].copy_from_slice(src);
        Some(())
    }

    /// Copies one whole frame onto another
    pub fn copy_frame(&mut self, from: PhysAddr, to: PhysAddr) -> Option<()> {
        let src = *self.frames.get(self.frame_index(from)?)?;
        let dst = self.frame_index(to)?;
        self.frames[dst] = src;
        Some(())
    }

    fn frame_addr(index: usize) -> PhysAddr {
        PhysAddr::new(PHYS_BASE + (index << PAGE_SHIFT))
    }

    fn frame_index(&self, pa: PhysAddr) -> Option<usize> {
        let index = pa.as_usize().checked_sub(PHYS_BASE)? >> PAGE_SHIFT;
        (index < self.frames.len()).then_some(index)
    }

    /// Resolves an access of `len` bytes that must stay inside one frame
    fn locate(&self, pa: PhysAddr, len: usize) -> Option<(usize, usize)> {
        let index = self.frame_index(pa)?;
        let offset = pa.page_offset();
        if offset + len > PAGE_SIZE {
            mm_debug!("phys: access at {:#x} len {} crosses a frame", pa.as_usize(), len);
            return None;
        }
        Some((index, offset))
    }
}

impl FreeMemorySource for PhysMemory {
    fn free_bytes(&self) -> u64 {
        (self.free_pages() * PAGE_SIZE) as u64
    }
}
