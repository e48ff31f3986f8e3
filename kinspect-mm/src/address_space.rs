//! User address spaces
//!
//! An [`AddressSpace`] is a root page table plus the size of the user image,
//! which always starts at virtual address 0. It does not own a reference to
//! [`PhysMemory`]; every operation borrows the machine explicitly so the caller
//! decides how memory is locked.
//!
//! [`Mmu`] is a short-lived view of one address space. It plays both sides of
//! the translation: the user-mode accesses that make hardware latch the `A`
//! and `D` flags, and the kernel-side walker and copier used by the
//! introspection syscalls.

use kinspect_api::{Error, PageTableWalker, Result, UserCopier, VirtAddr};

use crate::logging::mm_trace;
use crate::page_table::{self, MAXVA, PERMISSION_MASK, Pte, PteFlags, PteRef};
use crate::physical::{PAGE_SIZE, PhysAddr, PhysMemory, page_round_down, page_round_up};

/// Permissions of pages grown with `sbrk`
const USER_RW: PteFlags = PteFlags::R.union(PteFlags::W).union(PteFlags::U);

/// Maps one page; fails with [`Error::PageFault`] if `va` is already mapped
fn map_page(mem: &mut PhysMemory, root: PhysAddr, va: VirtAddr, pa: PhysAddr, perm: PteFlags) -> Result<()> {
    let slot = page_table::walk_create(mem, root, va)?;
    let old = Pte::from_bits(mem.read_u64(slot).unwrap_or(0));
    if old.is_valid() {
        return Err(Error::PageFault(va));
    }
    mem.write_u64(slot, Pte::new(pa, perm | PteFlags::V).bits())
        .ok_or(Error::PageFault(va))
}

/// Unmaps one page and returns the frame it pointed at
fn unmap_page(mem: &mut PhysMemory, root: PhysAddr, va: VirtAddr) -> Option<PhysAddr> {
    let slot = page_table::walk(mem, root, va)?;
    let pte = Pte::from_bits(mem.read_u64(slot)?);
    if !pte.is_valid() {
        return None;
    }
    mem.write_u64(slot, 0)?;
    Some(pte.pa())
}

/// A user address space
#[derive(Debug)]
pub struct AddressSpace {
    root: PhysAddr,
    size: usize,
}

impl AddressSpace {
    /// Creates an empty address space
    pub fn new(mem: &mut PhysMemory) -> Result<Self> {
        let root = mem.alloc_frame().ok_or(Error::OutOfMemory)?;
        Ok(Self { root, size: 0 })
    }

    /// Physical address of the root page table
    pub fn root(&self) -> PhysAddr {
        self.root
    }

    /// Size of the user image in bytes
    pub fn size(&self) -> usize {
        self.size
    }

    /// Grows or shrinks the image by `delta` bytes and returns the old size.
    ///
    /// Growth maps zeroed read/write user pages. Shrinking frees the data
    /// frames but keeps intermediate page tables until [`Self::destroy`].
    pub fn grow(&mut self, mem: &mut PhysMemory, delta: isize) -> Result<usize> {
        let old = self.size;
        let new = old.checked_add_signed(delta).ok_or(Error::OutOfMemory)?;
        if new > old {
            self.alloc_range(mem, old, new)?;
        } else {
            self.dealloc_range(mem, old, new);
        }
        self.size = new;
        mm_trace!("vm: grow {:#x} -> {:#x}", old, new);
        Ok(old)
    }

    fn alloc_range(&mut self, mem: &mut PhysMemory, old: usize, new: usize) -> Result<()> {
        if new > MAXVA {
            return Err(Error::OutOfMemory);
        }
        let mut va = page_round_up(old);
        while va < new {
            let mapped = match mem.alloc_frame() {
                Some(frame) => {
                    let result = map_page(mem, self.root, VirtAddr::new(va), frame, USER_RW);
                    if result.is_err() {
                        mem.free_frame(frame);
                    }
                    result
                }
                None => Err(Error::OutOfMemory),
            };
            if let Err(error) = mapped {
                self.dealloc_range(mem, va, old);
                return Err(error);
            }
            va += PAGE_SIZE;
        }
        Ok(())
    }

    fn dealloc_range(&mut self, mem: &mut PhysMemory, old: usize, new: usize) {
        let mut va = page_round_up(new);
        while va < page_round_up(old) {
            if let Some(frame) = unmap_page(mem, self.root, VirtAddr::new(va)) {
                mem.free_frame(frame);
            }
            va += PAGE_SIZE;
        }
    }

    /// Copies the whole image into a fresh address space, as `fork` does.
    ///
    /// The child gets its own frames with the parent's permissions; accessed
    /// and dirty flags start clear.
    pub fn duplicate(&self, mem: &mut PhysMemory) -> Result<Self> {
        let mut child = Self::new(mem)?;
        let mut va = 0;
        while va < self.size {
            if let Err(error) = self.copy_page_into(&mut child, mem, VirtAddr::new(va)) {
                child.destroy(mem);
                return Err(error);
            }
            child.size = va + PAGE_SIZE;
            va += PAGE_SIZE;
        }
        child.size = self.size;
        Ok(child)
    }

    fn copy_page_into(&self, child: &mut Self, mem: &mut PhysMemory, va: VirtAddr) -> Result<()> {
        let slot = page_table::walk(mem, self.root, va).ok_or(Error::PageFault(va))?;
        let pte = Pte::from_bits(mem.read_u64(slot).unwrap_or(0));
        if !pte.is_valid() {
            return Err(Error::PageFault(va));
        }
        let frame = mem.alloc_frame().ok_or(Error::OutOfMemory)?;
        mem.copy_frame(pte.pa(), frame).ok_or(Error::PageFault(va))?;
        if let Err(error) = map_page(mem, child.root, va, frame, pte.flags() & PERMISSION_MASK) {
            mem.free_frame(frame);
            return Err(error);
        }
        Ok(())
    }

    /// Frees every frame of the address space, page tables included
    pub fn destroy(mut self, mem: &mut PhysMemory) {
        let size = self.size;
        self.dealloc_range(mem, size, 0);
        page_table::free_tables(mem, self.root);
    }

    /// Borrows a translation view of this address space
    pub fn mmu<'a>(&self, mem: &'a mut PhysMemory) -> Mmu<'a> {
        Mmu::new(mem, self.root)
    }
}

/// Translation view of one address space
pub struct Mmu<'a> {
    mem: &'a mut PhysMemory,
    root: PhysAddr,
}

impl<'a> Mmu<'a> {
    /// Creates a view of the address space rooted at `root`
    pub fn new(mem: &'a mut PhysMemory, root: PhysAddr) -> Self {
        Self { mem, root }
    }

    /// Current entry for `va`, if any table maps it
    pub fn entry(&self, va: VirtAddr) -> Option<Pte> {
        let slot = page_table::walk(&*self.mem, self.root, va)?;
        self.mem.read_u64(slot).map(Pte::from_bits)
    }

    /// Translates `va` for an access that needs `perm`.
    ///
    /// With `latch` set the walk behaves like the hardware translator and
    /// sets `latch` on the entry (`A`, plus `D` for stores).
    fn translate(&mut self, va: VirtAddr, perm: PteFlags, latch: PteFlags) -> Option<PhysAddr> {
        let slot = page_table::walk(&*self.mem, self.root, VirtAddr::new(page_round_down(va.as_usize())))?;
        let pte = Pte::from_bits(self.mem.read_u64(slot)?);
        if !pte.flags().contains(PteFlags::V | PteFlags::U | perm) {
            return None;
        }
        if !latch.is_empty() {
            self.mem.write_u64(slot, pte.with(latch).bits())?;
        }
        Some(pte.pa().offset(va.as_usize() & (PAGE_SIZE - 1)))
    }

    /// Runs `f` on every page-sized chunk of `[va, va + len)`
    fn for_each_chunk(
        &mut self,
        va: VirtAddr,
        len: usize,
        perm: PteFlags,
        latch: PteFlags,
        mut f: impl FnMut(&mut PhysMemory, PhysAddr, core::ops::Range<usize>) -> Option<()>,
    ) -> Option<()> {
        let mut done = 0;
        while done < len {
            let at = va.checked_add(done)?;
            let chunk = (PAGE_SIZE - (at.as_usize() & (PAGE_SIZE - 1))).min(len - done);
            let pa = self.translate(at, perm, latch)?;
            f(&mut *self.mem, pa, done..done + chunk)?;
            done += chunk;
        }
        Some(())
    }

    /// User-mode store: needs a writable user page, latches `A` and `D`
    pub fn store(&mut self, va: VirtAddr, src: &[u8]) -> Result<()> {
        self.for_each_chunk(va, src.len(), PteFlags::W, PteFlags::A | PteFlags::D, |mem, pa, range| {
            mem.write_bytes(pa, &src[range])
        })
        .ok_or(Error::PageFault(va))
    }

    /// User-mode load: needs a readable user page, latches `A`
    pub fn load(&mut self, va: VirtAddr, dst: &mut [u8]) -> Result<()> {
        let len = dst.len();
        self.for_each_chunk(va, len, PteFlags::R, PteFlags::A, |mem, pa, range| {
            mem.read_bytes(pa, &mut dst[range])
        })
        .ok_or(Error::PageFault(va))
    }

    /// Kernel copy from user memory; leaves the flags alone
    pub fn copy_in(&mut self, src: VirtAddr, dst: &mut [u8]) -> Result<()> {
        let len = dst.len();
        self.for_each_chunk(src, len, PteFlags::R, PteFlags::empty(), |mem, pa, range| {
            mem.read_bytes(pa, &mut dst[range])
        })
        .ok_or(Error::CopyFault(src))
    }
}

impl PageTableWalker for Mmu<'_> {
    type Entry<'e>
        = PteRef<'e>
    where
        Self: 'e;

    fn walk(&mut self, va: VirtAddr) -> Option<PteRef<'_>> {
        let slot = page_table::walk(&*self.mem, self.root, va)?;
        Some(PteRef::new(&mut *self.mem, slot))
    }
}

impl UserCopier for Mmu<'_> {
    /// Kernel copy into user memory; goes through physical memory, so the
    /// destination's accessed flag is not latched
    fn copy_out(&mut self, dst: VirtAddr, src: &[u8]) -> Result<()> {
        self.for_each_chunk(dst, src.len(), PteFlags::W, PteFlags::empty(), |mem, pa, range| {
            mem.write_bytes(pa, &src[range])
        })
        .ok_or(Error::CopyFault(dst))
    }
}
