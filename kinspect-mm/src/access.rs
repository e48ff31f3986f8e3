//! Access-bit scanner
//!
//! Reports which pages of a small range were touched since the previous scan
//! and resets their hardware access flags. The flag is a clear-on-read sensor:
//! a page shows up once per burst of accesses, and the next scan only sees
//! accesses that happened after this one.
//!
//! The count is validated before any entry is looked at. Once the walk has
//! run, the flags it cleared stay cleared even if delivering the bitmap fails;
//! a caller that gets `CopyFault` has still consumed the signal.

use kinspect_api::{Error, PageTableEntry, PageTableWalker, Result, UserCopier, VirtAddr};

use crate::config::{AccessBitmap, MAX_SCAN_PAGES};
use crate::logging::{mm_debug, mm_trace};
use crate::physical::PAGE_SIZE;

/// A validated range of pages to scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualPageRange {
    base: VirtAddr,
    count: usize,
}

impl VirtualPageRange {
    /// Validates `count` against [`MAX_SCAN_PAGES`]
    pub fn new(base: VirtAddr, count: i64) -> Result<Self> {
        match usize::try_from(count) {
            Ok(count) if count <= MAX_SCAN_PAGES => Ok(Self { base, count }),
            _ => Err(Error::OutOfRange {
                requested: count,
                max: MAX_SCAN_PAGES,
            }),
        }
    }

    /// First address of the range; need not be page-aligned
    pub fn base(&self) -> VirtAddr {
        self.base
    }

    /// Number of pages in the range
    pub fn count(&self) -> usize {
        self.count
    }

    /// Address of each page, `base + i * PAGE_SIZE`, or `None` past the end of
    /// the address space
    pub fn pages(&self) -> impl Iterator<Item = Option<VirtAddr>> {
        let base = self.base;
        (0..self.count).map(move |i| i.checked_mul(PAGE_SIZE).and_then(|offset| base.checked_add(offset)))
    }
}

/// Walks `range`, collecting and clearing access flags.
///
/// Unmapped and invalid pages read as not accessed.
pub fn sample<W>(walker: &mut W, range: VirtualPageRange) -> AccessBitmap
where
    W: PageTableWalker + ?Sized,
{
    let mut bitmap: AccessBitmap = 0;
    for (i, va) in range.pages().enumerate() {
        let Some(va) = va else { continue };
        let Some(mut pte) = walker.walk(va) else { continue };
        if !pte.is_valid() {
            continue;
        }
        if pte.is_accessed() {
            bitmap |= 1 << i;
            pte.clear_accessed();
        }
    }
    bitmap
}

/// Scans `count` pages from `base` and writes the bitmap to `dst`.
pub fn scan<S>(space: &mut S, base: VirtAddr, count: i64, dst: VirtAddr) -> Result<()>
where
    S: PageTableWalker + UserCopier + ?Sized,
{
    let range = VirtualPageRange::new(base, count).inspect_err(|_| {
        mm_debug!("pgaccess: rejected count {} (max {})", count, MAX_SCAN_PAGES);
    })?;

    let bitmap = sample(&mut *space, range);
    mm_trace!("pgaccess: base={} pages={} bitmap={:#x}", base, range.count(), bitmap);

    space.copy_out(dst, &bitmap.to_ne_bytes())
}
