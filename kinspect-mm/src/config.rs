//! Per-architecture scan configuration
//!
//! The scan width and the access-flag position are set once here. The default
//! build scans up to 32 pages into a `u32`; the `wide-scan` feature scans up to
//! 64 pages into a `u64`.

use core::mem::size_of;

use static_assertions::const_assert_eq;

use crate::page_table::PteFlags;

/// Bitmap returned by `pgaccess`; bit `i` is page `i` of the range
#[cfg(not(feature = "wide-scan"))]
pub type AccessBitmap = u32;

/// Bitmap returned by `pgaccess`; bit `i` is page `i` of the range
#[cfg(feature = "wide-scan")]
pub type AccessBitmap = u64;

/// Largest page count a single scan accepts
pub const MAX_SCAN_PAGES: usize = AccessBitmap::BITS as usize;

/// Hardware flag latched on access (Sv39 `A`, bit 6)
pub const ACCESS_FLAG: PteFlags = PteFlags::A;

const_assert_eq!(size_of::<AccessBitmap>() * 8, MAX_SCAN_PAGES);
