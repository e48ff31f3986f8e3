//! Kinspect Memory Management
//!
//! This crate provides a hosted model of RISC-V Sv39 memory and the
//! access-bit scanner built on top of it. Physical frames live in
//! [`PhysMemory`]; page tables are ordinary frames inside it, so a walk reads
//! real page-table words and clearing an access flag rewrites one.
//!
//! User accesses go through [`Mmu`], which latches the accessed and dirty
//! flags the way the hardware walker does. Kernel copies ([`Mmu::copy_out`])
//! go through physical memory and leave the flags alone.

#![no_std]
#![warn(missing_docs)]
#![warn(clippy::all)]

extern crate alloc;

mod logging;

pub mod access;
pub mod address_space;
pub mod config;
pub mod page_table;
pub mod physical;

// Re-export API types
pub use kinspect_api::*;

// Re-export commonly used types and functions
pub use access::{VirtualPageRange, sample, scan};
pub use address_space::{AddressSpace, Mmu};
pub use config::{ACCESS_FLAG, AccessBitmap, MAX_SCAN_PAGES};
pub use page_table::{MAXVA, Pte, PteFlags, PteRef};
pub use physical::{PAGE_SHIFT, PAGE_SIZE, PhysAddr, PhysMemory, page_round_down, page_round_up};
