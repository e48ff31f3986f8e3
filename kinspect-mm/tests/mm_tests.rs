//! Access scanner tests against the hosted Sv39 model

use kinspect_mm::*;
use proptest::prelude::*;

fn bitmap_at(mmu: &mut Mmu<'_>, va: VirtAddr) -> AccessBitmap {
    let mut raw = [0u8; core::mem::size_of::<AccessBitmap>()];
    mmu.copy_in(va, &mut raw).unwrap();
    AccessBitmap::from_ne_bytes(raw)
}

/// Process image: `pages` user pages, with the last one reserved for results
fn machine(pages: usize) -> (PhysMemory, AddressSpace) {
    let mut mem = PhysMemory::new(256);
    let mut space = AddressSpace::new(&mut mem).unwrap();
    space.grow(&mut mem, (pages * PAGE_SIZE) as isize).unwrap();
    (mem, space)
}

#[test]
fn test_writes_to_pages_1_2_30() {
    let (mut mem, space) = machine(33);
    let mut mmu = space.mmu(&mut mem);
    let result = VirtAddr::new(32 * PAGE_SIZE);

    for page in [1, 2, 30] {
        mmu.store(VirtAddr::new(page * PAGE_SIZE), &[0xff]).unwrap();
    }

    scan(&mut mmu, VirtAddr::new(0), 32, result).unwrap();
    assert_eq!(bitmap_at(&mut mmu, result), (1 << 1) | (1 << 2) | (1 << 30));

    // Flags were consumed
    scan(&mut mmu, VirtAddr::new(0), 32, result).unwrap();
    assert_eq!(bitmap_at(&mut mmu, result), 0);
}

#[test]
fn test_accessed_page_outside_range_is_untouched() {
    let (mut mem, space) = machine(8);
    let mut mmu = space.mmu(&mut mem);
    mmu.store(VirtAddr::new(PAGE_SIZE), &[1]).unwrap();
    mmu.store(VirtAddr::new(5 * PAGE_SIZE), &[1]).unwrap();

    let result = VirtAddr::new(7 * PAGE_SIZE);
    scan(&mut mmu, VirtAddr::new(0), 4, result).unwrap();
    assert_eq!(bitmap_at(&mut mmu, result), 1 << 1);
    assert!(mmu.entry(VirtAddr::new(5 * PAGE_SIZE)).unwrap().flags().contains(ACCESS_FLAG));
}

#[test]
fn test_scan_clears_only_access_flag() {
    let (mut mem, space) = machine(2);
    let mut mmu = space.mmu(&mut mem);
    mmu.store(VirtAddr::new(0), &[1]).unwrap();
    let before = mmu.entry(VirtAddr::new(0)).unwrap();

    scan(&mut mmu, VirtAddr::new(0), 1, VirtAddr::new(PAGE_SIZE)).unwrap();
    let after = mmu.entry(VirtAddr::new(0)).unwrap();
    assert_eq!(after, before.without(PteFlags::A));
    assert!(after.flags().contains(PteFlags::D));
}

#[test]
fn test_range_past_image_end() {
    let (mut mem, space) = machine(3);
    space.mmu(&mut mem).store(VirtAddr::new(PAGE_SIZE), &[1]).unwrap();
    let free = mem.free_pages();

    let mut mmu = space.mmu(&mut mem);
    scan(&mut mmu, VirtAddr::new(0), 32, VirtAddr::new(2 * PAGE_SIZE)).unwrap();
    assert_eq!(bitmap_at(&mut mmu, VirtAddr::new(2 * PAGE_SIZE)), 1 << 1);

    // The walk never allocates page tables
    assert_eq!(mem.free_pages(), free);
}

#[test]
fn test_out_of_range_counts() {
    let (mut mem, space) = machine(2);
    let mut mmu = space.mmu(&mut mem);
    mmu.store(VirtAddr::new(0), &[1]).unwrap();

    for count in [-1, -(1 << 31), MAX_SCAN_PAGES as i64 + 1] {
        let result = scan(&mut mmu, VirtAddr::new(0), count, VirtAddr::new(PAGE_SIZE));
        assert_eq!(
            result,
            Err(Error::OutOfRange {
                requested: count,
                max: MAX_SCAN_PAGES
            })
        );
    }
    assert!(mmu.entry(VirtAddr::new(0)).unwrap().flags().contains(ACCESS_FLAG));
}

#[test]
fn test_copy_fault_consumes_flags() {
    let (mut mem, space) = machine(2);
    let mut mmu = space.mmu(&mut mem);
    mmu.store(VirtAddr::new(0), &[1]).unwrap();

    let dst = VirtAddr::new(MAXVA + PAGE_SIZE);
    assert_eq!(scan(&mut mmu, VirtAddr::new(0), 2, dst), Err(Error::CopyFault(dst)));
    assert!(!mmu.entry(VirtAddr::new(0)).unwrap().flags().contains(ACCESS_FLAG));
}

#[test]
fn test_result_copy_does_not_mark_result_page() {
    let (mut mem, space) = machine(4);
    let mut mmu = space.mmu(&mut mem);
    let result = VirtAddr::new(3 * PAGE_SIZE);
    scan(&mut mmu, VirtAddr::new(0), 4, result).unwrap();
    scan(&mut mmu, VirtAddr::new(0), 4, result).unwrap();
    assert_eq!(bitmap_at(&mut mmu, result), 0);
}

proptest! {
    #[test]
    fn prop_bits_beyond_count_are_zero(
        touched in proptest::collection::vec(0usize..MAX_SCAN_PAGES, 0..16),
        count in 0usize..=MAX_SCAN_PAGES,
    ) {
        let (mut mem, space) = machine(MAX_SCAN_PAGES + 1);
        let mut mmu = space.mmu(&mut mem);
        for page in &touched {
            mmu.store(VirtAddr::new(page * PAGE_SIZE), &[1]).unwrap();
        }

        let result = VirtAddr::new(MAX_SCAN_PAGES * PAGE_SIZE);
        scan(&mut mmu, VirtAddr::new(0), count as i64, result).unwrap();
        let bitmap = bitmap_at(&mut mmu, result);

        for page in 0..MAX_SCAN_PAGES {
            let bit = bitmap & (1 << page) != 0;
            let expected = page < count && touched.contains(&page);
            prop_assert_eq!(bit, expected);
        }
    }

    #[test]
    fn prop_out_of_range_modifies_nothing(count in prop_oneof![
        i64::MIN..0,
        (MAX_SCAN_PAGES as i64 + 1)..i64::MAX,
    ]) {
        let (mut mem, space) = machine(4);
        let mut mmu = space.mmu(&mut mem);
        for page in 0..3 {
            mmu.store(VirtAddr::new(page * PAGE_SIZE), &[1]).unwrap();
        }
        let before: Vec<_> = (0..4).map(|page| mmu.entry(VirtAddr::new(page * PAGE_SIZE))).collect();

        let result = scan(&mut mmu, VirtAddr::new(0), count, VirtAddr::new(3 * PAGE_SIZE));
        let is_out_of_range = matches!(result, Err(Error::OutOfRange { .. }));
        prop_assert!(is_out_of_range);

        let after: Vec<_> = (0..4).map(|page| mmu.entry(VirtAddr::new(page * PAGE_SIZE))).collect();
        prop_assert_eq!(before, after);
    }
}
