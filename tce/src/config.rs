/// IOMMU page (translation granule) addressed by one TCE.
pub const TCE_SHIFT: usize = 12;
pub const TCE_PAGE_SIZE: usize = 1 << TCE_SHIFT; // 4KiB
pub const TCE_PAGE_MASK: u64 = !((TCE_PAGE_SIZE as u64) - 1);

/// Host page backing the table and the guest memory slots.
pub const PAGE_SHIFT: usize = 12;
pub const PAGE_SIZE: usize = 1 << PAGE_SHIFT; // 4KiB
pub const PAGE_MASK: u64 = !((PAGE_SIZE as u64) - 1);

pub const TCE_ENTRY_SIZE: usize = core::mem::size_of::<u64>();
pub const TCES_PER_PAGE: usize = PAGE_SIZE / TCE_ENTRY_SIZE;

/// Upper bound of H_PUT_TCE_INDIRECT, so the whole list resides in one 4K page.
pub const MAX_TCE_LIST: usize = 512;

crate::const_assert_eq!(MAX_TCE_LIST * TCE_ENTRY_SIZE, TCE_PAGE_SIZE);
