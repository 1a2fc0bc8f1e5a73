use crate::config::{PAGE_SIZE, TCES_PER_PAGE};

use alloc::alloc::{alloc_zeroed, Layout};
use alloc::boxed::Box;
use core::sync::atomic::{AtomicU64, Ordering};

/// One host page of the table's backing store: a dense array of TCE slots.
///
/// Slots are atomics so that guest-facing handlers and host userspace
/// reading through its mapping can touch the page concurrently without a
/// table lock. A single slot store is what the translation hardware observes.
#[repr(C, align(4096))]
pub struct TcePage([AtomicU64; TCES_PER_PAGE]);

crate::const_assert_size!(TcePage, PAGE_SIZE);

impl TcePage {
    pub fn get(&self, idx: usize) -> u64 {
        self.0[idx].load(Ordering::Acquire)
    }

    pub fn set(&self, idx: usize, tce: u64) {
        self.0[idx].store(tce, Ordering::Release);
    }

    pub fn is_zeroed(&self) -> bool {
        self.0.iter().all(|slot| slot.load(Ordering::Relaxed) == 0)
    }

    /// Host address of the page, handed out to a userspace mapping.
    pub fn as_ptr(&self) -> *const u8 {
        self.0.as_ptr() as *const u8
    }
}

/// Source of zero-filled pages for the table's page store.
pub trait PageAllocator: Send + Sync {
    /// Returns `None` when no page can be allocated.
    fn alloc_zeroed(&self) -> Option<Box<TcePage>>;

    /// Takes back a page handed out by `alloc_zeroed`.
    fn free(&self, page: Box<TcePage>) {
        drop(page);
    }
}

/// Allocates pages from the global allocator.
pub struct HeapAllocator;

impl PageAllocator for HeapAllocator {
    fn alloc_zeroed(&self) -> Option<Box<TcePage>> {
        let layout = Layout::new::<TcePage>();
        // Safety: `TcePage` has a non-zero size, and an all-zero bit pattern
        // is a valid array of `AtomicU64`.
        let ptr = unsafe { alloc_zeroed(layout) } as *mut TcePage;
        if ptr.is_null() {
            return None;
        }
        // Safety: `ptr` was just allocated with the layout of `TcePage`.
        Some(unsafe { Box::from_raw(ptr) })
    }
}
