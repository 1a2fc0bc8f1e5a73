pub mod fd;

use crate::config::{PAGE_SIZE, TCES_PER_PAGE, TCE_ENTRY_SIZE, TCE_SHIFT};
use crate::error::Error;
use crate::guest::Guest;
use crate::mm::{PageAllocator, TcePage};

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};

/// Number of host pages holding the TCEs of a `window_size` byte window.
pub fn stt_npages(window_size: u32) -> usize {
    let entries = window_size as usize >> TCE_SHIFT;
    (entries * TCE_ENTRY_SIZE).div_ceil(PAGE_SIZE)
}

/// Pages of one table. Every page goes back to the allocator it came from.
struct PageStore {
    pages: Vec<Box<TcePage>>,
    allocator: Arc<dyn PageAllocator>,
}

impl PageStore {
    fn alloc(allocator: Arc<dyn PageAllocator>, npages: usize) -> Result<Self, Error> {
        let mut store = Self {
            pages: Vec::new(),
            allocator,
        };
        store.pages.try_reserve_exact(npages).map_err(|_| Error::NoMem)?;
        for _ in 0..npages {
            // An early return hands the pages allocated so far back on drop.
            let page = store.allocator.alloc_zeroed().ok_or(Error::NoMem)?;
            store.pages.push(page);
        }
        Ok(store)
    }
}

impl Drop for PageStore {
    fn drop(&mut self) {
        for page in self.pages.drain(..) {
            self.allocator.free(page);
        }
    }
}

/// Translation table of one LIOBN.
///
/// The shape (liobn, window, page store) never changes after creation, so
/// entries are read and written without holding any lock.
pub struct TceTable {
    liobn: u64,
    window_size: u32,
    store: PageStore,
    map_refs: Vec<AtomicUsize>,
    guest: Arc<Guest>,
}

impl TceTable {
    /// Allocates the zeroed page store. Either every page is allocated or
    /// none is kept.
    pub fn new(
        guest: Arc<Guest>,
        liobn: u64,
        window_size: u32,
        allocator: Arc<dyn PageAllocator>,
    ) -> Result<Self, Error> {
        let npages = stt_npages(window_size);

        let store = PageStore::alloc(allocator, npages).inspect_err(|_| {
            warn!(
                "liobn {:#x}: page store allocation of {} pages failed",
                liobn, npages
            );
        })?;

        let mut map_refs = Vec::new();
        map_refs.try_reserve_exact(npages).map_err(|_| Error::NoMem)?;
        map_refs.extend((0..npages).map(|_| AtomicUsize::new(0)));

        Ok(Self {
            liobn,
            window_size,
            store,
            map_refs,
            guest,
        })
    }

    pub fn liobn(&self) -> u64 {
        self.liobn
    }

    pub fn window_size(&self) -> u64 {
        self.window_size as u64
    }

    pub fn npages(&self) -> usize {
        self.store.pages.len()
    }

    pub fn guest(&self) -> &Arc<Guest> {
        &self.guest
    }

    /// Page `pgoff` of the store.
    pub fn page(&self, pgoff: usize) -> Result<&TcePage, Error> {
        self.store
            .pages
            .get(pgoff)
            .map(|page| page.as_ref())
            .ok_or(Error::BusError)
    }

    /// Number of userspace mappings that faulted page `pgoff` in.
    pub fn map_refs(&self, pgoff: usize) -> usize {
        self.map_refs
            .get(pgoff)
            .map_or(0, |refs| refs.load(Ordering::Acquire))
    }

    /// Page `pgoff` with a mapping reference taken on it.
    pub(crate) fn map_page(&self, pgoff: usize) -> Result<&TcePage, Error> {
        let page = self.page(pgoff)?;
        self.map_refs[pgoff].fetch_add(1, Ordering::AcqRel);
        Ok(page)
    }

    pub(crate) fn unmap_page(&self, pgoff: usize) {
        if let Some(refs) = self.map_refs.get(pgoff) {
            let prev = refs.fetch_sub(1, Ordering::AcqRel);
            debug_assert!(prev > 0, "unbalanced page unmap");
        }
    }

    fn slot(&self, ioba: u64) -> Option<(&TcePage, usize)> {
        if ioba >= self.window_size() {
            return None;
        }
        let idx = (ioba >> TCE_SHIFT) as usize;
        let page = self.store.pages.get(idx / TCES_PER_PAGE)?;
        Some((page, idx % TCES_PER_PAGE))
    }

    /// Entry for `ioba`, or `None` outside the window.
    pub fn entry(&self, ioba: u64) -> Option<u64> {
        self.slot(ioba).map(|(page, idx)| page.get(idx))
    }

    /// Stores `tce` for `ioba`. Callers have checked `ioba` against the window.
    pub(crate) fn put(&self, ioba: u64, tce: u64) {
        debug_assert!(ioba < self.window_size(), "ioba out of window");
        if let Some((page, idx)) = self.slot(ioba) {
            page.set(idx, tce);
        }
    }

    /// Entry for `ioba`, which must lie inside the window.
    pub(crate) fn get(&self, ioba: u64) -> u64 {
        self.entry(ioba).unwrap_or(0)
    }

    /// No entry of the page store is set.
    pub fn is_clear(&self) -> bool {
        self.store.pages.iter().all(|page| page.is_zeroed())
    }
}

impl Drop for TceTable {
    fn drop(&mut self) {
        debug!("liobn {:#x}: freeing {} pages", self.liobn, self.npages());
    }
}
