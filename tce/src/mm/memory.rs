use crate::config::{PAGE_MASK, PAGE_SHIFT, PAGE_SIZE};

use alloc::sync::Arc;

/// Guest-physical to host translation, provided by the memory-slot layer.
pub trait GuestMemory: Send + Sync {
    /// Pins the host page backing `gpa`.
    /// Returns `None` if no memory slot covers it.
    fn pin(&self, gpa: u64) -> Option<PinnedPage>;
}

/// A host page backing guest memory, as seen by the hypercall path.
pub trait HostPage: Send + Sync {
    /// Reads the 8-byte word at `offset` inside the page.
    /// Returns `None` when the access faults.
    fn read_u64(&self, offset: usize) -> Option<u64>;

    /// Takes a pin on the page.
    fn get(&self);

    /// Drops a pin taken by `get`.
    fn put(&self);

    /// Contents can be read without faulting in the fast path.
    fn is_resident(&self) -> bool {
        true
    }

    /// Part of a compound page, whose pin may only be dropped in the slow path.
    fn is_compound(&self) -> bool {
        false
    }
}

/// A pinned guest page. The pin is dropped together with this object,
/// so it is released exactly once whichever path ends up owning it.
pub struct PinnedPage {
    gpa: u64,
    page: Arc<dyn HostPage>,
}

impl PinnedPage {
    pub fn new(gpa: u64, page: Arc<dyn HostPage>) -> Self {
        page.get();
        Self { gpa, page }
    }

    pub fn gpa(&self) -> u64 {
        self.gpa
    }

    pub fn gfn(&self) -> u64 {
        self.gpa >> PAGE_SHIFT
    }

    /// Reads the `idx`-th 8-byte word starting at the pinned address.
    pub fn read_u64(&self, idx: usize) -> Option<u64> {
        let offset = (self.gpa & !PAGE_MASK) as usize + idx * core::mem::size_of::<u64>();
        if offset + core::mem::size_of::<u64>() > PAGE_SIZE {
            return None;
        }
        self.page.read_u64(offset)
    }

    pub fn is_resident(&self) -> bool {
        self.page.is_resident()
    }

    pub fn is_compound(&self) -> bool {
        self.page.is_compound()
    }
}

impl Drop for PinnedPage {
    fn drop(&mut self) {
        self.page.put();
    }
}

impl core::fmt::Debug for PinnedPage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PinnedPage").field("gpa", &self.gpa).finish()
    }
}
