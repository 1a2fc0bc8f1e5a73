use super::memory::{GuestMemory, HostPage, PinnedPage};
use crate::config::{PAGE_MASK, PAGE_SHIFT, PAGE_SIZE};

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use spin::RwLock;

const WORDS_PER_PAGE: usize = PAGE_SIZE / core::mem::size_of::<u64>();

/// A host page of guest RAM.
pub struct SlotPage {
    words: Vec<AtomicU64>,
    pins: AtomicUsize,
    resident: AtomicBool,
    compound: AtomicBool,
    poisoned: AtomicUsize,
}

impl SlotPage {
    fn new() -> Self {
        Self {
            words: (0..WORDS_PER_PAGE).map(|_| AtomicU64::new(0)).collect(),
            pins: AtomicUsize::new(0),
            resident: AtomicBool::new(true),
            compound: AtomicBool::new(false),
            poisoned: AtomicUsize::new(usize::MAX),
        }
    }

    pub fn pins(&self) -> usize {
        self.pins.load(Ordering::Acquire)
    }
}

impl HostPage for SlotPage {
    fn read_u64(&self, offset: usize) -> Option<u64> {
        if offset % core::mem::size_of::<u64>() != 0 {
            return None;
        }
        let idx = offset / core::mem::size_of::<u64>();
        if idx >= self.poisoned.load(Ordering::Acquire) {
            return None;
        }
        self.words.get(idx).map(|w| w.load(Ordering::Acquire))
    }

    fn get(&self) {
        self.pins.fetch_add(1, Ordering::AcqRel);
    }

    fn put(&self) {
        let prev = self.pins.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "unbalanced page release");
    }

    fn is_resident(&self) -> bool {
        self.resident.load(Ordering::Acquire)
    }

    fn is_compound(&self) -> bool {
        self.compound.load(Ordering::Acquire)
    }
}

struct MemorySlot {
    base_gfn: u64,
    pages: Vec<Arc<SlotPage>>,
}

impl MemorySlot {
    fn contains(&self, gfn: u64) -> bool {
        gfn >= self.base_gfn && gfn - self.base_gfn < self.pages.len() as u64
    }
}

/// Guest RAM organized as memory slots of page-granular host memory.
pub struct MemorySlots {
    slots: RwLock<Vec<MemorySlot>>,
}

impl MemorySlots {
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(Vec::new()),
        }
    }

    /// Adds a slot of `npages` zeroed pages starting at `base_gpa`.
    /// Returns false if `base_gpa` is unaligned or the slot overlaps another one.
    pub fn add_slot(&self, base_gpa: u64, npages: usize) -> bool {
        if base_gpa & !PAGE_MASK != 0 {
            return false;
        }
        let base_gfn = base_gpa >> PAGE_SHIFT;
        let end_gfn = base_gfn + npages as u64;
        let mut slots = self.slots.write();
        if slots
            .iter()
            .any(|s| base_gfn < s.base_gfn + s.pages.len() as u64 && s.base_gfn < end_gfn)
        {
            return false;
        }
        slots.push(MemorySlot {
            base_gfn,
            pages: (0..npages).map(|_| Arc::new(SlotPage::new())).collect(),
        });
        true
    }

    fn page(&self, gpa: u64) -> Option<Arc<SlotPage>> {
        let gfn = gpa >> PAGE_SHIFT;
        let slots = self.slots.read();
        let slot = slots.iter().find(|s| s.contains(gfn))?;
        Some(Arc::clone(&slot.pages[(gfn - slot.base_gfn) as usize]))
    }

    /// Stores `val` at the 8-byte aligned `gpa`, as guest code would.
    pub fn write_u64(&self, gpa: u64, val: u64) -> bool {
        if gpa % core::mem::size_of::<u64>() as u64 != 0 {
            return false;
        }
        match self.page(gpa) {
            Some(page) => {
                let idx = (gpa & !PAGE_MASK) as usize / core::mem::size_of::<u64>();
                page.words[idx].store(val, Ordering::Release);
                true
            }
            None => false,
        }
    }

    pub fn pins(&self, gpa: u64) -> Option<usize> {
        self.page(gpa).map(|page| page.pins())
    }

    pub fn set_resident(&self, gpa: u64, resident: bool) {
        if let Some(page) = self.page(gpa) {
            page.resident.store(resident, Ordering::Release);
        }
    }

    pub fn set_compound(&self, gpa: u64, compound: bool) {
        if let Some(page) = self.page(gpa) {
            page.compound.store(compound, Ordering::Release);
        }
    }

    /// Makes reads fault from the word at `gpa` up to the end of its page.
    pub fn poison_from(&self, gpa: u64) {
        if let Some(page) = self.page(gpa) {
            let idx = (gpa & !PAGE_MASK) as usize / core::mem::size_of::<u64>();
            page.poisoned.store(idx, Ordering::Release);
        }
    }
}

impl Default for MemorySlots {
    fn default() -> Self {
        Self::new()
    }
}

impl GuestMemory for MemorySlots {
    fn pin(&self, gpa: u64) -> Option<PinnedPage> {
        let page = self.page(gpa)?;
        Some(PinnedPage::new(gpa, page))
    }
}
