use crate::config::TCE_PAGE_MASK;
use crate::error::Error;
use crate::mm::{GuestMemory, HeapAllocator, PageAllocator};
use crate::registry::TableRegistry;
use crate::table::fd::TceTableFd;
use crate::table::TceTable;

use alloc::sync::Arc;

/// Argument of the table creation request, laid out as host userspace passes it.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CreateSpaprTce {
    pub liobn: u64,
    pub window_size: u32,
}

/// Guest machine state this crate needs: its translation tables, its
/// memory and where table pages come from.
pub struct Guest {
    id: usize,
    tables: TableRegistry,
    memory: Arc<dyn GuestMemory>,
    allocator: Arc<dyn PageAllocator>,
}

impl Guest {
    pub fn new(id: usize, memory: Arc<dyn GuestMemory>) -> Arc<Self> {
        Self::with_allocator(id, memory, Arc::new(HeapAllocator))
    }

    pub fn with_allocator(
        id: usize,
        memory: Arc<dyn GuestMemory>,
        allocator: Arc<dyn PageAllocator>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            tables: TableRegistry::new(),
            memory,
            allocator,
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn memory(&self) -> &dyn GuestMemory {
        self.memory.as_ref()
    }

    pub fn registry(&self) -> &TableRegistry {
        &self.tables
    }

    /// Creates the table of `args.liobn` and hands back the handle that owns it.
    /// The table keeps this guest alive until the handle is released.
    pub fn create_spapr_tce(self: &Arc<Self>, args: &CreateSpaprTce) -> Result<TceTableFd, Error> {
        let CreateSpaprTce { liobn, window_size } = *args;

        if window_size as u64 & !TCE_PAGE_MASK != 0 {
            warn!(
                "guest {}: liobn {:#x} window {:#x} is not page aligned",
                self.id, liobn, window_size
            );
            return Err(Error::Invalid);
        }

        if self.tables.contains(liobn) {
            return Err(Error::Busy);
        }

        let table = TceTable::new(
            Arc::clone(self),
            liobn,
            window_size,
            Arc::clone(&self.allocator),
        )
        .map(Arc::new)?;

        // A racing creation of the same liobn may have won; dropping our
        // table then frees its pages and the guest reference.
        self.tables.insert(Arc::clone(&table))?;

        info!(
            "guest {}: liobn {:#x} created, window {:#x}, {} pages",
            self.id,
            liobn,
            window_size,
            table.npages()
        );
        Ok(TceTableFd::new(table))
    }

    pub fn find_tce_table(&self, liobn: u64) -> Option<Arc<TceTable>> {
        self.tables.find(liobn)
    }

    /// Lookup for the fast hcall path; gives up instead of waiting for the registry.
    pub fn try_find_tce_table(&self, liobn: u64) -> Option<Arc<TceTable>> {
        self.tables.try_find(liobn)
    }

    /// Unlinks `table` from the registry. Its pages go away with the last reference.
    pub(crate) fn release_tce_table(&self, table: &TceTable) {
        if self.tables.remove_table(table) {
            info!("guest {}: liobn {:#x} released", self.id, table.liobn());
        }
    }
}

impl Drop for Guest {
    fn drop(&mut self) {
        debug!("guest {}: dropped", self.id);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn create_and_find() {
        let (_mem, vcpu) = setup();
        let guest = vcpu.guest();
        let fd = create_table(&vcpu, 0x10_0000);

        let table = guest.find_tce_table(LIOBN).unwrap();
        assert!(Arc::ptr_eq(&table, fd.table()));
        assert_eq!(table.window_size(), 0x10_0000);
        assert!(guest.try_find_tce_table(LIOBN).is_some());
        assert!(guest.find_tce_table(LIOBN + 1).is_none());
    }

    #[test]
    fn duplicate_liobn_allocates_nothing() {
        let (mem, _) = setup();
        let allocator = Arc::new(FailingAllocator::new(usize::MAX));
        let guest = Guest::with_allocator(1, mem, allocator.clone());
        let args = CreateSpaprTce {
            liobn: LIOBN,
            window_size: 0x40_0000,
        };

        let _fd = guest.create_spapr_tce(&args).unwrap();
        let allocated = allocator.allocated();
        assert_eq!(allocated, 2);

        assert_eq!(guest.create_spapr_tce(&args).err(), Some(Error::Busy));
        assert_eq!(allocator.allocated(), allocated);
        assert_eq!(guest.registry().len(), 1);
    }

    #[test]
    fn out_of_memory_rolls_back() {
        let (mem, _) = setup();
        let allocator = Arc::new(FailingAllocator::new(3));
        let guest = Guest::with_allocator(1, mem, allocator.clone());
        let args = CreateSpaprTce {
            liobn: LIOBN,
            window_size: 0x80_0000, // 4 pages
        };

        assert_eq!(guest.create_spapr_tce(&args).err(), Some(Error::NoMem));
        assert_eq!(allocator.allocated(), 3);
        assert_eq!(allocator.live(), 0);
        assert!(guest.registry().is_empty());
        assert_eq!(Arc::strong_count(&guest), 1);
    }

    #[test]
    fn unaligned_window_is_invalid() {
        let (_mem, vcpu) = setup();
        let args = CreateSpaprTce {
            liobn: LIOBN,
            window_size: 0x1800,
        };
        assert_eq!(vcpu.guest().create_spapr_tce(&args).err(), Some(Error::Invalid));
        assert!(vcpu.guest().registry().is_empty());
    }

    #[test]
    fn table_holds_guest_reference() {
        let (_mem, vcpu) = setup();
        let guest = vcpu.guest().clone();
        let before = Arc::strong_count(&guest);

        let fd = create_table(&vcpu, 0x1000);
        assert_eq!(Arc::strong_count(&guest), before + 1);
        drop(fd);
        assert_eq!(Arc::strong_count(&guest), before);
    }

    #[test]
    fn liobn_is_reusable_after_release() {
        let (_mem, vcpu) = setup();
        let fd = create_table(&vcpu, 0x1000);
        drop(fd);
        assert!(vcpu.guest().find_tce_table(LIOBN).is_none());

        let fd = create_table(&vcpu, 0x2000);
        assert_eq!(fd.table().window_size(), 0x2000);
    }
}
