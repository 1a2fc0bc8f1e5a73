use crate::error::Error;
use crate::table::TceTable;

use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use spinning_top::Spinlock;

/// LIOBN to table map of one guest.
///
/// Writers (table creation and release) serialize on the lock. Lookups
/// either wait for it, or, on the fast hcall path, give up when it is held.
pub struct TableRegistry {
    tables: Spinlock<BTreeMap<u64, Arc<TceTable>>>,
}

impl TableRegistry {
    pub fn new() -> Self {
        Self {
            tables: Spinlock::new(BTreeMap::new()),
        }
    }

    pub fn find(&self, liobn: u64) -> Option<Arc<TceTable>> {
        self.tables.lock().get(&liobn).cloned()
    }

    /// Lookup that never spins. `None` either means the LIOBN is unknown
    /// or the registry is being updated.
    pub fn try_find(&self, liobn: u64) -> Option<Arc<TceTable>> {
        self.tables.try_lock()?.get(&liobn).cloned()
    }

    pub fn contains(&self, liobn: u64) -> bool {
        self.tables.lock().contains_key(&liobn)
    }

    pub fn insert(&self, table: Arc<TceTable>) -> Result<(), Error> {
        let mut tables = self.tables.lock();
        if tables.contains_key(&table.liobn()) {
            return Err(Error::Busy);
        }
        tables.insert(table.liobn(), table);
        Ok(())
    }

    pub fn remove(&self, liobn: u64) -> Option<Arc<TceTable>> {
        self.tables.lock().remove(&liobn)
    }

    /// Removes `table` if it is still the one registered for its liobn.
    pub fn remove_table(&self, table: &TceTable) -> bool {
        let mut tables = self.tables.lock();
        match tables.get(&table.liobn()) {
            Some(found) if core::ptr::eq(Arc::as_ptr(found), table) => {
                tables.remove(&table.liobn());
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.tables.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(any(test, fuzzing))]
    pub(crate) fn lock(&self) -> spinning_top::guard::SpinlockGuard<'_, BTreeMap<u64, Arc<TceTable>>> {
        self.tables.lock()
    }
}

impl Default for TableRegistry {
    fn default() -> Self {
        Self::new()
    }
}
