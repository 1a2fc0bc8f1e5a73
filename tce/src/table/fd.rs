use super::TceTable;
use crate::config::{PAGE_SIZE, TCES_PER_PAGE};
use crate::error::Error;
use crate::mm::TcePage;

use alloc::collections::BTreeSet;
use alloc::sync::Arc;

/// The open file behind every handle and mapping of one table.
/// Dropping the last reference destroys the table.
struct TceFile {
    table: Arc<TceTable>,
}

impl Drop for TceFile {
    fn drop(&mut self) {
        self.table.guest().release_tce_table(&self.table);
    }
}

/// Host userspace handle of a translation table.
pub struct TceTableFd {
    file: Arc<TceFile>,
}

impl TceTableFd {
    pub(crate) fn new(table: Arc<TceTable>) -> Self {
        Self {
            file: Arc::new(TceFile { table }),
        }
    }

    pub fn table(&self) -> &Arc<TceTable> {
        &self.file.table
    }

    pub fn liobn(&self) -> u64 {
        self.file.table.liobn()
    }

    /// Another handle of the same file, as `dup` would give.
    pub fn try_clone(&self) -> Self {
        Self {
            file: Arc::clone(&self.file),
        }
    }

    /// Maps the whole page store. Pages are populated on fault.
    pub fn mmap(&self) -> TceMapping {
        TceMapping {
            file: Arc::clone(&self.file),
            faulted: BTreeSet::new(),
        }
    }
}

/// A userspace mapping of the page store. It keeps the file open, so the
/// table outlives a closed handle as long as it is mapped.
pub struct TceMapping {
    file: Arc<TceFile>,
    faulted: BTreeSet<usize>,
}

impl TceMapping {
    /// Size of the mapping in bytes.
    pub fn len(&self) -> usize {
        self.file.table.npages() * PAGE_SIZE
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Populates page `pgoff`, taking a reference held until unmap.
    pub fn fault(&mut self, pgoff: usize) -> Result<&TcePage, Error> {
        let table = &self.file.table;
        if self.faulted.contains(&pgoff) {
            return table.page(pgoff);
        }
        let page = table.map_page(pgoff).inspect_err(|_| {
            debug!(
                "liobn {:#x}: fault at page {} past {} pages",
                table.liobn(),
                pgoff,
                table.npages()
            );
        })?;
        self.faulted.insert(pgoff);
        Ok(page)
    }

    /// Reads entry `idx` of the mapping, faulting its page in.
    pub fn read_tce(&mut self, idx: usize) -> Result<u64, Error> {
        let page = self.fault(idx / TCES_PER_PAGE)?;
        Ok(page.get(idx % TCES_PER_PAGE))
    }

    pub fn resident_pages(&self) -> usize {
        self.faulted.len()
    }
}

impl Drop for TceMapping {
    fn drop(&mut self) {
        for pgoff in &self.faulted {
            self.file.table.unmap_page(*pgoff);
        }
    }
}
