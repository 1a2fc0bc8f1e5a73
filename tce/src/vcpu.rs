use crate::config::MAX_TCE_LIST;
use crate::guest::Guest;
use crate::mm::PinnedPage;

use alloc::boxed::Box;
use alloc::sync::Arc;

/// The H_PUT_TCE_INDIRECT call an interrupted attempt was working on.
#[derive(Debug)]
pub struct PendingList {
    call: [usize; 4],
    page: PinnedPage,
}

impl PendingList {
    pub fn new(call: [usize; 4], page: PinnedPage) -> Self {
        Self { call, page }
    }

    pub fn is_for(&self, call: &[usize]) -> bool {
        self.call[..] == *call
    }

    pub fn page(&self) -> &PinnedPage {
        &self.page
    }
}

/// Progress left behind by a fast-path H_PUT_TCE_INDIRECT that had to
/// defer to the slow path.
///
/// The pinned list page is owned by the state itself: whoever takes the
/// state out of the vCPU releases the page exactly once, by dropping it.
#[derive(Debug, Default)]
pub enum ListRetry {
    #[default]
    NotStarted,
    /// The list page is pinned but no entry has been written.
    ListPagePinned(PendingList),
    /// Every entry has been written; only the list page release is left.
    ListConsumed(PendingList),
}

pub struct Vcpu {
    id: usize,
    guest: Arc<Guest>,
    tce_tmp: Box<[u64; MAX_TCE_LIST]>,
    tce_retry: ListRetry,
}

impl Vcpu {
    pub fn new(id: usize, guest: Arc<Guest>) -> Self {
        Self {
            id,
            guest,
            tce_tmp: Box::new([0; MAX_TCE_LIST]),
            tce_retry: ListRetry::NotStarted,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn guest(&self) -> &Arc<Guest> {
        &self.guest
    }

    /// Scratch buffer holding a TCE list between validation and commit.
    pub fn tce_tmp(&mut self) -> &mut [u64; MAX_TCE_LIST] {
        &mut self.tce_tmp
    }

    pub fn list_retry(&self) -> &ListRetry {
        &self.tce_retry
    }

    pub fn set_list_retry(&mut self, state: ListRetry) {
        if !matches!(self.tce_retry, ListRetry::NotStarted) {
            warn!("vcpu {}: dropping stale list retry state", self.id);
        }
        self.tce_retry = state;
    }

    pub fn take_list_retry(&mut self) -> ListRetry {
        core::mem::take(&mut self.tce_retry)
    }
}
