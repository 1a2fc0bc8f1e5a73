//! Binding to the passthrough (VFIO) group module.
//!
//! The module is optional and bound late: until a provider registers, every
//! operation reports it as unavailable.

use crate::error::Error;

use alloc::sync::Arc;
use spin::RwLock;

/// File descriptor of an open VFIO group, as handed in by host userspace.
pub type RawFd = i32;

/// Token the module hands out for one external user reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupRef(pub usize);

/// Operations the passthrough module exports to external users.
pub trait ExternalUser: Send + Sync {
    fn get(&self, file: RawFd) -> Option<GroupRef>;
    fn put(&self, group: GroupRef);
    /// Fails with `Invalid` when the group has no IOMMU behind it.
    fn iommu_id(&self, group: GroupRef) -> Result<u32, Error>;
}

lazy_static! {
    static ref EXTERNAL_USER: RwLock<Option<Arc<dyn ExternalUser>>> = RwLock::new(None);
}

pub fn register(module: Arc<dyn ExternalUser>) {
    *EXTERNAL_USER.write() = Some(module);
    info!("vfio: external user module bound");
}

pub fn unregister() {
    if EXTERNAL_USER.write().take().is_some() {
        info!("vfio: external user module unbound");
    }
}

fn module() -> Option<Arc<dyn ExternalUser>> {
    EXTERNAL_USER.read().clone()
}

/// A reference on a VFIO group. It pins the module that handed it out and
/// goes back to that module when dropped.
pub struct VfioGroup {
    group: GroupRef,
    module: Arc<dyn ExternalUser>,
}

impl VfioGroup {
    pub fn group(&self) -> GroupRef {
        self.group
    }
}

impl Drop for VfioGroup {
    fn drop(&mut self) {
        self.module.put(self.group);
    }
}

impl core::fmt::Debug for VfioGroup {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("VfioGroup").field("group", &self.group).finish()
    }
}

/// `None` when the module is absent or rejects `file`.
pub fn group_get_external_user(file: RawFd) -> Option<VfioGroup> {
    let module = module()?;
    let group = module.get(file)?;
    Some(VfioGroup { group, module })
}

pub fn group_put_external_user(group: VfioGroup) {
    drop(group);
}

pub fn external_user_iommu_id(group: &VfioGroup) -> Result<u32, Error> {
    let module = module().ok_or(Error::Invalid)?;
    module.iommu_id(group.group)
}
