use super::Error;
use crate::hcall;
use crate::vcpu::Vcpu;

use alloc::boxed::Box;
use alloc::collections::btree_map::BTreeMap;

pub type Handler =
    Box<dyn Fn(&[usize], &mut [usize], &mut Vcpu) -> Result<(), Error> + Send + Sync>;

/// Hypercall handlers of one execution context.
pub struct HcallHandle {
    pub on_event: BTreeMap<usize, Handler>,
}

impl HcallHandle {
    /// Handlers that run with the vCPU still in guest-exit context.
    pub fn new_fast() -> Self {
        let mut handle = Self::empty();
        hcall::fast::set_event_handler(&mut handle);
        handle
    }

    /// Handlers that may block on locks and drop any page pin.
    pub fn new_slow() -> Self {
        let mut handle = Self::empty();
        hcall::slow::set_event_handler(&mut handle);
        handle
    }

    fn empty() -> Self {
        Self {
            on_event: BTreeMap::new(),
        }
    }

    pub fn add_event_handler(&mut self, code: usize, handler: Handler) {
        self.on_event.insert(code, handler);
    }

    pub fn get(&self, code: usize) -> Option<&Handler> {
        self.on_event.get(&code)
    }
}
