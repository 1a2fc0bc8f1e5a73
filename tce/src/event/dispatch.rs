use super::{Command, Context, HcallHandle};
use crate::hcall::{self, constraint};
use crate::vcpu::Vcpu;

/// Where a hypercall ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HcallExit {
    /// Handled in the kernel; the value goes back to the guest in r3.
    Complete(usize),
    /// Neither path could finish the call; host userspace has to emulate it.
    Userspace,
}

/// Routes a guest hypercall through the fast path, then the slow path.
pub struct Dispatcher {
    fast: HcallHandle,
    slow: HcallHandle,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            fast: HcallHandle::new_fast(),
            slow: HcallHandle::new_slow(),
        }
    }

    pub fn handle_fast(&self, vcpu: &mut Vcpu, cmd: Command, gprs: &[usize]) -> usize {
        run(&self.fast, vcpu, cmd, gprs)
    }

    pub fn handle_slow(&self, vcpu: &mut Vcpu, cmd: Command, gprs: &[usize]) -> usize {
        run(&self.slow, vcpu, cmd, gprs)
    }

    /// `gprs` holds the guest's argument registers, r4 onwards.
    pub fn dispatch(&self, vcpu: &mut Vcpu, cmd: Command, gprs: &[usize]) -> HcallExit {
        let ret = self.handle_fast(vcpu, cmd, gprs);
        if ret != hcall::H_TOO_HARD {
            return HcallExit::Complete(ret);
        }

        let ret = self.handle_slow(vcpu, cmd, gprs);
        if ret != hcall::H_TOO_HARD {
            return HcallExit::Complete(ret);
        }

        debug!(
            "vcpu {}: {} {:#x} passed to userspace",
            vcpu.id(),
            hcall::to_str(cmd),
            cmd
        );
        HcallExit::Userspace
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn run(handle: &HcallHandle, vcpu: &mut Vcpu, cmd: Command, gprs: &[usize]) -> usize {
    constraint::validate(
        cmd,
        |arg_num, ret_num| {
            if gprs.len() < arg_num {
                warn!(
                    "{}: {} arguments given, {} expected",
                    hcall::to_str(cmd),
                    gprs.len(),
                    arg_num
                );
                return hcall::H_PARAMETER;
            }
            let Some(handler) = handle.get(cmd) else {
                return hcall::H_TOO_HARD;
            };

            let mut ctx = Context::new(cmd);
            ctx.init_arg(&gprs[..arg_num]);
            ctx.resize_ret(ret_num);
            ctx.do_hcall(|arg, ret| handler(arg, ret, vcpu))
        },
        || hcall::H_TOO_HARD,
    )
}
