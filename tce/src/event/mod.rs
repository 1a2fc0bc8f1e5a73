pub mod dispatch;
pub mod hcallhandle;

pub use crate::hcall;
pub use crate::hcall::error::Error;
pub use dispatch::{Dispatcher, HcallExit};
pub use hcallhandle::{Handler, HcallHandle};

use alloc::vec::Vec;

#[macro_export]
macro_rules! listen {
    ($eventloop:expr, $code:expr, $handler:expr) => {{
        $eventloop.add_event_handler($code.into(), alloc::boxed::Box::new($handler))
    }};
}

pub type Command = usize;

#[derive(Clone)]
pub struct Context {
    pub cmd: Command,
    pub arg: Vec<usize>,
    pub ret: Vec<usize>,
}

impl Context {
    pub fn new(cmd: Command) -> Context {
        Context {
            cmd,
            arg: Vec::new(),
            ret: Vec::new(),
        }
    }

    pub fn init_arg(&mut self, arg: &[usize]) {
        self.arg.clear();
        self.arg.extend_from_slice(arg);
    }

    pub fn resize_ret(&mut self, new_len: usize) {
        self.ret.clear();
        self.ret.resize(new_len, 0);
    }

    pub fn arg_slice(&self) -> &[usize] {
        &self.arg[..]
    }

    pub fn ret_slice(&self) -> &[usize] {
        &self.ret[..]
    }

    pub fn cmd(&self) -> Command {
        self.cmd
    }

    /// Runs `handler` and folds its error into the hcall return code.
    pub fn do_hcall<F>(&mut self, handler: F) -> usize
    where
        F: FnOnce(&[usize], &mut [usize]) -> Result<(), Error>,
    {
        if self.ret.is_empty() {
            self.ret.push(0);
        }
        self.ret[0] = hcall::H_SUCCESS;

        if let Err(code) = handler(&self.arg[..], &mut self.ret[..]) {
            self.ret[0] = code.into();
        }

        trace!(
            "HCALL: {0: <20} {1:X?} > {2:X?}",
            hcall::to_str(self.cmd),
            &self.arg,
            &self.ret
        );
        self.ret[0]
    }
}

impl Default for Context {
    fn default() -> Context {
        Context::new(0)
    }
}
