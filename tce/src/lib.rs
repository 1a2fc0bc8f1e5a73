#![no_std]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod event;
pub mod guest;
pub mod hcall;
pub mod logger;
pub mod mm;
pub mod registry;
pub mod table;
pub mod tce;
pub mod vcpu;
pub mod vfio;
#[macro_use]
pub mod r#macro;

#[cfg(any(test, fuzzing))]
pub mod test_utils;

extern crate alloc;

#[macro_use]
extern crate lazy_static;

#[macro_use]
extern crate log;

pub use crate::guest::{CreateSpaprTce, Guest};
pub use crate::table::fd::TceTableFd;
pub use crate::vcpu::Vcpu;
