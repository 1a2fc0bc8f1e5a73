use crate::event::{Dispatcher, HcallExit};
use crate::guest::{CreateSpaprTce, Guest};
use crate::hcall::H_TOO_HARD;
use crate::logger::{self, LogSink};
use crate::mm::{HeapAllocator, PageAllocator, TcePage};
use crate::table::fd::TceTableFd;
use crate::table::TceTable;
use crate::tce::TCE_PCI_RW;
use crate::vcpu::Vcpu;

pub use crate::mm::{GuestMemory, MemorySlots};

use alloc::boxed::Box;
use alloc::format;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};
use log::{Level, LevelFilter};
use spin::Mutex;

pub const LIOBN: u64 = 0x8000_0001;

pub const RAM_BASE: u64 = 0x1000_0000;
pub const RAM_PAGES: usize = 16;
pub const LIST_GPA: u64 = RAM_BASE + 0x2000;

/// A guest with one memory slot and its first vCPU.
pub fn setup() -> (Arc<MemorySlots>, Vcpu) {
    let mem = Arc::new(MemorySlots::new());
    assert!(mem.add_slot(RAM_BASE, RAM_PAGES));
    let guest = Guest::new(0, mem.clone());
    (mem, Vcpu::new(0, guest))
}

pub fn create_table(vcpu: &Vcpu, window_size: u32) -> TceTableFd {
    let args = CreateSpaprTce {
        liobn: LIOBN,
        window_size,
    };
    vcpu.guest().create_spapr_tce(&args).unwrap()
}

/// A distinct, valid, read-write TCE for each `n`.
pub fn valid_tce(n: u64) -> u64 {
    ((n + 1) << 12) | TCE_PCI_RW
}

pub fn snapshot(table: &TceTable) -> Vec<u64> {
    (0..table.window_size() >> 12)
        .map(|i| table.get(i << 12))
        .collect()
}

pub fn write_list(mem: &MemorySlots, gpa: u64, tces: &[u64]) {
    for (i, tce) in tces.iter().enumerate() {
        assert!(mem.write_u64(gpa + (i * 8) as u64, *tce));
    }
}

pub fn list_pins(mem: &MemorySlots) -> usize {
    mem.pins(LIST_GPA).unwrap()
}

/// Runs a hypercall the way the vCPU exit path does.
/// Calls that would leave for userspace report H_TOO_HARD.
pub fn hcall<const COMMAND: usize>(vcpu: &mut Vcpu, arg: &[usize]) -> usize {
    match Dispatcher::new().dispatch(vcpu, COMMAND, arg) {
        HcallExit::Complete(ret) => ret,
        HcallExit::Userspace => H_TOO_HARD,
    }
}

pub fn hcall_fast<const COMMAND: usize>(vcpu: &mut Vcpu, arg: &[usize]) -> usize {
    Dispatcher::new().handle_fast(vcpu, COMMAND, arg)
}

pub fn hcall_slow<const COMMAND: usize>(vcpu: &mut Vcpu, arg: &[usize]) -> usize {
    Dispatcher::new().handle_slow(vcpu, COMMAND, arg)
}

/// Hands out `budget` pages, then fails.
pub struct FailingAllocator {
    budget: usize,
    allocated: AtomicUsize,
    freed: AtomicUsize,
}

impl FailingAllocator {
    pub fn new(budget: usize) -> Self {
        Self {
            budget,
            allocated: AtomicUsize::new(0),
            freed: AtomicUsize::new(0),
        }
    }

    pub fn allocated(&self) -> usize {
        self.allocated.load(Ordering::SeqCst)
    }

    /// Pages handed out and not yet freed.
    pub fn live(&self) -> usize {
        self.allocated() - self.freed.load(Ordering::SeqCst)
    }
}

impl PageAllocator for FailingAllocator {
    fn alloc_zeroed(&self) -> Option<Box<TcePage>> {
        if self.allocated() >= self.budget {
            return None;
        }
        let page = HeapAllocator.alloc_zeroed()?;
        self.allocated.fetch_add(1, Ordering::SeqCst);
        Some(page)
    }

    fn free(&self, page: Box<TcePage>) {
        self.freed.fetch_add(1, Ordering::SeqCst);
        drop(page);
    }
}

struct LogCapture(Mutex<Vec<String>>);

impl LogSink for LogCapture {
    fn write(&self, level: Level, target: &str, args: &core::fmt::Arguments<'_>) {
        self.0.lock().push(format!("[{}]{} -- {}", level, target, args));
    }
}

static LOG_CAPTURE: LogCapture = LogCapture(Mutex::new(Vec::new()));

/// Routes every record from now on to an in-memory sink.
pub fn capture_log() {
    logger::set_sink(&LOG_CAPTURE);
    // Fails when the logger is already registered, which is fine.
    let _ = logger::register_global_logger(LevelFilter::Trace);
}

/// Some captured record, formatted as `[LEVEL]target -- message`, contains `needle`.
pub fn captured_log(needle: &str) -> bool {
    LOG_CAPTURE.0.lock().iter().any(|line| line.contains(needle))
}
