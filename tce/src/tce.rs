use crate::config::TCE_PAGE_MASK;
use crate::hcall::error::Error;

pub const TCE_PCI_READ: u64 = 0x1;
pub const TCE_PCI_WRITE: u64 = 0x2;
pub const TCE_PCI_RW: u64 = TCE_PCI_READ | TCE_PCI_WRITE;

/// A translation control entry.
///   [63:12] real page number
///   [11:2]  must be zero
///   [1]     write permission
///   [0]     read permission
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tce(u64);

impl Tce {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }

    pub fn rpn(&self) -> u64 {
        self.0 & TCE_PAGE_MASK
    }

    pub fn readable(&self) -> bool {
        self.0 & TCE_PCI_READ != 0
    }

    pub fn writable(&self) -> bool {
        self.0 & TCE_PCI_WRITE != 0
    }

    pub fn is_accessible(&self) -> bool {
        self.0 & TCE_PCI_RW != 0
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.0 & !(TCE_PAGE_MASK | TCE_PCI_RW) != 0 {
            return Err(Error::Parameter);
        }
        Ok(())
    }
}

impl From<u64> for Tce {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

pub fn validate(tce: u64) -> Result<(), Error> {
    Tce::new(tce).validate()
}
