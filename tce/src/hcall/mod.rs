pub mod constraint;
pub mod error;
pub mod fast;
pub mod slow;

use self::error::Error;
use crate::config::{MAX_TCE_LIST, TCE_PAGE_MASK, TCE_SHIFT};
use crate::define_interface;
use crate::mm::PinnedPage;
use crate::table::TceTable;
use crate::tce::{self, Tce};

define_interface! {
    command {
        H_PUT_TCE           = 0x20,
        H_STUFF_TCE         = 0x138,
        H_PUT_TCE_INDIRECT  = 0x13C,
    }
}

pub const H_SUCCESS: usize = 0;
pub const H_PARAMETER: usize = -4isize as usize;
pub const H_TOO_HARD: usize = 9999;

fn check_ioba(table: &TceTable, ioba: u64) -> Result<(), Error> {
    if ioba >= table.window_size() {
        debug!(
            "liobn {:#x}: ioba {:#x} out of window {:#x}",
            table.liobn(),
            ioba,
            table.window_size()
        );
        return Err(Error::Parameter);
    }
    Ok(())
}

/// `[ioba, ioba + npages * TCE_PAGE_SIZE)` must lie inside the DMA window.
fn check_range(table: &TceTable, ioba: u64, npages: u64) -> Result<(), Error> {
    let end = npages
        .checked_mul(1 << TCE_SHIFT)
        .and_then(|len| ioba.checked_add(len))
        .ok_or(Error::Parameter)?;
    if end > table.window_size() {
        debug!(
            "liobn {:#x}: range {:#x}+{} out of window {:#x}",
            table.liobn(),
            ioba,
            npages,
            table.window_size()
        );
        return Err(Error::Parameter);
    }
    Ok(())
}

/// Checks done on a TCE list before any guest memory is touched.
fn check_list(tce_list: u64, npages: u64) -> Result<(), Error> {
    // The list is limited to 512 TCEs so that it resides in one 4K page.
    if npages > MAX_TCE_LIST as u64 {
        debug!("tce list of {} entries exceeds {}", npages, MAX_TCE_LIST);
        return Err(Error::Parameter);
    }
    if tce_list & !TCE_PAGE_MASK != 0 {
        debug!("tce list {:#x} is not page aligned", tce_list);
        return Err(Error::Parameter);
    }
    Ok(())
}

fn put_tce(table: &TceTable, ioba: u64, tce: u64) -> Result<(), Error> {
    check_ioba(table, ioba)?;
    tce::validate(tce).inspect_err(|_| {
        debug!("liobn {:#x}: invalid tce {:#x}", table.liobn(), tce);
    })?;
    table.put(ioba, tce);
    Ok(())
}

fn stuff_tce(table: &TceTable, ioba: u64, value: u64, npages: u64) -> Result<(), Error> {
    check_range(table, ioba, npages)?;

    // Only a non-accessible pattern can be stuffed.
    let value = Tce::new(value);
    if value.validate().is_err() || value.is_accessible() {
        debug!(
            "liobn {:#x}: {:#x} cannot be stuffed",
            table.liobn(),
            value.raw()
        );
        return Err(Error::Parameter);
    }

    for i in 0..npages {
        table.put(ioba + (i << TCE_SHIFT), value.raw());
    }
    Ok(())
}

/// Copies the guest's TCE list into `scratch`, validating every entry.
fn read_list(scratch: &mut [u64], list: &PinnedPage) -> Result<(), Error> {
    for (i, slot) in scratch.iter_mut().enumerate() {
        *slot = list.read_u64(i).ok_or_else(|| {
            debug!("tce list {:#x}: entry {} faulted", list.gpa(), i);
            Error::Parameter
        })?;
        tce::validate(*slot).inspect_err(|_| {
            debug!("tce list {:#x}: entry {} {:#x} invalid", list.gpa(), i, *slot);
        })?;
    }
    Ok(())
}

fn commit_list(table: &TceTable, ioba: u64, tces: &[u64]) {
    for (i, tce) in tces.iter().enumerate() {
        table.put(ioba + ((i as u64) << TCE_SHIFT), *tce);
    }
}
