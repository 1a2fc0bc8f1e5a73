use super::error::Error;
use super::{check_list, check_range, commit_list, read_list};
use crate::event::HcallHandle;
use crate::hcall;
use crate::listen;
use crate::vcpu::{ListRetry, PendingList};

/// Handlers run in-line on the vCPU exit path. They never wait for the
/// registry lock and never drop a pin that needs the slow path;
/// in both cases they return H_TOO_HARD and the call is retried there.
pub fn set_event_handler(handle: &mut HcallHandle) {
    listen!(handle, hcall::H_PUT_TCE, |arg, _ret, vcpu| {
        let liobn = arg[0] as u64;
        let ioba = arg[1] as u64;
        let tce = arg[2] as u64;

        let table = vcpu
            .guest()
            .try_find_tce_table(liobn)
            .ok_or(Error::TooHard)?;
        super::put_tce(&table, ioba, tce)
    });

    listen!(handle, hcall::H_PUT_TCE_INDIRECT, |arg, _ret, vcpu| {
        let liobn = arg[0] as u64;
        let ioba = arg[1] as u64;
        let tce_list = arg[2] as u64;
        let npages = arg[3] as u64;
        let call = [arg[0], arg[1], arg[2], arg[3]];

        check_list(tce_list, npages)?;
        let table = vcpu
            .guest()
            .try_find_tce_table(liobn)
            .ok_or(Error::TooHard)?;
        check_range(&table, ioba, npages)?;

        let list = vcpu
            .guest()
            .memory()
            .pin(tce_list)
            .ok_or(Error::TooHard)?;

        if !list.is_resident() {
            vcpu.set_list_retry(ListRetry::ListPagePinned(PendingList::new(call, list)));
            return Err(Error::TooHard);
        }

        let tces = &mut vcpu.tce_tmp()[..npages as usize];
        let res = read_list(tces, &list);
        if res.is_ok() {
            commit_list(&table, ioba, tces);
        }

        if list.is_compound() {
            let pending = PendingList::new(call, list);
            let state = match res {
                Ok(()) => ListRetry::ListConsumed(pending),
                // Nothing was written; the slow path redoes the call and fails the same way.
                Err(_) => ListRetry::ListPagePinned(pending),
            };
            vcpu.set_list_retry(state);
            return Err(Error::TooHard);
        }
        res
    });

    listen!(handle, hcall::H_STUFF_TCE, |arg, _ret, vcpu| {
        let liobn = arg[0] as u64;
        let ioba = arg[1] as u64;
        let value = arg[2] as u64;
        let npages = arg[3] as u64;

        let table = vcpu
            .guest()
            .try_find_tce_table(liobn)
            .ok_or(Error::TooHard)?;
        super::stuff_tce(&table, ioba, value, npages)
    });
}
