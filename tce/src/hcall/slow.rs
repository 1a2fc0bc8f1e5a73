use super::error::Error;
use super::{check_list, check_range, commit_list, read_list};
use crate::event::HcallHandle;
use crate::hcall;
use crate::listen;
use crate::vcpu::ListRetry;

/// Handlers run in the full host context, after the fast path deferred.
/// H_TOO_HARD from here sends the call on to host userspace.
pub fn set_event_handler(handle: &mut HcallHandle) {
    listen!(handle, hcall::H_PUT_TCE, |arg, _ret, vcpu| {
        let liobn = arg[0] as u64;
        let ioba = arg[1] as u64;
        let tce = arg[2] as u64;

        let table = vcpu
            .guest()
            .find_tce_table(liobn)
            .ok_or(Error::TooHard)?;
        super::put_tce(&table, ioba, tce)
    });

    listen!(handle, hcall::H_PUT_TCE_INDIRECT, |arg, _ret, vcpu| {
        let liobn = arg[0] as u64;
        let ioba = arg[1] as u64;
        let tce_list = arg[2] as u64;
        let npages = arg[3] as u64;

        // Whatever an earlier attempt left behind is released on every way out.
        let retry = vcpu.take_list_retry();

        check_list(tce_list, npages)?;
        let table = vcpu
            .guest()
            .find_tce_table(liobn)
            .ok_or(Error::TooHard)?;
        check_range(&table, ioba, npages)?;

        match retry {
            ListRetry::ListConsumed(pending) if pending.is_for(arg) => {
                trace!(
                    "vcpu {}: list {:#x} already consumed, releasing page",
                    vcpu.id(),
                    pending.page().gpa()
                );
                return Ok(());
            }
            stale => drop(stale),
        }

        let list = vcpu
            .guest()
            .memory()
            .pin(tce_list)
            .ok_or(Error::TooHard)?;

        let tces = &mut vcpu.tce_tmp()[..npages as usize];
        read_list(tces, &list)?;
        commit_list(&table, ioba, tces);
        Ok(())
    });

    listen!(handle, hcall::H_STUFF_TCE, |arg, _ret, vcpu| {
        let liobn = arg[0] as u64;
        let ioba = arg[1] as u64;
        let value = arg[2] as u64;
        let npages = arg[3] as u64;

        let table = vcpu
            .guest()
            .find_tce_table(liobn)
            .ok_or(Error::TooHard)?;
        super::stuff_tce(&table, ioba, value, npages)
    });
}

#[cfg(test)]
mod test {
    use crate::config::{MAX_TCE_LIST, TCE_PAGE_SIZE};
    use crate::hcall::{H_PARAMETER, H_PUT_TCE, H_PUT_TCE_INDIRECT, H_STUFF_TCE};
    use crate::hcall::{H_SUCCESS, H_TOO_HARD};
    use crate::tce::{TCE_PCI_READ, TCE_PCI_RW, TCE_PCI_WRITE};
    use crate::test_utils::*;
    use crate::vcpu::{ListRetry, PendingList};

    const WINDOW: u32 = 0x10_0000; // 256 TCEs

    #[test]
    fn put_tce_single_entry() {
        let (_mem, mut vcpu) = setup();
        let fd = create_table(&vcpu, 65536);
        let tce = valid_tce(7);

        let ret = hcall_slow::<H_PUT_TCE>(&mut vcpu, &[LIOBN as usize, 4096, tce as usize]);
        assert_eq!(ret, H_SUCCESS);
        assert_eq!(fd.table().get(4096), tce);
        assert_eq!(fd.table().get(0), 0);

        let ret = hcall_slow::<H_PUT_TCE>(&mut vcpu, &[LIOBN as usize, 65536, tce as usize]);
        assert_eq!(ret, H_PARAMETER);
    }

    #[test]
    fn put_tce_unknown_liobn_defers() {
        let (_mem, mut vcpu) = setup();
        let _fd = create_table(&vcpu, WINDOW);

        let ret = hcall_slow::<H_PUT_TCE>(&mut vcpu, &[0x9999, 0, valid_tce(1) as usize]);
        assert_eq!(ret, H_TOO_HARD);
    }

    #[test]
    fn put_tce_out_of_window_leaves_table() {
        let (_mem, mut vcpu) = setup();
        let fd = create_table(&vcpu, WINDOW);

        for ioba in [WINDOW as usize, WINDOW as usize + 0x1000, usize::MAX] {
            let ret = hcall_slow::<H_PUT_TCE>(&mut vcpu, &[LIOBN as usize, ioba, valid_tce(1) as usize]);
            assert_eq!(ret, H_PARAMETER);
        }
        assert!(fd.table().is_clear());
    }

    #[test]
    fn put_tce_rejects_reserved_bits() {
        let (_mem, mut vcpu) = setup();
        let fd = create_table(&vcpu, WINDOW);

        let ret = hcall_slow::<H_PUT_TCE>(&mut vcpu, &[LIOBN as usize, 0, 0x1000 | 0x4]);
        assert_eq!(ret, H_PARAMETER);
        assert!(fd.table().is_clear());
    }

    #[test]
    fn put_tce_is_idempotent() {
        let (_mem, mut vcpu) = setup();
        let fd = create_table(&vcpu, WINDOW);
        let args = [LIOBN as usize, 0x3000, valid_tce(3) as usize];

        assert_eq!(hcall_slow::<H_PUT_TCE>(&mut vcpu, &args), H_SUCCESS);
        let once = snapshot(fd.table());
        assert_eq!(hcall_slow::<H_PUT_TCE>(&mut vcpu, &args), H_SUCCESS);
        assert_eq!(snapshot(fd.table()), once);
    }

    #[test]
    fn put_tce_indirect() {
        let (mem, mut vcpu) = setup();
        let fd = create_table(&vcpu, WINDOW);
        let tces: alloc::vec::Vec<u64> = (0..10).map(valid_tce).collect();
        write_list(&mem, LIST_GPA, &tces);

        let ret = hcall_slow::<H_PUT_TCE_INDIRECT>(
            &mut vcpu,
            &[LIOBN as usize, 0x2000, LIST_GPA as usize, tces.len()],
        );
        assert_eq!(ret, H_SUCCESS);
        for (i, tce) in tces.iter().enumerate() {
            assert_eq!(fd.table().get(0x2000 + (i * TCE_PAGE_SIZE) as u64), *tce);
        }
        assert_eq!(fd.table().get(0x1000), 0);
        assert_eq!(list_pins(&mem), 0);
    }

    #[test]
    fn put_tce_indirect_is_all_or_nothing() {
        let (mem, mut vcpu) = setup();
        let fd = create_table(&vcpu, WINDOW);
        let mut tces: alloc::vec::Vec<u64> = (0..10).map(valid_tce).collect();
        tces[9] |= 0x10;
        write_list(&mem, LIST_GPA, &tces);

        let ret = hcall_slow::<H_PUT_TCE_INDIRECT>(
            &mut vcpu,
            &[LIOBN as usize, 0, LIST_GPA as usize, tces.len()],
        );
        assert_eq!(ret, H_PARAMETER);
        assert!(fd.table().is_clear());
        assert_eq!(list_pins(&mem), 0);
    }

    #[test]
    fn put_tce_indirect_read_fault() {
        let (mem, mut vcpu) = setup();
        let fd = create_table(&vcpu, WINDOW);
        let tces: alloc::vec::Vec<u64> = (0..8).map(valid_tce).collect();
        write_list(&mem, LIST_GPA, &tces);
        mem.poison_from(LIST_GPA + 5 * 8);

        let ret = hcall_slow::<H_PUT_TCE_INDIRECT>(
            &mut vcpu,
            &[LIOBN as usize, 0, LIST_GPA as usize, tces.len()],
        );
        assert_eq!(ret, H_PARAMETER);
        assert!(fd.table().is_clear());
        assert_eq!(list_pins(&mem), 0);
    }

    #[test]
    fn put_tce_indirect_bad_list() {
        let (mem, mut vcpu) = setup();
        let fd = create_table(&vcpu, WINDOW);

        let too_long = [LIOBN as usize, 0, LIST_GPA as usize, MAX_TCE_LIST + 1];
        assert_eq!(hcall_slow::<H_PUT_TCE_INDIRECT>(&mut vcpu, &too_long), H_PARAMETER);

        let unaligned = [LIOBN as usize, 0, LIST_GPA as usize + 8, 1];
        assert_eq!(hcall_slow::<H_PUT_TCE_INDIRECT>(&mut vcpu, &unaligned), H_PARAMETER);

        let past_window = [LIOBN as usize, WINDOW as usize - 0x1000, LIST_GPA as usize, 2];
        assert_eq!(hcall_slow::<H_PUT_TCE_INDIRECT>(&mut vcpu, &past_window), H_PARAMETER);

        let unmapped = [LIOBN as usize, 0, 0x7000_0000, 1];
        assert_eq!(hcall_slow::<H_PUT_TCE_INDIRECT>(&mut vcpu, &unmapped), H_TOO_HARD);

        assert!(fd.table().is_clear());
        assert_eq!(list_pins(&mem), 0);
    }

    #[test]
    fn retry_after_consumed_list_skips_reread() {
        let (mem, mut vcpu) = setup();
        let fd = create_table(&vcpu, WINDOW);
        let args = [LIOBN as usize, 0, LIST_GPA as usize, 1];

        // The entries never reach the table here: a consumed list must not be read again.
        write_list(&mem, LIST_GPA, &[valid_tce(1)]);
        let page = mem.pin(LIST_GPA).unwrap();
        vcpu.set_list_retry(ListRetry::ListConsumed(PendingList::new(args, page)));
        assert_eq!(list_pins(&mem), 1);

        assert_eq!(hcall_slow::<H_PUT_TCE_INDIRECT>(&mut vcpu, &args), H_SUCCESS);
        assert!(fd.table().is_clear());
        assert_eq!(list_pins(&mem), 0);
        assert!(matches!(vcpu.list_retry(), ListRetry::NotStarted));
    }

    #[test]
    fn retry_after_pinned_list_rereads() {
        let (mem, mut vcpu) = setup();
        let fd = create_table(&vcpu, WINDOW);
        let args = [LIOBN as usize, 0, LIST_GPA as usize, 1];

        write_list(&mem, LIST_GPA, &[valid_tce(1)]);
        let page = mem.pin(LIST_GPA).unwrap();
        vcpu.set_list_retry(ListRetry::ListPagePinned(PendingList::new(args, page)));

        assert_eq!(hcall_slow::<H_PUT_TCE_INDIRECT>(&mut vcpu, &args), H_SUCCESS);
        assert_eq!(fd.table().get(0), valid_tce(1));
        assert_eq!(list_pins(&mem), 0);
    }

    #[test]
    fn stale_retry_state_is_released() {
        let (mem, mut vcpu) = setup();
        let fd = create_table(&vcpu, WINDOW);
        let stale = [LIOBN as usize, 0x8000, LIST_GPA as usize, 1];
        let args = [LIOBN as usize, 0, LIST_GPA as usize, 1];

        write_list(&mem, LIST_GPA, &[valid_tce(2)]);
        let page = mem.pin(LIST_GPA).unwrap();
        vcpu.set_list_retry(ListRetry::ListConsumed(PendingList::new(stale, page)));

        assert_eq!(hcall_slow::<H_PUT_TCE_INDIRECT>(&mut vcpu, &args), H_SUCCESS);
        assert_eq!(fd.table().get(0), valid_tce(2));
        assert_eq!(list_pins(&mem), 0);
    }

    #[test]
    fn stuff_tce() {
        let (_mem, mut vcpu) = setup();
        let fd = create_table(&vcpu, WINDOW);
        for i in 0..8u64 {
            fd.table().put(i << 12, valid_tce(i));
        }

        let ret = hcall_slow::<H_STUFF_TCE>(&mut vcpu, &[LIOBN as usize, 0x2000, 0, 4]);
        assert_eq!(ret, H_SUCCESS);
        assert_eq!(fd.table().get(0x1000), valid_tce(1));
        for ioba in [0x2000, 0x3000, 0x4000, 0x5000] {
            assert_eq!(fd.table().get(ioba), 0);
        }
        assert_eq!(fd.table().get(0x6000), valid_tce(6));
    }

    #[test]
    fn stuff_tce_rejects_permissions() {
        let (_mem, mut vcpu) = setup();
        let fd = create_table(&vcpu, WINDOW);

        for perm in [TCE_PCI_READ, TCE_PCI_WRITE, TCE_PCI_RW] {
            let ret = hcall_slow::<H_STUFF_TCE>(&mut vcpu, &[LIOBN as usize, 0, (0x5000 | perm) as usize, 2]);
            assert_eq!(ret, H_PARAMETER);
        }
        let ret = hcall_slow::<H_STUFF_TCE>(&mut vcpu, &[LIOBN as usize, 0, 0x5000 | 0x100, 2]);
        assert_eq!(ret, H_PARAMETER);
        assert!(fd.table().is_clear());
    }

    #[test]
    fn stuff_tce_out_of_window() {
        let (_mem, mut vcpu) = setup();
        let fd = create_table(&vcpu, WINDOW);
        fd.table().put(0, valid_tce(1));
        let before = snapshot(fd.table());

        let cases = [
            [LIOBN as usize, WINDOW as usize, 0, 1],
            [LIOBN as usize, 0, 0, (WINDOW as usize >> 12) + 1],
            [LIOBN as usize, 0x1000, 0, usize::MAX],
        ];
        for args in cases {
            assert_eq!(hcall_slow::<H_STUFF_TCE>(&mut vcpu, &args), H_PARAMETER);
        }
        assert_eq!(snapshot(fd.table()), before);
    }

    #[test]
    fn stuff_tce_is_idempotent() {
        let (_mem, mut vcpu) = setup();
        let fd = create_table(&vcpu, WINDOW);
        fd.table().put(0x1000, valid_tce(1));
        let args = [LIOBN as usize, 0, 0x7000, 16];

        assert_eq!(hcall_slow::<H_STUFF_TCE>(&mut vcpu, &args), H_SUCCESS);
        let once = snapshot(fd.table());
        assert_eq!(hcall_slow::<H_STUFF_TCE>(&mut vcpu, &args), H_SUCCESS);
        assert_eq!(snapshot(fd.table()), once);
        assert_eq!(fd.table().get(0x1000), 0x7000);
    }
}
