#![no_main]

use spapr_tce::hcall::{H_PARAMETER, H_PUT_TCE, H_SUCCESS};
use spapr_tce::test_utils::*;

use libfuzzer_sys::{arbitrary, fuzz_target};

#[derive(Debug, arbitrary::Arbitrary)]
struct PutTceFuzz {
    ioba: u64,
    tce: u64,
}

fuzz_target!(|data: PutTceFuzz| {
    let (_mem, mut vcpu) = setup();
    let fd = create_table(&vcpu, 0x10_0000);
    let before = snapshot(fd.table());

    let ret = hcall::<H_PUT_TCE>(&mut vcpu, &[LIOBN as usize, data.ioba as usize, data.tce as usize]);

    if ret == H_SUCCESS {
        assert_eq!(fd.table().entry(data.ioba), Some(data.tce));
    } else {
        assert_eq!(ret, H_PARAMETER);
        assert_eq!(snapshot(fd.table()), before);
    }
});
