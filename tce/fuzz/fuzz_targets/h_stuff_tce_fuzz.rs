#![no_main]

use spapr_tce::hcall::{H_PARAMETER, H_PUT_TCE, H_STUFF_TCE, H_SUCCESS};
use spapr_tce::test_utils::*;

use libfuzzer_sys::{arbitrary, fuzz_target};

#[derive(Debug, arbitrary::Arbitrary)]
struct StuffTceFuzz {
    ioba: u64,
    value: u64,
    npages: u64,
}

fuzz_target!(|data: StuffTceFuzz| {
    let (_mem, mut vcpu) = setup();
    let fd = create_table(&vcpu, 0x10_0000);
    let ret = hcall::<H_PUT_TCE>(&mut vcpu, &[LIOBN as usize, 0, valid_tce(0) as usize]);
    assert_eq!(ret, H_SUCCESS);
    let before = snapshot(fd.table());

    let args = [
        LIOBN as usize,
        data.ioba as usize,
        data.value as usize,
        data.npages as usize,
    ];
    let ret = hcall::<H_STUFF_TCE>(&mut vcpu, &args);

    if ret == H_SUCCESS {
        for i in 0..data.npages {
            assert_eq!(fd.table().entry(data.ioba + (i << 12)), Some(data.value));
        }
    } else {
        assert_eq!(ret, H_PARAMETER);
        assert_eq!(snapshot(fd.table()), before);
    }
});
