#![no_main]

use spapr_tce::hcall::{H_PARAMETER, H_PUT_TCE_INDIRECT, H_SUCCESS, H_TOO_HARD};
use spapr_tce::test_utils::*;

use libfuzzer_sys::{arbitrary, fuzz_target, Corpus};

#[derive(Debug, arbitrary::Arbitrary)]
struct PutTceIndirectFuzz {
    ioba: u64,
    tce_list: u64,
    npages: u64,
    entries: Vec<u64>,
    resident: bool,
    compound: bool,
}

fuzz_target!(|data: PutTceIndirectFuzz| -> Corpus {
    if data.entries.len() > 512 {
        return Corpus::Reject;
    }

    let (mem, mut vcpu) = setup();
    let fd = create_table(&vcpu, 0x40_0000);
    write_list(&mem, LIST_GPA, &data.entries);
    mem.set_resident(LIST_GPA, data.resident);
    mem.set_compound(LIST_GPA, data.compound);
    let before = snapshot(fd.table());

    let args = [
        LIOBN as usize,
        data.ioba as usize,
        data.tce_list as usize,
        data.npages as usize,
    ];
    let ret = hcall::<H_PUT_TCE_INDIRECT>(&mut vcpu, &args);

    match ret {
        H_SUCCESS => {}
        H_PARAMETER | H_TOO_HARD => assert_eq!(snapshot(fd.table()), before),
        _ => panic!("unexpected return {:#x}", ret),
    }
    assert_eq!(list_pins(&mem), 0);

    Corpus::Keep
});
