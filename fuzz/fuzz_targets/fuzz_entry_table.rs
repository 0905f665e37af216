#![no_main]

use filepack_rs::EntryTable;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Parsing the tail region must never panic
    let Ok((mut table, header)) = EntryTable::deserialize(data) else {
        return;
    };

    table.resort();
    let names: Vec<String> = table.iter().map(|e| e.name.clone()).collect();
    for name in &names {
        assert!(table.find(name).is_some());
    }

    // Anything that parsed serializes again
    let _ = table.serialize(&header);
});
