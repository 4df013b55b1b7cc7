#![no_main]

use libfuzzer_sys::fuzz_target;
use passgen_core::{derive_password, Engine};
use passgen_store::parse_legacy;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(mut document) = parse_legacy(text) else {
        return;
    };

    // A parsed legacy list must survive a verification and derivation of
    // each of its labels.
    let entries = document.entries().to_vec();
    let mut engine = Engine::new(&mut document);
    let _ = engine.verify_master("fuzz");
    for entry in &entries {
        let _ = derive_password(entry, "fuzz");
    }
    document.validate().expect("verified document stays valid");
});
