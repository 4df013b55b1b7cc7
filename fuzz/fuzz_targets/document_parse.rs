#![no_main]

use libfuzzer_sys::fuzz_target;
use passgen_core::KeyListDocument;

fuzz_target!(|data: &[u8]| {
    // from_json must return Ok or Err for any input, never panic.
    let Ok(json) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(document) = KeyListDocument::from_json(json) else {
        return;
    };

    // Anything accepted must serialize and read back unchanged
    let written = document.to_json_pretty().expect("valid document serializes");
    let reread = KeyListDocument::from_json(&written).expect("written document parses");
    assert_eq!(document, reread);
});
