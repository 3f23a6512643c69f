#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(expanded) = sundial::expand(s) {
            // the canonical form must expand to the same value
            let canonical = expanded.to_string();
            assert_eq!(sundial::expand(&canonical), Ok(expanded));
        }
    }
});
