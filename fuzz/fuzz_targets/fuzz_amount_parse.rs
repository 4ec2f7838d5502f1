#![no_main]

use libfuzzer_sys::fuzz_target;

use accrue_types::FixedPointAmount;

// Parse arbitrary strings at an arbitrary scale. Parsing must never panic,
// and anything that parses must format back to the same value.
fuzz_target!(|data: &[u8]| {
    let Some((&decimals, rest)) = data.split_first() else {
        return;
    };
    let Ok(text) = std::str::from_utf8(rest) else {
        return;
    };

    if let Ok(amount) = FixedPointAmount::parse_units(text, decimals) {
        let reparsed = FixedPointAmount::parse_units(&amount.to_string(), decimals)
            .expect("formatted amount must parse");
        assert_eq!(reparsed, amount);
    }
});
