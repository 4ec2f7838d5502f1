#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use accrue_types::{mul_div, mul_div_ceil, FixedPointAmount};

#[derive(Debug, Arbitrary)]
struct Input {
    a: u128,
    b: u128,
    denom: u128,
    decimals: u8,
    new_decimals: u8,
}

// Wide multiply-divide and rescaling never panic, and rounding up differs
// from rounding down by at most one unit.
fuzz_target!(|input: Input| {
    match (mul_div(input.a, input.b, input.denom), mul_div_ceil(input.a, input.b, input.denom)) {
        (Ok(floor), Ok(ceil)) => assert!(ceil >= floor && ceil - floor <= 1),
        (Ok(floor), Err(_)) => assert_eq!(floor, u128::MAX),
        (Err(_), Ok(_)) => panic!("ceil succeeded where floor failed"),
        (Err(_), Err(_)) => {}
    }

    if let Ok(amount) = FixedPointAmount::from_raw(input.a, input.decimals) {
        if let Ok(rescaled) = amount.rescale(input.new_decimals) {
            let back = rescaled.rescale(input.decimals).expect("exact rescale reverses");
            assert_eq!(back, amount);
        }
    }
});
