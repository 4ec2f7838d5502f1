#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use accrue_rewards::RewardAccrualIndex;
use accrue_types::{FixedPointAmount, Timestamp};

#[derive(Debug, Arbitrary)]
enum Step {
    Advance(u32),
    AddStake(u64),
    RemoveStake(u64),
    SetRate(u64),
    Release(u64),
}

#[derive(Debug, Arbitrary)]
struct Input {
    rate: u64,
    pool: u64,
    steps: Vec<Step>,
}

// Drive the accrual index through arbitrary steps. It must never panic, the
// per-share index must never decrease, and issued rewards must stay within
// the pool.
fuzz_target!(|input: Input| {
    const D: u8 = 6;
    let amount = |raw: u64| FixedPointAmount::from_raw(raw as u128, D).expect("scale is valid");
    let pool = amount(input.pool);
    let Ok(mut index) = RewardAccrualIndex::new(amount(input.rate), Timestamp::new(0)) else {
        return;
    };
    let mut now = 0u64;

    for step in input.steps {
        let before = index.cumulative_reward_per_share();
        let _ = match step {
            Step::Advance(secs) => {
                now = now.saturating_add(secs as u64);
                index.settle(Timestamp::new(now), pool).map(|_| ())
            }
            Step::AddStake(raw) => index.settle(Timestamp::new(now), pool).and_then(|_| index.add_stake(amount(raw))),
            Step::RemoveStake(raw) => index
                .settle(Timestamp::new(now), pool)
                .and_then(|_| index.remove_stake(amount(raw))),
            Step::SetRate(raw) => index.set_rate(amount(raw), Timestamp::new(now), pool),
            Step::Release(raw) => index.release_liability(amount(raw)),
        };
        assert!(index.cumulative_reward_per_share().raw() >= before.raw());
        assert!(index.accrued_liability().raw() <= pool.raw());
    }
});
