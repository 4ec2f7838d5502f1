use std::time::Duration;

use accrue_ledger::{LedgerError, LedgerEvent, LedgerSnapshot, StakingLedger};
use accrue_nullables::{CallKind, NullClock, NullGateway};
use accrue_types::{AccountId, FixedPointAmount, LedgerParams};

const D: u8 = 6;

type TestLedger = StakingLedger<NullGateway, NullClock>;

fn units(n: u128) -> FixedPointAmount {
    FixedPointAmount::from_units(n, D).unwrap()
}

fn account(name: &str) -> AccountId {
    AccountId::new(name).unwrap()
}

fn treasury() -> AccountId {
    account("treasury")
}

fn params(rate: u128) -> LedgerParams {
    LedgerParams::new(units(rate), vec![treasury()])
}

fn ledger(rate: u128) -> (TestLedger, NullGateway, NullClock) {
    let gateway = NullGateway::new(D).unwrap();
    let clock = NullClock::new(0);
    let ledger = StakingLedger::new(gateway.clone(), clock.clone(), params(rate)).unwrap();
    (ledger, gateway, clock)
}

async fn funded(rate: u128, pool: u128) -> (TestLedger, NullGateway, NullClock) {
    let (ledger, gateway, clock) = ledger(rate);
    ledger.fund_pool(&treasury(), units(pool)).await.unwrap();
    (ledger, gateway, clock)
}

/// Custody must always equal what is staked plus what is left in the pool.
async fn assert_conserved(ledger: &TestLedger, gateway: &NullGateway) {
    let pool = ledger.pool().await;
    assert_eq!(gateway.custody(), pool.total_staked.add(pool.reward_pool).unwrap());
    ledger.check_invariants().await.unwrap();
}

#[tokio::test]
async fn test_single_staker_earns_full_rate() {
    let (ledger, gateway, clock) = funded(1, 1_000).await;
    ledger.deposit(&account("x"), units(100)).await.unwrap();
    clock.advance(100);

    assert_eq!(ledger.earned(&account("x")).await.unwrap(), units(100));
    assert_conserved(&ledger, &gateway).await;
}

#[tokio::test]
async fn test_rewards_split_by_stake() {
    let (ledger, gateway, clock) = funded(4, 1_000).await;
    ledger.deposit(&account("x"), units(100)).await.unwrap();
    ledger.deposit(&account("y"), units(300)).await.unwrap();
    clock.advance(40);

    assert_eq!(ledger.earned(&account("x")).await.unwrap(), units(40));
    assert_eq!(ledger.earned(&account("y")).await.unwrap(), units(120));
    assert_conserved(&ledger, &gateway).await;
}

#[tokio::test]
async fn test_over_withdraw_rejected() {
    let (ledger, gateway, clock) = funded(1, 1_000).await;
    ledger.deposit(&account("x"), units(50)).await.unwrap();
    clock.advance(5);

    let err = ledger.withdraw(&account("x"), units(80)).await.unwrap_err();
    assert_eq!(
        err,
        LedgerError::InsufficientStake {
            requested: units(80),
            available: units(50)
        }
    );
    assert_eq!(ledger.get_staked(&account("x")).await, units(50));
    assert_eq!(gateway.total(CallKind::Push), units(0));
}

#[tokio::test]
async fn test_claim_without_reward_is_noop() {
    let (ledger, gateway, _clock) = funded(1, 1_000).await;
    ledger.deposit(&account("x"), units(50)).await.unwrap();
    let calls_before = gateway.calls().len();
    let pool_before = ledger.pool().await;

    let err = ledger.claim_reward(&account("x")).await.unwrap_err();
    assert_eq!(err, LedgerError::NoRewardAvailable);
    assert_eq!(gateway.calls().len(), calls_before);
    assert_eq!(ledger.pool().await, pool_before);

    let err = ledger.claim_reward(&account("nobody")).await.unwrap_err();
    assert_eq!(err, LedgerError::NoRewardAvailable);
}

#[tokio::test]
async fn test_queries_on_unknown_account_return_zero() {
    let (ledger, _gateway, clock) = funded(1, 1_000).await;
    clock.advance(10);
    assert!(ledger.get_staked(&account("ghost")).await.is_zero());
    assert!(ledger.earned(&account("ghost")).await.unwrap().is_zero());
    let view = ledger.position(&account("ghost")).await.unwrap();
    assert!(view.staked_balance.is_zero() && view.pending_reward.is_zero());
}

#[tokio::test]
async fn test_earned_is_idempotent() {
    let (ledger, _gateway, clock) = funded(3, 1_000).await;
    ledger.deposit(&account("x"), units(7)).await.unwrap();
    clock.advance(13);

    let pool_before = ledger.pool().await;
    let first = ledger.earned(&account("x")).await.unwrap();
    let second = ledger.calculate_earned_rewards(&account("x")).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(ledger.pool().await, pool_before);
}

#[tokio::test]
async fn test_deposit_then_withdraw_restores_balance() {
    let (ledger, gateway, _clock) = funded(1, 1_000).await;
    ledger.deposit(&account("x"), units(25)).await.unwrap();
    let view = ledger.withdraw(&account("x"), units(25)).await.unwrap();

    assert!(view.staked_balance.is_zero());
    assert!(view.pending_reward.is_zero());
    assert_eq!(ledger.pool().await.staker_count, 0);
    assert_eq!(gateway.custody(), units(1_000));
}

#[tokio::test]
async fn test_claim_pays_and_resets_pending() {
    let (ledger, gateway, clock) = funded(2, 1_000).await;
    ledger.deposit(&account("x"), units(10)).await.unwrap();
    clock.advance(30);

    let view = ledger.claim_reward(&account("x")).await.unwrap();
    assert!(view.pending_reward.is_zero());
    assert_eq!(view.staked_balance, units(10));
    assert_eq!(gateway.total(CallKind::Push), units(60));
    assert_eq!(ledger.pool().await.reward_pool, units(940));
    assert_conserved(&ledger, &gateway).await;
}

#[tokio::test]
async fn test_accrual_capped_by_pool() {
    let (ledger, gateway, clock) = funded(10, 50).await;
    ledger.deposit(&account("x"), units(1)).await.unwrap();
    ledger.deposit(&account("y"), units(1)).await.unwrap();
    clock.advance(100);

    let x = ledger.earned(&account("x")).await.unwrap();
    let y = ledger.earned(&account("y")).await.unwrap();
    assert_eq!(x.add(y).unwrap(), units(50));

    ledger.claim_reward(&account("x")).await.unwrap();
    ledger.claim_reward(&account("y")).await.unwrap();
    assert!(ledger.pool().await.reward_pool.is_zero());
    assert_conserved(&ledger, &gateway).await;

    // An empty pool accrues nothing further.
    clock.advance(100);
    assert!(ledger.earned(&account("x")).await.unwrap().is_zero());
}

#[tokio::test]
async fn test_rate_change_preserves_earlier_accrual() {
    let (ledger, _gateway, clock) = funded(1, 1_000).await;
    ledger.deposit(&account("x"), units(100)).await.unwrap();
    clock.advance(10);
    ledger.set_reward_rate(&treasury(), units(3)).await.unwrap();
    clock.advance(10);

    assert_eq!(ledger.earned(&account("x")).await.unwrap(), units(40));
}

#[tokio::test]
async fn test_failed_pull_leaves_ledger_unchanged() {
    let (ledger, gateway, clock) = funded(1, 1_000).await;
    ledger.deposit(&account("x"), units(10)).await.unwrap();
    clock.advance(5);
    let pool_before = ledger.pool().await;

    gateway.fail_pulls(true);
    let err = ledger.deposit(&account("x"), units(10)).await.unwrap_err();
    assert!(matches!(err, LedgerError::GatewayTransferFailed(_)));
    assert_eq!(ledger.get_staked(&account("x")).await, units(10));
    assert_eq!(ledger.pool().await, pool_before);
    assert_eq!(ledger.stats()["gateway_failures"], 1);
    assert_conserved(&ledger, &gateway).await;
}

#[tokio::test]
async fn test_failed_withdraw_push_keeps_stake() {
    let (ledger, gateway, clock) = funded(1, 1_000).await;
    ledger.deposit(&account("x"), units(10)).await.unwrap();
    clock.advance(5);
    let pool_before = ledger.pool().await;
    let hash_before = ledger.snapshot().await.unwrap().hash;

    gateway.fail_pushes(true);
    let err = ledger.withdraw(&account("x"), units(4)).await.unwrap_err();
    assert!(matches!(err, LedgerError::GatewayTransferFailed(_)));
    assert_eq!(ledger.get_staked(&account("x")).await, units(10));
    assert_eq!(ledger.pool().await, pool_before);
    assert_eq!(ledger.snapshot().await.unwrap().hash, hash_before);
    assert_conserved(&ledger, &gateway).await;
}

#[tokio::test]
async fn test_failed_claim_push_releases_reservation() {
    let (ledger, gateway, clock) = funded(1, 1_000).await;
    ledger.deposit(&account("x"), units(10)).await.unwrap();
    clock.advance(20);
    let pool_before = ledger.pool().await;
    let hash_before = ledger.snapshot().await.unwrap().hash;

    gateway.fail_pushes(true);
    let err = ledger.claim_reward(&account("x")).await.unwrap_err();
    assert!(matches!(err, LedgerError::GatewayTransferFailed(_)));
    assert_eq!(ledger.earned(&account("x")).await.unwrap(), units(20));
    assert_eq!(ledger.pool().await, pool_before);
    assert_eq!(ledger.snapshot().await.unwrap().hash, hash_before);

    gateway.fail_pushes(false);
    ledger.claim_reward(&account("x")).await.unwrap();
    assert_eq!(gateway.total(CallKind::Push), units(20));
    assert_conserved(&ledger, &gateway).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_claims_pay_once() {
    let (ledger, gateway, clock) = funded(1, 1_000).await;
    ledger.deposit(&account("x"), units(10)).await.unwrap();
    clock.advance(10);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let ledger = ledger.clone();
            tokio::spawn(async move { ledger.claim_reward(&account("x")).await })
        })
        .collect();

    let mut paid = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => paid += 1,
            Err(e) => assert_eq!(e, LedgerError::NoRewardAvailable),
        }
    }
    assert_eq!(paid, 1);
    assert_eq!(gateway.total(CallKind::Push), units(10));
    assert_conserved(&ledger, &gateway).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_withdrawals_never_overdraw() {
    let (ledger, gateway, _clock) = funded(1, 1_000).await;
    ledger.deposit(&account("x"), units(10)).await.unwrap();

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let ledger = ledger.clone();
            tokio::spawn(async move { ledger.withdraw(&account("x"), units(3)).await })
        })
        .collect();

    let mut ok = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            ok += 1;
        }
    }
    assert_eq!(ok, 3);
    assert_eq!(ledger.get_staked(&account("x")).await, units(1));
    assert_conserved(&ledger, &gateway).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_stakers_interleaved() {
    let (ledger, gateway, clock) = funded(5, 10_000).await;
    let mut handles = Vec::new();
    for i in 0..16u128 {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move {
            let owner = account(&format!("staker_{i}"));
            ledger.deposit(&owner, units(i + 1)).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    clock.advance(60);

    let mut handles = Vec::new();
    for i in 0..16u128 {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move {
            let owner = account(&format!("staker_{i}"));
            ledger.claim_reward(&owner).await.unwrap();
            ledger.withdraw(&owner, units(i + 1)).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert!(ledger.pool().await.total_staked.is_zero());
    assert!(gateway.total(CallKind::Push).raw() <= units(10_000 + 136).raw());
    assert_conserved(&ledger, &gateway).await;
}

#[tokio::test]
async fn test_abandoned_claim_still_commits() {
    let (ledger, gateway, clock) = funded(1, 1_000).await;
    ledger.deposit(&account("x"), units(10)).await.unwrap();
    clock.advance(10);
    let mut events = ledger.subscribe();

    gateway.pause();
    let started = gateway.calls().len() + 1;
    let abandoned = tokio::time::timeout(Duration::from_millis(50), ledger.claim_reward(&account("x"))).await;
    assert!(abandoned.is_err());
    gateway.wait_for_started(started).await;
    gateway.resume();

    match events.recv().await.unwrap() {
        LedgerEvent::RewardPaid { amount, position } => {
            assert_eq!(amount, units(10));
            assert!(position.pending_reward.is_zero());
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(ledger.pool().await.reward_pool, units(990));
    assert_conserved(&ledger, &gateway).await;
}

#[tokio::test]
async fn test_abandoned_deposit_with_failed_pull_rolls_back() {
    let (ledger, gateway, _clock) = funded(1, 1_000).await;
    gateway.pause();
    gateway.fail_pulls(true);
    let abandoned = tokio::time::timeout(
        Duration::from_millis(50),
        ledger.deposit(&account("x"), units(10)),
    )
    .await;
    assert!(abandoned.is_err());
    gateway.resume();

    // Wait until the detached task has seen the failed pull.
    while !gateway.calls().iter().any(|c| !c.succeeded) {
        tokio::task::yield_now().await;
    }
    gateway.fail_pulls(false);
    ledger.deposit(&account("x"), units(1)).await.unwrap();
    assert_eq!(ledger.get_staked(&account("x")).await, units(1));
    assert_conserved(&ledger, &gateway).await;
}

#[tokio::test]
async fn test_clock_regression_rejected_before_transfer() {
    let (ledger, gateway, clock) = funded(1, 1_000).await;
    clock.set(100);
    ledger.deposit(&account("x"), units(10)).await.unwrap();
    let calls = gateway.calls().len();

    clock.set(50);
    let err = ledger.deposit(&account("x"), units(10)).await.unwrap_err();
    assert!(matches!(err, LedgerError::NonMonotonicTime { .. }));
    assert_eq!(gateway.calls().len(), calls);
}

#[tokio::test]
async fn test_clock_regression_during_pull_refunds_deposit() {
    let (ledger, gateway, clock) = funded(1, 1_000).await;
    clock.set(100);
    let pool_before = ledger.pool().await;
    let hash_before = ledger.snapshot().await.unwrap().hash;

    gateway.pause();
    let pending = tokio::spawn({
        let ledger = ledger.clone();
        async move { ledger.deposit(&account("x"), units(10)).await }
    });
    gateway.wait_for_started(2).await;
    clock.set(50);
    gateway.resume();

    let err = pending.await.unwrap().unwrap_err();
    assert!(matches!(err, LedgerError::NonMonotonicTime { .. }));
    assert!(ledger.get_staked(&account("x")).await.is_zero());
    assert_eq!(ledger.pool().await, pool_before);
    assert_eq!(ledger.snapshot().await.unwrap().hash, hash_before);
    assert_eq!(ledger.stats()["refunds"], 1);
    assert_eq!(gateway.total(CallKind::Push), units(10));
    assert_conserved(&ledger, &gateway).await;
}

#[tokio::test]
async fn test_clock_regression_during_pull_refunds_funding() {
    let (ledger, gateway, clock) = funded(1, 1_000).await;
    clock.set(100);
    ledger.deposit(&account("x"), units(10)).await.unwrap();

    gateway.pause();
    let pending = tokio::spawn({
        let ledger = ledger.clone();
        async move { ledger.fund_pool(&treasury(), units(500)).await }
    });
    gateway.wait_for_started(3).await;
    clock.set(60);
    gateway.resume();

    let err = pending.await.unwrap().unwrap_err();
    assert!(matches!(err, LedgerError::NonMonotonicTime { .. }));
    assert_eq!(ledger.pool().await.reward_pool, units(1_000));
    assert_conserved(&ledger, &gateway).await;
}

#[tokio::test]
async fn test_withdraw_commit_sees_deposit_made_mid_flight() {
    let (ledger, gateway, clock) = funded(1, 1_000).await;
    ledger.deposit(&account("x"), units(10)).await.unwrap();
    clock.set(10);

    gateway.pause_pushes();
    let pending = tokio::spawn({
        let ledger = ledger.clone();
        async move { ledger.withdraw(&account("x"), units(10)).await }
    });
    gateway.wait_for_started(3).await;
    clock.set(20);
    ledger.deposit(&account("y"), units(40)).await.unwrap();
    gateway.resume();

    // x was the only staker until y joined at 20.
    let view = pending.await.unwrap().unwrap();
    assert!(view.staked_balance.is_zero());
    assert_eq!(view.pending_reward, units(20));
    assert_eq!(ledger.pool().await.total_staked, units(40));

    clock.set(30);
    assert_eq!(ledger.earned(&account("y")).await.unwrap(), units(10));
    assert_eq!(ledger.earned(&account("x")).await.unwrap(), units(20));
    assert_conserved(&ledger, &gateway).await;
}

#[tokio::test]
async fn test_claim_commit_keeps_accrual_from_transfer_window() {
    let (ledger, gateway, clock) = funded(1, 1_000).await;
    ledger.deposit(&account("x"), units(10)).await.unwrap();
    clock.set(10);

    gateway.pause_pushes();
    let pending = tokio::spawn({
        let ledger = ledger.clone();
        async move { ledger.claim_reward(&account("x")).await }
    });
    gateway.wait_for_started(3).await;
    clock.set(20);
    ledger.deposit(&account("y"), units(40)).await.unwrap();
    gateway.resume();

    let view = pending.await.unwrap().unwrap();
    assert_eq!(view.pending_reward, units(10));
    assert_eq!(gateway.total(CallKind::Push), units(10));
    let pool = ledger.pool().await;
    assert_eq!(pool.reward_pool, units(990));
    assert_eq!(pool.total_staked, units(50));
    assert_conserved(&ledger, &gateway).await;
}

#[tokio::test]
async fn test_funding_requires_funder() {
    let (ledger, gateway, _clock) = ledger(1);
    let err = ledger.fund_pool(&account("mallory"), units(10)).await.unwrap_err();
    assert_eq!(err, LedgerError::Unauthorized("mallory".into()));
    assert!(gateway.calls().is_empty());

    let pool = ledger.fund_pool(&treasury(), units(10)).await.unwrap();
    assert_eq!(pool.reward_pool, units(10));
}

#[tokio::test]
async fn test_wrong_scale_rejected() {
    let (ledger, _gateway, _clock) = funded(1, 1_000).await;
    let wrong = FixedPointAmount::from_units(1, 18).unwrap();
    let err = ledger.deposit(&account("x"), wrong).await.unwrap_err();
    assert_eq!(
        err,
        LedgerError::ScaleMismatch {
            expected: 6,
            actual: 18
        }
    );
}

#[tokio::test]
async fn test_snapshot_restores_accrual() {
    let (ledger, _gateway, clock) = funded(2, 1_000).await;
    ledger.deposit(&account("x"), units(10)).await.unwrap();
    ledger.deposit(&account("y"), units(30)).await.unwrap();
    clock.advance(15);
    ledger.claim_reward(&account("y")).await.unwrap();

    let snapshot = ledger.snapshot().await.unwrap();
    assert!(snapshot.verify());
    let bytes = snapshot.to_bytes().unwrap();

    let restored = StakingLedger::from_snapshot(
        NullGateway::new(D).unwrap(),
        clock.clone(),
        params(1),
        LedgerSnapshot::from_bytes(&bytes).unwrap(),
    )
    .unwrap();
    clock.advance(5);

    assert_eq!(restored.pool().await.reward_rate_per_second, units(2));
    for name in ["x", "y"] {
        assert_eq!(
            restored.earned(&account(name)).await.unwrap(),
            ledger.earned(&account(name)).await.unwrap()
        );
    }
    restored.check_invariants().await.unwrap();
}

#[tokio::test]
async fn test_snapshot_scale_must_match_gateway() {
    let (ledger, _gateway, clock) = funded(1, 1_000).await;
    let snapshot = ledger.snapshot().await.unwrap();
    let result = StakingLedger::from_snapshot(
        NullGateway::new(18).unwrap(),
        clock,
        LedgerParams::new(FixedPointAmount::from_units(1, 18).unwrap(), vec![]),
        snapshot,
    );
    assert!(matches!(result, Err(LedgerError::ScaleMismatch { .. })));
}
