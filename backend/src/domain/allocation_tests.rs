//! Tests for the claim allocation engine.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use mockable::MockClock;
use mockall::predicate::eq;
use uuid::Uuid;

use super::*;
use crate::domain::ErrorCode;
use crate::domain::claim::ClaimRecord;
use crate::domain::coupon::{CouponDraft, RedemptionPolicy};
use crate::domain::ports::{
    CommittedClaim, MockClaimCommitter, MockClaimLedger, MockCouponStore, MockRemoteCouponMinter,
    NoopRemoteMinter, RemoteCouponId,
};

fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 8, 20, 12, 0, 0).single().expect("valid timestamp")
}

fn fixed_clock(now: DateTime<Utc>) -> Arc<MockClock> {
    let mut clock = MockClock::new();
    clock.expect_utc().return_const(now);
    Arc::new(clock)
}

fn identity() -> ClaimIdentity {
    ClaimIdentity::try_new("s1", "1.2.3.4").expect("valid identity")
}

fn pool_coupon(now: DateTime<Utc>, max_redemptions: Option<i32>) -> Coupon {
    let draft = CouponDraft {
        code: "SAVE15-AAAAAA".to_owned(),
        description: "15% off your order".to_owned(),
        discount_percent: 15,
        expires_at: now + Duration::days(30),
        redemption_policy: RedemptionPolicy::Once,
        max_redemptions,
    };
    Coupon::from_draft(draft, Uuid::new_v4(), now - Duration::days(1)).expect("valid coupon")
}

fn committed(mut coupon: Coupon, who: &ClaimIdentity, at: DateTime<Utc>) -> CommittedClaim {
    coupon.times_redeemed += 1;
    CommittedClaim {
        record: ClaimRecord {
            id: Uuid::new_v4(),
            identity: who.clone(),
            coupon_id: coupon.id,
            claimed_at: at,
        },
        coupon,
    }
}

fn engine(
    coupons: MockCouponStore,
    ledger: MockClaimLedger,
    committer: MockClaimCommitter,
    minter: Arc<dyn RemoteCouponMinter>,
    now: DateTime<Utc>,
) -> AllocationEngine<MockCouponStore, MockClaimLedger, MockClaimCommitter> {
    AllocationEngine::new(
        Arc::new(coupons),
        Arc::new(ledger),
        Arc::new(committer),
        minter,
        fixed_clock(now),
        AllocationConfig::default(),
    )
}

fn ledger_with_no_recent_claim() -> MockClaimLedger {
    let mut ledger = MockClaimLedger::new();
    ledger.expect_recent_claim().returning(|_, _| Ok(None));
    ledger
}

#[tokio::test]
async fn cooldown_rejects_with_ceiled_minutes() {
    let now = fixed_now();
    let who = identity();

    let mut ledger = MockClaimLedger::new();
    let stored = ClaimRecord {
        id: Uuid::new_v4(),
        identity: who.clone(),
        coupon_id: Uuid::new_v4(),
        // 29m30s elapsed of a 60m window: 30m30s remain, ceiling 31 minutes.
        claimed_at: now - Duration::seconds(29 * 60 + 30),
    };
    ledger
        .expect_recent_claim()
        .withf(move |candidate, since| {
            candidate.session_token() == "s1" && *since == fixed_now() - Duration::minutes(60)
        })
        .return_once(move |_, _| Ok(Some(stored)));

    let mut coupons = MockCouponStore::new();
    coupons.expect_find_eligible().times(0);
    let mut committer = MockClaimCommitter::new();
    committer.expect_commit().times(0);

    let engine = engine(coupons, ledger, committer, Arc::new(NoopRemoteMinter), now);
    let error = engine.claim(who).await.expect_err("cooldown active");

    assert_eq!(error.code(), ErrorCode::CooldownActive);
    assert!(error.message().contains("31 minutes"));
    assert_eq!(error.retry_after_seconds(), Some(31 * 60));
}

#[tokio::test]
async fn grants_pool_coupon_when_available() {
    let now = fixed_now();
    let who = identity();
    let coupon = pool_coupon(now, Some(100));
    let coupon_id = coupon.id;
    let expected_code = coupon.code.clone();

    let mut coupons = MockCouponStore::new();
    let candidate = coupon.clone();
    coupons
        .expect_find_eligible()
        .withf(|_, excluded| excluded.is_empty())
        .times(1)
        .return_once(move |_, _| Ok(Some(candidate)));

    let mut committer = MockClaimCommitter::new();
    let who_for_commit = who.clone();
    committer
        .expect_commit()
        .with(
            eq(coupon_id),
            eq(who.clone()),
            eq(now),
            eq(now - Duration::minutes(60)),
        )
        .times(1)
        .return_once(move |_, _, at, _| Ok(committed(coupon, &who_for_commit, at)));

    let engine = engine(
        coupons,
        ledger_with_no_recent_claim(),
        committer,
        Arc::new(NoopRemoteMinter),
        now,
    );
    let granted = engine.claim(who).await.expect("claim succeeds");

    assert_eq!(granted.code, expected_code);
    assert_eq!(granted.discount_percent, 15);
}

#[tokio::test]
async fn mints_exactly_one_coupon_when_pool_is_empty() {
    let now = fixed_now();
    let who = identity();

    let mut coupons = MockCouponStore::new();
    coupons
        .expect_find_eligible()
        .times(1)
        .returning(|_, _| Ok(None));
    coupons.expect_create().times(1).returning(move |draft, _| {
        Coupon::from_draft(draft, Uuid::new_v4(), now)
            .map_err(|err| CouponStoreError::query(err.to_string()))
    });

    let mut committer = MockClaimCommitter::new();
    let who_for_commit = who.clone();
    committer
        .expect_commit()
        .times(1)
        .returning(move |coupon_id, _, at, _| {
            let mut coupon = pool_coupon(at, Some(25));
            coupon.id = coupon_id;
            Ok(committed(coupon, &who_for_commit, at))
        });

    let mut minter = MockRemoteCouponMinter::new();
    minter
        .expect_create_remote()
        .times(1)
        .returning(|_| Ok(RemoteCouponId("rc_123".to_owned())));

    let engine = engine(
        coupons,
        ledger_with_no_recent_claim(),
        committer,
        Arc::new(minter),
        now,
    );
    engine.claim(who).await.expect("minted claim succeeds");
}

#[tokio::test]
async fn remote_mirror_failure_is_non_fatal() {
    let now = fixed_now();
    let who = identity();

    let mut coupons = MockCouponStore::new();
    coupons.expect_find_eligible().returning(|_, _| Ok(None));
    coupons.expect_create().returning(move |draft, _| {
        Coupon::from_draft(draft, Uuid::new_v4(), now)
            .map_err(|err| CouponStoreError::query(err.to_string()))
    });

    let mut committer = MockClaimCommitter::new();
    let who_for_commit = who.clone();
    committer
        .expect_commit()
        .returning(move |coupon_id, _, at, _| {
            let mut coupon = pool_coupon(at, Some(25));
            coupon.id = coupon_id;
            Ok(committed(coupon, &who_for_commit, at))
        });

    let mut minter = MockRemoteCouponMinter::new();
    minter
        .expect_create_remote()
        .times(1)
        .returning(|_| Err(RemoteMintError::transport("connection refused")));

    let engine = engine(
        coupons,
        ledger_with_no_recent_claim(),
        committer,
        Arc::new(minter),
        now,
    );
    engine.claim(who).await.expect("claim unaffected by mirror failure");
}

#[tokio::test]
async fn duplicate_code_is_regenerated() {
    let now = fixed_now();
    let who = identity();

    let mut coupons = MockCouponStore::new();
    coupons.expect_find_eligible().returning(|_, _| Ok(None));
    let mut create_calls = 0_u8;
    coupons.expect_create().times(2).returning(move |draft, _| {
        create_calls += 1;
        if create_calls == 1 {
            Err(CouponStoreError::duplicate_code(draft.code))
        } else {
            Coupon::from_draft(draft, Uuid::new_v4(), now)
                .map_err(|err| CouponStoreError::query(err.to_string()))
        }
    });

    let mut committer = MockClaimCommitter::new();
    let who_for_commit = who.clone();
    committer
        .expect_commit()
        .times(1)
        .returning(move |coupon_id, _, at, _| {
            let mut coupon = pool_coupon(at, Some(25));
            coupon.id = coupon_id;
            Ok(committed(coupon, &who_for_commit, at))
        });

    let engine = engine(
        coupons,
        ledger_with_no_recent_claim(),
        committer,
        Arc::new(NoopRemoteMinter),
        now,
    );
    engine.claim(who).await.expect("claim succeeds after regeneration");
}

#[tokio::test]
async fn lost_race_excludes_coupon_and_retries() {
    let now = fixed_now();
    let who = identity();
    let first = pool_coupon(now, Some(1));
    let mut second = pool_coupon(now, Some(100));
    second.code = "SAVE15-BBBBBB".to_owned();
    let first_id = first.id;
    let second_id = second.id;

    let mut coupons = MockCouponStore::new();
    let first_candidate = first.clone();
    coupons
        .expect_find_eligible()
        .withf(|_, excluded| excluded.is_empty())
        .times(1)
        .return_once(move |_, _| Ok(Some(first_candidate)));
    let second_candidate = second.clone();
    coupons
        .expect_find_eligible()
        .withf(move |_, excluded| excluded == [first_id])
        .times(1)
        .return_once(move |_, _| Ok(Some(second_candidate)));

    let mut committer = MockClaimCommitter::new();
    committer
        .expect_commit()
        .with(
            eq(first_id),
            eq(who.clone()),
            eq(now),
            eq(now - Duration::minutes(60)),
        )
        .times(1)
        .returning(move |coupon_id, _, _, _| Err(ClaimCommitError::AlreadyExhausted { coupon_id }));
    let who_for_commit = who.clone();
    committer
        .expect_commit()
        .with(
            eq(second_id),
            eq(who.clone()),
            eq(now),
            eq(now - Duration::minutes(60)),
        )
        .times(1)
        .return_once(move |_, _, at, _| Ok(committed(second, &who_for_commit, at)));

    let engine = engine(
        coupons,
        ledger_with_no_recent_claim(),
        committer,
        Arc::new(NoopRemoteMinter),
        now,
    );
    let granted = engine.claim(who).await.expect("second candidate succeeds");
    assert_ne!(granted.code, first.code);
}

#[tokio::test]
async fn commit_level_cooldown_conflict_rejects_the_loser() {
    let now = fixed_now();
    let who = identity();
    let coupon = pool_coupon(now, Some(100));
    let coupon_id = coupon.id;

    let mut coupons = MockCouponStore::new();
    coupons
        .expect_find_eligible()
        .times(1)
        .return_once(move |_, _| Ok(Some(coupon)));

    // A parallel request from the same identity committed after the ledger
    // read above returned nothing; the committer detects it atomically.
    let mut committer = MockClaimCommitter::new();
    committer
        .expect_commit()
        .with(
            eq(coupon_id),
            eq(who.clone()),
            eq(now),
            eq(now - Duration::minutes(60)),
        )
        .times(1)
        .returning(move |_, _, _, _| {
            Err(ClaimCommitError::CooldownHit {
                claimed_at: now - Duration::seconds(90),
            })
        });

    let engine = engine(
        coupons,
        ledger_with_no_recent_claim(),
        committer,
        Arc::new(NoopRemoteMinter),
        now,
    );
    let error = engine.claim(who).await.expect_err("loser sees the cooldown");

    assert_eq!(error.code(), ErrorCode::CooldownActive);
    // 58m30s of the window remain, ceiling 59 minutes.
    assert_eq!(error.retry_after_seconds(), Some(59 * 60));
}

#[tokio::test]
async fn persistent_contention_reports_pool_exhausted() {
    let now = fixed_now();
    let who = identity();

    let mut coupons = MockCouponStore::new();
    coupons.expect_find_eligible().times(3).returning(move |_, _| {
        Ok(Some(pool_coupon(fixed_now(), Some(1))))
    });

    let mut committer = MockClaimCommitter::new();
    committer
        .expect_commit()
        .times(3)
        .returning(|coupon_id, _, _, _| Err(ClaimCommitError::AlreadyExhausted { coupon_id }));

    let engine = engine(
        coupons,
        ledger_with_no_recent_claim(),
        committer,
        Arc::new(NoopRemoteMinter),
        now,
    );
    let error = engine.claim(who).await.expect_err("pool exhausted");

    assert_eq!(error.code(), ErrorCode::PoolExhausted);
    assert!(error.retry_after_seconds().is_some());
}

#[tokio::test]
async fn ledger_connection_failure_is_service_unavailable() {
    let now = fixed_now();

    let mut ledger = MockClaimLedger::new();
    ledger
        .expect_recent_claim()
        .returning(|_, _| Err(ClaimLedgerError::connection("pool timed out")));

    let engine = engine(
        MockCouponStore::new(),
        ledger,
        MockClaimCommitter::new(),
        Arc::new(NoopRemoteMinter),
        now,
    );
    let error = engine.claim(identity()).await.expect_err("storage down");

    assert_eq!(error.code(), ErrorCode::ServiceUnavailable);
    assert_eq!(error.retry_after_seconds(), Some(10));
}

#[tokio::test]
async fn status_derives_pool_and_cooldown_horizon() {
    let now = fixed_now();
    let who = identity();
    let available = pool_coupon(now, Some(100));
    let mut exhausted = pool_coupon(now, Some(1));
    exhausted.code = "SAVE20-BBBBBB".to_owned();
    exhausted.times_redeemed = 1;
    exhausted.active = false;

    let mut coupons = MockCouponStore::new();
    let listing = vec![available.clone(), exhausted.clone()];
    coupons
        .expect_list_all()
        .return_once(move || Ok(listing));

    let mut ledger = MockClaimLedger::new();
    let claimed_at = now - Duration::minutes(10);
    let who_for_record = who.clone();
    ledger.expect_recent_claim().return_once(move |_, _| {
        Ok(Some(ClaimRecord {
            id: Uuid::new_v4(),
            identity: who_for_record,
            coupon_id: Uuid::new_v4(),
            claimed_at,
        }))
    });

    let engine = engine(
        coupons,
        ledger,
        MockClaimCommitter::new(),
        Arc::new(NoopRemoteMinter),
        now,
    );
    let status = engine.status(Some(who)).await.expect("status succeeds");

    assert_eq!(status.coupons.len(), 2);
    assert!(status.coupons[0].available);
    assert_eq!(status.coupons[0].claimed, 0);
    assert!(!status.coupons[1].available);
    assert_eq!(status.coupons[1].claimed, 1);
    let horizon = Some(claimed_at + Duration::minutes(60));
    assert_eq!(status.coupons[0].next_available, horizon);
    assert_eq!(status.next_available, horizon);
}

#[tokio::test]
async fn status_without_identity_skips_the_ledger() {
    let now = fixed_now();

    let mut coupons = MockCouponStore::new();
    coupons.expect_list_all().return_once(|| Ok(Vec::new()));
    let mut ledger = MockClaimLedger::new();
    ledger.expect_recent_claim().times(0);

    let engine = engine(
        coupons,
        ledger,
        MockClaimCommitter::new(),
        Arc::new(NoopRemoteMinter),
        now,
    );
    let status = engine.status(None).await.expect("status succeeds");

    assert!(status.coupons.is_empty());
    assert_eq!(status.next_available, None);
}

#[test]
fn minutes_until_ceils_partial_minutes() {
    let now = fixed_now();
    assert_eq!(minutes_until(now + Duration::seconds(61), now), 2);
    assert_eq!(minutes_until(now + Duration::seconds(60), now), 1);
    assert_eq!(minutes_until(now - Duration::seconds(5), now), 0);
}
