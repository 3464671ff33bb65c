//! Reservation lifecycle integration tests.

mod common;

use common::TestLedger;

use ledgerd_core::{EventType, GenerationService, LedgerError, ReservationStatus, UserId};
use ledgerd_engine::{FinalizeRequest, FinalizeStatus, ReserveRequest};

fn finalize_by_id(
    ledger: &TestLedger,
    reservation_id: &ledgerd_core::ReservationId,
    success: bool,
    actual: Option<f64>,
) -> Option<ledgerd_engine::FinalizeOutcome> {
    ledger
        .engine
        .finalize(&FinalizeRequest {
            reservation_id: Some(reservation_id.clone()),
            external_request_id: None,
            user_id: None,
            success,
            actual_credits: actual,
        })
        .unwrap()
}

// ============================================================================
// Reserve
// ============================================================================

#[test]
fn reserve_moves_credits_into_hold() {
    let ledger = TestLedger::new();
    let user = ledger.subscribed_user(100);

    let outcome = ledger.reserve(user, 30.0);

    assert_eq!(outcome.estimated_credits, 30);
    assert!(!outcome.was_idempotent);
    assert_eq!(ledger.balances(user), (70, 30));
}

#[test]
fn reserve_rounds_fractional_estimates_up() {
    let ledger = TestLedger::new();
    let user = ledger.subscribed_user(100);

    let outcome = ledger.reserve(user, 29.01);
    assert_eq!(outcome.estimated_credits, 30);
    assert_eq!(ledger.balances(user), (70, 30));
}

#[test]
fn reserve_requires_active_subscription() {
    let ledger = TestLedger::new();
    let user = UserId::generate();

    let result = ledger.engine.reserve(ReserveRequest {
        user_id: user,
        service: GenerationService::Fal,
        model_id: "flux-pro".into(),
        estimated_credits: 10.0,
        reservation_id: None,
    });
    assert!(matches!(result, Err(LedgerError::SubscriptionRequired)));
}

#[test]
fn reserve_rejects_invalid_amounts() {
    let ledger = TestLedger::new();
    let user = ledger.subscribed_user(100);

    for bad in [0.0, -5.0, f64::NAN, f64::INFINITY] {
        let result = ledger.engine.reserve(ReserveRequest {
            user_id: user,
            service: GenerationService::Fal,
            model_id: "flux-pro".into(),
            estimated_credits: bad,
            reservation_id: None,
        });
        assert!(matches!(result, Err(LedgerError::InvalidAmount(_))));
    }
    assert_eq!(ledger.balances(user), (100, 0));
}

#[test]
fn reserve_fails_on_insufficient_credits() {
    let ledger = TestLedger::new();
    let user = ledger.subscribed_user(20);

    let result = ledger.engine.reserve(ReserveRequest {
        user_id: user,
        service: GenerationService::Fal,
        model_id: "flux-pro".into(),
        estimated_credits: 30.0,
        reservation_id: None,
    });
    assert!(matches!(
        result,
        Err(LedgerError::InsufficientCredits {
            available: 20,
            required: 30
        })
    ));
    assert_eq!(ledger.balances(user), (20, 0));
}

#[test]
fn reserve_replay_with_same_id_is_noop() {
    let ledger = TestLedger::new();
    let user = ledger.subscribed_user(100);

    let first = ledger.reserve_with_id(user, 30.0, "job-alpha").unwrap();
    assert!(!first.was_idempotent);
    assert_eq!(ledger.balances(user), (70, 30));

    let second = ledger.reserve_with_id(user, 30.0, "job-alpha").unwrap();
    assert!(second.was_idempotent);
    assert_eq!(second.estimated_credits, 30);
    assert_eq!(ledger.balances(user), (70, 30));
}

#[test]
fn reserve_replay_by_another_user_is_forbidden() {
    let ledger = TestLedger::new();
    let owner = ledger.subscribed_user(100);
    let intruder = ledger.subscribed_user(100);

    ledger.reserve_with_id(owner, 30.0, "job-alpha").unwrap();

    let result = ledger.reserve_with_id(intruder, 30.0, "job-alpha");
    assert!(matches!(result, Err(LedgerError::Forbidden)));
}

// ============================================================================
// Finalize: success
// ============================================================================

#[test]
fn successful_job_captures_actual_and_refunds_remainder() {
    let ledger = TestLedger::new();
    let user = ledger.subscribed_user(100);

    let reservation = ledger.reserve(user, 30.0);
    assert_eq!(ledger.balances(user), (70, 30));

    let outcome = finalize_by_id(&ledger, &reservation.reservation_id, true, Some(20.0)).unwrap();

    assert_eq!(outcome.status, FinalizeStatus::Captured);
    assert_eq!(outcome.captured_credits, 20);
    assert_eq!(outcome.released_credits, 10);
    assert_eq!(ledger.balances(user), (80, 0));

    let row = ledger
        .engine
        .store()
        .get_reservation(&reservation.reservation_id)
        .unwrap()
        .unwrap();
    assert_eq!(row.status, ReservationStatus::Captured);
    assert_eq!(row.actual_credits, Some(20));
}

#[test]
fn capture_without_actual_consumes_full_estimate() {
    let ledger = TestLedger::new();
    let user = ledger.subscribed_user(100);

    let reservation = ledger.reserve(user, 30.0);
    let outcome = finalize_by_id(&ledger, &reservation.reservation_id, true, None).unwrap();

    assert_eq!(outcome.captured_credits, 30);
    assert_eq!(outcome.released_credits, 0);
    assert_eq!(ledger.balances(user), (70, 0));
}

#[test]
fn capture_clamps_implausible_actuals() {
    let ledger = TestLedger::new();
    let user = ledger.subscribed_user(200);

    // Reported usage above the estimate is capped at the estimate.
    let over = ledger.reserve(user, 30.0);
    let outcome = finalize_by_id(&ledger, &over.reservation_id, true, Some(45.0)).unwrap();
    assert_eq!(outcome.captured_credits, 30);
    assert_eq!(outcome.released_credits, 0);

    // Tiny usage still costs at least one credit.
    let under = ledger.reserve(user, 30.0);
    let outcome = finalize_by_id(&ledger, &under.reservation_id, true, Some(0.001)).unwrap();
    assert_eq!(outcome.captured_credits, 1);
    assert_eq!(outcome.released_credits, 29);
}

#[test]
fn capture_with_refund_records_two_events() {
    let ledger = TestLedger::new();
    let user = ledger.subscribed_user(100);

    let reservation = ledger.reserve(user, 30.0);
    finalize_by_id(&ledger, &reservation.reservation_id, true, Some(20.0)).unwrap();

    let events = ledger.events(user);
    let types: Vec<EventType> = events.iter().map(|e| e.event_type).collect();
    assert!(types.contains(&EventType::Reserve));
    assert!(types.contains(&EventType::Capture));
    assert!(types.contains(&EventType::Release));
    assert_eq!(events.len(), 3);
}

// ============================================================================
// Finalize: failure
// ============================================================================

#[test]
fn failed_job_returns_full_estimate() {
    let ledger = TestLedger::new();
    let user = ledger.subscribed_user(100);

    let reservation = ledger.reserve(user, 30.0);
    let outcome = finalize_by_id(&ledger, &reservation.reservation_id, false, None).unwrap();

    assert_eq!(outcome.status, FinalizeStatus::Released);
    assert_eq!(outcome.released_credits, 30);
    assert_eq!(outcome.captured_credits, 0);
    assert_eq!(ledger.balances(user), (100, 0));

    let events = ledger.events(user);
    assert_eq!(events.len(), 2);
}

#[test]
fn finalize_twice_is_a_noop_replay() {
    let ledger = TestLedger::new();
    let user = ledger.subscribed_user(100);

    let reservation = ledger.reserve(user, 30.0);
    finalize_by_id(&ledger, &reservation.reservation_id, false, None).unwrap();
    assert_eq!(ledger.balances(user), (100, 0));

    // Retrying the release changes nothing and duplicates no events.
    let retry = finalize_by_id(&ledger, &reservation.reservation_id, false, None).unwrap();
    assert_eq!(retry.status, FinalizeStatus::Noop);
    assert_eq!(retry.released_credits, 30);
    assert_eq!(ledger.balances(user), (100, 0));
    assert_eq!(ledger.events(user).len(), 2);

    // Even flipping the success flag cannot escape the terminal state.
    let flipped = finalize_by_id(&ledger, &reservation.reservation_id, true, Some(10.0)).unwrap();
    assert_eq!(flipped.status, FinalizeStatus::Noop);
    assert_eq!(ledger.balances(user), (100, 0));
}

#[test]
fn finalize_after_capture_reports_prior_outcome() {
    let ledger = TestLedger::new();
    let user = ledger.subscribed_user(100);

    let reservation = ledger.reserve(user, 30.0);
    finalize_by_id(&ledger, &reservation.reservation_id, true, Some(20.0)).unwrap();

    let replay = finalize_by_id(&ledger, &reservation.reservation_id, true, Some(20.0)).unwrap();
    assert_eq!(replay.status, FinalizeStatus::Noop);
    assert_eq!(replay.captured_credits, 20);
    assert_eq!(replay.released_credits, 10);
    assert_eq!(ledger.balances(user), (80, 0));
}

#[test]
fn finalize_unknown_ids_is_nothing_to_do() {
    let ledger = TestLedger::new();

    let outcome = ledger
        .engine
        .finalize(&FinalizeRequest {
            reservation_id: Some(ledgerd_core::ReservationId::new("rsv_missing")),
            external_request_id: Some("job-missing".into()),
            user_id: None,
            success: true,
            actual_credits: None,
        })
        .unwrap();
    assert!(outcome.is_none());
}

#[test]
fn finalize_owner_mismatch_is_forbidden() {
    let ledger = TestLedger::new();
    let owner = ledger.subscribed_user(100);
    let reservation = ledger.reserve(owner, 30.0);

    let result = ledger.engine.finalize(&FinalizeRequest {
        reservation_id: Some(reservation.reservation_id),
        external_request_id: None,
        user_id: Some(UserId::generate()),
        success: false,
        actual_credits: None,
    });
    assert!(matches!(result, Err(LedgerError::Forbidden)));
    assert_eq!(ledger.balances(owner), (70, 30));
}

// ============================================================================
// External request ids
// ============================================================================

#[test]
fn finalize_resolves_through_external_id() {
    let ledger = TestLedger::new();
    let user = ledger.subscribed_user(100);
    let reservation = ledger.reserve(user, 30.0);

    ledger
        .engine
        .attach_external_request_id(&reservation.reservation_id, "fal-job-7")
        .unwrap();

    let outcome = ledger
        .engine
        .finalize(&FinalizeRequest {
            reservation_id: None,
            external_request_id: Some("fal-job-7".into()),
            user_id: None,
            success: true,
            actual_credits: Some(20.0),
        })
        .unwrap()
        .unwrap();

    assert_eq!(outcome.status, FinalizeStatus::Captured);
    assert_eq!(ledger.balances(user), (80, 0));
}

#[test]
fn attach_external_id_is_set_once() {
    let ledger = TestLedger::new();
    let user = ledger.subscribed_user(100);
    let reservation = ledger.reserve(user, 30.0);

    ledger
        .engine
        .attach_external_request_id(&reservation.reservation_id, "fal-job-7")
        .unwrap();

    // Same id again: silent no-op.
    ledger
        .engine
        .attach_external_request_id(&reservation.reservation_id, "fal-job-7")
        .unwrap();

    // Different id: conflict.
    let result = ledger
        .engine
        .attach_external_request_id(&reservation.reservation_id, "fal-job-8");
    assert!(matches!(result, Err(LedgerError::Conflict(_))));
}

#[test]
fn attach_external_id_unknown_reservation() {
    let ledger = TestLedger::new();
    let result = ledger
        .engine
        .attach_external_request_id(&ledgerd_core::ReservationId::new("rsv_missing"), "job-1");
    assert!(matches!(result, Err(LedgerError::NotFound(_))));
}

#[test]
fn attach_after_settlement_is_conflict() {
    let ledger = TestLedger::new();
    let user = ledger.subscribed_user(100);
    let reservation = ledger.reserve(user, 30.0);

    finalize_by_id(&ledger, &reservation.reservation_id, true, Some(20.0)).unwrap();

    let result = ledger
        .engine
        .attach_external_request_id(&reservation.reservation_id, "fal-job-late");
    assert!(matches!(result, Err(LedgerError::Conflict(_))));
    assert_eq!(ledger.balances(user), (80, 0));
}

#[test]
fn stale_attach_write_cannot_reopen_settled_reservation() {
    use ledgerd_store::{LedgerWrite, ReservationWrite, StoreError};

    let ledger = TestLedger::new();
    let user = ledger.subscribed_user(100);
    let reservation = ledger.reserve(user, 30.0);
    assert_eq!(ledger.balances(user), (70, 30));

    // What an attach has in hand right before its commit: the row as it
    // read it, with the external id applied in memory.
    let mut stale_row = ledger
        .engine
        .store()
        .get_reservation(&reservation.reservation_id)
        .unwrap()
        .unwrap();
    stale_row.attach_external_id("fal-job-9").unwrap();

    // A finalize lands inside that window.
    finalize_by_id(&ledger, &reservation.reservation_id, true, Some(20.0)).unwrap();
    assert_eq!(ledger.balances(user), (80, 0));

    // The late commit must not resurrect the open row.
    let result = ledger.engine.store().commit(LedgerWrite {
        account: None,
        reservation: Some(ReservationWrite::update(stale_row)),
        external_id: Some("fal-job-9".into()),
        events: vec![],
    });
    assert!(matches!(result, Err(StoreError::ReservationClosed { .. })));

    let row = ledger
        .engine
        .store()
        .get_reservation(&reservation.reservation_id)
        .unwrap()
        .unwrap();
    assert_eq!(row.status, ReservationStatus::Captured);
    assert_eq!(ledger.balances(user), (80, 0));

    // A retried failure webhook sees the settled row and changes nothing.
    let retry = finalize_by_id(&ledger, &reservation.reservation_id, false, None).unwrap();
    assert_eq!(retry.status, FinalizeStatus::Noop);
    assert_eq!(ledger.balances(user), (80, 0));
}

#[test]
fn external_id_cannot_be_claimed_by_second_reservation() {
    let ledger = TestLedger::new();
    let user = ledger.subscribed_user(100);
    let first = ledger.reserve(user, 10.0);
    let second = ledger.reserve(user, 10.0);

    ledger
        .engine
        .attach_external_request_id(&first.reservation_id, "fal-job-7")
        .unwrap();

    let result = ledger
        .engine
        .attach_external_request_id(&second.reservation_id, "fal-job-7");
    assert!(matches!(result, Err(LedgerError::Conflict(_))));
}

// ============================================================================
// Release-all sweep
// ============================================================================

#[test]
fn release_all_unwinds_open_reservations() {
    let ledger = TestLedger::new();
    let user = ledger.subscribed_user(100);

    ledger.reserve(user, 10.0);
    ledger.reserve(user, 20.0);
    let captured = ledger.reserve(user, 15.0);
    finalize_by_id(&ledger, &captured.reservation_id, true, None).unwrap();
    assert_eq!(ledger.balances(user), (55, 30));

    let outcome = ledger.engine.release_all_reserved(user, None).unwrap();
    assert_eq!(outcome.released_count, 2);
    assert_eq!(outcome.released_credits, 30);
    assert_eq!(ledger.balances(user), (85, 0));

    // Nothing left to sweep.
    let again = ledger.engine.release_all_reserved(user, None).unwrap();
    assert_eq!(again.released_count, 0);
}

#[test]
fn release_all_honors_service_filter() {
    let ledger = TestLedger::new();
    let user = ledger.subscribed_user(100);

    ledger.reserve(user, 10.0); // fal
    ledger
        .engine
        .reserve(ReserveRequest {
            user_id: user,
            service: GenerationService::Replicate,
            model_id: "sdxl".into(),
            estimated_credits: 20.0,
            reservation_id: None,
        })
        .unwrap();

    let outcome = ledger
        .engine
        .release_all_reserved(user, Some(GenerationService::Replicate))
        .unwrap();
    assert_eq!(outcome.released_count, 1);
    assert_eq!(outcome.released_credits, 20);
    assert_eq!(ledger.balances(user), (90, 10));
}
