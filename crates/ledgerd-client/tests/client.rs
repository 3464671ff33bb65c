//! Client integration tests against a mock ledgerd service.

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ledgerd_client::{
    ChargeGrantRequest, ClientError, ClientOptions, FinalizeRequest, LedgerClient,
    ReleaseAllRequest, ReserveRequest,
};

fn client_for(server: &MockServer) -> LedgerClient {
    LedgerClient::with_options(
        server.uri(),
        "test-api-key",
        ClientOptions::with_service_name("gen-worker"),
    )
}

#[tokio::test]
async fn reserve_sends_key_and_parses_outcome() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/reservations"))
        .and(header("x-api-key", "test-api-key"))
        .and(header("x-service-name", "gen-worker"))
        .and(body_partial_json(json!({
            "user_id": "user-1",
            "service": "fal",
            "estimated_credits": 30.0,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "reservation_id": "rsv_abc",
            "estimated_credits": 30,
            "available_credits": 70,
            "reserved_credits": 30,
            "was_idempotent": false,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let outcome = client
        .reserve(ReserveRequest {
            user_id: "user-1".to_string(),
            service: "fal".to_string(),
            model_id: "flux-pro".to_string(),
            estimated_credits: 30.0,
            reservation_id: None,
        })
        .await
        .unwrap();

    assert_eq!(outcome.reservation_id, "rsv_abc");
    assert_eq!(outcome.available_credits, 70);
    assert!(!outcome.was_idempotent);
}

#[tokio::test]
async fn insufficient_credits_becomes_typed_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/reservations"))
        .respond_with(ResponseTemplate::new(402).set_body_json(json!({
            "error": {
                "code": "insufficient_credits",
                "message": "insufficient credits: balance=10, required=30",
                "details": { "balance": 10, "required": 30 },
            }
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .reserve(ReserveRequest {
            user_id: "user-1".to_string(),
            service: "fal".to_string(),
            model_id: "flux-pro".to_string(),
            estimated_credits: 30.0,
            reservation_id: None,
        })
        .await
        .unwrap_err();

    match err {
        ClientError::InsufficientCredits { balance, required } => {
            assert_eq!(balance, 10);
            assert_eq!(required, 30);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn subscription_required_becomes_typed_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/reservations"))
        .respond_with(ResponseTemplate::new(402).set_body_json(json!({
            "error": {
                "code": "subscription_required",
                "message": "active subscription required",
            }
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .reserve(ReserveRequest {
            user_id: "user-1".to_string(),
            service: "fal".to_string(),
            model_id: "flux-pro".to_string(),
            estimated_credits: 30.0,
            reservation_id: None,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::SubscriptionRequired));
}

#[tokio::test]
async fn finalize_success_round_trips() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/reservations/finalize"))
        .and(body_partial_json(json!({
            "reservation_id": "rsv_abc",
            "success": true,
            "actual_credits": 20.0,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "reservation_id": "rsv_abc",
            "status": "captured",
            "captured_credits": 20,
            "released_credits": 10,
            "available_credits": 80,
            "reserved_credits": 0,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let outcome = client
        .finalize(FinalizeRequest::success("rsv_abc", 20.0))
        .await
        .unwrap();

    assert_eq!(outcome.status, "captured");
    assert_eq!(outcome.captured_credits, 20);
    assert_eq!(outcome.released_credits, 10);
}

#[tokio::test]
async fn finalize_unknown_reservation_is_benign() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/reservations/finalize"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "reservation_id": "rsv_missing",
            "status": "unknown",
            "captured_credits": 0,
            "released_credits": 0,
            "available_credits": 0,
            "reserved_credits": 0,
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let outcome = client
        .finalize(FinalizeRequest::failure("rsv_missing"))
        .await
        .unwrap();

    assert_eq!(outcome.status, "unknown");
    assert_eq!(outcome.captured_credits, 0);
    assert_eq!(outcome.released_credits, 0);
}

#[tokio::test]
async fn attach_external_id_conflict_is_typed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/reservations/rsv_abc/external"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "error": {
                "code": "conflict",
                "message": "external request id fal_req_456 is bound to another reservation",
            }
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .attach_external_id("rsv_abc", "fal_req_456")
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Conflict(_)));
}

#[tokio::test]
async fn release_all_parses_sweep_summary() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/reservations/release-all"))
        .and(body_partial_json(json!({ "user_id": "user-1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "released_count": 2,
            "released_credits": 50,
            "available_credits": 100,
            "reserved_credits": 0,
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let outcome = client
        .release_all(ReleaseAllRequest {
            user_id: "user-1".to_string(),
            service: None,
        })
        .await
        .unwrap();

    assert_eq!(outcome.released_count, 2);
    assert_eq!(outcome.released_credits, 50);
}

#[tokio::test]
async fn grant_for_charge_parses_outcome() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/grants/charge"))
        .and(body_partial_json(json!({
            "plan_id": "standard",
            "charge_id": "ch_001",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "plan": "standard",
            "granted_credits": 2500,
            "available_credits": 2500,
            "reserved_credits": 0,
            "was_idempotent": false,
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let outcome = client
        .grant_for_charge(ChargeGrantRequest {
            user_id: "user-1".to_string(),
            plan_id: "standard".to_string(),
            charge_id: "ch_001".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(outcome.plan, "standard");
    assert_eq!(outcome.granted_credits, 2500);
}

#[tokio::test]
async fn get_balance_uses_bearer_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/credits/balance"))
        .and(header("authorization", "Bearer test-token:user-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "available_credits": 70,
            "reserved_credits": 30,
            "total_credits": 100,
            "has_active_subscription": true,
            "plan_id": "standard",
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let balance = client.get_balance("test-token:user-1").await.unwrap();

    assert_eq!(balance.available_credits, 70);
    assert_eq!(balance.total_credits, 100);
    assert!(balance.has_active_subscription);
    assert_eq!(balance.plan_id.as_deref(), Some("standard"));
}

#[tokio::test]
async fn unparseable_error_body_falls_back_to_api_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/reconcile"))
        .respond_with(ResponseTemplate::new(500).set_body_string("not json"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.reconcile("user-1").await.unwrap_err();

    match err {
        ClientError::Api { code, status, .. } => {
            assert_eq!(code, "unknown");
            assert_eq!(status, 500);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
