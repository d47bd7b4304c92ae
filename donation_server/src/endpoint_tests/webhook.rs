use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use actix_web::{http::StatusCode, test, test::TestRequest, web, App};
use donation_engine::{
    db_types::DonationStatus,
    events::{EventHandlers, EventHooks},
    traits::DonationGatewayError,
    WebhookFlowApi,
};

use super::{
    helpers::{claimed_event, donation, paystack_config, post_unsigned_webhook, post_webhook, webhook_app, SECRET},
    mocks::MockDonationDb,
};
use crate::{
    helpers::sign_paystack_payload,
    routes::{paystack_webhook, SIGNATURE_HEADER},
};

const CHARGE_SUCCESS_R1: &str = r#"{
    "event": "charge.success",
    "id": "evt_100",
    "data": { "reference": "R1", "amount": 10000, "currency": "GHS", "status": "success" }
}"#;

#[actix_web::test]
async fn charge_success_reconciles_the_donation() {
    let _ = env_logger::try_init().ok();
    let mut db = MockDonationDb::new();
    db.expect_webhook_event_exists().times(1).returning(|_, _| Ok(false));
    db.expect_claim_webhook_event()
        .times(1)
        .withf(|ev| ev.event_id == "evt_100" && ev.event_type == "charge.success" && ev.signature.is_some())
        .returning(|_| Ok(claimed_event(1, "evt_100", "charge.success")));
    db.expect_fetch_donation_by_reference()
        .times(1)
        .returning(|_| Ok(Some(donation(1, 10_000, "R1", DonationStatus::Pending))));
    db.expect_mark_donation_succeeded()
        .times(1)
        .withf(|id| *id == 1)
        .returning(|_| Ok(donation(1, 10_000, "R1", DonationStatus::Success)));
    db.expect_mark_webhook_event_processed().times(1).withf(|id| *id == 1).returning(|_| Ok(()));

    let (status, body) = post_webhook(CHARGE_SUCCESS_R1, None, webhook_app(db)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("reconciled"), "unexpected body: {body}");
}

#[actix_web::test]
async fn missing_signature_is_rejected_without_side_effects() {
    let _ = env_logger::try_init().ok();
    // No expectations: any storage call panics the mock, proving zero rows are written.
    let db = MockDonationDb::new();
    let (status, body) = post_unsigned_webhook(CHARGE_SUCCESS_R1, webhook_app(db)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Missing signature"), "unexpected body: {body}");
}

#[actix_web::test]
async fn invalid_signature_is_rejected_without_side_effects() {
    let _ = env_logger::try_init().ok();
    let db = MockDonationDb::new();
    let (status, body) = post_webhook(CHARGE_SUCCESS_R1, Some("deadbeef"), webhook_app(db)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("Invalid signature"), "unexpected body: {body}");
}

#[actix_web::test]
async fn losing_the_claim_race_still_acknowledges_the_duplicate() {
    let _ = env_logger::try_init().ok();
    let mut db = MockDonationDb::new();
    // A concurrent delivery slipped in between the existence check and the claiming insert.
    db.expect_webhook_event_exists().times(1).returning(|_, _| Ok(false));
    db.expect_claim_webhook_event()
        .times(1)
        .returning(|ev| Err(DonationGatewayError::DuplicateEvent(ev.event_id)));

    let (status, body) = post_webhook(CHARGE_SUCCESS_R1, None, webhook_app(db)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("already processed"), "unexpected body: {body}");
}

#[actix_web::test]
async fn malformed_payload_with_a_valid_signature_is_a_bad_request() {
    let _ = env_logger::try_init().ok();
    let db = MockDonationDb::new();
    let (status, body) = post_webhook("this is not json", None, webhook_app(db)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Malformed"), "unexpected body: {body}");
}

#[actix_web::test]
async fn amount_mismatch_fails_the_donation_and_the_event() {
    let _ = env_logger::try_init().ok();
    let payload = r#"{
        "event": "charge.success",
        "id": "evt_101",
        "data": { "reference": "R2", "amount": 4800, "currency": "GHS" }
    }"#;
    let mut db = MockDonationDb::new();
    db.expect_webhook_event_exists().times(1).returning(|_, _| Ok(false));
    db.expect_claim_webhook_event().times(1).returning(|_| Ok(claimed_event(2, "evt_101", "charge.success")));
    db.expect_fetch_donation_by_reference()
        .times(1)
        .returning(|_| Ok(Some(donation(2, 5000, "R2", DonationStatus::Pending))));
    db.expect_mark_donation_failed()
        .times(1)
        .withf(|id, reason| *id == 2 && reason.contains("50.00") && reason.contains("48.00"))
        .returning(|_, _| Ok(donation(2, 5000, "R2", DonationStatus::Failed)));
    db.expect_mark_webhook_event_failed()
        .times(1)
        .withf(|id, reason| *id == 2 && reason.contains("mismatch"))
        .returning(|_, _| Ok(()));

    let (status, body) = post_webhook(payload, None, webhook_app(db)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("50.00") && body.contains("48.00"), "unexpected body: {body}");
}

#[actix_web::test]
async fn unknown_reference_is_not_found() {
    let _ = env_logger::try_init().ok();
    let payload = r#"{"event": "charge.success", "id": "evt_102", "data": {"reference": "GHOST", "amount": 100}}"#;
    let mut db = MockDonationDb::new();
    db.expect_webhook_event_exists().times(1).returning(|_, _| Ok(false));
    db.expect_claim_webhook_event().times(1).returning(|_| Ok(claimed_event(3, "evt_102", "charge.success")));
    db.expect_fetch_donation_by_reference().times(1).returning(|_| Ok(None));
    db.expect_mark_webhook_event_failed()
        .times(1)
        .withf(|id, reason| *id == 3 && reason.contains("GHOST"))
        .returning(|_, _| Ok(()));

    let (status, body) = post_webhook(payload, None, webhook_app(db)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("GHOST"), "unexpected body: {body}");
}

#[actix_web::test]
async fn unknown_event_types_are_acknowledged_and_never_retried() {
    let _ = env_logger::try_init().ok();
    let payload = r#"{"event": "some.future.event", "id": "evt_103", "data": {"reference": "R1"}}"#;
    let mut db = MockDonationDb::new();
    db.expect_webhook_event_exists().times(1).returning(|_, _| Ok(false));
    db.expect_claim_webhook_event().times(1).returning(|_| Ok(claimed_event(4, "evt_103", "some.future.event")));
    // No donation lookups or mutations: the donation stays untouched.
    db.expect_mark_webhook_event_processed().times(1).withf(|id| *id == 4).returning(|_| Ok(()));

    let (status, body) = post_webhook(payload, None, webhook_app(db)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("some.future.event"), "unexpected body: {body}");
}

#[actix_web::test]
async fn dispute_create_fails_a_successful_donation() {
    let _ = env_logger::try_init().ok();
    let payload = r#"{
        "event": "charge.dispute.create",
        "id": "evt_104",
        "data": { "reference": "R1", "status": "open", "gateway_response": "Chargeback opened" }
    }"#;
    let mut db = MockDonationDb::new();
    db.expect_webhook_event_exists().times(1).returning(|_, _| Ok(false));
    db.expect_claim_webhook_event().times(1).returning(|_| Ok(claimed_event(5, "evt_104", "charge.dispute.create")));
    db.expect_fetch_donation_by_reference()
        .times(1)
        .returning(|_| Ok(Some(donation(1, 10_000, "R1", DonationStatus::Success))));
    db.expect_mark_donation_failed()
        .times(1)
        .withf(|id, reason| *id == 1 && reason.starts_with("disputed") && reason.contains("Chargeback opened"))
        .returning(|_, _| {
            let mut d = donation(1, 10_000, "R1", DonationStatus::Failed);
            d.failure_reason = Some("disputed: Chargeback opened".to_string());
            Ok(d)
        });
    db.expect_mark_webhook_event_processed().times(1).withf(|id| *id == 5).returning(|_| Ok(()));

    let (status, _) = post_webhook(payload, None, webhook_app(db)).await;
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn dispute_resolved_in_merchants_favour_restores_success() {
    let _ = env_logger::try_init().ok();
    let payload = r#"{
        "event": "charge.dispute.resolve",
        "id": "evt_105",
        "data": { "reference": "R1", "status": "resolved" }
    }"#;
    let mut db = MockDonationDb::new();
    db.expect_webhook_event_exists().times(1).returning(|_, _| Ok(false));
    db.expect_claim_webhook_event().times(1).returning(|_| Ok(claimed_event(6, "evt_105", "charge.dispute.resolve")));
    db.expect_fetch_donation_by_reference().times(1).returning(|_| {
        let mut d = donation(1, 10_000, "R1", DonationStatus::Failed);
        d.failure_reason = Some("disputed: Chargeback opened".to_string());
        Ok(Some(d))
    });
    db.expect_mark_donation_succeeded()
        .times(1)
        .withf(|id| *id == 1)
        .returning(|_| Ok(donation(1, 10_000, "R1", DonationStatus::Success)));
    db.expect_mark_webhook_event_processed().times(1).withf(|id| *id == 6).returning(|_| Ok(()));

    let (status, _) = post_webhook(payload, None, webhook_app(db)).await;
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn storage_errors_ask_the_processor_to_retry() {
    let _ = env_logger::try_init().ok();
    let mut db = MockDonationDb::new();
    db.expect_webhook_event_exists().times(1).returning(|_, _| Ok(false));
    db.expect_claim_webhook_event().times(1).returning(|_| Ok(claimed_event(7, "evt_100", "charge.success")));
    db.expect_fetch_donation_by_reference()
        .times(1)
        .returning(|_| Err(DonationGatewayError::DatabaseError("connection reset".to_string())));
    db.expect_mark_webhook_event_failed()
        .times(1)
        .withf(|id, reason| *id == 7 && reason.contains("connection reset"))
        .returning(|_, _| Ok(()));

    let (status, body) = post_webhook(CHARGE_SUCCESS_R1, None, webhook_app(db)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("retried"), "unexpected body: {body}");
}

#[actix_web::test]
async fn duplicate_delivery_is_a_no_op_and_broadcasts_exactly_once() {
    let _ = env_logger::try_init().ok();
    let deliveries = Arc::new(AtomicUsize::new(0));
    let seen = deliveries.clone();
    let mut db = MockDonationDb::new();
    db.expect_webhook_event_exists().times(2).returning(move |_, _| Ok(seen.fetch_add(1, Ordering::SeqCst) > 0));
    db.expect_claim_webhook_event().times(1).returning(|_| Ok(claimed_event(1, "evt_100", "charge.success")));
    db.expect_fetch_donation_by_reference()
        .times(1)
        .returning(|_| Ok(Some(donation(1, 10_000, "R1", DonationStatus::Pending))));
    db.expect_mark_donation_succeeded()
        .times(1)
        .returning(|_| Ok(donation(1, 10_000, "R1", DonationStatus::Success)));
    db.expect_mark_webhook_event_processed().times(1).returning(|_| Ok(()));

    let broadcasts = Arc::new(AtomicUsize::new(0));
    let counter = broadcasts.clone();
    let mut hooks = EventHooks::default();
    hooks.on_donation_succeeded(move |_| {
        let counter = counter.clone();
        Box::pin(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    });
    let handlers = EventHandlers::new(10, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let api = WebhookFlowApi::new(db, producers);
    let app = App::new()
        .app_data(web::Data::new(api))
        .app_data(web::Data::new(paystack_config()))
        .service(web::resource("/webhook").route(web::post().to(paystack_webhook::<MockDonationDb>)));
    let service = test::init_service(app).await;

    let sig = sign_paystack_payload(SECRET, CHARGE_SUCCESS_R1.as_bytes());
    for _ in 0..2 {
        let req = TestRequest::post()
            .uri("/webhook")
            .insert_header((SIGNATURE_HEADER, sig.clone()))
            .set_payload(CHARGE_SUCCESS_R1)
            .to_request();
        let res = test::call_service(&service, req).await;
        assert_eq!(res.status(), StatusCode::OK);
    }
    // The hook runs off the request path; give it a beat to land.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(broadcasts.load(Ordering::SeqCst), 1);
}
