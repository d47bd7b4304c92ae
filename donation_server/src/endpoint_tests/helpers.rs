use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, web, web::ServiceConfig, App};
use chrono::{TimeZone, Utc};
use donation_engine::{
    db_types::{Donation, DonationStatus, PaymentProcessor, Reference, WebhookEvent, WebhookEventStatus},
    events::EventProducers,
    WebhookFlowApi,
};
use dpg_common::{MinorUnits, Secret};

use super::mocks::MockDonationDb;
use crate::{
    config::PaystackConfig,
    helpers::sign_paystack_payload,
    routes::{paystack_webhook, SIGNATURE_HEADER},
};

// Test-only webhook secret. DO NOT re-use anywhere.
pub const SECRET: &str = "sk_test_c0ffee15g00d";

pub fn paystack_config() -> PaystackConfig {
    PaystackConfig { secret_key: Secret::new(SECRET.to_string()), hmac_checks: true, whitelist: None }
}

/// Wires a mock backend into a webhook-only test app, the way the production server does it.
pub fn webhook_app(db: MockDonationDb) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let api = WebhookFlowApi::new(db, EventProducers::default());
        cfg.app_data(web::Data::new(api))
            .app_data(web::Data::new(paystack_config()))
            .service(web::resource("/webhook").route(web::post().to(paystack_webhook::<MockDonationDb>)));
    }
}

/// Posts a webhook delivery, signing the body with the test secret unless an explicit signature is given.
pub async fn post_webhook(
    body: &str,
    signature: Option<&str>,
    configure: impl FnOnce(&mut ServiceConfig),
) -> (StatusCode, String) {
    let sig = signature.map(str::to_string).unwrap_or_else(|| sign_paystack_payload(SECRET, body.as_bytes()));
    let req =
        TestRequest::post().uri("/webhook").insert_header((SIGNATURE_HEADER, sig)).set_payload(body.to_string());
    send(req, configure).await
}

/// Posts a webhook delivery with no signature header at all.
pub async fn post_unsigned_webhook(
    body: &str,
    configure: impl FnOnce(&mut ServiceConfig),
) -> (StatusCode, String) {
    let req = TestRequest::post().uri("/webhook").set_payload(body.to_string());
    send(req, configure).await
}

async fn send(req: TestRequest, configure: impl FnOnce(&mut ServiceConfig)) -> (StatusCode, String) {
    let app = App::new().configure(configure);
    let service = test::init_service(app).await;
    let (_, res) = test::call_service(&service, req.to_request()).await.into_parts();
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    (status, body)
}

pub fn donation(id: i64, amount: i64, reference: &str, status: DonationStatus) -> Donation {
    let created = Utc.with_ymd_and_hms(2024, 9, 20, 8, 0, 0).unwrap();
    Donation {
        id,
        campaign_id: 11,
        amount: MinorUnits::from(amount),
        currency: "GHS".to_string(),
        reference: Reference::from(reference),
        status,
        payment_transaction_id: None,
        completed_at: (status == DonationStatus::Success).then_some(created),
        failed_at: None,
        failure_reason: None,
        created_at: created,
        updated_at: created,
    }
}

pub fn claimed_event(id: i64, event_id: &str, event_type: &str) -> WebhookEvent {
    WebhookEvent {
        id,
        processor: PaymentProcessor::Paystack,
        event_id: event_id.to_string(),
        event_type: event_type.to_string(),
        signature: None,
        raw_payload: "{}".to_string(),
        status: WebhookEventStatus::Pending,
        error_message: None,
        received_at: Utc.with_ymd_and_hms(2024, 9, 20, 8, 5, 0).unwrap(),
        processed_at: None,
    }
}
