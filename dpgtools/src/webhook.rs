use donation_server::{helpers::sign_paystack_payload, routes::SIGNATURE_HEADER};
use dpg_common::MinorUnits;
use serde_json::json;

use crate::{SignParams, WebhookParams};

pub async fn send_test_event(params: WebhookParams) {
    let Some(secret) = resolve_secret(params.secret.clone()) else {
        eprintln!("No webhook secret. Pass --secret or set DPG_PAYSTACK_SECRET_KEY.");
        return;
    };
    let body = build_envelope(&params).to_string();
    let signature = sign_paystack_payload(&secret, body.as_bytes());
    let url = format!("{}/paystack/webhook", params.url.trim_end_matches('/'));
    if let Some(amount) = params.amount {
        println!("Sending {} for {} ({} {})", params.event, params.reference, MinorUnits::from(amount), params.currency);
    } else {
        println!("Sending {} for {}", params.event, params.reference);
    }
    let client = reqwest::Client::new();
    let result = client
        .post(&url)
        .header(SIGNATURE_HEADER, signature)
        .header("Content-Type", "application/json")
        .body(body)
        .send()
        .await;
    match result {
        Ok(res) => {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            println!("{status}: {body}");
        },
        Err(e) => eprintln!("Request to {url} failed. {e}"),
    }
}

pub fn print_signature(params: SignParams) {
    let Some(secret) = resolve_secret(params.secret) else {
        eprintln!("No webhook secret. Pass --secret or set DPG_PAYSTACK_SECRET_KEY.");
        return;
    };
    println!("{}", sign_paystack_payload(&secret, params.payload.as_bytes()));
}

fn resolve_secret(cli_secret: Option<String>) -> Option<String> {
    cli_secret.or_else(|| std::env::var("DPG_PAYSTACK_SECRET_KEY").ok())
}

fn build_envelope(params: &WebhookParams) -> serde_json::Value {
    let mut data = json!({ "reference": params.reference, "currency": params.currency });
    if let Some(amount) = params.amount {
        data["amount"] = json!(amount);
    }
    if let Some(status) = &params.status {
        data["status"] = json!(status);
    }
    let mut envelope = json!({ "event": params.event, "data": data });
    if let Some(id) = &params.event_id {
        envelope["id"] = json!(id);
    }
    envelope
}
