//! HTTP endpoints for the donation gateway.
//!
//! The webhook handler owns steps the engine cannot: a missing signature header is a `400` and an invalid
//! signature is a `401`, both before anything is written anywhere. Everything after verification is delegated to
//! [`WebhookFlowApi`], whose outcome maps onto the response status.

use actix_web::{get, web, HttpRequest, HttpResponse};
use actix_ws::Message;
use donation_engine::{
    db_types::Reference,
    paystack_types::PaystackEvent,
    traits::DonationGatewayDatabase,
    ReconcileOutcome,
    WebhookFlowApi,
};
use futures::StreamExt;
use log::*;

use crate::{
    broadcaster::BroadcasterRegistry,
    config::PaystackConfig,
    data_objects::JsonResponse,
    errors::ServerError,
    helpers::verify_paystack_signature,
};

pub const SIGNATURE_HEADER: &str = "x-paystack-signature";

#[get("/health")]
pub async fn health() -> HttpResponse {
    trace!("💻️ Health check");
    HttpResponse::Ok().body("👍️\n")
}

/// `POST /paystack/webhook` — the payment processor's delivery endpoint.
///
/// Response statuses follow the processor's retry semantics: `200` acknowledges (including harmless duplicates
/// and unknown event types), `400`/`401`/`404` are non-retryable rejections, and `500` asks for a redelivery.
pub async fn paystack_webhook<B: DonationGatewayDatabase>(
    req: HttpRequest,
    body: web::Bytes,
    api: web::Data<WebhookFlowApi<B>>,
    config: web::Data<PaystackConfig>,
) -> Result<HttpResponse, ServerError> {
    trace!("💰️ Received webhook delivery: {}", req.uri());
    let signature = req.headers().get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    if config.hmac_checks {
        let Some(signature) = signature else {
            warn!("💰️ Rejected a webhook delivery without a signature header.");
            return Err(ServerError::MissingSignature);
        };
        if !verify_paystack_signature(config.secret_key.reveal(), &body, signature) {
            warn!("💰️ Rejected a webhook delivery with an invalid signature.");
            return Err(ServerError::InvalidSignature);
        }
    } else {
        debug!("💰️ Signature verification is disabled. Accepting the delivery as-is.");
    }
    let event = PaystackEvent::from_slice(&body).map_err(|e| {
        warn!("💰️ Could not parse a verified webhook payload. {e}");
        ServerError::InvalidRequestBody(e.to_string())
    })?;
    let raw_body = String::from_utf8_lossy(&body);
    let response = match api.process_paystack_event(event, &raw_body, signature).await {
        Ok(ReconcileOutcome::Success(donation)) => {
            HttpResponse::Ok().json(JsonResponse::success(format!("Donation {} reconciled.", donation.reference)))
        },
        Ok(ReconcileOutcome::Recorded(donation)) => {
            HttpResponse::Ok().json(JsonResponse::success(format!("Event recorded against {}.", donation.reference)))
        },
        Ok(ReconcileOutcome::Duplicate) => HttpResponse::Ok().json(JsonResponse::success("Event already processed.")),
        Ok(ReconcileOutcome::Ignored(what)) => {
            HttpResponse::Ok().json(JsonResponse::success(format!("Event acknowledged: {what}")))
        },
        Ok(ReconcileOutcome::UnknownReference(reference)) => HttpResponse::NotFound()
            .json(JsonResponse::failure(format!("No donation matches reference {reference}"))),
        Ok(ReconcileOutcome::AmountMismatch { reason }) => {
            HttpResponse::BadRequest().json(JsonResponse::failure(reason))
        },
        Err(e) => {
            error!("💰️ Webhook reconciliation hit a storage error. {e}");
            HttpResponse::InternalServerError()
                .json(JsonResponse::failure("Transient error. The delivery will be retried."))
        },
    };
    Ok(response)
}

/// `GET /donation/{reference}` — the authoritative donation record. Live clients re-fetch this after an
/// invalidation signal instead of trusting notification payloads.
pub async fn donation_status<B: DonationGatewayDatabase>(
    path: web::Path<String>,
    api: web::Data<WebhookFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let reference = Reference::from(path.into_inner());
    let donation = api
        .donation_by_reference(&reference)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("Donation {reference}")))?;
    Ok(HttpResponse::Ok().json(donation))
}

/// `GET /live/{campaign_id}` — upgrades to a websocket and registers the viewer with the campaign's broadcaster.
///
/// Client messages carry no protocol significance; the stream is read only to answer pings and observe the
/// close, which immediately deregisters the viewer.
pub async fn live(
    req: HttpRequest,
    stream: web::Payload,
    path: web::Path<i64>,
    registry: web::Data<BroadcasterRegistry<actix_ws::Session>>,
) -> Result<HttpResponse, ServerError> {
    let campaign_id = path.into_inner();
    let (response, session, mut msg_stream) =
        actix_ws::handle(&req, stream).map_err(|e| ServerError::WebsocketUpgradeError(e.to_string()))?;
    let mut control_session = session.clone();
    let Some(conn_id) = registry.register(campaign_id, session).await else {
        return Err(ServerError::Unspecified("Could not register the live connection".to_string()));
    };
    info!("📡️ New live viewer for campaign #{campaign_id}.");
    let registry = registry.into_inner();
    actix_web::rt::spawn(async move {
        while let Some(Ok(msg)) = msg_stream.next().await {
            match msg {
                Message::Ping(bytes) => {
                    if control_session.pong(&bytes).await.is_err() {
                        break;
                    }
                },
                Message::Close(_) => break,
                _ => {},
            }
        }
        registry.deregister(campaign_id, conn_id).await;
        debug!("📡️ Live viewer {conn_id} for campaign #{campaign_id} disconnected.");
    });
    Ok(response)
}
