use std::{future::Future, net::IpAddr, pin::Pin, str::FromStr, time::Duration};

use actix_web::{
    dev::{Server, Service},
    http::KeepAlive,
    middleware::Logger,
    web,
    App,
    HttpServer,
};
use actix_ws::Session;
use donation_engine::{
    events::{DonationSucceededEvent, EventHandlers, EventHooks},
    SqliteDatabase,
    WebhookFlowApi,
};
use futures::{future::ok, FutureExt};
use log::{info, warn};

use crate::{
    broadcaster::{BroadcasterRegistry, LiveConnection},
    config::ServerConfig,
    errors::ServerError,
    routes::{donation_status, health, live, paystack_webhook},
};

const EVENT_BUFFER_SIZE: usize = 25;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let srv = create_server_instance(config, db).await?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// Builds the HTTP server, wiring the reconciliation flow to the realtime fan-out.
///
/// The donation-succeeded hook runs off the request path: its failure is logged and never changes the response
/// already implied by a correctly reconciled donation.
pub async fn create_server_instance(config: ServerConfig, db: SqliteDatabase) -> Result<Server, ServerError> {
    let registry = BroadcasterRegistry::<Session>::new();
    let mut hooks = EventHooks::default();
    hooks.on_donation_succeeded(donation_succeeded_hook(registry.clone()));
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let srv = HttpServer::new(move || {
        let api = WebhookFlowApi::new(db.clone(), producers.clone());
        let use_x_forwarded_for = config.use_x_forwarded_for;
        let use_forwarded = config.use_forwarded;
        let whitelist = config.paystack.whitelist.clone();
        let webhook_scope = web::scope("/paystack")
            .wrap_fn(move |req, srv| {
                // Collect the peer IP from the x-forwarded-for or forwarded headers _if_ the corresponding
                // `use_nnn` flag has been set in the configuration. Otherwise, use the peer address from the
                // connection info.
                let peer_addr = req.connection_info().peer_addr().map(|a| a.to_string());
                let peer_ip = req
                    .headers()
                    .get("X-Forwarded-For")
                    .and_then(|v| use_x_forwarded_for.then(|| v.to_str().ok()).flatten())
                    .or_else(|| {
                        req.headers().get("Forwarded").and_then(|v| use_forwarded.then(|| v.to_str().ok()).flatten())
                    })
                    .or_else(|| peer_addr.as_deref())
                    .and_then(parse_ip);
                let allowed = match (peer_ip, &whitelist) {
                    (Some(ip), Some(whitelist)) => {
                        info!("💰️ Webhook delivery from {ip}");
                        whitelist.contains(&ip)
                    },
                    (_, None) => true,
                    (None, Some(_)) => {
                        warn!("💰️ No IP address found for a webhook delivery. Denying access.");
                        false
                    },
                };
                if allowed {
                    srv.call(req)
                } else {
                    ok(req.error_response(ServerError::ForbiddenPeer)).boxed_local()
                }
            })
            .service(web::resource("/webhook").route(web::post().to(paystack_webhook::<SqliteDatabase>)));
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("dpg::access_log"))
            .app_data(web::Data::new(api))
            .app_data(web::Data::new(registry.clone()))
            .app_data(web::Data::new(config.paystack.clone()))
            .service(health)
            .service(webhook_scope)
            .service(web::resource("/donation/{reference}").route(web::get().to(donation_status::<SqliteDatabase>)))
            .service(web::resource("/live/{campaign_id}").route(web::get().to(live)))
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

fn parse_ip(s: &str) -> Option<IpAddr> {
    IpAddr::from_str(s).ok().or_else(|| std::net::SocketAddr::from_str(s).map(|sa| sa.ip()).ok())
}

/// The donation-succeeded hook pushes the donation invalidation and then the campaign invalidation, so viewers
/// re-fetch both the donation and the campaign totals.
fn donation_succeeded_hook<C: LiveConnection>(
    registry: BroadcasterRegistry<C>,
) -> impl Fn(DonationSucceededEvent) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync + 'static {
    move |event: DonationSucceededEvent| {
        let registry = registry.clone();
        Box::pin(async move {
            let campaign_id = event.campaign_id();
            let attempted = registry.broadcast_donation_success(event.donation.id, campaign_id).await;
            registry.broadcast_campaign_updated(campaign_id).await;
            info!("📡️ Donation success for campaign #{campaign_id} pushed to {attempted} live viewer(s).");
        })
    }
}

#[cfg(test)]
mod test {
    use chrono::{TimeZone, Utc};
    use donation_engine::{
        db_types::{Donation, DonationStatus, Reference},
        events::DonationSucceededEvent,
    };
    use dpg_common::MinorUnits;

    use super::donation_succeeded_hook;
    use crate::broadcaster::{test_support::FakeConnection, BroadcasterRegistry};

    #[tokio::test]
    async fn the_success_hook_invalidates_the_donation_and_its_campaign() {
        let registry = BroadcasterRegistry::new();
        let viewer = FakeConnection::default();
        registry.register(11, viewer.clone()).await.unwrap();
        let created = Utc.with_ymd_and_hms(2024, 9, 20, 8, 0, 0).unwrap();
        let donation = Donation {
            id: 42,
            campaign_id: 11,
            amount: MinorUnits::from(10_000),
            currency: "GHS".to_string(),
            reference: Reference::from("R1"),
            status: DonationStatus::Success,
            payment_transaction_id: None,
            completed_at: Some(created),
            failed_at: None,
            failure_reason: None,
            created_at: created,
            updated_at: created,
        };
        let hook = donation_succeeded_hook(registry);
        hook(DonationSucceededEvent::new(donation)).await;
        let messages = viewer.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], r#"{"type":"DONATION_SUCCESS","donationId":42,"campaignId":11}"#);
        assert_eq!(messages[1], r#"{"type":"CAMPAIGN_UPDATED","campaignId":11}"#);
    }
}
