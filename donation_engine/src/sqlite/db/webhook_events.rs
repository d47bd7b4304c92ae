use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewWebhookEvent, PaymentProcessor, WebhookEvent},
    traits::DonationGatewayError,
};

/// Returns true if an event with this `(processor, event_id)` is already recorded.
pub async fn event_exists(
    processor: PaymentProcessor,
    event_id: &str,
    conn: &mut SqliteConnection,
) -> Result<bool, DonationGatewayError> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM webhook_events WHERE processor = $1 AND event_id = $2")
        .bind(processor.to_string())
        .bind(event_id)
        .fetch_optional(conn)
        .await?;
    Ok(row.is_some())
}

/// Inserts the event with `Pending` status, claiming it for the calling process.
///
/// The unique constraint on `(processor, event_id)` makes this the authoritative guard against two deliveries of
/// the same event racing past the existence check: the insert fails closed on conflict, which is surfaced as
/// `DuplicateEvent` and treated identically to "already processed".
pub async fn claim_insert(
    event: NewWebhookEvent,
    conn: &mut SqliteConnection,
) -> Result<WebhookEvent, DonationGatewayError> {
    let event_id = event.event_id.clone();
    let result: Result<WebhookEvent, sqlx::Error> = sqlx::query_as(
        r#"
            INSERT INTO webhook_events (
                processor,
                event_id,
                event_type,
                signature,
                raw_payload
            ) VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(event.processor.to_string())
    .bind(event.event_id)
    .bind(event.event_type)
    .bind(event.signature)
    .bind(event.raw_payload)
    .fetch_one(conn)
    .await;
    match result {
        Ok(event) => {
            debug!("🗃️ Webhook event [{}] claimed with id {}", event.event_id, event.id);
            Ok(event)
        },
        Err(sqlx::Error::Database(de)) if de.is_unique_violation() => {
            Err(DonationGatewayError::DuplicateEvent(event_id))
        },
        Err(e) => Err(e.into()),
    }
}

/// Marks the event `Processed` and stamps `processed_at`. Once processed, the row is never mutated again.
pub(crate) async fn set_event_processed(id: i64, conn: &mut SqliteConnection) -> Result<(), DonationGatewayError> {
    let rows = sqlx::query(
        "UPDATE webhook_events SET status = 'Processed', processed_at = CURRENT_TIMESTAMP WHERE id = $1 AND status \
         = 'Pending'",
    )
    .bind(id)
    .execute(conn)
    .await?
    .rows_affected();
    if rows == 0 {
        return Err(DonationGatewayError::WebhookEventIdNotFound(id));
    }
    Ok(())
}

/// Marks the event `Failed` with a human-readable reason for audit.
pub(crate) async fn set_event_failed(
    id: i64,
    error: &str,
    conn: &mut SqliteConnection,
) -> Result<(), DonationGatewayError> {
    let rows = sqlx::query(
        "UPDATE webhook_events SET status = 'Failed', error_message = $1, processed_at = CURRENT_TIMESTAMP WHERE id \
         = $2 AND status = 'Pending'",
    )
    .bind(error)
    .bind(id)
    .execute(conn)
    .await?
    .rows_affected();
    if rows == 0 {
        return Err(DonationGatewayError::WebhookEventIdNotFound(id));
    }
    Ok(())
}
