use thiserror::Error;

use crate::db_types::{
    Donation,
    NewDonation,
    NewWebhookEvent,
    PaymentProcessor,
    PaymentTransaction,
    Reference,
    WebhookEvent,
};

/// This trait defines the storage behaviour backends must provide to support the donation payment engine.
///
/// This behaviour includes:
/// * The idempotency ledger of inbound webhook events, keyed on `(processor, event_id)`.
/// * Resolving donations by their processor reference.
/// * The idempotent "set status to" mutations the reconciler applies.
///
/// All coordination between concurrent reconciler instances happens here: the claiming insert of a webhook event
/// is backed by a unique constraint, so of two processes racing on the same event id exactly one wins and the
/// loser sees [`DonationGatewayError::DuplicateEvent`].
#[allow(async_fn_in_trait)]
pub trait DonationGatewayDatabase: Clone {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Returns true if an event with this `(processor, event_id)` has already been recorded. This is the cheap
    /// short-circuit for redeliveries; the claiming insert below remains the authoritative guard.
    async fn webhook_event_exists(
        &self,
        processor: PaymentProcessor,
        event_id: &str,
    ) -> Result<bool, DonationGatewayError>;

    /// Inserts the webhook event with `Pending` status, claiming it for this process. This insert is the commit
    /// point: it must happen before any donation mutation, and it fails closed with
    /// [`DonationGatewayError::DuplicateEvent`] when the `(processor, event_id)` row already exists.
    async fn claim_webhook_event(&self, event: NewWebhookEvent) -> Result<WebhookEvent, DonationGatewayError>;

    /// Marks the webhook event `Processed` and stamps `processed_at`. Terminal; the row is never mutated again.
    async fn mark_webhook_event_processed(&self, event_id: i64) -> Result<(), DonationGatewayError>;

    /// Marks the webhook event `Failed` with a human-readable reason for audit.
    async fn mark_webhook_event_failed(&self, event_id: i64, error: &str) -> Result<(), DonationGatewayError>;

    /// Fetches the donation whose `reference` matches the processor's transaction reference.
    async fn fetch_donation_by_reference(
        &self,
        reference: &Reference,
    ) -> Result<Option<Donation>, DonationGatewayError>;

    /// Creates a new `Pending` donation. Called when a donor initiates payment, not by the reconciler. The call is
    /// idempotent on `reference`; the second element is false if the donation already existed.
    async fn insert_donation(&self, donation: NewDonation) -> Result<(Donation, bool), DonationGatewayError>;

    /// Sets the donation to `Success`, stamps `completed_at`, clears any failure fields, and settles the linked
    /// payment transaction if present. A single atomic transaction; safe to re-apply.
    async fn mark_donation_succeeded(&self, donation_id: i64) -> Result<Donation, DonationGatewayError>;

    /// Sets the donation to `Failed` with the given reason, stamps `failed_at`, and fails the linked payment
    /// transaction if present. A single atomic transaction; safe to re-apply.
    async fn mark_donation_failed(&self, donation_id: i64, reason: &str) -> Result<Donation, DonationGatewayError>;

    /// Fetches the payment transaction linked to a donation, if any.
    async fn fetch_payment_transaction_for_donation(
        &self,
        donation_id: i64,
    ) -> Result<Option<PaymentTransaction>, DonationGatewayError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), DonationGatewayError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum DonationGatewayError {
    #[error("We have an internal database engine problem (configuration/uptime etc.): {0}")]
    DatabaseError(String),
    #[error("Event {0} has already been recorded in the idempotency ledger")]
    DuplicateEvent(String),
    #[error("No donation exists for reference {0}")]
    DonationNotFound(Reference),
    #[error("The requested donation (internal id {0}) does not exist")]
    DonationIdNotFound(i64),
    #[error("Cannot insert donation, since it already exists with reference {0}")]
    DonationAlreadyExists(Reference),
    #[error("The requested webhook event (internal id {0}) does not exist")]
    WebhookEventIdNotFound(i64),
    #[error("Could not parse the event payload. {0}")]
    PayloadError(String),
}

impl From<sqlx::Error> for DonationGatewayError {
    fn from(e: sqlx::Error) -> Self {
        DonationGatewayError::DatabaseError(e.to_string())
    }
}
