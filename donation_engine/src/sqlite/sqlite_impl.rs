//! `SqliteDatabase` is a concrete implementation of a donation gateway backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements the traits defined in the [`crate::traits`] module.
use std::fmt::Debug;

use log::*;
use sqlx::SqlitePool;

use super::db::{db_url, donations, new_pool, payment_transactions, run_migrations, webhook_events};
use crate::{
    db_types::{
        Donation,
        NewDonation,
        NewWebhookEvent,
        PaymentProcessor,
        PaymentTransaction,
        Reference,
        SettlementStatus,
        WebhookEvent,
    },
    traits::{DonationGatewayDatabase, DonationGatewayError},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database connection using the URL from the `DPG_DATABASE_URL` environment variable.
    pub async fn new(max_connections: u32) -> Result<Self, DonationGatewayError> {
        let url = db_url();
        Self::new_with_url(&url, max_connections).await
    }

    /// Creates a new connection pool against the given URL and applies any outstanding migrations.
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, DonationGatewayError> {
        let pool = new_pool(url, max_connections).await?;
        run_migrations(&pool).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl DonationGatewayDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn webhook_event_exists(
        &self,
        processor: PaymentProcessor,
        event_id: &str,
    ) -> Result<bool, DonationGatewayError> {
        let mut conn = self.pool.acquire().await?;
        webhook_events::event_exists(processor, event_id, &mut conn).await
    }

    async fn claim_webhook_event(&self, event: NewWebhookEvent) -> Result<WebhookEvent, DonationGatewayError> {
        let mut conn = self.pool.acquire().await?;
        webhook_events::claim_insert(event, &mut conn).await
    }

    async fn mark_webhook_event_processed(&self, event_id: i64) -> Result<(), DonationGatewayError> {
        let mut conn = self.pool.acquire().await?;
        webhook_events::set_event_processed(event_id, &mut conn).await
    }

    async fn mark_webhook_event_failed(&self, event_id: i64, error: &str) -> Result<(), DonationGatewayError> {
        let mut conn = self.pool.acquire().await?;
        webhook_events::set_event_failed(event_id, error, &mut conn).await
    }

    async fn fetch_donation_by_reference(
        &self,
        reference: &Reference,
    ) -> Result<Option<Donation>, DonationGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let donation = donations::fetch_donation_by_reference(reference, &mut conn).await?;
        Ok(donation)
    }

    async fn insert_donation(&self, donation: NewDonation) -> Result<(Donation, bool), DonationGatewayError> {
        let mut tx = self.pool.begin().await?;
        let reference = donation.reference.clone();
        let (donation, inserted) = donations::idempotent_insert(donation, &mut tx).await?;
        tx.commit().await?;
        if inserted {
            debug!("🗃️ Donation [{reference}] saved with id {}", donation.id);
        }
        Ok((donation, inserted))
    }

    /// The donation transition and the settlement mirror commit atomically, so a crash can never leave them
    /// disagreeing. The webhook event row is marked only after this commits.
    async fn mark_donation_succeeded(&self, donation_id: i64) -> Result<Donation, DonationGatewayError> {
        let mut tx = self.pool.begin().await?;
        let donation = donations::set_donation_succeeded(donation_id, &mut tx).await?;
        payment_transactions::set_status_for_donation(donation_id, SettlementStatus::Settled, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Donation [{}] is now {}", donation.reference, donation.status);
        Ok(donation)
    }

    async fn mark_donation_failed(&self, donation_id: i64, reason: &str) -> Result<Donation, DonationGatewayError> {
        let mut tx = self.pool.begin().await?;
        let donation = donations::set_donation_failed(donation_id, reason, &mut tx).await?;
        payment_transactions::set_status_for_donation(donation_id, SettlementStatus::Failed, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Donation [{}] is now {}. Reason: {reason}", donation.reference, donation.status);
        Ok(donation)
    }

    async fn fetch_payment_transaction_for_donation(
        &self,
        donation_id: i64,
    ) -> Result<Option<PaymentTransaction>, DonationGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let tx = payment_transactions::fetch_for_donation(donation_id, &mut conn).await?;
        Ok(tx)
    }

    async fn close(&mut self) -> Result<(), DonationGatewayError> {
        self.pool.close().await;
        Ok(())
    }
}
