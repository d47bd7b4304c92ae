use donation_engine::{
    db_types::{
        Donation,
        NewDonation,
        NewWebhookEvent,
        PaymentProcessor,
        PaymentTransaction,
        Reference,
        WebhookEvent,
    },
    traits::{DonationGatewayDatabase, DonationGatewayError},
};
use mockall::mock;

mock! {
    pub DonationDb {}

    impl Clone for DonationDb {
        fn clone(&self) -> Self;
    }

    impl DonationGatewayDatabase for DonationDb {
        fn url(&self) -> &str;
        async fn webhook_event_exists(&self, processor: PaymentProcessor, event_id: &str) -> Result<bool, DonationGatewayError>;
        async fn claim_webhook_event(&self, event: NewWebhookEvent) -> Result<WebhookEvent, DonationGatewayError>;
        async fn mark_webhook_event_processed(&self, event_id: i64) -> Result<(), DonationGatewayError>;
        async fn mark_webhook_event_failed(&self, event_id: i64, error: &str) -> Result<(), DonationGatewayError>;
        async fn fetch_donation_by_reference(&self, reference: &Reference) -> Result<Option<Donation>, DonationGatewayError>;
        async fn insert_donation(&self, donation: NewDonation) -> Result<(Donation, bool), DonationGatewayError>;
        async fn mark_donation_succeeded(&self, donation_id: i64) -> Result<Donation, DonationGatewayError>;
        async fn mark_donation_failed(&self, donation_id: i64, reason: &str) -> Result<Donation, DonationGatewayError>;
        async fn fetch_payment_transaction_for_donation(&self, donation_id: i64) -> Result<Option<PaymentTransaction>, DonationGatewayError>;
        async fn close(&mut self) -> Result<(), DonationGatewayError>;
    }
}
