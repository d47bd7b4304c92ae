use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{
        Donation,
        DonationStatus,
        NewDonation,
        NewWebhookEvent,
        PaymentProcessor,
        Reference,
        WebhookEvent,
        DISPUTED_REASON_PREFIX,
    },
    events::{DonationSucceededEvent, EventProducers},
    paystack_types::{EventKind, PaystackEvent},
    state_machine::{self, ReconcileAction, Transition},
    traits::{DonationGatewayDatabase, DonationGatewayError},
};

/// `WebhookFlowApi` is the primary API for reconciling verified payment-processor events against donation records.
///
/// Signature verification happens before this API is called; everything here assumes an authenticated event.
/// The flow is: dedupe against the idempotency ledger → claim the event → resolve the donation → check the amount →
/// run the state machine → record the outcome. Every donation mutation is an idempotent "set to" operation, so a
/// processor retry after a partial failure converges rather than double-applying.
pub struct WebhookFlowApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for WebhookFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WebhookFlowApi")
    }
}

impl<B> WebhookFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

/// The reconciliation result for a single verified event. The server maps these onto HTTP statuses; everything
/// except `UnknownReference` and `AmountMismatch` is an acknowledgement.
#[derive(Debug, Clone)]
pub enum ReconcileOutcome {
    /// The donation transitioned to `Success`. The donation-succeeded hook has been fired.
    Success(Donation),
    /// A failure-type transition was applied, or the event was an idempotent no-op against a matching state.
    Recorded(Donation),
    /// The event was already in the idempotency ledger. A normal consequence of at-least-once delivery.
    Duplicate,
    /// No donation matches the event's transaction reference.
    UnknownReference(Reference),
    /// The processor-reported amount differs from the amount quoted to the donor. The donation is failed and the
    /// reason records both values.
    AmountMismatch { reason: String },
    /// An unhandled event type or an anomalous transition, acknowledged so the processor stops redelivering.
    Ignored(String),
}

impl<B> WebhookFlowApi<B>
where B: DonationGatewayDatabase
{
    /// Reconcile a verified Paystack event.
    ///
    /// `raw_body` is stored verbatim on the audit record; `signature` is the header value that authenticated it.
    /// Returns an error only for storage failures (the one retryable case); every business outcome is a
    /// [`ReconcileOutcome`].
    pub async fn process_paystack_event(
        &self,
        event: PaystackEvent,
        raw_body: &str,
        signature: Option<&str>,
    ) -> Result<ReconcileOutcome, DonationGatewayError> {
        let key = event.dedupe_key();
        if self.db.webhook_event_exists(PaymentProcessor::Paystack, &key).await? {
            debug!("🔄️ Event [{key}] has been seen before. Acknowledging without effect.");
            return Ok(ReconcileOutcome::Duplicate);
        }
        let mut new_event = NewWebhookEvent::new(PaymentProcessor::Paystack, &key, &event.event, raw_body);
        if let Some(sig) = signature {
            new_event = new_event.with_signature(sig);
        }
        let claimed = match self.db.claim_webhook_event(new_event).await {
            Ok(ev) => ev,
            // A concurrent delivery won the claiming insert. Same as "seen before".
            Err(DonationGatewayError::DuplicateEvent(_)) => {
                debug!("🔄️ Lost the claim race for event [{key}]. Acknowledging without effect.");
                return Ok(ReconcileOutcome::Duplicate);
            },
            Err(e) => return Err(e),
        };
        match self.reconcile_claimed(&claimed, &event).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                if let Err(mark_err) = self.db.mark_webhook_event_failed(claimed.id, &e.to_string()).await {
                    error!("🔄️ Could not record the failure on webhook event {}. {mark_err}", claimed.id);
                }
                Err(e)
            },
        }
    }

    async fn reconcile_claimed(
        &self,
        claimed: &WebhookEvent,
        event: &PaystackEvent,
    ) -> Result<ReconcileOutcome, DonationGatewayError> {
        // Unhandled event types are acknowledged before touching any donation. The processor adds event types over
        // time and redelivering them buys nothing.
        if let EventKind::Other(name) = event.kind() {
            info!("🔄️ Unhandled Paystack event type [{name}]. Marking as processed so it is not redelivered.");
            self.db.mark_webhook_event_processed(claimed.id).await?;
            return Ok(ReconcileOutcome::Ignored(name));
        }
        let reference = event.data.reference.clone();
        let donation = match self.db.fetch_donation_by_reference(&reference).await? {
            Some(d) => d,
            None => {
                let reason = format!("No donation matches reference {reference}");
                warn!("🔄️ {reason}");
                self.db.mark_webhook_event_failed(claimed.id, &reason).await?;
                return Ok(ReconcileOutcome::UnknownReference(reference));
            },
        };
        let Some((action, failure_reason)) = build_action(event, &donation) else {
            self.db.mark_webhook_event_processed(claimed.id).await?;
            return Ok(ReconcileOutcome::Ignored(event.event.clone()));
        };
        match state_machine::next(donation.status, donation.is_disputed(), &action) {
            Transition::Apply(DonationStatus::Success) => {
                let donation = self.db.mark_donation_succeeded(donation.id).await?;
                self.db.mark_webhook_event_processed(claimed.id).await?;
                info!("🔄️ Donation [{}] for campaign #{} reconciled to Success.", donation.reference, donation.campaign_id);
                self.call_donation_succeeded_hook(&donation).await;
                Ok(ReconcileOutcome::Success(donation))
            },
            Transition::Apply(DonationStatus::Failed) => {
                let reason = failure_reason.unwrap_or_else(|| event.processor_reason());
                let donation = self.db.mark_donation_failed(donation.id, &reason).await?;
                if matches!(action, ReconcileAction::ChargeSuccess { amount_ok: false }) {
                    // Never silently accept a different amount than was quoted to the donor. The event itself is
                    // recorded as failed so the discrepancy shows up in the audit trail.
                    warn!("🔄️ {reason}");
                    self.db.mark_webhook_event_failed(claimed.id, &reason).await?;
                    Ok(ReconcileOutcome::AmountMismatch { reason })
                } else {
                    info!("🔄️ Donation [{}] reconciled to Failed. {reason}", donation.reference);
                    self.db.mark_webhook_event_processed(claimed.id).await?;
                    Ok(ReconcileOutcome::Recorded(donation))
                }
            },
            Transition::Apply(DonationStatus::Pending) => {
                Err(DonationGatewayError::PayloadError("The state machine produced an illegal transition".to_string()))
            },
            Transition::NoOp => {
                debug!("🔄️ Donation [{}] is already in the target state. Event [{}] is a no-op.", donation.reference, claimed.event_id);
                self.db.mark_webhook_event_processed(claimed.id).await?;
                Ok(ReconcileOutcome::Recorded(donation))
            },
            Transition::Conflict(msg) => {
                error!(
                    "🔄️ Anomalous event [{}] for donation [{}] (currently {}): {msg}. The terminal state is preserved.",
                    claimed.event_id, donation.reference, donation.status
                );
                self.db.mark_webhook_event_processed(claimed.id).await?;
                Ok(ReconcileOutcome::Ignored(msg.to_string()))
            },
        }
    }

    async fn call_donation_succeeded_hook(&self, donation: &Donation) {
        for emitter in &self.producers.donation_succeeded_producer {
            debug!("🔄️ Notifying donation-succeeded hook subscribers");
            let event = DonationSucceededEvent::new(donation.clone());
            emitter.publish_event(event).await;
        }
    }

    /// Record a new `Pending` donation at payment initiation. Idempotent on the reference.
    pub async fn new_donation(&self, donation: NewDonation) -> Result<(Donation, bool), DonationGatewayError> {
        self.db.insert_donation(donation).await
    }

    /// The authoritative donation record for a reference. Realtime clients re-fetch this after an invalidation
    /// signal rather than trusting notification payloads.
    pub async fn donation_by_reference(&self, reference: &Reference) -> Result<Option<Donation>, DonationGatewayError> {
        self.db.fetch_donation_by_reference(reference).await
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

/// Translate a classified event into a state-machine action, plus the failure reason to record if the action lands
/// the donation in `Failed`. Returns `None` for unhandled event types.
fn build_action(event: &PaystackEvent, donation: &Donation) -> Option<(ReconcileAction, Option<String>)> {
    let pair = match event.kind() {
        EventKind::ChargeSuccess => match event.amount() {
            Some(reported) if reported == donation.amount => (ReconcileAction::ChargeSuccess { amount_ok: true }, None),
            reported => {
                let reported = reported.map(|a| a.to_string()).unwrap_or_else(|| "no amount".to_string());
                let reason = format!(
                    "Amount mismatch for {}: expected {} {}, processor reported {reported}",
                    donation.reference, donation.amount, donation.currency
                );
                (ReconcileAction::ChargeSuccess { amount_ok: false }, Some(reason))
            },
        },
        EventKind::ChargeFailed => {
            (ReconcileAction::ChargeFailed, Some(format!("Charge failed: {}", event.processor_reason())))
        },
        EventKind::DisputeCreated => {
            let reason = format!("{DISPUTED_REASON_PREFIX}: {}", event.processor_reason());
            (ReconcileAction::DisputeCreated, Some(reason))
        },
        EventKind::DisputeResolved => {
            let merchant_won = event.dispute_resolved_for_merchant();
            (ReconcileAction::DisputeResolved { merchant_won }, None)
        },
        EventKind::RefundProcessed => {
            (ReconcileAction::RefundProcessed, Some(format!("Refunded: {}", event.processor_reason())))
        },
        EventKind::Other(_) => return None,
    };
    Some(pair)
}
