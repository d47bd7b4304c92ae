use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use dpg_common::MinorUnits;
use log::error;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(pub String);

//--------------------------------------   PaymentProcessor   ---------------------------------------------------------
/// The upstream payment processor that originated an event. Only Paystack is wired up at present, but the
/// idempotency ledger is keyed on `(processor, event_id)` so that a second processor can be added without migrating
/// existing rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PaymentProcessor {
    Paystack,
}

impl Display for PaymentProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentProcessor::Paystack => write!(f, "Paystack"),
        }
    }
}

impl FromStr for PaymentProcessor {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Paystack" => Ok(Self::Paystack),
            s => Err(ConversionError(format!("Invalid payment processor: {s}"))),
        }
    }
}

//--------------------------------------    DonationStatus    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum DonationStatus {
    /// The donor has initiated payment, but no verified processor event has arrived yet.
    Pending,
    /// A verified `charge.success` event with a matching amount has been reconciled.
    Success,
    /// The charge failed, the amount did not match, or the payment was disputed or refunded.
    Failed,
}

impl Display for DonationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DonationStatus::Pending => write!(f, "Pending"),
            DonationStatus::Success => write!(f, "Success"),
            DonationStatus::Failed => write!(f, "Failed"),
        }
    }
}

impl FromStr for DonationStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Success" => Ok(Self::Success),
            "Failed" => Ok(Self::Failed),
            s => Err(ConversionError(format!("Invalid donation status: {s}"))),
        }
    }
}

impl From<String> for DonationStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid donation status: {value}. But this conversion cannot fail. Defaulting to Pending");
            DonationStatus::Pending
        })
    }
}

//--------------------------------------  WebhookEventStatus  ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum WebhookEventStatus {
    /// The event row has been claimed, but reconciliation has not completed. A crash leaves the row in this state,
    /// and a processor redelivery will safely re-apply the (idempotent) effects.
    Pending,
    /// Reconciliation completed. The row is never mutated again.
    Processed,
    /// Reconciliation reached a terminal business failure. The error message carries the reason for audit.
    Failed,
}

impl Display for WebhookEventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WebhookEventStatus::Pending => write!(f, "Pending"),
            WebhookEventStatus::Processed => write!(f, "Processed"),
            WebhookEventStatus::Failed => write!(f, "Failed"),
        }
    }
}

impl FromStr for WebhookEventStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Processed" => Ok(Self::Processed),
            "Failed" => Ok(Self::Failed),
            s => Err(ConversionError(format!("Invalid webhook event status: {s}"))),
        }
    }
}

//--------------------------------------   SettlementStatus   ---------------------------------------------------------
/// Settlement-side status of a payment transaction, mirrored from the processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum SettlementStatus {
    Pending,
    Settled,
    Failed,
}

impl Display for SettlementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettlementStatus::Pending => write!(f, "Pending"),
            SettlementStatus::Settled => write!(f, "Settled"),
            SettlementStatus::Failed => write!(f, "Failed"),
        }
    }
}

//--------------------------------------      Reference       ---------------------------------------------------------
/// The correlation identifier shared between a donation and the processor's transaction. This is the join key
/// between an inbound event and its domain entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Reference(pub String);

impl FromStr for Reference {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for Reference {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Reference {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Reference {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------       Donation       ---------------------------------------------------------
/// The reconciled business entity. `amount`, `currency` and `campaign_id` are set at creation and never altered by
/// webhook processing; reconciliation may only transition `status` and stamp the terminal timestamps.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Donation {
    pub id: i64,
    pub campaign_id: i64,
    pub amount: MinorUnits,
    pub currency: String,
    pub reference: Reference,
    pub status: DonationStatus,
    pub payment_transaction_id: Option<i64>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Donation {
    /// A `Failed` donation is in the disputed sub-state when its failure reason was written by a dispute event.
    /// `dispute.resolve` may only restore donations that got here via `dispute.create`.
    pub fn is_disputed(&self) -> bool {
        self.status == DonationStatus::Failed
            && self.failure_reason.as_deref().map(|r| r.starts_with(DISPUTED_REASON_PREFIX)).unwrap_or(false)
    }
}

/// Prefix for failure reasons written by `dispute.create`, checked by the state machine on `dispute.resolve`.
pub const DISPUTED_REASON_PREFIX: &str = "disputed";

//--------------------------------------      NewDonation     ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDonation {
    pub campaign_id: i64,
    /// The donation amount, in minor units. Quoted to the donor at initiation and immutable thereafter.
    pub amount: MinorUnits,
    pub currency: String,
    /// The processor transaction reference. Unique per donation.
    pub reference: Reference,
}

impl NewDonation {
    pub fn new(campaign_id: i64, amount: MinorUnits, currency: &str, reference: Reference) -> Self {
        Self { campaign_id, amount, currency: currency.to_string(), reference }
    }
}

//--------------------------------------     WebhookEvent     ---------------------------------------------------------
/// Immutable audit and idempotency record for an inbound processor event. `(processor, event_id)` is unique; rows
/// are never deleted.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: i64,
    pub processor: PaymentProcessor,
    /// The processor-supplied event identifier, or a synthetic `{event_type}:{reference}` key when the processor
    /// does not supply one. This is the dedupe key.
    pub event_id: String,
    pub event_type: String,
    pub signature: Option<String>,
    /// The raw request body, stored verbatim for replay and audit. Re-serializing it would break the HMAC.
    pub raw_payload: String,
    pub status: WebhookEventStatus,
    pub error_message: Option<String>,
    pub received_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewWebhookEvent {
    pub processor: PaymentProcessor,
    pub event_id: String,
    pub event_type: String,
    pub signature: Option<String>,
    pub raw_payload: String,
}

impl NewWebhookEvent {
    pub fn new(processor: PaymentProcessor, event_id: &str, event_type: &str, raw_payload: &str) -> Self {
        Self {
            processor,
            event_id: event_id.to_string(),
            event_type: event_type.to_string(),
            signature: None,
            raw_payload: raw_payload.to_string(),
        }
    }

    pub fn with_signature(mut self, signature: &str) -> Self {
        self.signature = Some(signature.to_string());
        self
    }
}

//--------------------------------------  PaymentTransaction  ---------------------------------------------------------
/// Settlement-side ledger entry, linked 1:1 to a donation where applicable and updated alongside it.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub id: i64,
    pub donation_id: i64,
    pub reference: Reference,
    pub amount: MinorUnits,
    pub currency: String,
    pub status: SettlementStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
