//! Paystack webhook event envelope.
//!
//! The envelope is parsed once at the boundary into a typed structure, and the free-form `event` string is
//! classified into [`EventKind`], a tagged union with an explicit catch-all variant. Paystack adds event types over
//! time; unrecognised ones land in [`EventKind::Other`] and are acknowledged without side effects so the processor
//! stops redelivering them.
use dpg_common::MinorUnits;
use serde::{Deserialize, Serialize};

use crate::db_types::Reference;

/// The JSON envelope Paystack posts to the webhook endpoint:
/// `{ "event": "...", "id": ..., "data": { "reference": ..., "amount": ..., ... } }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaystackEvent {
    pub event: String,
    /// Paystack does not include a stable event id on every event type.
    #[serde(default)]
    pub id: Option<String>,
    pub data: PaystackEventData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaystackEventData {
    pub reference: Reference,
    /// Amount in minor units, as reported by the processor.
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    /// Paystack's human-readable gateway response, e.g. "Declined by bank".
    #[serde(default)]
    pub gateway_response: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl PaystackEvent {
    pub fn from_slice(raw: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(raw)
    }

    /// The idempotency key for this event. Prefers the processor-supplied id; events without one get a synthetic
    /// key derived from the event type and transaction reference, so an id-less redelivery still deduplicates.
    pub fn dedupe_key(&self) -> String {
        match &self.id {
            Some(id) => id.clone(),
            None => format!("{}:{}", self.event, self.data.reference),
        }
    }

    pub fn kind(&self) -> EventKind {
        EventKind::classify(&self.event)
    }

    pub fn amount(&self) -> Option<MinorUnits> {
        self.data.amount.map(MinorUnits::from)
    }

    /// The processor's stated reason for a failure-type event, falling back to its status field.
    pub fn processor_reason(&self) -> String {
        self.data
            .gateway_response
            .clone()
            .or_else(|| self.data.status.clone())
            .unwrap_or_else(|| self.event.clone())
    }

    /// Whether a `dispute.resolve` event was resolved in the merchant's favour.
    pub fn dispute_resolved_for_merchant(&self) -> bool {
        self.data.status.as_deref().map(|s| s.eq_ignore_ascii_case("resolved")).unwrap_or(false)
    }
}

//--------------------------------------       EventKind      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    ChargeSuccess,
    ChargeFailed,
    DisputeCreated,
    DisputeResolved,
    RefundProcessed,
    /// Any event type we do not explicitly handle. Acknowledged and marked processed, never retried.
    Other(String),
}

impl EventKind {
    pub fn classify(event: &str) -> Self {
        match event {
            "charge.success" => Self::ChargeSuccess,
            "charge.failed" => Self::ChargeFailed,
            "charge.dispute.create" | "dispute.create" => Self::DisputeCreated,
            "charge.dispute.resolve" | "dispute.resolve" => Self::DisputeResolved,
            "refund.processed" => Self::RefundProcessed,
            other => Self::Other(other.to_string()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const CHARGE_SUCCESS: &str = r#"{
        "event": "charge.success",
        "id": "evt_001",
        "data": {
            "reference": "R1",
            "amount": 10000,
            "currency": "GHS",
            "status": "success",
            "gateway_response": "Approved",
            "metadata": {"campaign": "clean-water"}
        }
    }"#;

    #[test]
    fn parse_charge_success() {
        let event = PaystackEvent::from_slice(CHARGE_SUCCESS.as_bytes()).unwrap();
        assert_eq!(event.kind(), EventKind::ChargeSuccess);
        assert_eq!(event.dedupe_key(), "evt_001");
        assert_eq!(event.amount(), Some(10_000.into()));
        assert_eq!(event.data.reference.as_str(), "R1");
        assert_eq!(event.data.currency.as_deref(), Some("GHS"));
    }

    #[test]
    fn synthetic_dedupe_key_without_id() {
        let raw = r#"{"event": "charge.failed", "data": {"reference": "R9"}}"#;
        let event = PaystackEvent::from_slice(raw.as_bytes()).unwrap();
        assert_eq!(event.dedupe_key(), "charge.failed:R9");
        assert_eq!(event.amount(), None);
    }

    #[test]
    fn classify_event_types() {
        assert_eq!(EventKind::classify("charge.success"), EventKind::ChargeSuccess);
        assert_eq!(EventKind::classify("charge.dispute.create"), EventKind::DisputeCreated);
        assert_eq!(EventKind::classify("dispute.resolve"), EventKind::DisputeResolved);
        assert_eq!(EventKind::classify("refund.processed"), EventKind::RefundProcessed);
        assert_eq!(EventKind::classify("some.future.event"), EventKind::Other("some.future.event".to_string()));
    }

    #[test]
    fn dispute_resolution_status() {
        let raw = r#"{"event": "charge.dispute.resolve", "data": {"reference": "R2", "status": "Resolved"}}"#;
        let event = PaystackEvent::from_slice(raw.as_bytes()).unwrap();
        assert!(event.dispute_resolved_for_merchant());
        let raw = r#"{"event": "charge.dispute.resolve", "data": {"reference": "R2", "status": "lost"}}"#;
        let event = PaystackEvent::from_slice(raw.as_bytes()).unwrap();
        assert!(!event.dispute_resolved_for_merchant());
    }

    #[test]
    fn processor_reason_fallbacks() {
        let raw = r#"{"event": "charge.failed", "data": {"reference": "R3", "gateway_response": "Declined by bank"}}"#;
        let event = PaystackEvent::from_slice(raw.as_bytes()).unwrap();
        assert_eq!(event.processor_reason(), "Declined by bank");
        let raw = r#"{"event": "charge.failed", "data": {"reference": "R3", "status": "failed"}}"#;
        let event = PaystackEvent::from_slice(raw.as_bytes()).unwrap();
        assert_eq!(event.processor_reason(), "failed");
        let raw = r#"{"event": "charge.failed", "data": {"reference": "R3"}}"#;
        let event = PaystackEvent::from_slice(raw.as_bytes()).unwrap();
        assert_eq!(event.processor_reason(), "charge.failed");
    }
}
