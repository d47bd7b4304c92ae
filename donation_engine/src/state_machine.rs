//! The donation lifecycle state machine.
//!
//! A donation moves from `Pending` to `Success` or `Failed` exactly once under reconciliation. `Success` can only
//! regress to `Failed` through an explicit dispute or refund event, and a disputed `Failed` can be restored to
//! `Success` when the dispute resolves in the merchant's favour.
//!
//! The transition function is pure: it looks at the current status (plus the disputed sub-state) and the incoming
//! action, and answers with what the reconciler should do. Duplicate deliveries whose target state already holds
//! are no-ops, not errors. A genuinely conflicting transition is reported as such so the reconciler can log the
//! anomaly without overwriting a terminal state.
use crate::db_types::DonationStatus;

/// A reconciliation action derived from a verified, classified processor event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileAction {
    /// `charge.success`, with the amount check already performed against the donation record.
    ChargeSuccess { amount_ok: bool },
    ChargeFailed,
    DisputeCreated,
    DisputeResolved { merchant_won: bool },
    RefundProcessed,
}

/// What the reconciler should do with the donation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Apply the idempotent "set status to" mutation.
    Apply(DonationStatus),
    /// The donation is already in the target state. Acknowledge and do nothing.
    NoOp,
    /// The action is not valid from the current state and the target does not match either. Log the anomaly, do
    /// not touch the donation.
    Conflict(&'static str),
}

/// The transition table.
///
/// | Action                      | Valid prior states | New state          |
/// |-----------------------------|--------------------|--------------------|
/// | charge.success (amount OK)  | Pending            | Success            |
/// | charge.success (mismatch)   | Pending            | Failed             |
/// | charge.failed               | Pending            | Failed             |
/// | dispute.create              | Success            | Failed (disputed)  |
/// | dispute.resolve (resolved)  | Failed (disputed)  | Success            |
/// | dispute.resolve (lost)      | Failed (disputed)  | Failed (unchanged) |
/// | refund.processed            | Success            | Failed             |
pub fn next(current: DonationStatus, disputed: bool, action: &ReconcileAction) -> Transition {
    use DonationStatus::*;
    match (action, current) {
        (ReconcileAction::ChargeSuccess { amount_ok: true }, Pending) => Transition::Apply(Success),
        (ReconcileAction::ChargeSuccess { amount_ok: true }, Success) => Transition::NoOp,
        (ReconcileAction::ChargeSuccess { amount_ok: true }, Failed) => {
            Transition::Conflict("charge.success for a donation already in Failed")
        },
        (ReconcileAction::ChargeSuccess { amount_ok: false }, Pending) => Transition::Apply(Failed),
        (ReconcileAction::ChargeSuccess { amount_ok: false }, Failed) => Transition::NoOp,
        (ReconcileAction::ChargeSuccess { amount_ok: false }, Success) => {
            Transition::Conflict("mismatched charge.success for a donation already in Success")
        },
        (ReconcileAction::ChargeFailed, Pending) => Transition::Apply(Failed),
        (ReconcileAction::ChargeFailed, Failed) => Transition::NoOp,
        (ReconcileAction::ChargeFailed, Success) => {
            Transition::Conflict("charge.failed cannot regress a Success donation without a dispute or refund")
        },
        (ReconcileAction::DisputeCreated, Success) => Transition::Apply(Failed),
        (ReconcileAction::DisputeCreated, Failed) => Transition::NoOp,
        (ReconcileAction::DisputeCreated, Pending) => {
            Transition::Conflict("dispute.create for a donation that never succeeded")
        },
        (ReconcileAction::DisputeResolved { merchant_won: true }, Failed) if disputed => Transition::Apply(Success),
        (ReconcileAction::DisputeResolved { merchant_won: true }, Success) => Transition::NoOp,
        (ReconcileAction::DisputeResolved { merchant_won: true }, _) => {
            Transition::Conflict("dispute.resolve for a donation that is not disputed")
        },
        (ReconcileAction::DisputeResolved { merchant_won: false }, Failed) if disputed => Transition::NoOp,
        (ReconcileAction::DisputeResolved { merchant_won: false }, _) => {
            Transition::Conflict("lost dispute.resolve for a donation that is not disputed")
        },
        (ReconcileAction::RefundProcessed, Success) => Transition::Apply(Failed),
        (ReconcileAction::RefundProcessed, Failed) => Transition::NoOp,
        (ReconcileAction::RefundProcessed, Pending) => {
            Transition::Conflict("refund.processed for a donation that never succeeded")
        },
    }
}
