//! Donation Payment Engine
//!
//! The donation payment engine is the core of the donation gateway. It reconciles payment-processor webhook events
//! against donation records exactly once, despite at-least-once delivery, and emits events that downstream
//! components (such as the realtime campaign broadcaster) can subscribe to.
//!
//! The library is divided into three main sections:
//! 1. Database management ([`SqliteDatabase`]). SQLite is the supported backend. You should never need to access
//!    the database directly; use the flow API instead. The exception is the data types used in the database, which
//!    are defined in [`mod@db_types`] and are public.
//! 2. The reconciliation API. [`WebhookFlowApi`] drives a verified webhook event through the
//!    idempotency ledger and the donation state machine, recording the outcome durably. Backends implement the
//!    traits in [`mod@traits`] to plug in.
//! 3. The event hook system ([`mod@events`]). When a donation is reconciled to `Success`, a
//!    `DonationSucceededEvent` is emitted. A small actor framework lets you hook into these events and perform
//!    custom actions, such as broadcasting to live viewers.
pub mod db_types;
pub mod events;
pub mod paystack_types;
pub mod state_machine;
pub mod traits;

mod flow_api;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use flow_api::{ReconcileOutcome, WebhookFlowApi};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
