mod webhook_flow_api;

pub use webhook_flow_api::{ReconcileOutcome, WebhookFlowApi};
