use serde::{Deserialize, Serialize};

use crate::db_types::Donation;

/// Emitted when a donation is reconciled to `Success`. The payload is advisory: subscribers that fan this out to
/// live viewers send an invalidation signal, and clients re-fetch authoritative state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonationSucceededEvent {
    pub donation: Donation,
}

impl DonationSucceededEvent {
    pub fn new(donation: Donation) -> Self {
        Self { donation }
    }

    pub fn campaign_id(&self) -> i64 {
        self.donation.campaign_id
    }
}
