use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Into<String>>(message: S) -> Self {
        Self { success: true, message: message.into() }
    }

    pub fn failure<S: Into<String>>(message: S) -> Self {
        Self { success: false, message: message.into() }
    }
}

/// The messages pushed to live campaign viewers.
///
/// These are advisory invalidation signals, not a source of truth. A client that receives one (or misses one)
/// re-fetches the authoritative donation or campaign record rather than trusting the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LiveMessage {
    #[serde(rename = "DONATION_SUCCESS", rename_all = "camelCase")]
    DonationSuccess { donation_id: i64, campaign_id: i64 },
    #[serde(rename = "CAMPAIGN_UPDATED", rename_all = "camelCase")]
    CampaignUpdated { campaign_id: i64 },
}
