use std::{collections::HashMap, sync::Arc};

use log::*;
use tokio::sync::{mpsc, oneshot, Mutex};

use crate::{
    broadcaster::actor::{CampaignBroadcaster, Command, LiveConnection},
    data_objects::LiveMessage,
};

const COMMAND_BUFFER_SIZE: usize = 32;

/// Directory of live per-campaign broadcasters, addressed by campaign id.
///
/// An actor is created on the first registration for a campaign and evicts itself once its connection set
/// empties. Eviction is always safe: no state is expected to survive it, so the registry just respawns the actor
/// on the next registration. Broadcasts to a campaign with no live actor report zero recipients.
pub struct BroadcasterRegistry<C> {
    channels: Arc<Mutex<HashMap<i64, mpsc::Sender<Command<C>>>>>,
}

impl<C> Clone for BroadcasterRegistry<C> {
    fn clone(&self) -> Self {
        Self { channels: Arc::clone(&self.channels) }
    }
}

impl<C> Default for BroadcasterRegistry<C> {
    fn default() -> Self {
        Self { channels: Arc::new(Mutex::new(HashMap::new())) }
    }
}

impl<C: LiveConnection> BroadcasterRegistry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new viewer for the campaign, returning the token that deregisters it.
    ///
    /// A registration can race with the actor evicting itself; losing that race is handled by spawning a fresh
    /// actor and retrying once.
    pub async fn register(&self, campaign_id: i64, conn: C) -> Option<u64> {
        let mut conn = Some(conn);
        for respawn in [false, true] {
            let tx = self.channel_for(campaign_id, respawn).await;
            let (reply, rx) = oneshot::channel();
            let c = conn.take()?;
            match tx.send(Command::Accept { conn: c, reply }).await {
                Ok(()) => match rx.await {
                    Ok(conn_id) => return Some(conn_id),
                    // The actor stopped with the command still queued. The connection went down with it, so a
                    // retry needs a fresh one and we don't have it. The client will reconnect.
                    Err(_) => return None,
                },
                Err(mpsc::error::SendError(Command::Accept { conn: c, .. })) => {
                    conn = Some(c);
                },
                Err(_) => return None,
            }
        }
        warn!("📡️ Could not register a viewer for campaign #{campaign_id}.");
        None
    }

    /// Removes a viewer from its campaign's broadcaster. A no-op if the actor is already gone, except that a
    /// stopped actor's stale entry is swept out of the directory, as on the broadcast path.
    pub async fn deregister(&self, campaign_id: i64, conn_id: u64) {
        let tx = { self.channels.lock().await.get(&campaign_id).cloned() };
        if let Some(tx) = tx {
            if tx.send(Command::Closed { conn_id }).await.is_err() {
                self.sweep(campaign_id).await;
            }
        }
    }

    pub async fn broadcast_donation_success(&self, donation_id: i64, campaign_id: i64) -> usize {
        self.broadcast(campaign_id, LiveMessage::DonationSuccess { donation_id, campaign_id }).await
    }

    pub async fn broadcast_campaign_updated(&self, campaign_id: i64) -> usize {
        self.broadcast(campaign_id, LiveMessage::CampaignUpdated { campaign_id }).await
    }

    /// Fans a message out to every live viewer of the campaign. Returns the number of recipients attempted,
    /// which is zero when the campaign has no live broadcaster.
    async fn broadcast(&self, campaign_id: i64, message: LiveMessage) -> usize {
        let tx = { self.channels.lock().await.get(&campaign_id).cloned() };
        let Some(tx) = tx else {
            debug!("📡️ No live viewers for campaign #{campaign_id}.");
            return 0;
        };
        let (reply, rx) = oneshot::channel();
        if tx.send(Command::Broadcast { message, reply }).await.is_err() {
            self.sweep(campaign_id).await;
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    /// Fetches the campaign's command channel, spawning the actor when there is none (or a stale one).
    async fn channel_for(&self, campaign_id: i64, force_respawn: bool) -> mpsc::Sender<Command<C>> {
        let mut channels = self.channels.lock().await;
        let live = channels.get(&campaign_id).filter(|tx| !force_respawn && !tx.is_closed()).cloned();
        match live {
            Some(tx) => tx,
            None => {
                let tx = CampaignBroadcaster::spawn(campaign_id, COMMAND_BUFFER_SIZE);
                channels.insert(campaign_id, tx.clone());
                tx
            },
        }
    }

    /// Drops the registry entry for an actor that has stopped.
    async fn sweep(&self, campaign_id: i64) {
        let mut channels = self.channels.lock().await;
        if channels.get(&campaign_id).map(|tx| tx.is_closed()).unwrap_or(false) {
            channels.remove(&campaign_id);
        }
    }
}
