use std::collections::HashMap;

use futures::future::BoxFuture;
use log::*;
use tokio::sync::{mpsc, oneshot};

use crate::data_objects::LiveMessage;

/// The peer went away. There is nothing to do with a closed connection except drop it.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionClosed;

/// One live realtime connection, as the broadcaster sees it.
///
/// `actix_ws::Session` is the production implementation. Tests substitute fakes, including ones that fail on
/// send, to exercise partial-failure fan-out.
pub trait LiveConnection: Send + 'static {
    fn send_text(&mut self, text: String) -> BoxFuture<'_, Result<(), ConnectionClosed>>;
}

impl LiveConnection for actix_ws::Session {
    fn send_text(&mut self, text: String) -> BoxFuture<'_, Result<(), ConnectionClosed>> {
        Box::pin(async move { self.text(text).await.map_err(|_| ConnectionClosed) })
    }
}

pub enum Command<C> {
    /// Register a new viewer. Replies with the token used to deregister it later.
    Accept { conn: C, reply: oneshot::Sender<u64> },
    /// The viewer's connection closed. Deregistration has no other side effect.
    Closed { conn_id: u64 },
    /// Fan a message out to every registered viewer. Replies with the number of recipients attempted.
    Broadcast { message: LiveMessage, reply: oneshot::Sender<usize> },
}

/// The per-campaign broadcaster task.
///
/// All commands for one campaign flow through one inbox, so the connection set needs no lock. The task exits
/// when its set empties; the registry respawns it on the next registration.
pub struct CampaignBroadcaster<C> {
    campaign_id: i64,
    connections: HashMap<u64, C>,
    next_conn_id: u64,
    inbox: mpsc::Receiver<Command<C>>,
}

impl<C: LiveConnection> CampaignBroadcaster<C> {
    pub fn spawn(campaign_id: i64, buffer_size: usize) -> mpsc::Sender<Command<C>> {
        let (tx, inbox) = mpsc::channel(buffer_size);
        let actor = Self { campaign_id, connections: HashMap::new(), next_conn_id: 0, inbox };
        tokio::spawn(actor.run());
        tx
    }

    async fn run(mut self) {
        debug!("📡️ Broadcaster for campaign #{} started.", self.campaign_id);
        while let Some(cmd) = self.inbox.recv().await {
            match cmd {
                Command::Accept { conn, reply } => {
                    let conn_id = self.next_conn_id;
                    self.next_conn_id += 1;
                    self.connections.insert(conn_id, conn);
                    debug!(
                        "📡️ Campaign #{}: viewer {conn_id} connected. {} viewer(s) live.",
                        self.campaign_id,
                        self.connections.len()
                    );
                    let _ = reply.send(conn_id);
                },
                Command::Closed { conn_id } => {
                    self.connections.remove(&conn_id);
                    debug!(
                        "📡️ Campaign #{}: viewer {conn_id} disconnected. {} viewer(s) live.",
                        self.campaign_id,
                        self.connections.len()
                    );
                    if self.connections.is_empty() {
                        break;
                    }
                },
                Command::Broadcast { message, reply } => {
                    let attempted = self.fan_out(&message).await;
                    let _ = reply.send(attempted);
                    if self.connections.is_empty() {
                        break;
                    }
                },
            }
        }
        debug!("📡️ Broadcaster for campaign #{} stopped.", self.campaign_id);
    }

    /// Delivers the message to every registered viewer. A failed send evicts that viewer and never aborts
    /// delivery to the rest. Returns the number of recipients attempted, including the ones that failed.
    async fn fan_out(&mut self, message: &LiveMessage) -> usize {
        let payload = match serde_json::to_string(message) {
            Ok(p) => p,
            Err(e) => {
                error!("📡️ Campaign #{}: could not serialize a live message. {e}", self.campaign_id);
                return 0;
            },
        };
        let attempted = self.connections.len();
        let mut dead = Vec::new();
        for (conn_id, conn) in self.connections.iter_mut() {
            if conn.send_text(payload.clone()).await.is_err() {
                warn!("📡️ Campaign #{}: dropping viewer {conn_id}. The peer is gone.", self.campaign_id);
                dead.push(*conn_id);
            }
        }
        for conn_id in dead {
            self.connections.remove(&conn_id);
        }
        attempted
    }
}
