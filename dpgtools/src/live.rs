use std::time::Duration;

use futures::StreamExt;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::LiveParams;

const MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Follows a campaign's notification stream, printing each message as it arrives.
///
/// The server may evict an idle broadcaster or restart at any time; the client reconnects with bounded backoff
/// and gives up after a fixed number of consecutive failures. Nothing is replayed on reconnect. The messages are
/// invalidation signals, so a fresh subscription loses nothing that a re-fetch would not recover.
pub async fn follow_campaign(params: LiveParams) {
    let url = format!("{}/live/{}", params.url.trim_end_matches('/'), params.campaign_id);
    let mut attempts = 0u32;
    loop {
        match connect_async(url.as_str()).await {
            Ok((mut stream, _)) => {
                attempts = 0;
                println!("Connected to {url}. Waiting for notifications...");
                while let Some(msg) = stream.next().await {
                    match msg {
                        Ok(Message::Text(text)) => println!("{text}"),
                        Ok(Message::Close(_)) => break,
                        Ok(_) => {},
                        Err(e) => {
                            eprintln!("Connection error. {e}");
                            break;
                        },
                    }
                }
                println!("Disconnected.");
            },
            Err(e) => eprintln!("Could not connect to {url}. {e}"),
        }
        attempts += 1;
        if attempts > MAX_RECONNECT_ATTEMPTS {
            eprintln!("Giving up after {MAX_RECONNECT_ATTEMPTS} reconnection attempts.");
            return;
        }
        let delay = Duration::from_secs(1 << attempts.min(4));
        println!("Reconnecting in {}s...", delay.as_secs());
        tokio::time::sleep(delay).await;
    }
}
