use clap::{Args, Parser, Subcommand};
use dotenvy::dotenv;

mod live;
mod webhook;

#[derive(Parser, Debug)]
#[command(version = "0.1.0", about = "Companion tools for the donation payment gateway")]
pub struct Arguments {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    #[clap(name = "webhook", about = "Send a signed Paystack-style test event to a gateway server")]
    Webhook(WebhookParams),
    #[clap(name = "sign", about = "Print the webhook signature for a raw payload")]
    Sign(SignParams),
    #[clap(name = "live", about = "Follow a campaign's live notification stream")]
    Live(LiveParams),
}

#[derive(Debug, Args)]
pub struct WebhookParams {
    /// The gateway server's base URL
    #[arg(short = 'u', long = "url", default_value = "http://127.0.0.1:8480")]
    url: String,
    /// The webhook secret. Falls back to DPG_PAYSTACK_SECRET_KEY.
    #[arg(short = 's', long = "secret")]
    secret: Option<String>,
    /// The event type to send
    #[arg(short = 'e', long = "event", default_value = "charge.success")]
    event: String,
    /// The processor event id. Omit to send an id-less event.
    #[arg(short = 'i', long = "id")]
    event_id: Option<String>,
    /// The donation reference
    #[arg(short = 'r', long = "reference")]
    reference: String,
    /// The amount, in minor units
    #[arg(short = 'a', long = "amount")]
    amount: Option<i64>,
    /// The currency code
    #[arg(short = 'c', long = "currency", default_value = "GHS")]
    currency: String,
    /// The processor status field, e.g. "resolved" for dispute resolutions
    #[arg(long = "status")]
    status: Option<String>,
}

#[derive(Debug, Args)]
pub struct SignParams {
    /// The webhook secret. Falls back to DPG_PAYSTACK_SECRET_KEY.
    #[arg(short = 's', long = "secret")]
    secret: Option<String>,
    /// The raw payload to sign, byte-for-byte
    #[arg(short = 'p', long = "payload")]
    payload: String,
}

#[derive(Debug, Args)]
pub struct LiveParams {
    /// The gateway server's websocket base URL
    #[arg(short = 'u', long = "url", default_value = "ws://127.0.0.1:8480")]
    url: String,
    /// The campaign to follow
    #[arg(short = 'c', long = "campaign")]
    campaign_id: i64,
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::init();
    let cli = Arguments::parse();
    match cli.command {
        Command::Webhook(params) => webhook::send_test_event(params).await,
        Command::Sign(params) => webhook::print_signature(params),
        Command::Live(params) => live::follow_campaign(params).await,
    }
}
