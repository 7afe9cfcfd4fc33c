//! Terminal viewer: connects to the gateway socket and prints every
//! broadcast payload as labelled lines.
//!
//! Usage: `fanout-tail [ws-url]` (default `$FANOUT_WS_URL`, then
//! `ws://localhost:4010/gateway`).

use futures_util::StreamExt;
use tokio_tungstenite::tungstenite::Message;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fanout_common::render::format_message;

const DEFAULT_URL: &str = "ws://localhost:4010/gateway";

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let url = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("FANOUT_WS_URL").ok())
        .unwrap_or_else(|| DEFAULT_URL.to_string());

    let (ws, _) = match tokio_tungstenite::connect_async(url.as_str()).await {
        Ok(conn) => conn,
        Err(e) => {
            tracing::error!(%url, error = %e, "could not connect");
            std::process::exit(1);
        }
    };
    tracing::info!(%url, "connected");

    let (_write, mut read) = ws.split();
    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Text(text)) => print_payload(text.as_str()),
            Ok(Message::Binary(bytes)) => match std::str::from_utf8(&bytes) {
                Ok(text) => print_payload(text),
                Err(_) => tracing::warn!(len = bytes.len(), "skipping non-UTF-8 frame"),
            },
            Ok(Message::Close(frame)) => {
                tracing::info!(?frame, "server closed the connection");
                break;
            }
            Ok(_) => continue,
            Err(e) => {
                tracing::error!(error = %e, "connection error");
                break;
            }
        }
    }

    tracing::info!("disconnected");
}

fn print_payload(text: &str) {
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(value) => println!("{}", format_message(&value)),
        Err(e) => tracing::warn!(error = %e, raw = text, "payload is not JSON"),
    }
}
