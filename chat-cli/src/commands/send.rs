//! Send one message to a peer.

use anyhow::{Context, Result};
use chat_client::Config;
use chat_types::{MessageKind, UserId};

/// Run the send command.
pub async fn run(
    config: &Config,
    user: UserId,
    to: UserId,
    text: &str,
    kind: MessageKind,
) -> Result<()> {
    let client = super::websocket_client(config, user);
    client.start().await;

    if !client.is_connected() {
        client.stop().await;
        anyhow::bail!("Could not connect to {}", config.server.socket_url);
    }

    let sent = client.send_message(&to, text, kind).await;
    client.stop().await;

    let message = sent.context("Message rejected")?;
    println!("Sent {} to {}", message.id, to);
    Ok(())
}
