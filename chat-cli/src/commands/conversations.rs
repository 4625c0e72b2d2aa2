//! List conversations from the REST backend.

use anyhow::{Context, Result};
use chat_client::Config;
use chat_types::UserId;

/// Run the conversations command.
pub async fn run(config: &Config, user: UserId) -> Result<()> {
    let client = super::websocket_client(config, user.clone());
    let backing = super::backing_store(config);

    let hydrated = client
        .hydrate(&backing)
        .await
        .with_context(|| format!("Failed to fetch conversations from {}", config.server.api_url))?;

    let reader = client.reader();
    println!("=== {} conversation(s) for {} ===", hydrated, user);
    for conversation in reader.list_conversations() {
        println!("{}", super::describe(&conversation, &user));
    }
    println!();
    println!("Total unread: {}", reader.total_unread_count());

    Ok(())
}
