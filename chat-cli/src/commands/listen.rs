//! Stay connected and print inbound events.

use anyhow::{Context, Result};
use chat_client::Config;
use chat_types::{EventKind, InboundEvent, UserId};
use tracing::warn;

/// Run the listen command.
pub async fn run(config: &Config, user: UserId, hydrate: bool) -> Result<()> {
    let client = super::websocket_client(config, user.clone());

    if hydrate {
        match client.hydrate(&super::backing_store(config)).await {
            Ok(count) => println!("Hydrated {} conversation(s)", count),
            Err(e) => warn!(error = %e, "hydration failed, continuing with live stream only"),
        }
    }

    // printing handlers go after the client's own, so the store is current
    client.start().await;
    let printers = [
        client.connector().subscribe(EventKind::Message, print_event),
        client.connector().subscribe(EventKind::Typing, print_event),
        client.connector().subscribe(EventKind::OnlineStatus, print_event),
    ];

    let mut lifecycle = client.connector().connection_events();
    println!("Listening as {} (Ctrl-C to quit)", user);

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to wait for Ctrl-C")?;
                break;
            }
            event = lifecycle.recv() => match event {
                Ok(event) => println!("* {:?}", event),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    for printer in &printers {
        printer.unsubscribe();
    }
    client.stop().await;

    println!();
    println!("Unread at exit: {}", client.reader().total_unread_count());
    Ok(())
}

fn print_event(event: &InboundEvent) {
    match event {
        InboundEvent::Message(m) => println!(
            "[{}] {} -> {}: {}",
            m.created_at.format("%H:%M:%S"),
            m.sender_id,
            m.receiver_id,
            m.text
        ),
        InboundEvent::Typing(t) => {
            let state = if t.is_typing { "is typing..." } else { "stopped typing" };
            println!("{} {}", t.user_id, state);
        }
        InboundEvent::OnlineStatus(s) => {
            let state = if s.is_online { "online" } else { "offline" };
            println!("{} is {}", s.user_id, state);
        }
    }
}
