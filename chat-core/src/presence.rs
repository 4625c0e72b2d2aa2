//! Ephemeral per-peer presence: typing and online flags.
//!
//! Nothing here is persisted. Every flag is last-write-wins and an unknown
//! peer reads as `false`.

use std::collections::HashMap;

use chat_types::UserId;

/// Typing and online flags keyed by peer.
#[derive(Debug, Default, Clone)]
pub struct PresenceBook {
    typing: HashMap<UserId, bool>,
    online: HashMap<UserId, bool>,
}

impl PresenceBook {
    /// Empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a typing signal. Returns `true` if the flag changed.
    pub fn set_typing(&mut self, peer: UserId, is_typing: bool) -> bool {
        self.typing.insert(peer, is_typing) != Some(is_typing)
    }

    /// Record an online signal. Returns `true` if the flag changed.
    pub fn set_online(&mut self, peer: UserId, is_online: bool) -> bool {
        self.online.insert(peer, is_online) != Some(is_online)
    }

    /// Whether `peer` is typing.
    pub fn is_typing(&self, peer: &UserId) -> bool {
        self.typing.get(peer).copied().unwrap_or(false)
    }

    /// Whether `peer` is online.
    pub fn is_online(&self, peer: &UserId) -> bool {
        self.online.get(peer).copied().unwrap_or(false)
    }

    /// Peers currently flagged typing, sorted.
    pub fn typing_peers(&self) -> Vec<UserId> {
        flagged(&self.typing)
    }

    /// Peers currently flagged online, sorted.
    pub fn online_peers(&self) -> Vec<UserId> {
        flagged(&self.online)
    }

    /// Forget everything, e.g. on identity change.
    pub fn clear(&mut self) {
        self.typing.clear();
        self.online.clear();
    }
}

fn flagged(map: &HashMap<UserId, bool>) -> Vec<UserId> {
    let mut peers: Vec<UserId> = map
        .iter()
        .filter(|(_, on)| **on)
        .map(|(peer, _)| peer.clone())
        .collect();
    peers.sort();
    peers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_peer_is_false() {
        let book = PresenceBook::new();
        assert!(!book.is_typing(&"u2".into()));
        assert!(!book.is_online(&"u2".into()));
    }

    #[test]
    fn last_write_wins() {
        let mut book = PresenceBook::new();
        assert!(book.set_typing("u2".into(), true));
        assert!(book.set_typing("u2".into(), false));
        assert!(!book.is_typing(&"u2".into()));
        assert!(!book.set_typing("u2".into(), false));
    }

    #[test]
    fn flags_are_independent() {
        let mut book = PresenceBook::new();
        book.set_online("u2".into(), true);
        book.set_typing("u3".into(), true);
        assert_eq!(book.online_peers(), vec![UserId::from("u2")]);
        assert_eq!(book.typing_peers(), vec![UserId::from("u3")]);
    }

    #[test]
    fn clear_forgets_all() {
        let mut book = PresenceBook::new();
        book.set_online("u2".into(), true);
        book.clear();
        assert!(book.online_peers().is_empty());
    }
}
