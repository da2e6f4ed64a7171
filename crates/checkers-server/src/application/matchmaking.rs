//! Player handles and the first-come, first-served matchmaking queue.
//!
//! A [`PlayerHandle`] is the coordinator's view of one connected client: an
//! identifier plus the sending end of that connection's outbound channel.
//! Cloning a handle is cheap and every clone writes into the same ordered
//! channel, so messages sent to one player always arrive in send order.

use std::collections::VecDeque;
use std::fmt;

use checkers_core::ServerMessage;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;
use uuid::Uuid;

/// Unique identifier assigned to each accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Addressable endpoint for one connected player.
#[derive(Debug, Clone)]
pub struct PlayerHandle {
    id: PlayerId,
    outbound: UnboundedSender<ServerMessage>,
}

impl PlayerHandle {
    /// Creates a handle with a fresh [`PlayerId`].
    pub fn new(outbound: UnboundedSender<ServerMessage>) -> Self {
        Self {
            id: PlayerId::new(),
            outbound,
        }
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    /// Queues `msg` for delivery.  Returns `false` if the connection's writer
    /// has already gone away; the message is dropped in that case.
    pub fn send(&self, msg: ServerMessage) -> bool {
        match self.outbound.send(msg) {
            Ok(()) => true,
            Err(unsent) => {
                debug!(player = %self.id, "dropping {} for closed connection", unsent.0.command());
                false
            }
        }
    }
}

/// FIFO of players waiting for an opponent.
///
/// Each player appears at most once.  All mutation goes through the
/// coordinator, which holds this queue behind a mutex so that popping a
/// waiting player and pairing them is one atomic step.
#[derive(Debug, Default)]
pub struct MatchQueue {
    waiting: VecDeque<PlayerHandle>,
}

impl MatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `player` unless they are already waiting.
    ///
    /// Returns `true` if the player was added.
    pub fn push(&mut self, player: PlayerHandle) -> bool {
        if self.contains(player.id()) {
            return false;
        }
        self.waiting.push_back(player);
        true
    }

    /// Removes and returns the player who has waited longest.
    pub fn pop_front(&mut self) -> Option<PlayerHandle> {
        self.waiting.pop_front()
    }

    /// Removes `id` from the queue.  Returns `true` if it was present;
    /// removing an absent player is a no-op.
    pub fn remove(&mut self, id: PlayerId) -> bool {
        let before = self.waiting.len();
        self.waiting.retain(|p| p.id() != id);
        self.waiting.len() != before
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.waiting.iter().any(|p| p.id() == id)
    }

    pub fn len(&self) -> usize {
        self.waiting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn make_player() -> (PlayerHandle, mpsc::UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (PlayerHandle::new(tx), rx)
    }

    #[test]
    fn test_queue_is_first_in_first_out() {
        let mut queue = MatchQueue::new();
        let (a, _ra) = make_player();
        let (b, _rb) = make_player();
        queue.push(a.clone());
        queue.push(b.clone());

        assert_eq!(queue.pop_front().map(|p| p.id()), Some(a.id()));
        assert_eq!(queue.pop_front().map(|p| p.id()), Some(b.id()));
        assert!(queue.pop_front().is_none());
    }

    #[test]
    fn test_push_ignores_duplicate_player() {
        let mut queue = MatchQueue::new();
        let (a, _ra) = make_player();

        assert!(queue.push(a.clone()));
        assert!(!queue.push(a));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut queue = MatchQueue::new();
        let (a, _ra) = make_player();
        queue.push(a.clone());

        assert!(queue.remove(a.id()));
        assert!(!queue.remove(a.id()));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_send_reaches_receiver_in_order() {
        let (a, mut rx) = make_player();
        assert!(a.send(ServerMessage::Waiting));
        assert!(a.send(ServerMessage::SearchCancelled));

        assert_eq!(rx.try_recv().ok(), Some(ServerMessage::Waiting));
        assert_eq!(rx.try_recv().ok(), Some(ServerMessage::SearchCancelled));
    }

    #[test]
    fn test_send_to_closed_connection_returns_false() {
        let (a, rx) = make_player();
        drop(rx);
        assert!(!a.send(ServerMessage::Waiting));
    }
}
