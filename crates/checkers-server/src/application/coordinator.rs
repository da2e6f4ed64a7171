//! Session coordinator: pairs waiting players, runs session clocks, and
//! relays moves between the two players of each session.
//!
//! # Shared state (for beginners)
//!
//! Every connection task holds an `Arc<Coordinator>`.  The coordinator owns
//! two collections, each behind its own `tokio::sync::Mutex`:
//!
//! - the [`MatchQueue`] of players waiting for an opponent, and
//! - the session registry (sessions by id, plus an index from player to session).
//!
//! When both are needed the queue is always locked first, then the registry.
//! A single lock order rules out deadlocks between connection tasks.
//!
//! # Trust model
//!
//! The coordinator does not run the rule engine.  Moves are relayed as
//! decoded, and each client validates them against its own copy of the game.
//!
//! # Teardown
//!
//! Removing a session from the registry is the only way to end it, and only
//! one caller can remove a given session.  That caller stops the clock task
//! and sends the notifications, so each session is torn down exactly once
//! even when a quit races a disconnect.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use checkers_core::{ClientMessage, Color, Move, ServerMessage};
use rand::Rng;
use tokio::sync::Mutex;
use tokio::time::{interval, sleep, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::application::matchmaking::{MatchQueue, PlayerHandle, PlayerId};
use crate::application::session::{GameSession, SessionId};

/// Countdown and broadcast cadence for new sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTiming {
    /// Delay between pairing and `GAME_STARTED`.
    pub countdown: Duration,
    /// Interval between `TIME_UPDATE` broadcasts.
    pub tick: Duration,
}

impl Default for SessionTiming {
    fn default() -> Self {
        Self {
            countdown: Duration::from_secs(5),
            tick: Duration::from_secs(1),
        }
    }
}

/// How a relayed move is framed for the opponent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayKind {
    /// Ends the mover's turn: the clock switches and a time update follows.
    Plain,
    /// Mid-chain capture: the turn and the clock stay with the mover.
    CaptureContinued,
}

#[derive(Debug, Default)]
struct SessionRegistry {
    sessions: HashMap<SessionId, Arc<GameSession>>,
    by_player: HashMap<PlayerId, SessionId>,
}

impl SessionRegistry {
    fn insert(&mut self, session: Arc<GameSession>) {
        let id = session.id();
        for color in [Color::White, Color::Black] {
            self.by_player.insert(session.player(color).id(), id);
        }
        self.sessions.insert(id, session);
    }

    fn find(&self, player: PlayerId) -> Option<Arc<GameSession>> {
        let id = self.by_player.get(&player)?;
        self.sessions.get(id).cloned()
    }

    /// Removes the session `player` belongs to, including both index entries.
    fn take(&mut self, player: PlayerId) -> Option<Arc<GameSession>> {
        let id = self.by_player.remove(&player)?;
        let session = self.sessions.remove(&id)?;
        for color in [Color::White, Color::Black] {
            self.by_player.remove(&session.player(color).id());
        }
        Some(session)
    }
}

/// The server context shared by every connection task.
#[derive(Debug, Default)]
pub struct Coordinator {
    queue: Mutex<MatchQueue>,
    registry: Mutex<SessionRegistry>,
    timing: SessionTiming,
}

impl Coordinator {
    pub fn new(timing: SessionTiming) -> Self {
        Self {
            queue: Mutex::new(MatchQueue::new()),
            registry: Mutex::new(SessionRegistry::default()),
            timing,
        }
    }

    pub fn timing(&self) -> SessionTiming {
        self.timing
    }

    /// Routes one decoded client message to the matching operation.
    pub async fn handle(&self, player: &PlayerHandle, msg: ClientMessage) {
        debug!(player = %player.id(), command = msg.command(), "client message");
        match msg {
            ClientMessage::FindGame => self.enqueue(player.clone()).await,
            ClientMessage::CancelSearch => self.cancel_wait(player).await,
            ClientMessage::Move(mv) => self.relay_move(player.id(), mv, RelayKind::Plain).await,
            ClientMessage::CaptureContinued(mv) => {
                self.relay_move(player.id(), mv, RelayKind::CaptureContinued)
                    .await
            }
            ClientMessage::Quit => self.quit(player.id()).await,
            ClientMessage::EndSession => self.end_session(player.id()).await,
        }
    }

    /// Pairs `player` with the longest-waiting player, or queues them.
    ///
    /// A player who is already waiting or already in a session is ignored.
    pub async fn enqueue(&self, player: PlayerHandle) {
        let mut queue = self.queue.lock().await;
        let mut registry = self.registry.lock().await;

        if queue.contains(player.id()) || registry.by_player.contains_key(&player.id()) {
            debug!(player = %player.id(), "already searching or playing; FIND_GAME ignored");
            return;
        }

        match queue.pop_front() {
            Some(waiting) => self.start_session(waiting, player, &mut registry),
            None => {
                info!(player = %player.id(), "player waiting for an opponent");
                queue.push(player.clone());
                player.send(ServerMessage::Waiting);
            }
        }
    }

    /// Removes `player` from the queue if present and confirms the cancellation.
    pub async fn cancel_wait(&self, player: &PlayerHandle) {
        let removed = self.queue.lock().await.remove(player.id());
        if removed {
            info!(player = %player.id(), "search cancelled");
        }
        player.send(ServerMessage::SearchCancelled);
    }

    /// Forwards `mv` from `from` to their opponent.
    ///
    /// For a plain move the clock switches first, then the move goes out,
    /// then both players get the new time.  Both messages use the
    /// opponent's ordered channel, so the move always arrives first.
    pub async fn relay_move(&self, from: PlayerId, mv: Move, kind: RelayKind) {
        let Some(session) = self.registry.lock().await.find(from) else {
            warn!(player = %from, %mv, "move from player without a session discarded");
            return;
        };
        let Some(opponent) = session.opponent_of(from) else {
            return;
        };

        debug!(session = %session.id(), player = %from, %mv, ?kind, "relaying move");
        match kind {
            RelayKind::Plain => {
                let now = Instant::now();
                session.switch_turn(now);
                opponent.send(ServerMessage::OpponentMove(mv));
                session.broadcast(ServerMessage::TimeUpdate(session.time_snapshot(now)));
            }
            RelayKind::CaptureContinued => {
                opponent.send(ServerMessage::OpponentCaptureContinued(mv));
            }
        }
    }

    /// `player` leaves their session; the opponent is told.
    pub async fn quit(&self, player: PlayerId) {
        if let Some(session) = self.teardown(player).await {
            info!(session = %session.id(), %player, "player quit");
            if let Some(opponent) = session.opponent_of(player) {
                opponent.send(ServerMessage::OpponentQuit);
            }
        }
    }

    /// Ends `player`'s session for both players.
    pub async fn end_session(&self, player: PlayerId) {
        if let Some(session) = self.teardown(player).await {
            info!(session = %session.id(), %player, "session ended");
            session.broadcast(ServerMessage::SessionEnded);
        }
    }

    /// Cleans up after a closed connection: leaves the queue, and quits any
    /// session exactly as an explicit `QUIT` would.
    pub async fn disconnect(&self, player: PlayerId) {
        if self.queue.lock().await.remove(player) {
            debug!(%player, "disconnected while waiting");
        }
        self.quit(player).await;
    }

    /// Number of sessions currently registered.
    pub async fn active_sessions(&self) -> usize {
        self.registry.lock().await.sessions.len()
    }

    /// Number of players currently in the queue.
    pub async fn waiting_players(&self) -> usize {
        self.queue.lock().await.len()
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    /// Forms a session.  Runs with both locks held, so neither player can be
    /// paired with anyone else in the meantime.
    fn start_session(&self, first: PlayerHandle, second: PlayerHandle, registry: &mut SessionRegistry) {
        let (white, black) = if rand::thread_rng().gen::<bool>() {
            (first, second)
        } else {
            (second, first)
        };
        let session = Arc::new(GameSession::new(white, black));
        registry.insert(Arc::clone(&session));

        info!(
            session = %session.id(),
            white = %session.player(Color::White).id(),
            black = %session.player(Color::Black).id(),
            "session formed"
        );

        for color in [Color::White, Color::Black] {
            session.player(color).send(ServerMessage::GameFound(color));
        }
        let countdown = u32::try_from(self.timing.countdown.as_secs()).unwrap_or(u32::MAX);
        session.broadcast(ServerMessage::GameStarting(countdown));

        let ticker = tokio::spawn(run_clock(Arc::clone(&session), self.timing));
        session.set_ticker(ticker);
    }

    async fn teardown(&self, player: PlayerId) -> Option<Arc<GameSession>> {
        let session = self.registry.lock().await.take(player)?;
        session.cancel_ticker();
        session.stop_clock(Instant::now());
        Some(session)
    }
}

/// Clock task of one session: countdown, `GAME_STARTED`, then a time update
/// every tick until cancelled.
async fn run_clock(session: Arc<GameSession>, timing: SessionTiming) {
    sleep(timing.countdown).await;

    session.start_clock(Instant::now());
    session.broadcast(ServerMessage::GameStarted);
    info!(session = %session.id(), "game started");

    let mut ticker = interval(timing.tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        // The first tick completes immediately.
        ticker.tick().await;
        session.broadcast(ServerMessage::TimeUpdate(session.time_snapshot(Instant::now())));
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use checkers_core::{Square, TimeSnapshot};
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    struct TestPlayer {
        handle: PlayerHandle,
        rx: UnboundedReceiver<ServerMessage>,
    }

    impl TestPlayer {
        fn new() -> Self {
            let (tx, rx) = mpsc::unbounded_channel();
            Self {
                handle: PlayerHandle::new(tx),
                rx,
            }
        }

        fn id(&self) -> PlayerId {
            self.handle.id()
        }

        fn drain(&mut self) -> Vec<ServerMessage> {
            let mut out = Vec::new();
            while let Ok(msg) = self.rx.try_recv() {
                out.push(msg);
            }
            out
        }

        fn color(&mut self) -> Color {
            self.drain()
                .into_iter()
                .find_map(|m| match m {
                    ServerMessage::GameFound(c) => Some(c),
                    _ => None,
                })
                .expect("GAME_FOUND expected")
        }
    }

    fn mv() -> Move {
        Move::new(Square::new(2, 5), Square::new(3, 4))
    }

    async fn paired(coordinator: &Coordinator) -> (TestPlayer, TestPlayer) {
        let mut a = TestPlayer::new();
        let mut b = TestPlayer::new();
        coordinator.enqueue(a.handle.clone()).await;
        coordinator.enqueue(b.handle.clone()).await;
        // Sort into (white, black).
        if a.color() == Color::White {
            b.drain();
            (a, b)
        } else {
            b.drain();
            (b, a)
        }
    }

    // ── Matchmaking ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_first_player_waits() {
        let coordinator = Coordinator::default();
        let mut a = TestPlayer::new();

        coordinator.enqueue(a.handle.clone()).await;

        assert_eq!(a.drain(), vec![ServerMessage::Waiting]);
        assert_eq!(coordinator.waiting_players().await, 1);
        assert_eq!(coordinator.active_sessions().await, 0);
    }

    #[tokio::test]
    async fn test_second_player_forms_session_with_split_colors() {
        let coordinator = Coordinator::default();
        let mut a = TestPlayer::new();
        let mut b = TestPlayer::new();

        coordinator.enqueue(a.handle.clone()).await;
        coordinator.enqueue(b.handle.clone()).await;

        let a_msgs = a.drain();
        let b_msgs = b.drain();
        assert_eq!(a_msgs[0], ServerMessage::Waiting);
        let ServerMessage::GameFound(a_color) = a_msgs[1] else {
            panic!("expected GAME_FOUND, got {a_msgs:?}");
        };
        assert_eq!(b_msgs[0], ServerMessage::GameFound(a_color.opponent()));
        assert_eq!(a_msgs[2], ServerMessage::GameStarting(5));
        assert_eq!(b_msgs[1], ServerMessage::GameStarting(5));

        assert_eq!(coordinator.active_sessions().await, 1);
        assert_eq!(coordinator.waiting_players().await, 0);
        let registry = coordinator.registry.lock().await;
        assert!(registry.by_player.contains_key(&a.id()));
        assert_eq!(registry.by_player.get(&a.id()), registry.by_player.get(&b.id()));
    }

    #[tokio::test]
    async fn test_duplicate_find_game_does_not_self_pair() {
        let coordinator = Coordinator::default();
        let mut a = TestPlayer::new();

        coordinator.enqueue(a.handle.clone()).await;
        coordinator.enqueue(a.handle.clone()).await;

        assert_eq!(a.drain(), vec![ServerMessage::Waiting]);
        assert_eq!(coordinator.active_sessions().await, 0);
        assert_eq!(coordinator.waiting_players().await, 1);
    }

    #[tokio::test]
    async fn test_find_game_while_playing_is_ignored() {
        let coordinator = Coordinator::default();
        let (mut white, _black) = paired(&coordinator).await;

        coordinator.enqueue(white.handle.clone()).await;

        assert!(white.drain().is_empty());
        assert_eq!(coordinator.waiting_players().await, 0);
    }

    #[tokio::test]
    async fn test_cancel_wait_always_confirms() {
        let coordinator = Coordinator::default();
        let mut a = TestPlayer::new();

        coordinator.enqueue(a.handle.clone()).await;
        coordinator.cancel_wait(&a.handle).await;
        coordinator.cancel_wait(&a.handle).await;

        assert_eq!(
            a.drain(),
            vec![
                ServerMessage::Waiting,
                ServerMessage::SearchCancelled,
                ServerMessage::SearchCancelled
            ]
        );
        assert_eq!(coordinator.waiting_players().await, 0);
    }

    // ── Relay ────────────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_plain_move_is_relayed_before_time_update() {
        let coordinator = Coordinator::default();
        let (mut white, mut black) = paired(&coordinator).await;

        coordinator.relay_move(white.id(), mv(), RelayKind::Plain).await;

        let black_msgs = black.drain();
        assert_eq!(black_msgs[0], ServerMessage::OpponentMove(mv()));
        assert!(matches!(black_msgs[1], ServerMessage::TimeUpdate(t) if t.turn == Color::Black));
        let white_msgs = white.drain();
        assert!(matches!(white_msgs[..], [ServerMessage::TimeUpdate(_)]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_capture_continuation_does_not_switch_clock() {
        let coordinator = Coordinator::default();
        let (mut white, mut black) = paired(&coordinator).await;

        coordinator
            .relay_move(white.id(), mv(), RelayKind::CaptureContinued)
            .await;

        assert_eq!(black.drain(), vec![ServerMessage::OpponentCaptureContinued(mv())]);
        assert!(white.drain().is_empty());
    }

    #[tokio::test]
    async fn test_move_without_session_is_dropped() {
        let coordinator = Coordinator::default();
        let mut a = TestPlayer::new();
        coordinator.relay_move(a.id(), mv(), RelayKind::Plain).await;
        assert!(a.drain().is_empty());
    }

    // ── Clock task ───────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_game_starts_after_countdown_then_ticks() {
        let coordinator = Coordinator::default();
        let (_white, mut black) = paired(&coordinator).await;

        tokio::time::sleep(Duration::from_millis(4_900)).await;
        assert!(black.drain().is_empty(), "nothing before the countdown ends");

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(
            black.drain(),
            vec![
                ServerMessage::GameStarted,
                ServerMessage::TimeUpdate(TimeSnapshot::new(0, 0, Color::White)),
            ]
        );

        tokio::time::sleep(Duration::from_secs(2)).await;
        let ticks = black.drain();
        assert_eq!(ticks.len(), 2);
        assert_eq!(ticks[1], ServerMessage::TimeUpdate(TimeSnapshot::new(2, 0, Color::White)));
    }

    // ── Teardown ─────────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_quit_notifies_opponent_and_stops_clock() {
        let coordinator = Coordinator::default();
        let (mut white, mut black) = paired(&coordinator).await;

        coordinator.quit(white.id()).await;
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(black.drain(), vec![ServerMessage::OpponentQuit]);
        assert!(white.drain().is_empty());
        assert_eq!(coordinator.active_sessions().await, 0);
    }

    #[tokio::test]
    async fn test_end_session_notifies_both() {
        let coordinator = Coordinator::default();
        let (mut white, mut black) = paired(&coordinator).await;

        coordinator.end_session(black.id()).await;

        assert_eq!(white.drain(), vec![ServerMessage::SessionEnded]);
        assert_eq!(black.drain(), vec![ServerMessage::SessionEnded]);
        assert_eq!(coordinator.active_sessions().await, 0);
    }

    #[tokio::test]
    async fn test_teardown_happens_once() {
        let coordinator = Coordinator::default();
        let (mut white, mut black) = paired(&coordinator).await;

        coordinator.quit(white.id()).await;
        coordinator.quit(white.id()).await;
        coordinator.disconnect(black.id()).await;
        coordinator.end_session(white.id()).await;

        assert_eq!(black.drain(), vec![ServerMessage::OpponentQuit]);
        assert!(white.drain().is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_while_waiting_leaves_queue() {
        let coordinator = Coordinator::default();
        let a = TestPlayer::new();
        coordinator.enqueue(a.handle.clone()).await;

        coordinator.disconnect(a.id()).await;

        assert_eq!(coordinator.waiting_players().await, 0);
    }

    #[tokio::test]
    async fn test_quitter_can_search_again() {
        let coordinator = Coordinator::default();
        let (mut white, _black) = paired(&coordinator).await;

        coordinator.quit(white.id()).await;
        coordinator.enqueue(white.handle.clone()).await;

        assert_eq!(white.drain(), vec![ServerMessage::Waiting]);
    }
}
