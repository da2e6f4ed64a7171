//! One paired game: the two players, their clock, and the clock broadcaster.
//!
//! # Clock model
//!
//! Time accrues only to the color whose turn it is, and only after the
//! countdown has finished.  A plain move calls [`SessionClock::switch_turn`],
//! which banks the elapsed time for the mover and hands the running clock to
//! the other color.  Capture continuations never touch the clock.
//!
//! The clock takes `Instant`s from the caller instead of reading the time
//! itself, so it is fully deterministic in tests.  The coordinator passes
//! `tokio::time::Instant::now()`, which also follows paused test time.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use checkers_core::{Color, ServerMessage, TimeSnapshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use crate::application::matchmaking::{PlayerHandle, PlayerId};

/// Unique identifier of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ── Clock ─────────────────────────────────────────────────────────────────────

/// Per-color elapsed time bookkeeping.
#[derive(Debug, Clone)]
pub struct SessionClock {
    white: Duration,
    black: Duration,
    turn: Color,
    /// When the current turn started accruing; `None` while not running.
    turn_started: Option<Instant>,
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionClock {
    /// A stopped clock with zero elapsed time and White on turn.
    pub fn new() -> Self {
        Self {
            white: Duration::ZERO,
            black: Duration::ZERO,
            turn: Color::White,
            turn_started: None,
        }
    }

    /// Starts accruing time to the color on turn.  No-op if already running.
    pub fn start(&mut self, now: Instant) {
        if !self.is_running() {
            self.turn_started = Some(now);
        }
    }

    fn is_running(&self) -> bool {
        self.turn_started.is_some()
    }

    pub fn turn(&self) -> Color {
        self.turn
    }

    /// Banks the current turn's time and passes the turn to the other color.
    ///
    /// Before the clock has started only the turn flips.
    pub fn switch_turn(&mut self, now: Instant) {
        if let Some(started) = self.turn_started {
            *self.bank(self.turn) += now.saturating_duration_since(started);
            self.turn_started = Some(now);
        }
        self.turn = self.turn.opponent();
    }

    /// Stops the clock, banking the running turn.
    pub fn stop(&mut self, now: Instant) {
        if let Some(started) = self.turn_started.take() {
            *self.bank(self.turn) += now.saturating_duration_since(started);
        }
    }

    /// Elapsed time per color as of `now`, in whole seconds.
    pub fn snapshot(&self, now: Instant) -> TimeSnapshot {
        let running = self
            .turn_started
            .map(|started| now.saturating_duration_since(started))
            .unwrap_or_default();
        let (mut white, mut black) = (self.white, self.black);
        match self.turn {
            Color::White => white += running,
            Color::Black => black += running,
        }
        TimeSnapshot::new(white.as_secs(), black.as_secs(), self.turn)
    }

    fn bank(&mut self, color: Color) -> &mut Duration {
        match color {
            Color::White => &mut self.white,
            Color::Black => &mut self.black,
        }
    }
}

// ── Session ───────────────────────────────────────────────────────────────────

/// Shared state of one running game between two players.
///
/// Held as `Arc<GameSession>` by the coordinator's registry and by the
/// session's clock task.  Both the clock and the ticker slot are behind
/// short-lived `std::sync::Mutex`es that are never held across an `.await`.
#[derive(Debug)]
pub struct GameSession {
    id: SessionId,
    white: PlayerHandle,
    black: PlayerHandle,
    clock: Mutex<SessionClock>,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl GameSession {
    pub fn new(white: PlayerHandle, black: PlayerHandle) -> Self {
        Self {
            id: SessionId::new(),
            white,
            black,
            clock: Mutex::new(SessionClock::new()),
            ticker: Mutex::new(None),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn player(&self, color: Color) -> &PlayerHandle {
        match color {
            Color::White => &self.white,
            Color::Black => &self.black,
        }
    }

    /// The color assigned to `player`, or `None` if they are not in this session.
    pub fn color_of(&self, player: PlayerId) -> Option<Color> {
        if self.white.id() == player {
            Some(Color::White)
        } else if self.black.id() == player {
            Some(Color::Black)
        } else {
            None
        }
    }

    /// The other participant.
    pub fn opponent_of(&self, player: PlayerId) -> Option<&PlayerHandle> {
        self.color_of(player).map(|c| self.player(c.opponent()))
    }

    /// Sends `msg` to both players, White first.
    pub fn broadcast(&self, msg: ServerMessage) {
        self.white.send(msg);
        self.black.send(msg);
    }

    pub fn start_clock(&self, now: Instant) {
        self.lock_clock().start(now);
    }

    pub fn switch_turn(&self, now: Instant) {
        self.lock_clock().switch_turn(now);
    }

    pub fn stop_clock(&self, now: Instant) {
        self.lock_clock().stop(now);
    }

    pub fn time_snapshot(&self, now: Instant) -> TimeSnapshot {
        self.lock_clock().snapshot(now)
    }

    /// Stores the clock task so that teardown can cancel it.
    pub fn set_ticker(&self, handle: JoinHandle<()>) {
        let previous = lock(&self.ticker).replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Cancels the clock task.  Returns `true` on the first call that actually
    /// had a task to cancel; every later call is a no-op returning `false`.
    pub fn cancel_ticker(&self) -> bool {
        match lock(&self.ticker).take() {
            Some(handle) => {
                handle.abort();
                debug!(session = %self.id, "clock task cancelled");
                true
            }
            None => false,
        }
    }

    fn lock_clock(&self) -> MutexGuard<'_, SessionClock> {
        lock(&self.clock)
    }
}

/// Locks a std mutex, recovering the data if a previous holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
