//! All networked-checkers protocol message types.
//!
//! Every message is one UTF-8 text line, either a bare `COMMAND` or
//! `COMMAND:PAYLOAD`.  The encoding lives in [`crate::protocol::codec`]; this
//! module only defines what can be said.

use serde::{Deserialize, Serialize};

use crate::domain::board::Color;
use crate::domain::rules::Move;

// ── Protocol constants ────────────────────────────────────────────────────────

/// TCP port the server listens on unless configured otherwise.
pub const DEFAULT_PORT: u16 = 5000;

/// Separator between a command word and its payload.
pub const PAYLOAD_SEPARATOR: char = ':';

/// Command words as they appear on the wire.
pub mod command {
    // Client → server
    pub const FIND_GAME: &str = "FIND_GAME";
    pub const CANCEL_SEARCH: &str = "CANCEL_SEARCH";
    pub const MOVE: &str = "MOVE";
    pub const CAPTURE_CONTINUED: &str = "CAPTURE_CONTINUED";
    pub const QUIT: &str = "QUIT";
    pub const END_SESSION: &str = "END_SESSION";

    // Server → client
    pub const WAITING: &str = "WAITING";
    pub const GAME_FOUND: &str = "GAME_FOUND";
    pub const GAME_STARTING: &str = "GAME_STARTING";
    pub const GAME_STARTED: &str = "GAME_STARTED";
    pub const OPPONENT_MOVE: &str = "OPPONENT_MOVE";
    pub const OPPONENT_CAPTURE_CONTINUED: &str = "OPPONENT_CAPTURE_CONTINUED";
    pub const TIME_UPDATE: &str = "TIME_UPDATE";
    pub const SEARCH_CANCELLED: &str = "SEARCH_CANCELLED";
    pub const OPPONENT_QUIT: &str = "OPPONENT_QUIT";
    pub const SESSION_ENDED: &str = "SESSION_ENDED";
}

// ── Payloads ──────────────────────────────────────────────────────────────────

/// Authoritative clock state broadcast by the server.
///
/// Wire form: `whiteSeconds:blackSeconds:TURN`, e.g. `12:7:BLACK`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeSnapshot {
    /// Whole seconds White has spent on its turns.
    pub white_secs: u64,
    /// Whole seconds Black has spent on its turns.
    pub black_secs: u64,
    /// Color whose clock is currently running.
    pub turn: Color,
}

impl TimeSnapshot {
    pub fn new(white_secs: u64, black_secs: u64, turn: Color) -> Self {
        Self {
            white_secs,
            black_secs,
            turn,
        }
    }

    /// Elapsed seconds for `color`.
    pub fn elapsed(&self, color: Color) -> u64 {
        match color {
            Color::White => self.white_secs,
            Color::Black => self.black_secs,
        }
    }
}

// ── Top-level messages ────────────────────────────────────────────────────────

/// Everything a client can send to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientMessage {
    /// Enter the matchmaking queue.
    FindGame,
    /// Leave the matchmaking queue.
    CancelSearch,
    /// A move that ends the sender's turn.
    Move(Move),
    /// A capture after which the same piece must capture again; the turn
    /// (and the clock) does not switch.
    CaptureContinued(Move),
    /// Leave the current session; the opponent is told.
    Quit,
    /// End the current session for both players.
    EndSession,
}

impl ClientMessage {
    /// The command word this message is sent under.
    pub fn command(&self) -> &'static str {
        match self {
            Self::FindGame => command::FIND_GAME,
            Self::CancelSearch => command::CANCEL_SEARCH,
            Self::Move(_) => command::MOVE,
            Self::CaptureContinued(_) => command::CAPTURE_CONTINUED,
            Self::Quit => command::QUIT,
            Self::EndSession => command::END_SESSION,
        }
    }
}

/// Everything the server can send to a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerMessage {
    /// The sender was queued and is waiting for an opponent.
    Waiting,
    /// An opponent was found; carries the color assigned to the recipient.
    GameFound(Color),
    /// The session starts after this many seconds.
    GameStarting(u32),
    /// The countdown finished and the clock is running.
    GameStarted,
    /// The opponent made a move that ended their turn.
    OpponentMove(Move),
    /// The opponent captured and must capture again with the same piece.
    OpponentCaptureContinued(Move),
    /// Current clock state.
    TimeUpdate(TimeSnapshot),
    /// The search was cancelled (sent even when the sender was not queued).
    SearchCancelled,
    /// The opponent left the session.
    OpponentQuit,
    /// The session was ended by either player.
    SessionEnded,
}

impl ServerMessage {
    /// The command word this message is sent under.
    pub fn command(&self) -> &'static str {
        match self {
            Self::Waiting => command::WAITING,
            Self::GameFound(_) => command::GAME_FOUND,
            Self::GameStarting(_) => command::GAME_STARTING,
            Self::GameStarted => command::GAME_STARTED,
            Self::OpponentMove(_) => command::OPPONENT_MOVE,
            Self::OpponentCaptureContinued(_) => command::OPPONENT_CAPTURE_CONTINUED,
            Self::TimeUpdate(_) => command::TIME_UPDATE,
            Self::SearchCancelled => command::SEARCH_CANCELLED,
            Self::OpponentQuit => command::OPPONENT_QUIT,
            Self::SessionEnded => command::SESSION_ENDED,
        }
    }
}
