//! Connection dispatcher: the client-side session state machine.
//!
//! The dispatcher sits between the network and the local rule engine.
//! Inbound [`ServerMessage`]s drive the phase of the session and replay the
//! opponent's moves on the local [`Game`]; local moves are validated by the
//! same engine before anything is sent.
//!
//! # Phases (for beginners)
//!
//! ```text
//! Idle ──FIND_GAME──▶ Searching ──GAME_FOUND──▶ Matched ──GAME_STARTED──▶ Playing
//!   ▲                    │                                                   │
//!   └─SEARCH_CANCELLED───┘                     OPPONENT_QUIT / SESSION_ENDED │
//!                                                  / local quit              ▼
//!                                                                        Finished
//! ```
//!
//! The server is a relay and never checks moves.  Both clients run the rule
//! engine and trust each other's coordinates, so a peer that sends an illegal
//! move is reported as [`DispatchEvent::OpponentMoveRejected`] and otherwise
//! ignored.

use checkers_core::{
    Board, ClientMessage, Color, Game, Move, MoveError, MoveOutcome, ServerMessage, Square,
    TimeSnapshot,
};
use thiserror::Error;
use tracing::{debug, info, warn};

/// The seam between the dispatcher and whatever carries messages to the server.
#[cfg_attr(test, mockall::automock)]
pub trait Outbound: Send {
    /// Queues `msg` for the server.  Returns `false` if the connection is gone.
    fn send(&self, msg: ClientMessage) -> bool;
}

/// Why a local move was not played.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LocalMoveError {
    #[error("not in a game")]
    NoSession,
    #[error("it is {0:?}'s turn")]
    NotYourTurn(Color),
    #[error(transparent)]
    Rules(#[from] MoveError),
    /// The move was applied locally but could not be sent.
    #[error("connection to the server is closed")]
    Disconnected,
}

/// Where the client is in the session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatcherPhase {
    #[default]
    Idle,
    Searching,
    /// Paired and counting down; moves are already accepted.
    Matched,
    Playing,
    Finished,
}

/// What an inbound message did, for the console to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchEvent {
    Waiting,
    Matched(Color),
    Countdown(u32),
    Started,
    OpponentMoved(MoveOutcome),
    OpponentMoveRejected { mv: Move, error: MoveError },
    Clock(TimeSnapshot),
    SearchCancelled,
    OpponentQuit,
    SessionEnded,
    /// The message made no sense in the current phase.
    Ignored,
}

/// Read-only snapshot for a renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameView {
    pub phase: DispatcherPhase,
    pub board: Board,
    pub local_color: Option<Color>,
    pub side_to_move: Color,
    pub selection: Option<Square>,
    /// Legal destinations of the selected piece.
    pub destinations: Vec<Square>,
    pub forced_captures: Vec<Square>,
    pub game_over: bool,
    pub winner: Option<Color>,
    pub clock: Option<TimeSnapshot>,
}

/// Client-side session state machine over an [`Outbound`] sink.
pub struct ConnectionDispatcher<O: Outbound> {
    outbound: O,
    phase: DispatcherPhase,
    game: Game,
    local_color: Option<Color>,
    clock: Option<TimeSnapshot>,
    selection: Option<Square>,
    /// `END_SESSION` already sent for this session.
    end_requested: bool,
}

impl<O: Outbound> ConnectionDispatcher<O> {
    pub fn new(outbound: O) -> Self {
        Self {
            outbound,
            phase: DispatcherPhase::Idle,
            game: Game::new(),
            local_color: None,
            clock: None,
            selection: None,
            end_requested: false,
        }
    }

    pub fn phase(&self) -> DispatcherPhase {
        self.phase
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    pub fn local_color(&self) -> Option<Color> {
        self.local_color
    }

    pub fn clock(&self) -> Option<TimeSnapshot> {
        self.clock
    }

    fn in_session(&self) -> bool {
        matches!(self.phase, DispatcherPhase::Matched | DispatcherPhase::Playing)
    }

    // ── Inbound ───────────────────────────────────────────────────────────────

    /// Applies one server message to the local state.
    pub fn handle(&mut self, msg: ServerMessage) -> DispatchEvent {
        debug!("dispatching {}", msg.command());
        match msg {
            ServerMessage::Waiting => {
                self.phase = DispatcherPhase::Searching;
                DispatchEvent::Waiting
            }
            ServerMessage::GameFound(color) => {
                self.game.reset();
                self.local_color = Some(color);
                self.clock = None;
                self.selection = None;
                self.end_requested = false;
                self.phase = DispatcherPhase::Matched;
                info!("matched; playing {color:?}");
                DispatchEvent::Matched(color)
            }
            ServerMessage::GameStarting(secs) => DispatchEvent::Countdown(secs),
            ServerMessage::GameStarted => {
                if !self.in_session() {
                    warn!("GAME_STARTED outside a session");
                    return DispatchEvent::Ignored;
                }
                self.phase = DispatcherPhase::Playing;
                DispatchEvent::Started
            }
            ServerMessage::OpponentMove(mv) | ServerMessage::OpponentCaptureContinued(mv) => {
                self.apply_remote(mv)
            }
            ServerMessage::TimeUpdate(snapshot) => {
                self.clock = Some(snapshot);
                DispatchEvent::Clock(snapshot)
            }
            ServerMessage::SearchCancelled => {
                if self.phase == DispatcherPhase::Searching {
                    self.phase = DispatcherPhase::Idle;
                }
                DispatchEvent::SearchCancelled
            }
            ServerMessage::OpponentQuit => {
                self.finish();
                DispatchEvent::OpponentQuit
            }
            ServerMessage::SessionEnded => {
                self.finish();
                DispatchEvent::SessionEnded
            }
        }
    }

    fn apply_remote(&mut self, mv: Move) -> DispatchEvent {
        if !self.in_session() {
            warn!("opponent move {mv} outside a session");
            return DispatchEvent::Ignored;
        }
        match self.game.apply_move(mv.from, mv.to) {
            Ok(outcome) => {
                self.selection = None;
                DispatchEvent::OpponentMoved(outcome)
            }
            Err(error) => {
                warn!("opponent move {mv} rejected by the local board: {error}");
                DispatchEvent::OpponentMoveRejected { mv, error }
            }
        }
    }

    fn finish(&mut self) {
        self.phase = DispatcherPhase::Finished;
        self.selection = None;
    }

    // ── Outbound commands ─────────────────────────────────────────────────────

    pub fn find_game(&mut self) -> bool {
        self.outbound.send(ClientMessage::FindGame)
    }

    pub fn cancel_search(&mut self) -> bool {
        self.outbound.send(ClientMessage::CancelSearch)
    }

    /// Leaves the session.  The server does not answer the quitter, so the
    /// session is finished locally straight away.
    pub fn quit(&mut self) -> bool {
        let sent = self.outbound.send(ClientMessage::Quit);
        if self.in_session() {
            self.finish();
        }
        sent
    }

    /// Asks the server to end the session for both players.  The phase
    /// changes when `SESSION_ENDED` arrives.
    pub fn end_session(&mut self) -> bool {
        self.end_requested = true;
        self.outbound.send(ClientMessage::EndSession)
    }

    /// Ends the session once the local game is decided.
    ///
    /// Sends `END_SESSION` at most once per session and only after game over.
    /// [`ConnectionDispatcher::play_local`] calls this itself; after an
    /// opponent's winning move the caller does.  Returns whether the request
    /// went out on this call.
    pub fn end_finished_game(&mut self) -> bool {
        if self.end_requested || !self.in_session() || !self.game.is_game_over() {
            return false;
        }
        info!("game over ({:?} wins); ending session", self.game.winner());
        self.end_session()
    }

    /// Plays a move for the local color and tells the server about it.
    ///
    /// A capture that must be continued is sent as `CAPTURE_CONTINUED` so the
    /// server leaves the clock alone; anything else is a plain `MOVE`.
    ///
    /// # Errors
    ///
    /// - [`LocalMoveError::NoSession`] outside a session.
    /// - [`LocalMoveError::NotYourTurn`] when the opponent is on move.
    /// - [`LocalMoveError::Rules`] when the engine refuses the move.
    /// - [`LocalMoveError::Disconnected`] when the move was applied but the
    ///   connection is gone.
    ///
    /// A move that decides the game is followed by `END_SESSION`.
    pub fn play_local(&mut self, from: Square, to: Square) -> Result<MoveOutcome, LocalMoveError> {
        let color = match self.local_color {
            Some(color) if self.in_session() => color,
            _ => return Err(LocalMoveError::NoSession),
        };
        let on_move = self.game.side_to_move();
        if on_move != color {
            return Err(LocalMoveError::NotYourTurn(on_move));
        }

        let outcome = self.game.apply_move(from, to)?;
        self.selection = outcome.continues_capture.then_some(to);

        let msg = if outcome.continues_capture {
            ClientMessage::CaptureContinued(outcome.mv)
        } else {
            ClientMessage::Move(outcome.mv)
        };
        if !self.outbound.send(msg) {
            return Err(LocalMoveError::Disconnected);
        }
        if outcome.winner.is_some() {
            self.end_finished_game();
        }
        Ok(outcome)
    }

    // ── Renderer surface ──────────────────────────────────────────────────────

    /// Selects the piece on `square`.  Returns whether the selection took.
    ///
    /// During a chain capture the selection stays on the capturing piece no
    /// matter what is asked for.
    pub fn select(&mut self, square: Square) -> bool {
        if let Some(active) = self.game.active_capturer() {
            self.selection = Some(active);
            return square == active;
        }
        let own = self
            .game
            .board()
            .piece_at(square)
            .is_some_and(|p| Some(p.color) == self.local_color);
        self.selection = own.then_some(square);
        own
    }

    pub fn view(&self) -> GameView {
        let selection = self.game.active_capturer().or(self.selection);
        GameView {
            phase: self.phase,
            board: self.game.board().clone(),
            local_color: self.local_color,
            side_to_move: self.game.side_to_move(),
            selection,
            destinations: selection
                .map(|s| self.game.legal_destinations(s))
                .unwrap_or_default(),
            forced_captures: self.game.forced_captures().to_vec(),
            game_over: self.game.is_game_over(),
            winner: self.game.winner(),
            clock: self.clock,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
