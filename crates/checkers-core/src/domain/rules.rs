//! Rule engine: move generation, captures, promotion, and game-over detection.
//!
//! [`Game`] owns a [`Board`] and the turn state around it.  Callers query
//! [`Game::legal_destinations`] / [`Game::capture_destinations`] and commit a
//! choice with [`Game::apply_move`].  The engine never trusts the caller: every
//! move is re-derived from the board before anything is mutated.
//!
//! # Rules implemented
//!
//! - **Men** step one square diagonally forward; they capture by jumping an
//!   adjacent opposing piece in any of the four diagonal directions.
//! - **Kings** slide any distance along a diagonal.  A king captures by
//!   sliding over exactly one opposing piece and landing on any empty square
//!   beyond it.
//! - **Forced capture** is global: if any piece of the side to move can
//!   capture, no piece of that side may make a plain move.
//! - **Chain capture**: after a capture, if the same piece can capture again,
//!   the turn does not pass and only that piece may move, and only by capturing.
//! - **Promotion**: a man that ends a move on the far back rank becomes a king.
//! - **Game over**: a side with no pieces loses; a side to move with no legal
//!   move loses.  Once set, the result never changes.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::board::{Board, Color, Piece, PieceId, Rank, Square};

/// The four diagonal directions as `(d_col, d_row)`.
const DIAGONALS: [(i8, i8); 4] = [(-1, -1), (1, -1), (-1, 1), (1, 1)];

/// A move from one square to another.
///
/// Text form (also the wire payload): `colFrom,rowFrom->colTo,rowTo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Move {
    pub from: Square,
    pub to: Square,
}

impl Move {
    pub const fn new(from: Square, to: Square) -> Self {
        Self { from, to }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.from, self.to)
    }
}

/// Why a move was refused.  The board is unchanged whenever one is returned.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MoveError {
    #[error("the game is over")]
    GameOver,
    #[error("no piece on {0}")]
    NoPiece(Square),
    #[error("the piece on {0} does not belong to the side to move")]
    NotYourTurn(Square),
    #[error("destination {0} is off the board")]
    OffBoard(Square),
    #[error("destination {0} is occupied")]
    Occupied(Square),
    #[error("{0} is not a diagonal move")]
    NotDiagonal(Move),
    #[error("{0} does not pass exactly one opposing piece")]
    BlockedPath(Move),
    #[error("the piece on {0} must continue capturing")]
    MustContinueCapture(Square),
    #[error("a capture is available and must be taken")]
    CaptureRequired,
    #[error("{0} is not a legal move")]
    Illegal(Move),
}

/// What happened as a result of a successful [`Game::apply_move`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveOutcome {
    /// The move that was applied.
    pub mv: Move,
    /// Square of the opposing piece that was removed, if this was a capture.
    pub captured: Option<Square>,
    /// Whether the moving man was crowned on this move.
    pub promoted: bool,
    /// Whether the same piece must capture again before the turn passes.
    pub continues_capture: bool,
    /// The winner, if this move ended the game.
    pub winner: Option<Color>,
}

/// Complete game state: board, side to move, capture obligations, and result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Game {
    board: Board,
    side_to_move: Color,
    /// Set only while a chain capture is in progress.
    active_capturer: Option<PieceId>,
    /// Origins of every piece of the side to move that has a capture available.
    forced: Vec<Square>,
    winner: Option<Color>,
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

impl Game {
    /// A new game from the standard starting position, White to move.
    pub fn new() -> Self {
        Self::from_board(Board::standard(), Color::White)
    }

    /// A game from an arbitrary position.
    ///
    /// Forced captures are computed immediately; the game-over check runs
    /// after the first applied move.
    pub fn from_board(board: Board, side_to_move: Color) -> Self {
        let mut game = Self {
            board,
            side_to_move,
            active_capturer: None,
            forced: Vec::new(),
            winner: None,
        };
        game.refresh_forced();
        game
    }

    /// Restores the standard starting position.
    pub fn reset(&mut self) {
        debug!("resetting game");
        *self = Self::new();
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn side_to_move(&self) -> Color {
        self.side_to_move
    }

    /// Origins of the pieces that are obliged to capture this turn.
    pub fn forced_captures(&self) -> &[Square] {
        &self.forced
    }

    /// Square of the piece in the middle of a chain capture, if any.
    pub fn active_capturer(&self) -> Option<Square> {
        self.active_capturer
            .and_then(|id| self.board.piece(id))
            .map(|p| p.square)
    }

    pub fn is_game_over(&self) -> bool {
        self.winner.is_some()
    }

    pub fn winner(&self) -> Option<Color> {
        self.winner
    }

    /// Squares the piece on `from` may legally move to right now.
    ///
    /// Empty when the square is empty, the piece belongs to the side not on
    /// move, the game is over, or a capture obligation elsewhere forbids it.
    pub fn legal_destinations(&self, from: Square) -> Vec<Square> {
        if self.winner.is_some() {
            return Vec::new();
        }
        let Some(piece) = self.board.piece_at(from) else {
            return Vec::new();
        };
        if piece.color != self.side_to_move {
            return Vec::new();
        }

        if let Some(active) = self.active_capturer {
            if piece.id != active {
                return Vec::new();
            }
            return self.capture_destinations(from);
        }

        let captures = self.capture_destinations(from);
        if !captures.is_empty() {
            return captures;
        }
        if !self.forced.is_empty() {
            return Vec::new();
        }
        self.plain_destinations(piece)
    }

    /// Landing squares of every single capture available to the piece on `from`,
    /// ignoring whose turn it is.
    pub fn capture_destinations(&self, from: Square) -> Vec<Square> {
        let Some(piece) = self.board.piece_at(from) else {
            return Vec::new();
        };
        let mut landings = Vec::new();
        for (dc, dr) in DIAGONALS {
            if piece.is_king() {
                self.king_captures_along(piece, dc, dr, &mut landings);
            } else {
                let over = from.offset(dc, dr);
                let landing = over.offset(dc, dr);
                if self.is_opposing(over, piece.color) && self.board.is_vacant(landing) {
                    landings.push(landing);
                }
            }
        }
        landings
    }

    /// Every legal move for the side to move.
    pub fn legal_moves(&self) -> Vec<Move> {
        if self.winner.is_some() {
            return Vec::new();
        }
        self.board
            .pieces()
            .filter(|p| p.color == self.side_to_move)
            .flat_map(|p| {
                let from = p.square;
                self.legal_destinations(from)
                    .into_iter()
                    .map(move |to| Move::new(from, to))
            })
            .collect()
    }

    /// Validates and applies a move of the piece on `from` to `to`.
    ///
    /// The capture (if any) is derived from the board geometry, not from the
    /// caller, and the destination must be one of [`Game::legal_destinations`].
    ///
    /// # Errors
    ///
    /// Returns a [`MoveError`] describing why the move is not allowed.  The
    /// game state is left untouched in that case.
    pub fn apply_move(&mut self, from: Square, to: Square) -> Result<MoveOutcome, MoveError> {
        let mv = Move::new(from, to);
        if self.winner.is_some() {
            return Err(MoveError::GameOver);
        }
        let piece = *self.board.piece_at(from).ok_or(MoveError::NoPiece(from))?;
        if piece.color != self.side_to_move {
            return Err(MoveError::NotYourTurn(from));
        }
        if !to.is_on_board() {
            return Err(MoveError::OffBoard(to));
        }
        if !self.board.is_vacant(to) {
            return Err(MoveError::Occupied(to));
        }
        if let Some(active) = self.active_capturer {
            if active != piece.id {
                let at = self.active_capturer().unwrap_or(from);
                return Err(MoveError::MustContinueCapture(at));
            }
        }

        let captured = self.jumped_square(&piece, mv)?;
        if !self.legal_destinations(from).contains(&to) {
            let obliged = self.active_capturer.is_some() || !self.forced.is_empty();
            return Err(if captured.is_none() && obliged {
                MoveError::CaptureRequired
            } else {
                MoveError::Illegal(mv)
            });
        }

        debug!(%mv, ?captured, "applying move");
        if let Some(square) = captured {
            self.board.remove(square);
        }
        self.board.relocate(piece.id, to);

        let promoted = piece.rank == Rank::Man
            && to.row == piece.color.promotion_row()
            && self.board.promote(piece.id);
        if promoted {
            info!(square = %to, color = %piece.color, "man promoted to king");
        }

        let continues_capture =
            captured.is_some() && !self.capture_destinations(to).is_empty();
        if continues_capture {
            debug!(square = %to, "chain capture continues");
            self.active_capturer = Some(piece.id);
            self.forced = vec![to];
        } else {
            self.active_capturer = None;
            self.side_to_move = self.side_to_move.opponent();
            self.refresh_forced();
        }

        self.check_game_over();

        Ok(MoveOutcome {
            mv,
            captured,
            promoted,
            continues_capture,
            winner: self.winner,
        })
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    fn is_opposing(&self, square: Square, color: Color) -> bool {
        self.board
            .piece_at(square)
            .is_some_and(|p| p.color != color)
    }

    fn plain_destinations(&self, piece: &Piece) -> Vec<Square> {
        let mut out = Vec::new();
        if piece.is_king() {
            for (dc, dr) in DIAGONALS {
                let mut sq = piece.square.offset(dc, dr);
                while self.board.is_vacant(sq) {
                    out.push(sq);
                    sq = sq.offset(dc, dr);
                }
            }
        } else {
            let dr = piece.color.forward();
            for dc in [-1, 1] {
                let sq = piece.square.offset(dc, dr);
                if self.board.is_vacant(sq) {
                    out.push(sq);
                }
            }
        }
        out
    }

    /// Walks one diagonal ray for a king: empties, then exactly one opposing
    /// piece, then every empty landing square up to the next obstacle.
    fn king_captures_along(&self, king: &Piece, dc: i8, dr: i8, out: &mut Vec<Square>) {
        let mut sq = king.square.offset(dc, dr);
        let mut jumped = false;
        while sq.is_on_board() {
            match self.board.piece_at(sq) {
                None if jumped => out.push(sq),
                None => {}
                Some(p) if !jumped && p.color != king.color => jumped = true,
                Some(_) => break,
            }
            sq = sq.offset(dc, dr);
        }
    }

    /// Derives which opposing piece (if any) a move jumps over.
    fn jumped_square(&self, piece: &Piece, mv: Move) -> Result<Option<Square>, MoveError> {
        let dc = mv.to.col - mv.from.col;
        let dr = mv.to.row - mv.from.row;
        if dc == 0 || dc.abs() != dr.abs() {
            return Err(MoveError::NotDiagonal(mv));
        }
        let distance = dc.abs();
        let (sc, sr) = (dc.signum(), dr.signum());

        let mut between = Vec::new();
        let mut sq = mv.from.offset(sc, sr);
        while sq != mv.to {
            if let Some(p) = self.board.piece_at(sq) {
                between.push(*p);
            }
            sq = sq.offset(sc, sr);
        }

        match (piece.rank, distance, between.as_slice()) {
            (_, _, []) if piece.is_king() || distance == 1 => Ok(None),
            (Rank::Man, 2, [over]) | (Rank::King, _, [over]) if over.color != piece.color => {
                Ok(Some(over.square))
            }
            (Rank::King, _, _) => Err(MoveError::BlockedPath(mv)),
            _ => Err(MoveError::Illegal(mv)),
        }
    }

    fn refresh_forced(&mut self) {
        let side = self.side_to_move;
        self.forced = self
            .board
            .pieces()
            .filter(|p| p.color == side)
            .map(|p| p.square)
            .filter(|&sq| !self.capture_destinations(sq).is_empty())
            .collect();
        if !self.forced.is_empty() {
            debug!(count = self.forced.len(), "pieces obliged to capture");
        }
    }

    fn check_game_over(&mut self) {
        if self.winner.is_some() {
            return;
        }
        let winner = if self.board.count(Color::White) == 0 {
            Some(Color::Black)
        } else if self.board.count(Color::Black) == 0 {
            Some(Color::White)
        } else if self.legal_moves().is_empty() {
            Some(self.side_to_move.opponent())
        } else {
            None
        };
        if let Some(color) = winner {
            info!(winner = %color, "game over");
            self.winner = Some(color);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
