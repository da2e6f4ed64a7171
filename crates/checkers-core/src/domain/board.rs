//! Board model: an 8×8 grid addressing an arena of piece records.
//!
//! The grid never holds pieces directly.  Each cell holds an optional
//! [`PieceId`], which indexes into the board's piece arena.  Relocating a piece
//! updates both the grid and the record in one place, so a piece's identity and
//! its position cannot drift apart.
//!
//! # Coordinates
//!
//! A [`Square`] is written `col,row`, matching the wire format.  Row 0 is the
//! top edge (Black's back rank); row 7 is the bottom edge (White's back rank).
//! Only dark squares, where `row + col` is odd, are ever occupied.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Width and height of the board.
pub const BOARD_SIZE: i8 = 8;

/// Number of rows each side fills at the start of a game.
const STARTING_ROWS: i8 = 3;

/// Errors produced when setting up a board position.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BoardError {
    /// The square lies outside the 8×8 grid.
    #[error("square {0} is off the board")]
    OffBoard(Square),

    /// The cell already holds a piece.
    #[error("square {0} is already occupied")]
    Occupied(Square),

    /// Pieces stand only on dark squares.
    #[error("square {0} is a light square")]
    LightSquare(Square),
}

/// One of the two sides.
///
/// White starts on rows 5–7, moves toward row 0, and moves first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Color {
    White,
    Black,
}

impl Color {
    /// Returns the other side.
    pub fn opponent(self) -> Self {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    /// Row delta of a forward step for a man of this color.
    pub fn forward(self) -> i8 {
        match self {
            Color::White => -1,
            Color::Black => 1,
        }
    }

    /// The row on which a man of this color is promoted.
    pub fn promotion_row(self) -> i8 {
        match self {
            Color::White => 0,
            Color::Black => BOARD_SIZE - 1,
        }
    }

    /// Upper-case name used on the wire.
    pub fn as_wire(self) -> &'static str {
        match self {
            Color::White => "WHITE",
            Color::Black => "BLACK",
        }
    }

    /// Parses the wire name produced by [`Color::as_wire`].
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "WHITE" => Some(Color::White),
            "BLACK" => Some(Color::Black),
            _ => None,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// Rank of a piece.  Promotion from `Man` to `King` is one-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rank {
    Man,
    King,
}

/// A cell on the board, addressed by column and row.
///
/// Coordinates are signed so that diagonal rays can step past the edge and be
/// rejected by [`Square::is_on_board`] rather than wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Square {
    pub col: i8,
    pub row: i8,
}

impl Square {
    /// Creates a square from a column and a row (wire order).
    pub const fn new(col: i8, row: i8) -> Self {
        Self { col, row }
    }

    /// Whether both coordinates fall inside the grid.
    pub fn is_on_board(self) -> bool {
        (0..BOARD_SIZE).contains(&self.row) && (0..BOARD_SIZE).contains(&self.col)
    }

    /// Whether this is a playable (dark) square.
    pub fn is_dark(self) -> bool {
        (self.row + self.col).rem_euclid(2) == 1
    }

    /// The square reached by stepping `(dc, dr)` from here.
    pub fn offset(self, dc: i8, dr: i8) -> Self {
        Self::new(self.col + dc, self.row + dr)
    }

    fn index(self) -> Option<(usize, usize)> {
        self.is_on_board()
            .then(|| (self.row as usize, self.col as usize))
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.col, self.row)
    }
}

/// Stable identity of a piece for the lifetime of a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PieceId(pub u8);

/// A piece record owned by the [`Board`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Piece {
    pub id: PieceId,
    pub color: Color,
    pub rank: Rank,
    pub square: Square,
}

impl Piece {
    pub fn is_king(&self) -> bool {
        self.rank == Rank::King
    }
}

/// The 8×8 grid plus the arena of piece records it refers to.
///
/// Captured pieces leave an empty slot in the arena so that ids handed out
/// earlier stay valid (they simply resolve to `None`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    cells: [[Option<PieceId>; BOARD_SIZE as usize]; BOARD_SIZE as usize],
    pieces: Vec<Option<Piece>>,
}

impl Default for Board {
    fn default() -> Self {
        Self::empty()
    }
}

impl Board {
    /// A board with no pieces on it.
    pub fn empty() -> Self {
        Self {
            cells: [[None; BOARD_SIZE as usize]; BOARD_SIZE as usize],
            pieces: Vec::new(),
        }
    }

    /// The standard starting position: 12 Black men on rows 0–2 and 12 White
    /// men on rows 5–7, all on dark squares.
    pub fn standard() -> Self {
        let mut board = Self::empty();
        for row in 0..BOARD_SIZE {
            let color = if row < STARTING_ROWS {
                Color::Black
            } else if row >= BOARD_SIZE - STARTING_ROWS {
                Color::White
            } else {
                continue;
            };
            for col in 0..BOARD_SIZE {
                let square = Square::new(col, row);
                if square.is_dark() {
                    // Cannot fail: dark, on-board, and visited once.
                    let _ = board.place(square, color, Rank::Man);
                }
            }
        }
        board
    }

    /// Puts a new piece on the board and returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError`] if the square is off the board, light, or
    /// occupied.
    pub fn place(&mut self, square: Square, color: Color, rank: Rank) -> Result<PieceId, BoardError> {
        if square.is_on_board() && !square.is_dark() {
            return Err(BoardError::LightSquare(square));
        }
        self.place_unchecked(square, color, rank)
    }

    /// Like [`Board::place`] but skips the dark-square check, for positions
    /// written in light-square coordinates.  Diagonal moves keep a piece on
    /// its square colour, so such a position stays consistent.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError`] if the square is off the board or occupied.
    pub fn place_unchecked(
        &mut self,
        square: Square,
        color: Color,
        rank: Rank,
    ) -> Result<PieceId, BoardError> {
        let (r, c) = square.index().ok_or(BoardError::OffBoard(square))?;
        if self.cells[r][c].is_some() {
            return Err(BoardError::Occupied(square));
        }
        let id = PieceId(self.pieces.len() as u8);
        self.pieces.push(Some(Piece {
            id,
            color,
            rank,
            square,
        }));
        self.cells[r][c] = Some(id);
        Ok(id)
    }

    /// The piece standing on `square`, if any.
    pub fn piece_at(&self, square: Square) -> Option<&Piece> {
        let (r, c) = square.index()?;
        self.cells[r][c].and_then(|id| self.piece(id))
    }

    /// The piece with the given id, if it is still on the board.
    pub fn piece(&self, id: PieceId) -> Option<&Piece> {
        self.pieces.get(id.0 as usize).and_then(Option::as_ref)
    }

    /// All pieces still on the board, in arena order.
    pub fn pieces(&self) -> impl Iterator<Item = &Piece> + '_ {
        self.pieces.iter().flatten()
    }

    /// Number of pieces of `color` still on the board.
    pub fn count(&self, color: Color) -> usize {
        self.pieces().filter(|p| p.color == color).count()
    }

    /// Whether `square` is on the board and empty.
    pub fn is_vacant(&self, square: Square) -> bool {
        square
            .index()
            .map(|(r, c)| self.cells[r][c].is_none())
            .unwrap_or(false)
    }

    /// Moves a piece to an empty square.  The caller has already validated the move.
    pub(crate) fn relocate(&mut self, id: PieceId, to: Square) {
        let Some(from) = self.piece(id).map(|p| p.square) else {
            return;
        };
        let (Some((fr, fc)), Some((tr, tc))) = (from.index(), to.index()) else {
            return;
        };
        self.cells[fr][fc] = None;
        self.cells[tr][tc] = Some(id);
        if let Some(Some(piece)) = self.pieces.get_mut(id.0 as usize) {
            piece.square = to;
        }
    }

    /// Takes the piece on `square` off the board.
    pub(crate) fn remove(&mut self, square: Square) -> Option<Piece> {
        let (r, c) = square.index()?;
        let id = self.cells[r][c].take()?;
        self.pieces.get_mut(id.0 as usize).and_then(Option::take)
    }

    /// Crowns a man.  Returns `true` if the rank changed.
    pub(crate) fn promote(&mut self, id: PieceId) -> bool {
        match self.pieces.get_mut(id.0 as usize) {
            Some(Some(piece)) if piece.rank == Rank::Man => {
                piece.rank = Rank::King;
                true
            }
            _ => false,
        }
    }
}

impl fmt::Display for Board {
    /// ASCII rendering: `w`/`b` men, `W`/`B` kings, `.` empty dark squares.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  01234567")?;
        for row in 0..BOARD_SIZE {
            write!(f, "{row} ")?;
            for col in 0..BOARD_SIZE {
                let square = Square::new(col, row);
                let ch = match self.piece_at(square) {
                    Some(p) => match (p.color, p.rank) {
                        (Color::White, Rank::Man) => 'w',
                        (Color::White, Rank::King) => 'W',
                        (Color::Black, Rank::Man) => 'b',
                        (Color::Black, Rank::King) => 'B',
                    },
                    None if square.is_dark() => '.',
                    None => ' ',
                };
                write!(f, "{ch}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_board_has_twelve_pieces_per_color() {
        let board = Board::standard();
        assert_eq!(board.count(Color::White), 12);
        assert_eq!(board.count(Color::Black), 12);
    }

    #[test]
    fn test_standard_board_places_pieces_on_dark_squares_in_home_rows() {
        let board = Board::standard();
        for piece in board.pieces() {
            assert!(piece.square.is_dark(), "{} must be dark", piece.square);
            assert_eq!(piece.rank, Rank::Man);
            match piece.color {
                Color::Black => assert!((0..=2).contains(&piece.square.row)),
                Color::White => assert!((5..=7).contains(&piece.square.row)),
            }
        }
    }

    #[test]
    fn test_place_rejects_off_board_square() {
        let mut board = Board::empty();
        let sq = Square::new(8, 1);
        assert_eq!(
            board.place(sq, Color::Black, Rank::Man),
            Err(BoardError::OffBoard(sq))
        );
    }

    #[test]
    fn test_place_rejects_light_square() {
        let mut board = Board::empty();
        let sq = Square::new(0, 0);
        assert_eq!(
            board.place(sq, Color::Black, Rank::Man),
            Err(BoardError::LightSquare(sq))
        );
        assert_eq!(board.pieces().count(), 0);
    }

    #[test]
    fn test_place_unchecked_accepts_light_square() {
        let mut board = Board::empty();
        let sq = Square::new(1, 5);
        let id = board.place_unchecked(sq, Color::White, Rank::Man).unwrap();
        assert_eq!(board.piece_at(sq).map(|p| p.id), Some(id));
        assert_eq!(
            board.place_unchecked(Square::new(8, 0), Color::White, Rank::Man),
            Err(BoardError::OffBoard(Square::new(8, 0)))
        );
    }

    #[test]
    fn test_place_rejects_occupied_square() {
        let mut board = Board::empty();
        let sq = Square::new(1, 0);
        board.place(sq, Color::Black, Rank::Man).unwrap();
        assert_eq!(
            board.place(sq, Color::White, Rank::King),
            Err(BoardError::Occupied(sq))
        );
    }

    #[test]
    fn test_relocate_updates_grid_and_record_together() {
        let mut board = Board::empty();
        let from = Square::new(2, 5);
        let to = Square::new(1, 4);
        let id = board.place(from, Color::White, Rank::Man).unwrap();

        board.relocate(id, to);

        assert!(board.is_vacant(from));
        assert_eq!(board.piece_at(to).map(|p| p.id), Some(id));
        assert_eq!(board.piece(id).map(|p| p.square), Some(to));
    }

    #[test]
    fn test_remove_invalidates_piece_id() {
        let mut board = Board::empty();
        let sq = Square::new(3, 4);
        let id = board.place(sq, Color::Black, Rank::Man).unwrap();

        let removed = board.remove(sq);

        assert_eq!(removed.map(|p| p.id), Some(id));
        assert!(board.piece(id).is_none());
        assert!(board.is_vacant(sq));
    }

    #[test]
    fn test_promote_is_one_way() {
        let mut board = Board::empty();
        let id = board.place(Square::new(1, 0), Color::White, Rank::Man).unwrap();
        assert!(board.promote(id));
        assert!(!board.promote(id), "a king cannot be promoted again");
        assert_eq!(board.piece(id).map(|p| p.rank), Some(Rank::King));
    }

    #[test]
    fn test_is_vacant_is_false_off_board() {
        let board = Board::empty();
        assert!(!board.is_vacant(Square::new(-1, 0)));
    }

    #[test]
    fn test_color_wire_names_round_trip() {
        for color in [Color::White, Color::Black] {
            assert_eq!(Color::from_wire(color.as_wire()), Some(color));
        }
        assert_eq!(Color::from_wire("white"), None);
    }

    #[test]
    fn test_display_renders_kings_in_upper_case() {
        let mut board = Board::empty();
        board.place(Square::new(1, 0), Color::White, Rank::King).unwrap();
        let text = board.to_string();
        assert!(text.lines().nth(1).unwrap().contains('W'));
    }
}
