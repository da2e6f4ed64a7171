//! Computer opponent that plays a uniformly random legal move.
//!
//! The chooser is stateless and takes the RNG as a parameter so tests can
//! pass a seeded generator and get a reproducible game.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::trace;

use crate::domain::rules::{Game, Move};

/// Picks one legal move for the side to move, or `None` when there is none
/// (including when the game is already over).
///
/// During a chain capture the only legal moves are further captures by the
/// active piece, so the chooser continues the chain automatically.
pub fn choose_move<R: Rng + ?Sized>(game: &Game, rng: &mut R) -> Option<Move> {
    let moves = game.legal_moves();
    let choice = moves.choose(rng).copied();
    trace!(candidates = moves.len(), ?choice, "computer move chosen");
    choice
}

// ── Tests ─────────────────────────────────────────────────────────────────────
