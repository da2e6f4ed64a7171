//! Domain entities for checkers.
//!
//! This module contains pure game logic with no infrastructure dependencies.
//! It compiles and tests on any platform without sockets or a runtime, which
//! is what lets the server, the client, and the benches share one rule set.
//!
//! Dependency order is leaf to root: `board` knows nothing about rules,
//! `rules` drives the board, and `opponent` only consumes the public rule API.

/// Board model: colors, ranks, squares, and the piece arena.
pub mod board;

/// Random move chooser for local games against the computer.
pub mod opponent;

/// Rule engine: move generation, captures, promotion, and game-over detection.
///
/// See [`rules::Game`] for the main type.
pub mod rules;
