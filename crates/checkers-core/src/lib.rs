//! # checkers-core
//!
//! Shared library for networked checkers containing the board model, the rule
//! engine, and the line-based wire protocol.
//!
//! This crate is used by both the server and client applications.
//! It has zero dependencies on sockets, async runtimes, or UI frameworks.
//!
//! # Architecture overview
//!
//! Two instances of the game stay synchronised through a relay server: each
//! client runs its own copy of the rule engine, and the server only pairs
//! players, keeps the clock, and forwards moves.
//!
//! - **`domain`** – Pure game logic.  `Board` is an arena of pieces addressed
//!   by square; `Game` wraps it with the side to move, forced captures, chain
//!   captures, promotion, and game-over detection.
//!
//! - **`protocol`** – How messages travel over the network.  Every message is
//!   a single UTF-8 text line of the form `COMMAND` or `COMMAND:PAYLOAD`.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `checkers_core::Game` instead of `checkers_core::domain::rules::Game`.
pub use domain::board::{Board, BoardError, Color, Piece, PieceId, Rank, Square, BOARD_SIZE};
pub use domain::rules::{Game, Move, MoveError, MoveOutcome};
pub use protocol::codec::{
    decode_client, decode_server, encode_client, encode_server, ProtocolError,
};
pub use protocol::messages::{ClientMessage, ServerMessage, TimeSnapshot, DEFAULT_PORT};
