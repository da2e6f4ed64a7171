//! Application layer for the checkers client.
//!
//! - [`dispatch`] turns server messages into local game state and local moves
//!   into protocol messages.
//! - [`console`] parses the commands typed at the console.

pub mod console;
pub mod dispatch;

pub use console::{ConsoleCommand, ConsoleError};
pub use dispatch::{
    ConnectionDispatcher, DispatchEvent, DispatcherPhase, GameView, LocalMoveError, Outbound,
};
