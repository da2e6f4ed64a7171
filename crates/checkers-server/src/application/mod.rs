//! Application layer for the checkers server.
//!
//! Everything here is transport-agnostic: players are addressed through
//! [`matchmaking::PlayerHandle`]s (an id plus an outbound message channel),
//! so the same code runs behind real sockets and in-memory test channels.
//!
//! # Sub-modules
//!
//! - **`matchmaking`** – Player identities and the FIFO wait queue.
//!
//! - **`session`** – One paired game: its players, per-color clock, and the
//!   cancellable clock task.
//!
//! - **`coordinator`** – The shared server context.  Pairs players, starts
//!   and tears down sessions, and relays moves.

pub mod coordinator;
pub mod matchmaking;
pub mod session;

pub use coordinator::{Coordinator, RelayKind, SessionTiming};
pub use matchmaking::{MatchQueue, PlayerHandle, PlayerId};
pub use session::{GameSession, SessionClock, SessionId};
