//! # checkers-client
//!
//! Console client for networked checkers.
//!
//! # Architecture
//!
//! - **`application`** – The connection dispatcher (session phases, replaying
//!   opponent moves, sending local ones) and the console command parser.
//!   Nothing here touches a socket.
//!
//! - **`infrastructure`** – The TCP connection: a reader task that decodes
//!   server lines into events and a writer task that sends client lines.

pub mod application;
pub mod infrastructure;
