//! Infrastructure layer for the checkers server.
//!
//! Contains OS-facing adapters: the TCP listener with its per-connection
//! workers, and TOML configuration storage.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `checkers_core`, but MUST NOT be imported by the `application` layer.

pub mod network;
pub mod storage;

pub use network::{run_server, serve, serve_connection};
