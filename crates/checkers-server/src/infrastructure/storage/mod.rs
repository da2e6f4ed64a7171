//! Storage infrastructure: configuration file loading and saving.
//!
//! The `config` sub-module reads the server's TOML file, falls back to
//! defaults when the file does not exist, and converts the stored values
//! into the types the network and application layers expect.

pub mod config;
