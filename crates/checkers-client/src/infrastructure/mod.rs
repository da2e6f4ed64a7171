//! Infrastructure layer: the TCP connection to the server.

pub mod network;

pub use network::{ClientConnection, ClientConnectionConfig, ClientNetworkError, NetworkEvent};
