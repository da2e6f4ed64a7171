//! Network infrastructure for the client application.
//!
//! Handles the TCP connection to the server and turns inbound lines into
//! [`NetworkEvent`]s for the application layer.
//!
//! Architecture:
//! - `ClientConnection` owns the sending side.  Outbound messages go through
//!   an unbounded channel drained by a writer task, so sending never blocks
//!   and messages leave in the order they were queued.
//! - `read_loop` runs in its own task, decodes one [`ServerMessage`] per
//!   line, and forwards it on an `mpsc` channel.  End-of-stream or a read
//!   error ends the loop with [`NetworkEvent::Disconnected`].

use std::net::SocketAddr;

use checkers_core::{decode_server, encode_client, ClientMessage, ServerMessage, DEFAULT_PORT};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::application::Outbound;

/// Capacity of the inbound event channel.
const EVENT_CHANNEL_CAPACITY: usize = 128;

/// Errors that can occur in the client network layer.
#[derive(Debug, Error)]
pub enum ClientNetworkError {
    /// TCP connection to the server failed.
    #[error("failed to connect to server at {addr}: {source}")]
    ConnectFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    /// An I/O error occurred on the established connection.
    #[error("connection I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration for the client's network connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConnectionConfig {
    /// Address of the server's TCP port.
    pub server_addr: SocketAddr,
}

impl Default for ClientConnectionConfig {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)),
        }
    }
}

/// Events emitted by the network layer to the application layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkEvent {
    /// A message was received from the server.
    MessageReceived(ServerMessage),
    /// The connection was closed or failed.
    Disconnected,
}

/// The sending half of a connection to the server.
pub struct ClientConnection {
    outbound: UnboundedSender<ClientMessage>,
    writer: JoinHandle<()>,
}

impl ClientConnection {
    /// Connects to the server and starts the reader and writer tasks.
    ///
    /// Returns the connection and the receiver for inbound events.
    ///
    /// # Errors
    ///
    /// Returns [`ClientNetworkError::ConnectFailed`] if the TCP connection
    /// cannot be established.
    pub async fn connect(
        config: &ClientConnectionConfig,
    ) -> Result<(Self, mpsc::Receiver<NetworkEvent>), ClientNetworkError> {
        let addr = config.server_addr;
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| ClientNetworkError::ConnectFailed { addr, source })?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!("could not set TCP_NODELAY: {e}");
        }
        info!("connected to server at {addr}");

        let (read_half, write_half) = stream.into_split();
        Ok(Self::from_halves(read_half, write_half))
    }

    /// Starts the reader and writer tasks over arbitrary stream halves.
    pub fn from_halves<R, W>(reader: R, writer: W) -> (Self, mpsc::Receiver<NetworkEvent>)
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        tokio::spawn(async move { read_loop(BufReader::new(reader), event_tx).await });

        let (outbound, rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(write_loop(writer, rx));
        (Self { outbound, writer }, event_rx)
    }

    /// Queues `msg` to be written as one line.  Returns `false` once the
    /// writer has stopped.
    pub fn send(&self, msg: ClientMessage) -> bool {
        self.outbound.send(msg).is_ok()
    }

    /// Flushes every queued message and closes the sending side.
    pub async fn close(self) {
        drop(self.outbound);
        if let Err(e) = self.writer.await {
            debug!("writer task ended abnormally: {e}");
        }
    }
}

impl Outbound for ClientConnection {
    fn send(&self, msg: ClientMessage) -> bool {
        ClientConnection::send(self, msg)
    }
}

/// Reads server lines and forwards them on `tx` until the stream ends.
///
/// Undecodable lines are logged and skipped.  The last event sent is always
/// [`NetworkEvent::Disconnected`] unless the receiver has gone away.
pub async fn read_loop<R>(reader: R, tx: mpsc::Sender<NetworkEvent>)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match decode_server(&line) {
                Ok(msg) => {
                    debug!("received {}", msg.command());
                    if tx.send(NetworkEvent::MessageReceived(msg)).await.is_err() {
                        return;
                    }
                }
                Err(e) => warn!("discarding undecodable line {line:?}: {e}"),
            },
            Ok(None) => {
                info!("server closed the connection");
                break;
            }
            Err(e) => {
                error!("read error on server connection: {e}");
                break;
            }
        }
    }
    let _ = tx.send(NetworkEvent::Disconnected).await;
}

async fn write_loop<W>(mut writer: W, mut rx: UnboundedReceiver<ClientMessage>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(msg) = rx.recv().await {
        let mut line = encode_client(&msg);
        line.push('\n');
        let written = async {
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await
        }
        .await;
        if let Err(e) = written {
            error!("failed to send {}: {e}", msg.command());
            break;
        }
        debug!("sent {}", line.trim_end());
    }
    let _ = writer.shutdown().await;
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use checkers_core::{Color, Move, Square, TimeSnapshot};
    use tokio_test::io::Builder;

    async fn collect(mut rx: mpsc::Receiver<NetworkEvent>) -> Vec<NetworkEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_client_connection_config_default_targets_port_5000() {
        let cfg = ClientConnectionConfig::default();
        assert_eq!(cfg.server_addr.to_string(), "127.0.0.1:5000");
    }

    #[tokio::test]
    async fn test_read_loop_decodes_lines_then_reports_disconnect() {
        // Arrange: the script splits one line across two reads.
        let mock = Builder::new()
            .read(b"WAITING\nGAME_FOUND:WH")
            .read(b"ITE\nTIME_UPDATE:3:1:BLACK\r\n")
            .build();
        let (tx, rx) = mpsc::channel(16);

        // Act
        read_loop(BufReader::new(mock), tx).await;

        // Assert
        assert_eq!(
            collect(rx).await,
            vec![
                NetworkEvent::MessageReceived(ServerMessage::Waiting),
                NetworkEvent::MessageReceived(ServerMessage::GameFound(Color::White)),
                NetworkEvent::MessageReceived(ServerMessage::TimeUpdate(TimeSnapshot::new(
                    3,
                    1,
                    Color::Black
                ))),
                NetworkEvent::Disconnected,
            ]
        );
    }

    #[tokio::test]
    async fn test_read_loop_skips_undecodable_lines() {
        let mock = Builder::new()
            .read(b"HELLO\nOPPONENT_MOVE:1,2\n\nOPPONENT_MOVE:1,2->2,3\n")
            .build();
        let (tx, rx) = mpsc::channel(16);

        read_loop(BufReader::new(mock), tx).await;

        assert_eq!(
            collect(rx).await,
            vec![
                NetworkEvent::MessageReceived(ServerMessage::OpponentMove(Move::new(
                    Square::new(1, 2),
                    Square::new(2, 3)
                ))),
                NetworkEvent::Disconnected,
            ]
        );
    }

    #[tokio::test]
    async fn test_read_error_ends_loop_with_disconnect() {
        let mock = Builder::new()
            .read(b"GAME_STARTED\n")
            .read_error(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"))
            .build();
        let (tx, rx) = mpsc::channel(16);

        read_loop(BufReader::new(mock), tx).await;

        assert_eq!(
            collect(rx).await,
            vec![
                NetworkEvent::MessageReceived(ServerMessage::GameStarted),
                NetworkEvent::Disconnected,
            ]
        );
    }

    #[tokio::test]
    async fn test_write_loop_writes_one_line_per_message_in_order() {
        // Arrange
        let mock = Builder::new()
            .write(b"FIND_GAME\n")
            .write(b"MOVE:2,5->3,4\n")
            .build();
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(ClientMessage::FindGame).unwrap();
        tx.send(ClientMessage::Move(Move::new(Square::new(2, 5), Square::new(3, 4))))
            .unwrap();
        drop(tx);

        // Act / Assert: the mock panics on any unexpected or missing write.
        write_loop(mock, rx).await;
    }

    #[tokio::test]
    async fn test_connection_over_pipes_sends_and_receives() {
        // Arrange
        let (client_side, server_side) = tokio::io::duplex(1024);
        let (client_read, client_write) = tokio::io::split(client_side);
        let (server_read, mut server_write) = tokio::io::split(server_side);
        let (conn, mut events) = ClientConnection::from_halves(client_read, client_write);

        // Act
        assert!(conn.send(ClientMessage::FindGame));
        server_write.write_all(b"WAITING\n").await.unwrap();

        // Assert
        let mut server_lines = BufReader::new(server_read).lines();
        assert_eq!(server_lines.next_line().await.unwrap().as_deref(), Some("FIND_GAME"));
        assert_eq!(
            events.recv().await,
            Some(NetworkEvent::MessageReceived(ServerMessage::Waiting))
        );
        conn.close().await;
    }

    #[tokio::test]
    async fn test_connect_to_closed_port_fails() {
        // Port 1 is privileged and normally closed.
        let cfg = ClientConnectionConfig {
            server_addr: "127.0.0.1:1".parse().unwrap(),
        };
        let result = ClientConnection::connect(&cfg).await;
        assert!(matches!(result, Err(ClientNetworkError::ConnectFailed { .. })));
    }
}
