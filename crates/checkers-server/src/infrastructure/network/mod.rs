//! TCP accept loop and per-connection workers.
//!
//! Each accepted connection runs two tasks:
//!
//! - **Reader** (the connection task itself): reads lines, decodes them, and
//!   hands the messages to the [`Coordinator`].  Undecodable lines are logged
//!   and dropped; the connection stays open.
//! - **Writer**: drains the player's outbound channel and writes one line per
//!   message.  Because every message to a player goes through this single
//!   channel, the player sees messages in exactly the order they were sent.
//!
//! When the reader hits end-of-stream or an I/O error the player is
//! disconnected from the coordinator, which tears down any session exactly as
//! an explicit `QUIT` would.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use checkers_core::{decode_client, encode_server, ServerMessage};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::application::{Coordinator, PlayerHandle, PlayerId};

/// How often the accept loop re-checks the shutdown flag.
const ACCEPT_POLL: Duration = Duration::from_millis(200);

// ── Public API ────────────────────────────────────────────────────────────────

/// Binds `addr` and serves connections until `running` is cleared.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot be bound (e.g., the port is
/// already in use).
pub async fn run_server(
    addr: SocketAddr,
    coordinator: Arc<Coordinator>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind checkers listener on {addr}"))?;
    info!("checkers server listening on {addr}");

    serve(listener, coordinator, running).await
}

/// Accept loop over an already-bound listener.
///
/// Separate from [`run_server`] so tests can bind port 0 and learn the
/// address before serving.
///
/// # Errors
///
/// Currently never fails; accept errors are logged and the loop continues.
pub async fn serve(
    listener: TcpListener,
    coordinator: Arc<Coordinator>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        match timeout(ACCEPT_POLL, listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                info!("new connection from {peer_addr}");
                let coordinator = Arc::clone(&coordinator);
                tokio::spawn(handle_connection(stream, peer_addr, coordinator));
            }
            Ok(Err(e)) => error!("accept error: {e}"),
            Err(_) => {}
        }
    }
    Ok(())
}

/// Runs one player's connection to completion.
///
/// Generic over the stream halves so tests can drive it with in-memory
/// duplex pipes instead of sockets.  Returns the player's id once the
/// connection has closed and the player has been disconnected.
pub async fn serve_connection<R, W>(reader: R, writer: W, coordinator: Arc<Coordinator>) -> PlayerId
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let player = PlayerHandle::new(tx);
    let id = player.id();
    let writer_task = tokio::spawn(write_lines(writer, rx, id));

    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match decode_client(&line) {
                Ok(msg) => coordinator.handle(&player, msg).await,
                Err(e) => warn!(player = %id, "discarding undecodable line {line:?}: {e}"),
            },
            Ok(None) => {
                debug!(player = %id, "connection closed by peer");
                break;
            }
            Err(e) => {
                warn!(player = %id, "read error: {e}");
                break;
            }
        }
    }

    coordinator.disconnect(id).await;
    drop(player);
    if let Err(e) = writer_task.await {
        debug!(player = %id, "writer task ended abnormally: {e}");
    }
    info!(player = %id, "player disconnected");
    id
}

// ── Internals ─────────────────────────────────────────────────────────────────

async fn handle_connection(stream: TcpStream, peer_addr: SocketAddr, coordinator: Arc<Coordinator>) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!("could not set TCP_NODELAY for {peer_addr}: {e}");
    }
    let (read_half, write_half) = stream.into_split();
    let player = serve_connection(read_half, write_half, coordinator).await;
    info!("connection {peer_addr} ({player}) finished");
}

/// Writes every queued message as one line until all senders are gone or
/// the peer stops accepting data.
async fn write_lines<W>(mut writer: W, mut rx: UnboundedReceiver<ServerMessage>, player: PlayerId)
where
    W: AsyncWrite + Unpin,
{
    while let Some(msg) = rx.recv().await {
        let mut line = encode_server(&msg);
        line.push('\n');
        let written = async {
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await
        }
        .await;
        if let Err(e) = written {
            debug!(%player, "write failed, dropping remaining messages: {e}");
            break;
        }
        debug!(%player, "sent {}", line.trim_end());
    }
    let _ = writer.shutdown().await;
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::SessionTiming;
    use tokio::io::{duplex, AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_scripted_client_gets_one_line_per_reply_then_leaves_queue() {
        // Arrange: the reader ends after the script, which closes the connection.
        let coordinator = Arc::new(Coordinator::default());
        let reader = Builder::new()
            .read(b"FIND_GAME
HELLO
CANCEL_")
            .read(b"SEARCH
FIND_GAME
")
            .build();
        let writer = Builder::new()
            .write(b"WAITING
")
            .write(b"SEARCH_CANCELLED
")
            .write(b"WAITING
")
            .build();

        // Act / Assert: the writer mock panics on any unexpected or missing line.
        serve_connection(reader, writer, Arc::clone(&coordinator)).await;
        assert_eq!(coordinator.waiting_players().await, 0);
    }

    #[tokio::test]
    async fn test_find_game_over_a_pipe_answers_waiting() {
        // Arrange: one side of each pipe is the "server", the other the "client".
        let coordinator = Arc::new(Coordinator::new(SessionTiming::default()));
        let (client_out, server_in) = duplex(1024);
        let (server_out, client_in) = duplex(1024);
        let server = tokio::spawn(serve_connection(server_in, server_out, Arc::clone(&coordinator)));

        // Act
        let mut client_out = client_out;
        client_out.write_all(b"FIND_GAME\n").await.unwrap();
        let mut replies = BufReader::new(client_in).lines();
        let first = replies.next_line().await.unwrap();

        // Assert
        assert_eq!(first.as_deref(), Some("WAITING"));
        assert_eq!(coordinator.waiting_players().await, 1);

        drop(client_out);
        server.await.unwrap();
        assert_eq!(coordinator.waiting_players().await, 0);
    }

    #[tokio::test]
    async fn test_garbage_line_is_ignored_and_connection_survives() {
        let coordinator = Arc::new(Coordinator::default());
        let (mut client_out, server_in) = duplex(1024);
        let (server_out, client_in) = duplex(1024);
        let server = tokio::spawn(serve_connection(server_in, server_out, Arc::clone(&coordinator)));

        client_out
            .write_all(b"NONSENSE\nMOVE:1,2\r\nCANCEL_SEARCH\r\n")
            .await
            .unwrap();
        let mut replies = BufReader::new(client_in).lines();

        assert_eq!(
            replies.next_line().await.unwrap().as_deref(),
            Some("SEARCH_CANCELLED")
        );

        drop(client_out);
        server.await.unwrap();
    }
}
