//! Networked checkers console client: entry point.
//!
//! Connects to a checkers server, then reads commands from stdin while a
//! background task feeds server messages into the connection dispatcher.
//!
//! # Usage
//!
//! ```text
//! checkers-client [OPTIONS]
//!
//! Options:
//!   --host <HOST>     Server address [default: 127.0.0.1]
//!   --port <PORT>     Server port [default: 5000]
//!   --vs-computer     Play offline against a random opponent
//!   --seed <SEED>     Seed for the random opponent
//!   --no-log          Disable all log output
//! ```
//!
//! # Event loop (for beginners)
//!
//! `tokio::select!` waits on two sources at once: the next console line and
//! the next [`NetworkEvent`].  Whichever arrives first is handled to
//! completion before the loop waits again, so the dispatcher is only ever
//! touched from this one task.

use std::net::{SocketAddr, ToSocketAddrs};

use anyhow::Context;
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use checkers_client::application::console::HELP;
use checkers_client::application::{
    ConnectionDispatcher, ConsoleCommand, DispatchEvent, GameView, Outbound,
};
use checkers_client::infrastructure::{ClientConnection, ClientConnectionConfig, NetworkEvent};
use checkers_core::domain::opponent::choose_move;
use checkers_core::{Color, Game, DEFAULT_PORT};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Console client for networked checkers.
#[derive(Debug, Parser)]
#[command(name = "checkers-client", about = "Console client for networked checkers", version)]
struct Cli {
    /// Server host name or IP address.
    #[arg(long, env = "CHECKERS_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Server TCP port.
    #[arg(long, env = "CHECKERS_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Play a local game against a random opponent instead of connecting.
    #[arg(long)]
    vs_computer: bool,

    /// Seed for the random opponent; a fresh one is drawn when absent.
    #[arg(long)]
    seed: Option<u64>,

    /// Disable logging entirely.
    #[arg(long)]
    no_log: bool,
}

impl Cli {
    fn server_addr(&self) -> anyhow::Result<SocketAddr> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .with_context(|| format!("cannot resolve {}:{}", self.host, self.port))?
            .next()
            .with_context(|| format!("no address found for {}", self.host))
    }
}

fn init_logging(no_log: bool) {
    let filter = if no_log {
        EnvFilter::new("off")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.no_log);

    if cli.vs_computer {
        let rng = match cli.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        return play_offline(rng).await;
    }

    let config = ClientConnectionConfig {
        server_addr: cli.server_addr()?,
    };
    let (connection, events) = ClientConnection::connect(&config)
        .await
        .context("could not reach the checkers server")?;
    println!("connected to {}. {HELP}", config.server_addr);

    play_online(connection, events).await
}

// ── Online game ───────────────────────────────────────────────────────────────

async fn play_online(
    connection: ClientConnection,
    mut events: tokio::sync::mpsc::Receiver<NetworkEvent>,
) -> anyhow::Result<()> {
    let mut dispatcher = ConnectionDispatcher::new(connection);
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = stdin.next_line() => {
                let Some(line) = line.context("failed to read from stdin")? else {
                    break;
                };
                if !run_online_command(&mut dispatcher, &line) {
                    break;
                }
            }
            event = events.recv() => match event {
                Some(NetworkEvent::MessageReceived(msg)) => {
                    let event = dispatcher.handle(msg);
                    report(&event, &dispatcher.view());
                    if matches!(&event, DispatchEvent::OpponentMoved(o) if o.winner.is_some()) {
                        dispatcher.end_finished_game();
                    }
                }
                Some(NetworkEvent::Disconnected) | None => {
                    println!("disconnected from server");
                    break;
                }
            },
        }
    }

    info!("checkers client stopped");
    Ok(())
}

/// Runs one console line.  Returns `false` when the client should exit.
fn run_online_command<O: Outbound>(dispatcher: &mut ConnectionDispatcher<O>, line: &str) -> bool {
    let cmd = match ConsoleCommand::parse(line) {
        Ok(Some(cmd)) => cmd,
        Ok(None) => return true,
        Err(e) => {
            println!("{e}");
            return true;
        }
    };

    let sent = match cmd {
        ConsoleCommand::Find => dispatcher.find_game(),
        ConsoleCommand::Cancel => dispatcher.cancel_search(),
        ConsoleCommand::End => dispatcher.end_session(),
        ConsoleCommand::Quit => {
            let sent = dispatcher.quit();
            println!("you left the game");
            sent
        }
        ConsoleCommand::Move(mv) => {
            match dispatcher.play_local(mv.from, mv.to) {
                Ok(outcome) if outcome.continues_capture => {
                    println!("{}\ncapture again with {}", render(&dispatcher.view()), mv.to);
                }
                Ok(outcome) => {
                    println!("{}", render(&dispatcher.view()));
                    if let Some(winner) = outcome.winner {
                        println!("game over: {winner:?} wins");
                    }
                }
                Err(e) => println!("move refused: {e}"),
            }
            true
        }
        ConsoleCommand::Select(square) => {
            if dispatcher.select(square) {
                let view = dispatcher.view();
                println!("{square} can move to {}", list(&view.destinations));
            } else {
                println!("cannot select {square}");
            }
            true
        }
        ConsoleCommand::Board => {
            println!("{}", render(&dispatcher.view()));
            true
        }
        ConsoleCommand::Help => {
            println!("{HELP}");
            true
        }
        ConsoleCommand::Exit => return false,
    };
    if !sent {
        warn!("command not sent; connection closed");
    }
    true
}

fn report(event: &DispatchEvent, view: &GameView) {
    match event {
        DispatchEvent::Waiting => println!("waiting for an opponent..."),
        DispatchEvent::Matched(color) => println!("opponent found, you play {color:?}"),
        DispatchEvent::Countdown(secs) => println!("game starts in {secs}s"),
        DispatchEvent::Started => println!("game started\n{}", render(view)),
        DispatchEvent::OpponentMoved(outcome) => {
            println!("opponent played {}\n{}", outcome.mv, render(view));
            if let Some(winner) = outcome.winner {
                println!("game over: {winner:?} wins");
            }
        }
        DispatchEvent::OpponentMoveRejected { mv, error } => {
            println!("opponent sent an impossible move {mv}: {error}");
        }
        DispatchEvent::SearchCancelled => println!("search cancelled"),
        DispatchEvent::OpponentQuit => println!("your opponent left the game"),
        DispatchEvent::SessionEnded => println!("the game was ended"),
        DispatchEvent::Clock(_) | DispatchEvent::Ignored => {}
    }
}

// ── Offline game ──────────────────────────────────────────────────────────────

/// Human plays White, the random opponent plays Black.
async fn play_offline(mut rng: StdRng) -> anyhow::Result<()> {
    let mut game = Game::new();
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    println!("you play White against the computer. {HELP}\n{game_board}", game_board = game.board());

    while let Some(line) = stdin.next_line().await.context("failed to read from stdin")? {
        let cmd = match ConsoleCommand::parse(&line) {
            Ok(Some(cmd)) => cmd,
            Ok(None) => continue,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };
        match cmd {
            ConsoleCommand::Move(mv) => match game.apply_move(mv.from, mv.to) {
                Ok(outcome) if outcome.continues_capture => {
                    println!("{}\ncapture again with {}", game.board(), mv.to);
                }
                Ok(_) => {
                    while game.side_to_move() == Color::Black && !game.is_game_over() {
                        let Some(reply) = choose_move(&game, &mut rng) else {
                            break;
                        };
                        game.apply_move(reply.from, reply.to)
                            .context("random opponent chose an illegal move")?;
                        println!("computer played {reply}");
                    }
                    println!("{}", game.board());
                }
                Err(e) => println!("move refused: {e}"),
            },
            ConsoleCommand::Select(square) => {
                println!("{square} can move to {}", list(&game.legal_destinations(square)));
            }
            ConsoleCommand::Board => println!("{}", game.board()),
            ConsoleCommand::Help => println!("{HELP}"),
            ConsoleCommand::Exit | ConsoleCommand::Quit | ConsoleCommand::End => break,
            ConsoleCommand::Find | ConsoleCommand::Cancel => println!("not available offline"),
        }
        if let Some(winner) = game.winner() {
            println!("game over: {winner:?} wins");
            break;
        }
    }
    Ok(())
}

// ── Rendering ─────────────────────────────────────────────────────────────────

fn render(view: &GameView) -> String {
    let mut out = view.board.to_string();
    let turn = match view.local_color {
        Some(c) if c == view.side_to_move => "your move".to_string(),
        _ => format!("{:?} to move", view.side_to_move),
    };
    out.push_str(&turn);
    if let Some(clock) = view.clock {
        out.push_str(&format!(
            " | White {}s, Black {}s",
            clock.white_secs, clock.black_secs
        ));
    }
    if !view.forced_captures.is_empty() {
        out.push_str(&format!(" | must capture from {}", list(&view.forced_captures)));
    }
    out
}

fn list(squares: &[checkers_core::Square]) -> String {
    if squares.is_empty() {
        return "nowhere".to_string();
    }
    squares
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

// ── Tests ─────────────────────────────────────────────────────────────────────
