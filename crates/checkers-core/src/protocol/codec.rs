//! Line codec for the networked-checkers protocol.
//!
//! Wire format (one message per line, no trailing newline in the encoded
//! string; the transport adds `\n`):
//! ```text
//! COMMAND
//! COMMAND:PAYLOAD
//! ```
//! Payload grammars:
//! ```text
//! move         colFrom,rowFrom->colTo,rowTo      e.g. 2,5->1,4
//! time update  whiteSeconds:blackSeconds:TURN    e.g. 12:7:BLACK
//! color        WHITE | BLACK
//! countdown    non-negative integer seconds
//! ```
//! Decoding is all-or-nothing: a line either yields a complete message or a
//! [`ProtocolError`], never a partially filled one.

use thiserror::Error;

use crate::domain::board::{Color, Square};
use crate::domain::rules::Move;
use crate::protocol::messages::{
    command, ClientMessage, ServerMessage, TimeSnapshot, PAYLOAD_SEPARATOR,
};

/// Errors that can occur while decoding a protocol line.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The line was blank after trimming.
    #[error("empty line")]
    Empty,

    /// The command word is not part of the vocabulary for this direction.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// The command requires a payload but none was given.
    #[error("{0} requires a payload")]
    MissingPayload(&'static str),

    /// The command takes no payload but one was given.
    #[error("{0} does not take a payload")]
    UnexpectedPayload(&'static str),

    /// The move payload does not match `c,r->c,r`.
    #[error("malformed move payload: {0:?}")]
    MalformedMove(String),

    /// The time-update payload does not have exactly three fields.
    #[error("malformed time update payload: {0:?}")]
    MalformedTimeUpdate(String),

    /// The color is neither `WHITE` nor `BLACK`.
    #[error("unknown color: {0:?}")]
    UnknownColor(String),

    /// A numeric field is not a valid integer for its type.
    #[error("invalid number: {0:?}")]
    InvalidNumber(String),
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes a client message as a single line (without the newline).
///
/// # Examples
///
/// ```rust
/// use checkers_core::{decode_client, encode_client, ClientMessage, Move, Square};
///
/// let msg = ClientMessage::Move(Move::new(Square::new(2, 5), Square::new(1, 4)));
/// let line = encode_client(&msg);
/// assert_eq!(line, "MOVE:2,5->1,4");
/// assert_eq!(decode_client(&line).unwrap(), msg);
/// ```
pub fn encode_client(msg: &ClientMessage) -> String {
    match msg {
        ClientMessage::Move(mv) | ClientMessage::CaptureContinued(mv) => {
            with_payload(msg.command(), mv)
        }
        ClientMessage::FindGame
        | ClientMessage::CancelSearch
        | ClientMessage::Quit
        | ClientMessage::EndSession => msg.command().to_string(),
    }
}

/// Encodes a server message as a single line (without the newline).
pub fn encode_server(msg: &ServerMessage) -> String {
    let cmd = msg.command();
    match msg {
        ServerMessage::GameFound(color) => with_payload(cmd, color.as_wire()),
        ServerMessage::GameStarting(secs) => with_payload(cmd, secs),
        ServerMessage::OpponentMove(mv) | ServerMessage::OpponentCaptureContinued(mv) => {
            with_payload(cmd, mv)
        }
        ServerMessage::TimeUpdate(t) => format!(
            "{cmd}{sep}{}{sep}{}{sep}{}",
            t.white_secs,
            t.black_secs,
            t.turn.as_wire(),
            sep = PAYLOAD_SEPARATOR
        ),
        ServerMessage::Waiting
        | ServerMessage::GameStarted
        | ServerMessage::SearchCancelled
        | ServerMessage::OpponentQuit
        | ServerMessage::SessionEnded => cmd.to_string(),
    }
}

/// Decodes one line sent by a client.
///
/// Surrounding whitespace, including a trailing `\r`, is ignored.
///
/// # Errors
///
/// Returns [`ProtocolError`] if the line is empty, names an unknown command,
/// or carries a payload that does not fit the command.
pub fn decode_client(line: &str) -> Result<ClientMessage, ProtocolError> {
    let (cmd, payload) = split_line(line)?;
    match cmd {
        command::FIND_GAME => bare(command::FIND_GAME, payload, ClientMessage::FindGame),
        command::CANCEL_SEARCH => {
            bare(command::CANCEL_SEARCH, payload, ClientMessage::CancelSearch)
        }
        command::QUIT => bare(command::QUIT, payload, ClientMessage::Quit),
        command::END_SESSION => bare(command::END_SESSION, payload, ClientMessage::EndSession),
        command::MOVE => Ok(ClientMessage::Move(parse_move(required(command::MOVE, payload)?)?)),
        command::CAPTURE_CONTINUED => Ok(ClientMessage::CaptureContinued(parse_move(
            required(command::CAPTURE_CONTINUED, payload)?,
        )?)),
        other => Err(ProtocolError::UnknownCommand(other.to_string())),
    }
}

/// Decodes one line sent by the server.
///
/// # Errors
///
/// Returns [`ProtocolError`] on any malformed input; see [`decode_client`].
pub fn decode_server(line: &str) -> Result<ServerMessage, ProtocolError> {
    let (cmd, payload) = split_line(line)?;
    match cmd {
        command::WAITING => bare(command::WAITING, payload, ServerMessage::Waiting),
        command::GAME_STARTED => bare(command::GAME_STARTED, payload, ServerMessage::GameStarted),
        command::SEARCH_CANCELLED => bare(
            command::SEARCH_CANCELLED,
            payload,
            ServerMessage::SearchCancelled,
        ),
        command::OPPONENT_QUIT => {
            bare(command::OPPONENT_QUIT, payload, ServerMessage::OpponentQuit)
        }
        command::SESSION_ENDED => {
            bare(command::SESSION_ENDED, payload, ServerMessage::SessionEnded)
        }
        command::GAME_FOUND => Ok(ServerMessage::GameFound(parse_color(required(
            command::GAME_FOUND,
            payload,
        )?)?)),
        command::GAME_STARTING => Ok(ServerMessage::GameStarting(parse_number(required(
            command::GAME_STARTING,
            payload,
        )?)?)),
        command::OPPONENT_MOVE => Ok(ServerMessage::OpponentMove(parse_move(required(
            command::OPPONENT_MOVE,
            payload,
        )?)?)),
        command::OPPONENT_CAPTURE_CONTINUED => Ok(ServerMessage::OpponentCaptureContinued(
            parse_move(required(command::OPPONENT_CAPTURE_CONTINUED, payload)?)?,
        )),
        command::TIME_UPDATE => Ok(ServerMessage::TimeUpdate(parse_time_update(required(
            command::TIME_UPDATE,
            payload,
        )?)?)),
        other => Err(ProtocolError::UnknownCommand(other.to_string())),
    }
}

/// Parses a move payload of the form `colFrom,rowFrom->colTo,rowTo`.
///
/// # Errors
///
/// [`ProtocolError::MalformedMove`] for a wrong shape,
/// [`ProtocolError::InvalidNumber`] for a non-integer coordinate.
pub fn parse_move(payload: &str) -> Result<Move, ProtocolError> {
    let malformed = || ProtocolError::MalformedMove(payload.to_string());
    let (from, to) = payload.split_once("->").ok_or_else(malformed)?;
    let from = parse_square(from).map_err(|e| widen(e, payload))?;
    let to = parse_square(to).map_err(|e| widen(e, payload))?;
    Ok(Move::new(from, to))
}

// ── Internals ─────────────────────────────────────────────────────────────────

fn with_payload(cmd: &str, payload: impl std::fmt::Display) -> String {
    format!("{cmd}{PAYLOAD_SEPARATOR}{payload}")
}

/// Splits a trimmed line at the first separator.  The time-update payload
/// contains further separators, which stay in the payload.
fn split_line(line: &str) -> Result<(&str, Option<&str>), ProtocolError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(ProtocolError::Empty);
    }
    Ok(match line.split_once(PAYLOAD_SEPARATOR) {
        Some((cmd, payload)) => (cmd, Some(payload)),
        None => (line, None),
    })
}

fn bare<T>(cmd: &'static str, payload: Option<&str>, msg: T) -> Result<T, ProtocolError> {
    match payload {
        None => Ok(msg),
        Some(_) => Err(ProtocolError::UnexpectedPayload(cmd)),
    }
}

fn required<'a>(cmd: &'static str, payload: Option<&'a str>) -> Result<&'a str, ProtocolError> {
    payload
        .filter(|p| !p.is_empty())
        .ok_or(ProtocolError::MissingPayload(cmd))
}

/// Parses a square of the form `col,row`.
///
/// # Errors
///
/// [`ProtocolError::MalformedMove`] when the comma is missing,
/// [`ProtocolError::InvalidNumber`] for a non-integer coordinate.
pub fn parse_square(text: &str) -> Result<Square, ProtocolError> {
    let (col, row) = text
        .split_once(',')
        .ok_or_else(|| ProtocolError::MalformedMove(text.to_string()))?;
    Ok(Square::new(parse_number(col)?, parse_number(row)?))
}

/// Reports a shape error against the whole move payload rather than half of it.
fn widen(err: ProtocolError, payload: &str) -> ProtocolError {
    match err {
        ProtocolError::MalformedMove(_) => ProtocolError::MalformedMove(payload.to_string()),
        other => other,
    }
}

fn parse_number<N: std::str::FromStr>(text: &str) -> Result<N, ProtocolError> {
    text.parse()
        .map_err(|_| ProtocolError::InvalidNumber(text.to_string()))
}

fn parse_color(text: &str) -> Result<Color, ProtocolError> {
    Color::from_wire(text).ok_or_else(|| ProtocolError::UnknownColor(text.to_string()))
}

fn parse_time_update(payload: &str) -> Result<TimeSnapshot, ProtocolError> {
    let fields: Vec<&str> = payload.split(PAYLOAD_SEPARATOR).collect();
    let [white, black, turn] = fields.as_slice() else {
        return Err(ProtocolError::MalformedTimeUpdate(payload.to_string()));
    };
    Ok(TimeSnapshot::new(
        parse_number(white)?,
        parse_number(black)?,
        parse_color(turn)?,
    ))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
