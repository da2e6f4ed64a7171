//! Console command parsing.
//!
//! One command per line, case-insensitive command word:
//!
//! ```text
//! find                 look for an opponent
//! cancel               stop looking
//! move c,r->c,r        play a move (also `m`)
//! select c,r           select a piece and list where it can go (also `s`)
//! board                print the board
//! quit                 leave the current game
//! end                  end the current game for both players
//! help                 list commands
//! exit                 close the client
//! ```

use checkers_core::protocol::{parse_move, parse_square, ProtocolError};
use checkers_core::{Move, Square};
use thiserror::Error;

/// Help text printed by the `help` command.
pub const HELP: &str = "commands: find | cancel | move c,r->c,r | select c,r | board | quit | end | help | exit";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConsoleError {
    #[error("unknown command '{0}' (try 'help')")]
    Unknown(String),
    #[error("'{0}' needs an argument")]
    MissingArgument(&'static str),
    #[error("'{0}' takes no argument")]
    UnexpectedArgument(&'static str),
    #[error("bad coordinates: {0}")]
    Coordinates(#[from] ProtocolError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Find,
    Cancel,
    Move(Move),
    Select(Square),
    Board,
    Quit,
    End,
    Help,
    Exit,
}

impl ConsoleCommand {
    /// Parses one console line.  Blank lines yield `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError`] for an unknown word, a missing or stray
    /// argument, or unparseable coordinates.
    pub fn parse(line: &str) -> Result<Option<Self>, ConsoleError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (word, arg) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, Some(rest.trim()).filter(|a| !a.is_empty())),
            None => (line, None),
        };

        let cmd = match word.to_ascii_lowercase().as_str() {
            "find" => bare(Self::Find, "find", arg)?,
            "cancel" => bare(Self::Cancel, "cancel", arg)?,
            "board" => bare(Self::Board, "board", arg)?,
            "quit" => bare(Self::Quit, "quit", arg)?,
            "end" => bare(Self::End, "end", arg)?,
            "help" | "?" => bare(Self::Help, "help", arg)?,
            "exit" => bare(Self::Exit, "exit", arg)?,
            "move" | "m" => {
                let arg = arg.ok_or(ConsoleError::MissingArgument("move"))?;
                Self::Move(parse_move(&strip_spaces(arg))?)
            }
            "select" | "s" => {
                let arg = arg.ok_or(ConsoleError::MissingArgument("select"))?;
                Self::Select(parse_square(&strip_spaces(arg))?)
            }
            other => return Err(ConsoleError::Unknown(other.to_string())),
        };
        Ok(Some(cmd))
    }
}

fn bare(
    cmd: ConsoleCommand,
    word: &'static str,
    arg: Option<&str>,
) -> Result<ConsoleCommand, ConsoleError> {
    match arg {
        None => Ok(cmd),
        Some(_) => Err(ConsoleError::UnexpectedArgument(word)),
    }
}

/// `2, 5 -> 3, 4` is accepted as well as `2,5->3,4`.
fn strip_spaces(arg: &str) -> String {
    arg.chars().filter(|c| !c.is_whitespace()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_line_is_no_command() {
        assert_eq!(ConsoleCommand::parse("   "), Ok(None));
    }

    #[test]
    fn test_bare_commands_parse_case_insensitively() {
        assert_eq!(ConsoleCommand::parse("FIND"), Ok(Some(ConsoleCommand::Find)));
        assert_eq!(ConsoleCommand::parse("cancel"), Ok(Some(ConsoleCommand::Cancel)));
        assert_eq!(ConsoleCommand::parse(" End "), Ok(Some(ConsoleCommand::End)));
        assert_eq!(ConsoleCommand::parse("exit"), Ok(Some(ConsoleCommand::Exit)));
    }

    #[test]
    fn test_move_accepts_spaced_coordinates() {
        let expected = Move::new(Square::new(2, 5), Square::new(3, 4));
        assert_eq!(
            ConsoleCommand::parse("move 2,5->3,4"),
            Ok(Some(ConsoleCommand::Move(expected)))
        );
        assert_eq!(
            ConsoleCommand::parse("m 2, 5 -> 3, 4"),
            Ok(Some(ConsoleCommand::Move(expected)))
        );
    }

    #[test]
    fn test_select_parses_square() {
        assert_eq!(
            ConsoleCommand::parse("select 1,2"),
            Ok(Some(ConsoleCommand::Select(Square::new(1, 2))))
        );
    }

    #[test]
    fn test_missing_and_stray_arguments_are_errors() {
        assert_eq!(
            ConsoleCommand::parse("move"),
            Err(ConsoleError::MissingArgument("move"))
        );
        assert_eq!(
            ConsoleCommand::parse("board now"),
            Err(ConsoleError::UnexpectedArgument("board"))
        );
    }

    #[test]
    fn test_bad_coordinates_and_unknown_words_are_errors() {
        assert!(matches!(
            ConsoleCommand::parse("move 2,5-3,4"),
            Err(ConsoleError::Coordinates(_))
        ));
        assert_eq!(
            ConsoleCommand::parse("resign"),
            Err(ConsoleError::Unknown("resign".to_string()))
        );
    }
}
