//! Line-oriented command input for the terminal front end

use crate::controller::Intent;
use shared::Position;
use thiserror::Error;

/// A parsed input line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Intent(Intent),
    Status,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq)]
pub enum InputError {
    #[error("empty input")]
    Empty,
    #[error("unknown command '{0}', type 'help' for a list")]
    UnknownCommand(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("'{0}' is not a number")]
    InvalidNumber(String),
}

pub const HELP: &str = "\
Commands:
  login <user> [password]   log in (an empty password is rejected)
  play                      find or create a lobby
  color <0-7>               pick a color in the lobby
  ready                     mark yourself ready
  back                      leave the lobby or game
  move <x> <y>              move your pointer
  click <x> <y>             fire a shockwave
  status                    print the current screen
  help                      show this list
  quit                      exit";

pub fn parse_line(line: &str) -> Result<Command, InputError> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Err(InputError::Empty);
    };
    let args: Vec<&str> = words.collect();

    let command = match command.to_ascii_lowercase().as_str() {
        "login" => match args.as_slice() {
            [username] => login(username, ""),
            [username, password] => login(username, password),
            _ => return Err(InputError::Usage("login <user> [password]")),
        },
        "play" => Command::Intent(Intent::Play),
        "color" => match args.as_slice() {
            [index] => Command::Intent(Intent::SetColor(parse_number(index)?)),
            _ => return Err(InputError::Usage("color <0-7>")),
        },
        "ready" => Command::Intent(Intent::SetReady),
        "back" => Command::Intent(Intent::Back),
        "move" => Command::Intent(Intent::PointerMove(parse_position(&args, "move <x> <y>")?)),
        "click" => Command::Intent(Intent::Click(parse_position(&args, "click <x> <y>")?)),
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(InputError::UnknownCommand(other.to_string())),
    };

    Ok(command)
}

fn login(username: &str, password: &str) -> Command {
    Command::Intent(Intent::Login {
        username: username.to_string(),
        password: password.to_string(),
    })
}

fn parse_position(args: &[&str], usage: &'static str) -> Result<Position, InputError> {
    match args {
        [x, y] => Ok(Position::new(parse_number(x)?, parse_number(y)?)),
        _ => Err(InputError::Usage(usage)),
    }
}

fn parse_number<T: std::str::FromStr>(word: &str) -> Result<T, InputError> {
    word.parse()
        .map_err(|_| InputError::InvalidNumber(word.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_with_and_without_password() {
        assert_eq!(
            parse_line("login alice pw"),
            Ok(Command::Intent(Intent::Login {
                username: "alice".to_string(),
                password: "pw".to_string(),
            }))
        );
        assert_eq!(
            parse_line("  LOGIN bob  "),
            Ok(Command::Intent(Intent::Login {
                username: "bob".to_string(),
                password: String::new(),
            }))
        );
        assert_eq!(
            parse_line("login"),
            Err(InputError::Usage("login <user> [password]"))
        );
    }

    #[test]
    fn test_pointer_commands() {
        assert_eq!(
            parse_line("click 10 20"),
            Ok(Command::Intent(Intent::Click(Position::new(10.0, 20.0))))
        );
        assert_eq!(
            parse_line("move -1.5 3"),
            Ok(Command::Intent(Intent::PointerMove(Position::new(-1.5, 3.0))))
        );
        assert_eq!(
            parse_line("move 1"),
            Err(InputError::Usage("move <x> <y>"))
        );
        assert_eq!(
            parse_line("click a 2"),
            Err(InputError::InvalidNumber("a".to_string()))
        );
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(parse_line("play"), Ok(Command::Intent(Intent::Play)));
        assert_eq!(parse_line("ready"), Ok(Command::Intent(Intent::SetReady)));
        assert_eq!(parse_line("back"), Ok(Command::Intent(Intent::Back)));
        assert_eq!(parse_line("color 3"), Ok(Command::Intent(Intent::SetColor(3))));
        assert_eq!(parse_line("status"), Ok(Command::Status));
        assert_eq!(parse_line("?"), Ok(Command::Help));
        assert_eq!(parse_line("exit"), Ok(Command::Quit));
    }

    #[test]
    fn test_invalid_input() {
        assert_eq!(parse_line("   "), Err(InputError::Empty));
        assert_eq!(
            parse_line("dance"),
            Err(InputError::UnknownCommand("dance".to_string()))
        );
        assert_eq!(
            parse_line("color -1"),
            Err(InputError::InvalidNumber("-1".to_string()))
        );
    }
}
