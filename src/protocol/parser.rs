//! Driver command parser.
//!
//! Parses the line-oriented stdin commands of the `kingrow` binary into
//! structured `Command` values that the main loop dispatches on.

use crate::board::{Board, Side};

/// Search constraints passed with the `go` command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoParams {
    pub depth: Option<u32>,
}

/// A parsed driver command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Identify the engine and list its options.
    Hello,

    /// Synchronization ping; engine must reply `readyok`.
    IsReady,

    /// Set an engine option: `setoption name <id> [value <x>]`.
    SetOption { name: String, value: Option<String> },

    /// Reset to the opening position, White to move.
    NewGame,

    /// `position startpos [w|b]` or `position <32 labels> <w|b>`.
    Position { board: Board, side: Side },

    /// Search the current position.
    Go(GoParams),

    /// Static evaluation of the current position for the side to move.
    Eval,

    /// Play a move on the current position: `play 21-17` or `play 24x17x10`.
    Play { text: String },

    /// Print the current position.
    Show,

    /// Terminate the driver.
    Quit,
}

/// Parses a single line of input into a `Command`.
///
/// Returns `None` for empty lines or unrecognized commands. Malformed
/// arguments for known commands also return `None` after logging.
pub fn parse_command(line: &str) -> Option<Command> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    let tokens: Vec<&str> = trimmed.split_whitespace().collect();

    match tokens[0] {
        "hello" => Some(Command::Hello),
        "isready" => Some(Command::IsReady),
        "quit" => Some(Command::Quit),
        "newgame" => Some(Command::NewGame),
        "eval" => Some(Command::Eval),
        "show" | "d" => Some(Command::Show),

        "setoption" => parse_setoption(&tokens),
        "position" => parse_position(&tokens),
        "go" => parse_go(&tokens),
        "play" => parse_play(&tokens),

        other => {
            tracing::warn!("unknown command: {}", other);
            None
        }
    }
}

/// Parses `setoption name <id> [value <x>]`.
fn parse_setoption(tokens: &[&str]) -> Option<Command> {
    if tokens.len() < 3 || tokens[1] != "name" {
        tracing::warn!("malformed setoption: expected 'setoption name <id> [value <x>]'");
        return None;
    }

    let value_idx = tokens.iter().position(|&t| t == "value");

    let (name, value) = match value_idx {
        Some(vi) => {
            let name_parts = &tokens[2..vi];
            let value_parts = &tokens[vi + 1..];
            if name_parts.is_empty() {
                tracing::warn!("malformed setoption: empty name");
                return None;
            }
            let value = if value_parts.is_empty() {
                None
            } else {
                Some(value_parts.join(" "))
            };
            (name_parts.join(" "), value)
        }
        None => (tokens[2..].join(" "), None),
    };

    Some(Command::SetOption { name, value })
}

/// Parses `position startpos [w|b]` and `position <labels> <w|b>`.
fn parse_position(tokens: &[&str]) -> Option<Command> {
    if tokens.len() < 2 {
        tracing::warn!("malformed position: expected 'position startpos|<labels> [w|b]'");
        return None;
    }

    let board = if tokens[1] == "startpos" {
        Board::initial()
    } else {
        match Board::from_labels(tokens[1]) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!("malformed position: {}", e);
                return None;
            }
        }
    };

    let side = match tokens.get(2) {
        None => Side::White,
        Some(s) => match Side::from_name(s) {
            Some(side) => side,
            None => {
                tracing::warn!("unknown side: '{}'", s);
                return None;
            }
        },
    };

    Some(Command::Position { board, side })
}

/// Parses `go [depth <n>]`.
fn parse_go(tokens: &[&str]) -> Option<Command> {
    let mut params = GoParams::default();
    let mut i = 1;

    while i < tokens.len() {
        match tokens[i] {
            "depth" => {
                i += 1;
                if i < tokens.len() {
                    match tokens[i].parse::<u32>() {
                        Ok(v) => params.depth = Some(v),
                        Err(_) => {
                            tracing::warn!("invalid depth value: '{}'", tokens[i]);
                        }
                    }
                }
            }
            other => {
                tracing::warn!("unknown go parameter: '{}'", other);
            }
        }
        i += 1;
    }

    Some(Command::Go(params))
}

/// Parses `play <move>`.
fn parse_play(tokens: &[&str]) -> Option<Command> {
    if tokens.len() != 2 {
        tracing::warn!("malformed play: expected 'play <from>-<to>' or 'play <a>x<b>x...'");
        return None;
    }
    Some(Command::Play {
        text: tokens[1].to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Piece;

    #[test]
    fn parse_simple_commands() {
        assert_eq!(parse_command("hello"), Some(Command::Hello));
        assert_eq!(parse_command("isready"), Some(Command::IsReady));
        assert_eq!(parse_command("quit"), Some(Command::Quit));
        assert_eq!(parse_command("newgame"), Some(Command::NewGame));
        assert_eq!(parse_command("eval"), Some(Command::Eval));
        assert_eq!(parse_command("show"), Some(Command::Show));
    }

    #[test]
    fn parse_empty_line_returns_none() {
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("  "), None);
        assert_eq!(parse_command("\t"), None);
    }

    #[test]
    fn parse_unknown_command_returns_none() {
        assert_eq!(parse_command("foobar"), None);
    }

    #[test]
    fn parse_setoption_with_value() {
        let cmd = parse_command("setoption name Depth value 8").unwrap();
        assert_eq!(
            cmd,
            Command::SetOption {
                name: "Depth".to_string(),
                value: Some("8".to_string()),
            }
        );
    }

    #[test]
    fn parse_setoption_multi_word_value() {
        let cmd = parse_command("setoption name Workers value 10.0.0.1:7100 10.0.0.2:7100").unwrap();
        assert_eq!(
            cmd,
            Command::SetOption {
                name: "Workers".to_string(),
                value: Some("10.0.0.1:7100 10.0.0.2:7100".to_string()),
            }
        );
    }

    #[test]
    fn parse_setoption_malformed_returns_none() {
        assert_eq!(parse_command("setoption"), None);
        assert_eq!(parse_command("setoption foo"), None);
        assert_eq!(parse_command("setoption name value 3"), None);
    }

    #[test]
    fn parse_position_startpos_defaults_to_white() {
        let cmd = parse_command("position startpos").unwrap();
        assert_eq!(
            cmd,
            Command::Position {
                board: Board::initial(),
                side: Side::White,
            }
        );
    }

    #[test]
    fn parse_position_labels_and_side() {
        let labels = format!("w{}b", ".".repeat(30));
        let cmd = parse_command(&format!("position {labels} b")).unwrap();
        let Command::Position { board, side } = cmd else {
            panic!("expected position");
        };
        assert_eq!(side, Side::Black);
        assert_eq!(board.get(0).unwrap(), Piece::WhitePawn);
        assert_eq!(board.get(31).unwrap(), Piece::BlackPawn);
    }

    #[test]
    fn parse_position_malformed_returns_none() {
        assert_eq!(parse_command("position"), None);
        assert_eq!(parse_command("position bbbb w"), None);
        assert_eq!(parse_command("position startpos green"), None);
    }

    #[test]
    fn parse_go_variants() {
        assert_eq!(parse_command("go"), Some(Command::Go(GoParams::default())));
        assert_eq!(
            parse_command("go depth 5"),
            Some(Command::Go(GoParams { depth: Some(5) }))
        );
        assert_eq!(parse_command("go depth x"), Some(Command::Go(GoParams::default())));
    }

    #[test]
    fn parse_play() {
        assert_eq!(
            parse_command("play 21-17"),
            Some(Command::Play {
                text: "21-17".to_string()
            })
        );
        assert_eq!(parse_command("play"), None);
    }
}
