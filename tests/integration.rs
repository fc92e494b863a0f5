//! Integration tests for the kingrow driver binary.
//!
//! Spawns the engine process, sends commands via stdin, and checks the
//! lines written to stdout.

use std::io::{BufRead, Write};
use std::process::{Command, Stdio};

/// Sends a sequence of commands to the engine and collects stdout lines.
fn run_engine(commands: &[&str]) -> Vec<String> {
    let exe = env!("CARGO_BIN_EXE_kingrow");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to start kingrow");

    let mut stdin = child.stdin.take().unwrap();
    let stdout = child.stdout.take().unwrap();
    let reader = std::io::BufReader::new(stdout);

    for cmd in commands {
        writeln!(stdin, "{}", cmd).unwrap();
    }
    stdin.flush().unwrap();
    drop(stdin);

    let lines: Vec<String> = reader.lines().map(|l| l.unwrap()).collect();
    let status = child.wait().expect("failed to wait on child");
    assert!(status.success());
    lines
}

/// Builds a 32-label position string with the given pieces.
fn labels(pieces: &[(usize, char)]) -> String {
    let mut cells = ['.'; 32];
    for &(i, c) in pieces {
        cells[i] = c;
    }
    cells.iter().collect()
}

fn bestmove(lines: &[String]) -> &str {
    let found: Vec<&String> = lines.iter().filter(|l| l.starts_with("bestmove ")).collect();
    assert_eq!(found.len(), 1, "expected exactly one bestmove in {lines:?}");
    found[0].strip_prefix("bestmove ").unwrap()
}

#[test]
fn hello_handshake_lists_options() {
    let lines = run_engine(&["hello", "quit"]);
    assert!(lines[0].starts_with("id name kingrow"));
    assert_eq!(lines.last().map(String::as_str), Some("hellook"));

    let options: Vec<&String> = lines.iter().filter(|l| l.starts_with("option ")).collect();
    assert!(!options.is_empty());
    for opt in &options {
        assert!(opt.contains(" type "), "option line missing type: {}", opt);
    }
}

#[test]
fn isready_response() {
    let lines = run_engine(&["isready", "quit"]);
    assert_eq!(lines, vec!["readyok".to_string()]);
}

#[test]
fn unknown_commands_are_ignored() {
    let lines = run_engine(&["bogus", "setoption name Nope value 1", "isready", "quit"]);
    assert_eq!(lines, vec!["readyok".to_string()]);
}

#[test]
fn go_from_startpos_plays_a_forward_white_move() {
    let lines = run_engine(&["position startpos", "go depth 2", "quit"]);
    let text = bestmove(&lines);
    let (from, to) = text.split_once('-').expect("plain move");
    let from: usize = from.parse().unwrap();
    let to: usize = to.parse().unwrap();
    assert!((20..24).contains(&from), "{text}");
    assert!((16..20).contains(&to), "{text}");
    assert!(lines.iter().any(|l| l.starts_with("info depth 2 ")));
}

#[test]
fn capture_is_mandatory() {
    let pos = labels(&[(24, 'w'), (29, 'w'), (20, 'b'), (3, 'b')]);
    let lines = run_engine(&[&format!("position {pos} w"), "go depth 3", "quit"]);
    assert_eq!(bestmove(&lines), "24x17");
}

#[test]
fn blocked_side_reports_no_move() {
    let pos = labels(&[(0, 'w'), (31, 'b')]);
    let lines = run_engine(&[&format!("position {pos} w"), "go depth 3", "quit"]);
    assert_eq!(bestmove(&lines), "none");
}

#[test]
fn play_passes_the_turn_and_illegal_play_is_ignored() {
    let lines = run_engine(&["play 22-10", "show", "play 22-18", "show", "quit"]);
    let sides: Vec<&String> = lines.iter().filter(|l| l.starts_with("side ")).collect();
    assert_eq!(sides, vec!["side w", "side b"]);
}

#[test]
fn eval_of_startpos_is_balanced() {
    let lines = run_engine(&["eval", "quit"]);
    assert_eq!(lines, vec!["eval 0".to_string()]);
}

#[test]
fn setoption_depth_applies_to_go() {
    let lines = run_engine(&["setoption name Depth value 1", "go", "quit"]);
    assert!(lines[0].starts_with("info depth 1 "), "{lines:?}");
}

#[test]
fn unreachable_workers_with_fail_policy_report_no_move() {
    let lines = run_engine(&[
        "setoption name Workers value 127.0.0.1:1",
        "setoption name Fallback value fail",
        "setoption name RpcTimeout value 500",
        "setoption name DistributionPly value 1",
        "go depth 2",
        "quit",
    ]);
    assert_eq!(bestmove(&lines), "none");
}

#[test]
fn newgame_restores_startpos() {
    let lines = run_engine(&["play 21-17", "newgame", "show", "quit"]);
    assert!(lines.iter().any(|l| l == "side w"));
    assert!(lines.iter().any(|l| l.starts_with("legal 20-16 ")));
}
