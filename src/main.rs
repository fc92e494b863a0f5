//! kingrow -- a checkers engine driven over stdin.
//!
//! Reads one command per line and writes responses to stdout. Logs go to
//! stderr, filtered by `RUST_LOG` (default `warn`).

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use kingrow::config::EngineConfig;
use kingrow::engine::Engine;
use kingrow::protocol::parser::{parse_command, Command};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let config = match args.config {
        Some(path) => EngineConfig::load(path),
        None => Ok(EngineConfig::default()),
    };
    let mut engine = match config.and_then(Engine::new) {
        Ok(engine) => engine,
        Err(e) => {
            error!(error = %e, "could not start engine");
            return ExitCode::FAILURE;
        }
    };

    match run(&mut engine) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "output failed");
            ExitCode::FAILURE
        }
    }
}

/// Runs the command loop until `quit` or end of input.
fn run(engine: &mut Engine) -> io::Result<()> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => break,
        };

        let cmd = match parse_command(&line) {
            Some(c) => c,
            None => continue,
        };

        match cmd {
            Command::Hello => engine.handle_hello(&mut out)?,
            Command::IsReady => engine.handle_isready(&mut out)?,
            Command::SetOption { name, value } => {
                if let Err(e) = engine.set_option(&name, value.as_deref()) {
                    warn!(error = %e, "setoption rejected");
                }
            }
            Command::NewGame => engine.new_game(),
            Command::Position { board, side } => engine.set_position(board, side),
            Command::Go(params) => engine.handle_go(&params, &mut out)?,
            Command::Eval => engine.handle_eval(&mut out)?,
            Command::Play { text } => {
                if let Err(e) = engine.play(&text) {
                    warn!(error = %e, "play rejected");
                }
            }
            Command::Show => engine.handle_show(&mut out)?,
            Command::Quit => break,
        }
    }
    out.flush()
}
