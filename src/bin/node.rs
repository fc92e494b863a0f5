//! kingrow-node -- hosts remote search for a kingrow engine.
//!
//! `worker` answers `minimax_search` calls itself, `coordinator` queues
//! them for pull workers, and `pull` runs a polling worker against a
//! coordinator.

use std::net::TcpListener;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use kingrow::config::EngineConfig;
use kingrow::distributed::{spawn_server, Coordinator, NodeService, PullConfig, PullWorker};
use kingrow::search::{Searcher, TracingObserver};
use kingrow::Result;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    role: Role,
}

#[derive(Subcommand, Debug)]
enum Role {
    /// Serve minimax_search by searching locally, up to `node.max_depth` plies.
    Worker {
        #[arg(long, default_value = "127.0.0.1:7100")]
        listen: String,
    },
    /// Queue minimax_search for pull workers.
    Coordinator {
        #[arg(long, default_value = "127.0.0.1:7200")]
        listen: String,
    },
    /// Poll a coordinator for tasks.
    Pull {
        #[arg(long, default_value = "127.0.0.1:7200")]
        coordinator: String,
        /// Defaults to a random id.
        #[arg(long)]
        id: Option<String>,
        /// Overrides `node.max_depth`.
        #[arg(long)]
        max_depth: Option<u32>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "node failed");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let searcher = Searcher::new(config.node_search_config())?.with_observer(Arc::new(TracingObserver));

    match args.role {
        Role::Worker { listen } => {
            let listener = TcpListener::bind(&listen)?;
            let service = NodeService::worker(searcher, config.node.max_depth);
            let server = spawn_server(listener, Arc::new(service))?;
            server.join();
        }
        Role::Coordinator { listen } => {
            let coordinator = Arc::new(Coordinator::new(config.node.lease(), config.rpc_timeout()));
            let _sweeper = coordinator.spawn_sweeper(config.node.sweep_interval())?;
            let listener = TcpListener::bind(&listen)?;
            let service = NodeService::coordinator(searcher, coordinator);
            let server = spawn_server(listener, Arc::new(service))?;
            server.join();
        }
        Role::Pull {
            coordinator,
            id,
            max_depth,
        } => {
            let worker_id = id.unwrap_or_else(|| Uuid::new_v4().to_string());
            let pull = PullConfig {
                worker_id,
                coordinator,
                max_depth: max_depth.unwrap_or(config.node.max_depth),
                poll_interval: config.node.poll_interval(),
                rpc_timeout: config.rpc_timeout(),
            };
            info!(worker_id = %pull.worker_id, "starting pull worker");
            let stop = AtomicBool::new(false);
            PullWorker::new(pull, searcher).run(&stop);
        }
    }
    Ok(())
}
