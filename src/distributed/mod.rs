//! Remote subtree evaluation.
//!
//! Two paths lead to a remote score. The direct path: a
//! [`MinimaxDistributor`] sends `minimax_search` to a worker node that
//! searches the subtree itself. The pull path: a [`Coordinator`] queues the
//! subtree and [`PullWorker`]s fetch, search and report it back.

pub mod coordinator;
pub mod distributor;
pub mod puller;
pub mod rpc;
pub mod server;
pub mod tracker;

pub use coordinator::{Coordinator, Sweeper, Task, TaskOutcome, TaskState};
pub use distributor::MinimaxDistributor;
pub use puller::{PullConfig, PullHandle, PullWorker};
pub use rpc::RpcClient;
pub use server::{spawn_server, NodeService, ServerHandle};
pub use tracker::{InFlight, PerformanceSample, PerformanceTracker};
