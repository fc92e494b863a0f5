//! Host side of the RPC surface.
//!
//! A [`NodeService`] answers requests either as a worker, which searches
//! `minimax_search` subtrees itself, or as a coordinator, which routes them
//! through its pull queue and also serves the worker-facing task methods.
//! [`spawn_server`] runs the service on any bound listener: one thread per
//! connection, one per request, responses interleaved on the connection in
//! completion order.

use std::io::{BufReader, BufWriter};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::board::Board;
use crate::error::{EngineError, Result};
use crate::eval::evaluate;
use crate::protocol::{read_frame, write_frame, Request, RequestFrame, Response, ResponseFrame, TaskSpec, WireBoard};
use crate::search::Searcher;

use super::coordinator::{Coordinator, Task};

pub struct NodeService {
    searcher: Searcher,
    coordinator: Option<Arc<Coordinator>>,
    /// Deepest subtree a worker searches; the coordinator leaves depth
    /// limits to its pull workers.
    max_depth: Option<u32>,
}

impl NodeService {
    /// A worker that computes subtrees of at most `max_depth` plies directly.
    pub fn worker(searcher: Searcher, max_depth: u32) -> Self {
        NodeService {
            searcher,
            coordinator: None,
            max_depth: Some(max_depth),
        }
    }

    /// A coordinator that hands subtrees to pull workers.
    pub fn coordinator(searcher: Searcher, coordinator: Arc<Coordinator>) -> Self {
        NodeService {
            searcher,
            coordinator: Some(coordinator),
            max_depth: None,
        }
    }

    pub fn role(&self) -> &'static str {
        if self.coordinator.is_some() {
            "coordinator"
        } else {
            "worker"
        }
    }

    /// Answers one request. Failures become `Response::Error`; nothing here
    /// panics on bad input.
    pub fn handle(&self, request: Request) -> Response {
        let method = request.method();
        match self.dispatch(request) {
            Ok(response) => response,
            Err(e) => {
                warn!(method, error = %e, "request failed");
                Response::Error {
                    message: e.to_string(),
                }
            }
        }
    }

    fn dispatch(&self, request: Request) -> Result<Response> {
        match request {
            Request::EvaluatePosition {
                board,
                side,
                is_maximizing,
            } => {
                let board = Board::try_from(board)?;
                let perspective = if is_maximizing { side } else { side.opponent() };
                let score = evaluate(&board, perspective, &self.searcher.config().eval);
                Ok(Response::Evaluation {
                    success: true,
                    score,
                })
            }

            Request::MinimaxSearch {
                board,
                depth,
                side,
                is_maximizing,
            } => {
                let board = Board::try_from(board)?;
                if let Some(max_depth) = self.max_depth.filter(|&max| depth > max) {
                    return Err(EngineError::Protocol(format!(
                        "depth {depth} exceeds this worker's limit of {max_depth}"
                    )));
                }
                let score = match &self.coordinator {
                    Some(c) => c.submit_evaluation(&board, depth, side, is_maximizing)?,
                    None => self.searcher.subtree_score(&board, depth, side, is_maximizing)?,
                };
                Ok(Response::Score { score })
            }

            Request::RegisterWorker {
                worker_id,
                max_depth,
            } => {
                self.require_coordinator("register_worker")?
                    .register_worker(&worker_id, max_depth);
                Ok(Response::Ack { success: true })
            }

            Request::GetTask { worker_id } => {
                let task = self
                    .require_coordinator("get_task")?
                    .get_next_task(&worker_id)
                    .map(task_spec);
                Ok(Response::Task { task })
            }

            Request::SubmitResult { task_id, score } => {
                let accepted = match self.require_coordinator("submit_result")?.submit_result(&task_id, score) {
                    Ok(()) => true,
                    Err(EngineError::UnknownTask(_)) => false,
                    Err(e) => return Err(e),
                };
                Ok(Response::Ack { success: accepted })
            }

            Request::ReportFailure { task_id, message } => {
                let accepted = match self.require_coordinator("report_failure")?.fail_task(&task_id, &message) {
                    Ok(()) => true,
                    Err(EngineError::UnknownTask(_)) => false,
                    Err(e) => return Err(e),
                };
                Ok(Response::Ack { success: accepted })
            }
        }
    }

    fn require_coordinator(&self, method: &str) -> Result<&Coordinator> {
        self.coordinator
            .as_deref()
            .ok_or_else(|| EngineError::Protocol(format!("{method} is only served by a coordinator")))
    }
}

fn task_spec(task: Task) -> TaskSpec {
    TaskSpec {
        task_id: task.id,
        board: WireBoard::from(&task.board),
        depth: task.depth,
        side: task.side,
        is_maximizing: task.maximizing,
    }
}

/// A running server. Dropping it stops accepting new connections.
pub struct ServerHandle {
    addr: SocketAddr,
    stop: Arc<AtomicBool>,
    accept: Option<JoinHandle<()>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Blocks until the accept loop exits.
    pub fn join(mut self) {
        if let Some(handle) = self.accept.take() {
            let _ = handle.join();
        }
    }

    pub fn shutdown(&mut self) {
        if self.stop.swap(true, Ordering::AcqRel) {
            return;
        }
        // Wake the blocking accept.
        let _ = TcpStream::connect(self.addr);
        if let Some(handle) = self.accept.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Serves `service` on `listener` from a background accept thread.
pub fn spawn_server(listener: TcpListener, service: Arc<NodeService>) -> Result<ServerHandle> {
    let addr = listener.local_addr()?;
    let stop = Arc::new(AtomicBool::new(false));
    info!(%addr, role = service.role(), "serving rpc");

    let accept = {
        let stop = Arc::clone(&stop);
        thread::Builder::new()
            .name("kingrow-accept".into())
            .spawn(move || accept_loop(listener, service, stop))?
    };

    Ok(ServerHandle {
        addr,
        stop,
        accept: Some(accept),
    })
}

fn accept_loop(listener: TcpListener, service: Arc<NodeService>, stop: Arc<AtomicBool>) {
    for stream in listener.incoming() {
        if stop.load(Ordering::Acquire) {
            break;
        }
        let stream = match stream {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "accept failed");
                continue;
            }
        };
        let service = Arc::clone(&service);
        let spawned = thread::Builder::new()
            .name("kingrow-conn".into())
            .spawn(move || {
                if let Err(e) = serve_connection(stream, service) {
                    debug!(error = %e, "connection ended");
                }
            });
        if let Err(e) = spawned {
            warn!(error = %e, "could not spawn connection thread");
        }
    }
}

fn serve_connection(stream: TcpStream, service: Arc<NodeService>) -> Result<()> {
    let peer = stream.peer_addr()?;
    stream.set_nodelay(true)?;
    debug!(%peer, "connection opened");

    let writer = Arc::new(Mutex::new(BufWriter::new(stream.try_clone()?)));
    let mut reader = BufReader::new(stream);

    loop {
        let frame: RequestFrame = match read_frame(&mut reader) {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(EngineError::Protocol(message)) => {
                warn!(%peer, %message, "dropping malformed request");
                continue;
            }
            Err(e) => return Err(e),
        };

        let service = Arc::clone(&service);
        let writer = Arc::clone(&writer);
        thread::Builder::new()
            .name("kingrow-request".into())
            .spawn(move || {
                let id = frame.id;
                let response = service.handle(frame.request);
                let mut out = writer.lock();
                if let Err(e) = write_frame(&mut *out, &ResponseFrame { id, response }) {
                    debug!(id, error = %e, "could not deliver response");
                }
            })?;
    }

    debug!(%peer, "connection closed");
    Ok(())
}
