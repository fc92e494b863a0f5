//! Multiplexed RPC client connection.
//!
//! One TCP connection carries any number of concurrent calls. Writers share
//! the socket under a lock; a reader thread routes each response to the
//! caller waiting on its `id`. When the connection drops, every waiting call
//! fails at once and the client reports itself dead so the owner can
//! reconnect.

use std::collections::HashMap;
use std::io::{BufReader, BufWriter};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{EngineError, Result};
use crate::protocol::{read_frame, write_frame, Request, RequestFrame, Response, ResponseFrame};

type Pending = Arc<Mutex<HashMap<u64, Sender<Response>>>>;

pub struct RpcClient {
    addr: String,
    writer: Mutex<BufWriter<TcpStream>>,
    pending: Pending,
    next_id: AtomicU64,
    alive: Arc<AtomicBool>,
}

impl RpcClient {
    /// Opens a connection to `addr`, giving up after `timeout`.
    pub fn connect(addr: &str, timeout: Duration) -> Result<Self> {
        let sock = addr
            .to_socket_addrs()
            .map_err(|e| EngineError::unavailable(addr, e))?
            .next()
            .ok_or_else(|| EngineError::unavailable(addr, "address did not resolve"))?;
        let stream =
            TcpStream::connect_timeout(&sock, timeout).map_err(|e| EngineError::unavailable(addr, e))?;
        stream.set_nodelay(true)?;
        let read_half = stream.try_clone()?;

        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let alive = Arc::new(AtomicBool::new(true));

        {
            let pending = Arc::clone(&pending);
            let alive = Arc::clone(&alive);
            let addr = addr.to_string();
            thread::Builder::new()
                .name(format!("kingrow-rpc-{addr}"))
                .spawn(move || read_loop(addr, read_half, pending, alive))?;
        }

        debug!(addr, "rpc connection established");
        Ok(RpcClient {
            addr: addr.to_string(),
            writer: Mutex::new(BufWriter::new(stream)),
            pending,
            next_id: AtomicU64::new(1),
            alive,
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Sends `request` and waits up to `timeout` for its response.
    ///
    /// Transport failures and timeouts map to `WorkerUnavailable`; an error
    /// reported by the remote side maps to `Protocol`.
    pub fn call(&self, request: Request, timeout: Duration) -> Result<Response> {
        if !self.is_alive() {
            return Err(EngineError::unavailable(&self.addr, "connection closed"));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = bounded(1);
        self.pending.lock().insert(id, tx);

        let frame = RequestFrame { id, request };
        let written = {
            let mut writer = self.writer.lock();
            write_frame(&mut *writer, &frame)
        };
        if let Err(e) = written {
            self.pending.lock().remove(&id);
            self.alive.store(false, Ordering::Release);
            return Err(EngineError::unavailable(&self.addr, e));
        }

        match rx.recv_timeout(timeout) {
            Ok(Response::Error { message }) => Err(EngineError::Protocol(message)),
            Ok(response) => Ok(response),
            Err(RecvTimeoutError::Timeout) => {
                self.pending.lock().remove(&id);
                Err(EngineError::unavailable(
                    &self.addr,
                    format!("no response within {} ms", timeout.as_millis()),
                ))
            }
            Err(RecvTimeoutError::Disconnected) => {
                Err(EngineError::unavailable(&self.addr, "connection closed"))
            }
        }
    }
}

impl Drop for RpcClient {
    fn drop(&mut self) {
        let _ = self.writer.get_mut().get_ref().shutdown(Shutdown::Both);
    }
}

fn read_loop(addr: String, stream: TcpStream, pending: Pending, alive: Arc<AtomicBool>) {
    let mut reader = BufReader::new(stream);
    loop {
        match read_frame::<_, ResponseFrame>(&mut reader) {
            Ok(Some(frame)) => {
                let waiter = pending.lock().remove(&frame.id);
                match waiter {
                    Some(tx) => {
                        let _ = tx.send(frame.response);
                    }
                    None => debug!(addr = %addr, id = frame.id, "response for abandoned call"),
                }
            }
            Ok(None) => {
                debug!(addr = %addr, "rpc connection closed by peer");
                break;
            }
            Err(e) => {
                warn!(addr = %addr, error = %e, "rpc connection failed");
                break;
            }
        }
    }
    alive.store(false, Ordering::Release);
    // Dropping the senders wakes every outstanding caller with Disconnected.
    pending.lock().clear();
}
