//! `Connection` — request/response correlation and dispatch over one
//! `CryptoSocket`, shared by the master and slave net servers (§4.9).
//!
//! Mirrors the broker's one-reader-thread-per-connection shape (the
//! `other_examples` broker's `handle_connection`), generalised to the RPC
//! envelope instead of a line protocol.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::crypto::socket::CryptoSocket;
use crate::error::NetError;
use crate::lifetime::SlokedLifetime;
use crate::rpc::envelope::RpcEnvelope;
use crate::rpc::value::KgrValue;
use crate::task::{task_result, Outcome, TaskResult, TaskResultSupplier};

/// Handles requests the peer sends us. Master and slave each implement
/// this with their own method table.
pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, connection: &Arc<Connection>, id: i64, method: &str, params: KgrValue) -> TaskResult<KgrValue, NetError>;
}

pub struct Connection {
    socket: Arc<CryptoSocket>,
    next_id: AtomicI64,
    pending: Mutex<HashMap<i64, TaskResultSupplier<KgrValue, NetError>>>,
    last_activity: Mutex<Instant>,
    lifetime: SlokedLifetime,
}

impl Connection {
    pub fn new(socket: Arc<CryptoSocket>) -> Arc<Self> {
        Arc::new(Connection {
            socket,
            next_id: AtomicI64::new(1),
            pending: Mutex::new(HashMap::new()),
            last_activity: Mutex::new(Instant::now()),
            lifetime: SlokedLifetime::new(),
        })
    }

    pub fn idle_for(&self) -> Duration {
        Instant::now().saturating_duration_since(*self.last_activity.lock().unwrap())
    }

    fn touch(&self) {
        *self.last_activity.lock().unwrap() = Instant::now();
    }

    /// Issues a request to the peer and returns a `TaskResult` that
    /// settles when the matching reply arrives (§4.9 RPC methods).
    pub fn call(self: &Arc<Self>, method: &str, params: KgrValue) -> TaskResult<KgrValue, NetError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (supplier, result) = task_result();
        self.pending.lock().unwrap().insert(id, supplier);
        let envelope = RpcEnvelope::Request { id, method: method.to_string(), params };
        if let Err(e) = self.socket.send(envelope.to_bytes()) {
            if let Some(supplier) = self.pending.lock().unwrap().remove(&id) {
                let _ = supplier.set_error(e);
            }
        }
        result
    }

    /// §4.9 `ping {} → "pong"`, blocking the caller at most
    /// `response_timeout`.
    pub fn call_with_timeout(self: &Arc<Self>, method: &str, params: KgrValue, timeout: Duration) -> Result<KgrValue, NetError> {
        let result = self.call(method, params);
        match result.wait_for(timeout) {
            Some(crate::task::TaskState::Ready) => Ok(result.unwrap().expect("Ready implies unwrap succeeds")),
            Some(_) => Err(result.unwrap().err().map(|e| NetError::Protocol(e.to_string())).unwrap_or(NetError::Cancelled)),
            None => Err(NetError::Timeout),
        }
    }

    fn reply_result(&self, id: i64, result: KgrValue) {
        let _ = self.socket.send(RpcEnvelope::Result { id, result }.to_bytes());
    }

    fn reply_error(&self, id: i64, error: String) {
        let _ = self.socket.send(RpcEnvelope::Error { id, error }.to_bytes());
    }

    /// Sends a reply and only then runs `then` — for the one handler
    /// (auth-response, §4.10) that must install a new session key on this
    /// connection's own socket *after* the reply carrying the salt has
    /// gone out under the key the peer still holds, not before (§4.8: a
    /// key switch takes effect for frames sent after it, never retroactively
    /// affecting one already in flight).
    pub(crate) fn reply_result_then(&self, id: i64, result: KgrValue, then: impl FnOnce() + Send + 'static) {
        self.reply_result(id, result);
        then();
    }

    fn handle_incoming(self: &Arc<Self>, envelope: RpcEnvelope, dispatcher: &Arc<dyn Dispatcher>) {
        match envelope {
            RpcEnvelope::Request { id, method, params } => {
                let conn = self.clone();
                let conn_for_dispatch = self.clone();
                dispatcher.dispatch(&conn_for_dispatch, id, &method, params).notify(
                    move |outcome| match outcome {
                        Outcome::Ready(v) => conn.reply_result(id, v.clone()),
                        Outcome::Error(e) => conn.reply_error(id, format!("{e}")),
                        Outcome::Cancelled => conn.reply_error(id, "cancelled".to_string()),
                    },
                    &self.lifetime,
                );
            }
            RpcEnvelope::Result { id, result } => {
                if let Some(supplier) = self.pending.lock().unwrap().remove(&id) {
                    let _ = supplier.set_result(result);
                }
            }
            RpcEnvelope::Error { id, error } => {
                if let Some(supplier) = self.pending.lock().unwrap().remove(&id) {
                    let _ = supplier.set_error(NetError::Protocol(format!("remote: {error}")));
                }
            }
        }
    }

    /// Drives the read loop on the current thread until the socket
    /// closes or a protocol error occurs, at which point every pending
    /// call is cancelled (§7: "a frame-level protocol error ... fans out
    /// Cancelled to every outstanding RPC call").
    pub fn run(self: &Arc<Self>, dispatcher: Arc<dyn Dispatcher>) {
        loop {
            match self.socket.recv() {
                Ok(bytes) => {
                    self.touch();
                    match RpcEnvelope::from_bytes(&bytes) {
                        Ok(envelope) => self.handle_incoming(envelope, &dispatcher),
                        Err(e) => {
                            warn!(error = %e, "net connection: protocol error decoding envelope");
                            break;
                        }
                    }
                }
                Err(e) => {
                    debug!(error = %e, "net connection: socket closed");
                    break;
                }
            }
        }
        self.close();
    }

    pub fn close(&self) {
        self.socket.close();
        self.lifetime.close();
        for (_, supplier) in self.pending.lock().unwrap().drain() {
            let _ = supplier.cancel();
        }
    }
}
