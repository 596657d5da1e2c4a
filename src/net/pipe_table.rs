//! Shared bookkeeping for the tunnelled pipes a net connection relays
//! (§4.9: `send`/`close`/`connect`/`activate`).
//!
//! Each side keeps its own id for a logical pipe and, once it learns the
//! peer's id for the same pipe, relays every local write across the
//! connection as a `send` call. Until the peer id is known, writes sit
//! in the `Pipe`'s own internal queue untouched — that queueing is what
//! the spec calls "freezing" a pipe (§4.9: "master creates a local pipe,
//! 'freezes' it (buffering outgoing until activated)").

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use crate::net::connection::Connection;
use crate::rpc::pipe::Pipe;
use crate::rpc::value::KgrValue;

struct PipeEntry {
    pipe: Pipe,
    peer_id: Option<i64>,
}

/// Maps this side's local pipe ids to the `Pipe` they relay and the
/// peer's id for the same logical connection.
pub struct PipeTable {
    next_id: AtomicI64,
    entries: Mutex<HashMap<i64, PipeEntry>>,
}

impl PipeTable {
    pub fn new() -> Self {
        PipeTable { next_id: AtomicI64::new(1), entries: Mutex::new(HashMap::new()) }
    }

    /// Registers a freshly created local `pipe`, not yet linked to a
    /// peer id, and returns the id to hand out to callers/replies.
    pub fn insert(&self, pipe: Pipe) -> i64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.entries.lock().unwrap().insert(id, PipeEntry { pipe, peer_id: None });
        id
    }

    /// Links `id` to `peer_id` and starts relaying: drains whatever the
    /// local side already wrote while frozen, then installs a listener
    /// that relays every future write the same way.
    pub fn activate(self: &Arc<Self>, connection: Arc<Connection>, id: i64, peer_id: i64) {
        let pipe = {
            let mut entries = self.entries.lock().unwrap();
            let Some(entry) = entries.get_mut(&id) else { return };
            entry.peer_id = Some(peer_id);
            entry.pipe.clone()
        };
        while let Some(value) = pipe.try_read() {
            let _ = connection.call("send", crate::kgr_object! { "pipe" => peer_id, "data" => value });
        }
        let relay_conn = connection;
        let relay_pipe = pipe.clone();
        pipe.set_listener(move || {
            while let Some(value) = relay_pipe.try_read() {
                let _ = relay_conn.call("send", crate::kgr_object! { "pipe" => peer_id, "data" => value });
            }
        });
    }

    /// `send {pipe, data}` dispatch: writes `data` onto the local pipe
    /// identified by `id` (our own id, since we're the recipient).
    pub fn deliver(&self, id: i64, data: KgrValue) -> bool {
        match self.entries.lock().unwrap().get(&id) {
            Some(entry) => entry.pipe.write(data).is_ok(),
            None => false,
        }
    }

    /// `close pipeId` dispatch.
    pub fn close(&self, id: i64) {
        if let Some(entry) = self.entries.lock().unwrap().remove(&id) {
            entry.pipe.close();
        }
    }

    pub fn close_all(&self) {
        for (_, entry) in self.entries.lock().unwrap().drain() {
            entry.pipe.close();
        }
    }
}
