//! `Pipe` / `Service` — the FIFO message channel and its acceptor (§3, §4.7).
//!
//! A `Pipe` pair shares one `Channel`: each side's `write` pushes onto the
//! queue the *other* side reads from, and each side's listener fires when
//! the other side writes. `close()` is shared — closing either handle
//! closes both, matching a real bidirectional pipe.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};

use crate::error::NetError;
use crate::rpc::value::KgrValue;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum PipeStatus {
    Open,
    Closed,
}

type Listener = Box<dyn Fn() + Send + Sync>;

#[derive(Clone, Copy, Eq, PartialEq)]
enum Side {
    A,
    B,
}

struct Channel {
    a_to_b: Mutex<VecDeque<KgrValue>>,
    b_to_a: Mutex<VecDeque<KgrValue>>,
    status: Mutex<PipeStatus>,
    condvar: Condvar,
    listener_a: Mutex<Option<Listener>>,
    listener_b: Mutex<Option<Listener>>,
}

/// One endpoint of an in-process bidirectional message queue — the local
/// half of an RPC (§3, glossary: "Pipe"). Cheaply `Clone`: every clone
/// shares the same side of the same channel, the way a socket handle
/// would be shared across the reader/relay threads that both need it.
#[derive(Clone)]
pub struct Pipe {
    channel: Arc<Channel>,
    side: Side,
}

/// Form a connected `(client, service)` pipe pair, the way `LocalServer`
/// does on every `connect` (§4.7).
pub fn pipe_pair() -> (Pipe, Pipe) {
    let channel = Arc::new(Channel {
        a_to_b: Mutex::new(VecDeque::new()),
        b_to_a: Mutex::new(VecDeque::new()),
        status: Mutex::new(PipeStatus::Open),
        condvar: Condvar::new(),
        listener_a: Mutex::new(None),
        listener_b: Mutex::new(None),
    });
    (Pipe { channel: channel.clone(), side: Side::A }, Pipe { channel, side: Side::B })
}

impl Pipe {
    fn incoming(&self) -> &Mutex<VecDeque<KgrValue>> {
        match self.side {
            Side::A => &self.channel.b_to_a,
            Side::B => &self.channel.a_to_b,
        }
    }

    fn outgoing(&self) -> &Mutex<VecDeque<KgrValue>> {
        match self.side {
            Side::A => &self.channel.a_to_b,
            Side::B => &self.channel.b_to_a,
        }
    }

    fn peer_listener(&self) -> &Mutex<Option<Listener>> {
        match self.side {
            Side::A => &self.channel.listener_b,
            Side::B => &self.channel.listener_a,
        }
    }

    fn my_listener(&self) -> &Mutex<Option<Listener>> {
        match self.side {
            Side::A => &self.channel.listener_a,
            Side::B => &self.channel.listener_b,
        }
    }

    pub fn status(&self) -> PipeStatus {
        *self.channel.status.lock().unwrap()
    }

    fn is_open(&self) -> bool {
        self.status() == PipeStatus::Open
    }

    /// Queue `value` for the peer to read, waking a blocked `read()` and
    /// firing the peer's listener, if any, outside the lock.
    pub fn write(&self, value: KgrValue) -> Result<(), NetError> {
        if !self.is_open() {
            return Err(NetError::Closed);
        }
        self.outgoing().lock().unwrap().push_back(value);
        self.channel.condvar.notify_all();
        let listener = self.peer_listener().lock().unwrap();
        if let Some(listener) = listener.as_ref() {
            listener();
        }
        Ok(())
    }

    /// Block until a message is available or the pipe closes.
    pub fn read(&self) -> Result<KgrValue, NetError> {
        let mut queue = self.incoming().lock().unwrap();
        loop {
            if let Some(value) = queue.pop_front() {
                return Ok(value);
            }
            if !self.is_open() {
                return Err(NetError::Closed);
            }
            queue = self.channel.condvar.wait(queue).unwrap();
        }
    }

    /// Non-blocking read: `None` if nothing is queued yet.
    pub fn try_read(&self) -> Option<KgrValue> {
        self.incoming().lock().unwrap().pop_front()
    }

    pub fn empty(&self) -> bool {
        self.incoming().lock().unwrap().is_empty()
    }

    pub fn count(&self) -> usize {
        self.incoming().lock().unwrap().len()
    }

    /// Closing either end closes the shared channel and wakes any blocked
    /// reader on both sides.
    pub fn close(&self) {
        *self.channel.status.lock().unwrap() = PipeStatus::Closed;
        self.channel.condvar.notify_all();
    }

    /// Install the callback invoked whenever the peer writes to this side.
    pub fn set_listener(&self, listener: impl Fn() + Send + Sync + 'static) {
        *self.my_listener().lock().unwrap() = Some(Box::new(listener));
    }

    pub fn clear_listener(&self) {
        *self.my_listener().lock().unwrap() = None;
    }
}

/// Accepts a `Pipe` and speaks a free-form protocol over it (§3, glossary:
/// "Service"). `attach` returns a `TaskResult` so a `LocalServer::connect`
/// can tell acceptance from the service cancelling the handshake.
pub trait Service: Send + Sync {
    fn attach(&self, pipe: Pipe) -> crate::task::TaskResult<(), NetError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn write_on_one_side_is_read_on_the_other() {
        let (a, b) = pipe_pair();
        a.write(KgrValue::Int(42)).unwrap();
        assert_eq!(b.read().unwrap(), KgrValue::Int(42));
        assert!(b.empty());
    }

    #[test]
    fn listener_fires_on_peer_write() {
        let (a, b) = pipe_pair();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits2 = hits.clone();
        b.set_listener(move || {
            hits2.fetch_add(1, Ordering::SeqCst);
        });
        a.write(KgrValue::Null).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn close_is_shared_and_unblocks_reader() {
        let (a, b) = pipe_pair();
        let handle = std::thread::spawn(move || b.read());
        std::thread::sleep(std::time::Duration::from_millis(20));
        a.close();
        assert_eq!(handle.join().unwrap(), Err(NetError::Closed));
    }
}
