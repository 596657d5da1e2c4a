//! `SlokedLifetime` and the scoped executor/scheduler wrappers that use it
//! for deterministic teardown (§3, §4.6).
//!
//! Kept in the concurrency register the rest of the crate already uses for
//! the multiplexer and transaction streams: a narrow `Mutex` plus, here, a
//! `Condvar` for the one genuinely blocking wait in the editor core
//! (`close()`).

mod scoped;

pub use scoped::{CancelFlag, ScopedExecutor, ScopedScheduler};

use std::sync::{Arc, Condvar, Mutex};

struct LifetimeState {
    active: bool,
    outstanding: u64,
}

struct LifetimeInner {
    state: Mutex<LifetimeState>,
    condvar: Condvar,
}

/// A token-issuing scope (§3). While `active`, `acquire()` hands out tokens;
/// `close()` flips the scope inactive and blocks until every outstanding
/// token has dropped.
#[derive(Clone)]
pub struct SlokedLifetime {
    inner: Arc<LifetimeInner>,
}

/// A ticket that keeps its issuing lifetime from completing `close()` while
/// held. Dropping it releases the hold.
pub struct LifetimeToken {
    inner: Arc<LifetimeInner>,
}

impl SlokedLifetime {
    pub fn new() -> SlokedLifetime {
        SlokedLifetime {
            inner: Arc::new(LifetimeInner {
                state: Mutex::new(LifetimeState { active: true, outstanding: 0 }),
                condvar: Condvar::new(),
            }),
        }
    }

    pub fn is_active(&self) -> bool {
        self.inner.state.lock().unwrap().active
    }

    /// Issue a token if the scope is still active. A listener can only fire
    /// if this succeeds at delivery time (§3).
    pub fn acquire(&self) -> Option<LifetimeToken> {
        let mut state = self.inner.state.lock().unwrap();
        if !state.active {
            return None;
        }
        state.outstanding += 1;
        Some(LifetimeToken { inner: self.inner.clone() })
    }

    /// Deactivate the scope and block until every token issued before this
    /// call has dropped (§8, invariant 6: "close() returns only after every
    /// listener whose callback took a token has run to completion").
    pub fn close(&self) {
        let mut state = self.inner.state.lock().unwrap();
        state.active = false;
        while state.outstanding > 0 {
            state = self.inner.condvar.wait(state).unwrap();
        }
    }
}

impl Default for SlokedLifetime {
    fn default() -> Self {
        SlokedLifetime::new()
    }
}

impl Drop for LifetimeToken {
    fn drop(&mut self) {
        let mut state = self.inner.state.lock().unwrap();
        state.outstanding -= 1;
        if state.outstanding == 0 {
            self.inner.condvar.notify_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn acquire_fails_once_inactive() {
        let lifetime = SlokedLifetime::new();
        let token = lifetime.acquire().unwrap();
        drop(token);
        lifetime.close();
        assert!(lifetime.acquire().is_none());
    }

    #[test]
    fn close_waits_for_outstanding_tokens() {
        let lifetime = SlokedLifetime::new();
        let token = lifetime.acquire().unwrap();
        let lifetime2 = lifetime.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            drop(token);
        });
        lifetime2.close();
        handle.join().unwrap();
        assert!(!lifetime2.is_active());
    }
}
