//! `TaskResult` / `TaskResultSupplier` — single-producer promise values with
//! cancellation, plus the pipeline stages built on top of them (§3, §4.5).

pub mod pipeline;

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::lifetime::SlokedLifetime;

/// §3: "state ∈ {Pending, Ready, Error, Cancelled}".
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum TaskState {
    Pending,
    Ready,
    Error,
    Cancelled,
}

/// The terminal value a `TaskResult` settles to. Kept distinct from
/// `TaskState` so listeners receive the payload alongside the state in one
/// match.
pub enum Outcome<R, E> {
    Ready(R),
    Error(E),
    Cancelled,
}

impl<R, E> Outcome<R, E> {
    pub fn state(&self) -> TaskState {
        match self {
            Outcome::Ready(_) => TaskState::Ready,
            Outcome::Error(_) => TaskState::Error,
            Outcome::Cancelled => TaskState::Cancelled,
        }
    }
}

type Listener<R, E> = Box<dyn FnOnce(&Outcome<R, E>) + Send>;

struct Inner<R, E> {
    state: TaskState,
    // Wrapped in `Arc` so a settling thread can grab a cheap handle, drop
    // the mutex, and only then invoke listeners — no operation holds a lock
    // across a user-supplied callback (§5).
    outcome: Option<Arc<Outcome<R, E>>>,
    listeners: Vec<(u64, Listener<R, E>)>,
    next_listener: u64,
}

struct Shared<R, E> {
    mutex: Mutex<Inner<R, E>>,
    condvar: Condvar,
}

/// The single-writer companion to a `TaskResult`. Producers call
/// `set_result`/`set_error`/`cancel` exactly once (§3).
pub struct TaskResultSupplier<R, E> {
    shared: Arc<Shared<R, E>>,
}

/// A read handle onto a task's eventual outcome. Cheaply `Clone`, so many
/// observers can `notify`/`wait` on the same result.
pub struct TaskResult<R, E> {
    shared: Arc<Shared<R, E>>,
}

impl<R, E> Clone for TaskResult<R, E> {
    fn clone(&self) -> Self {
        TaskResult { shared: self.shared.clone() }
    }
}

/// Detaches a listener registered with `notify` before it fires. A no-op if
/// the result already settled (the listener either already ran or was
/// dropped with the lifetime check failing).
pub struct Detach {
    inner: Option<Box<dyn FnOnce() + Send>>,
}

impl Detach {
    pub fn detach(mut self) {
        if let Some(f) = self.inner.take() {
            f();
        }
    }
}

pub fn task_result<R, E>() -> (TaskResultSupplier<R, E>, TaskResult<R, E>) {
    let shared = Arc::new(Shared {
        mutex: Mutex::new(Inner { state: TaskState::Pending, outcome: None, listeners: Vec::new(), next_listener: 0 }),
        condvar: Condvar::new(),
    });
    (TaskResultSupplier { shared: shared.clone() }, TaskResult { shared })
}

impl<R, E> TaskResultSupplier<R, E> {
    fn settle(&self, outcome: Outcome<R, E>) -> Result<(), crate::error::SlokedError> {
        let (listeners, outcome) = {
            let mut inner = self.shared.mutex.lock().unwrap();
            if inner.state != TaskState::Pending {
                return Err(crate::error::SlokedError::Other("task result already settled".to_string()));
            }
            inner.state = outcome.state();
            let outcome = Arc::new(outcome);
            inner.outcome = Some(outcome.clone());
            (std::mem::take(&mut inner.listeners), outcome)
        };
        self.shared.condvar.notify_all();
        for (_, listener) in listeners {
            listener(&outcome);
        }
        Ok(())
    }

    pub fn set_result(&self, value: R) -> Result<(), crate::error::SlokedError> {
        self.settle(Outcome::Ready(value))
    }

    pub fn set_error(&self, error: E) -> Result<(), crate::error::SlokedError> {
        self.settle(Outcome::Error(error))
    }

    pub fn cancel(&self) -> Result<(), crate::error::SlokedError> {
        self.settle(Outcome::Cancelled)
    }

    /// Supplemented feature (`Task.h`'s `Catch`/`Wrap`): run a fallible
    /// closure and route its result automatically, so a producer doesn't
    /// need its own `match` over `Result`.
    pub fn wrap(&self, f: impl FnOnce() -> Result<R, E>) -> Result<(), crate::error::SlokedError> {
        match f() {
            Ok(value) => self.set_result(value),
            Err(error) => self.set_error(error),
        }
    }
}

impl<R: Send + 'static, E: Send + 'static> TaskResult<R, E> {
    pub fn state(&self) -> TaskState {
        self.shared.mutex.lock().unwrap().state
    }

    fn wait_while(&self, deadline: Option<Instant>) -> Option<std::sync::MutexGuard<'_, Inner<R, E>>> {
        let mut inner = self.shared.mutex.lock().unwrap();
        while inner.state == TaskState::Pending {
            inner = match deadline {
                None => self.shared.condvar.wait(inner).unwrap(),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return None;
                    }
                    let (guard, timeout) = self.shared.condvar.wait_timeout(inner, deadline - now).unwrap();
                    if timeout.timed_out() && guard.state == TaskState::Pending {
                        return None;
                    }
                    guard
                }
            };
        }
        Some(inner)
    }

    /// Block until the result is terminal.
    pub fn wait(&self) -> TaskState {
        self.wait_while(None).expect("unbounded wait always settles").state
    }

    pub fn wait_for(&self, duration: Duration) -> Option<TaskState> {
        self.wait_while(Some(Instant::now() + duration)).map(|inner| inner.state)
    }

    pub fn wait_until(&self, deadline: Instant) -> Option<TaskState> {
        self.wait_while(Some(deadline)).map(|inner| inner.state)
    }

    /// `unwrap` per §3: returns `R` on `Ready`, raises on `Error`/`Cancelled`.
    pub fn unwrap(&self) -> Result<R, crate::error::SlokedError>
    where
        R: Clone,
        E: std::fmt::Display,
    {
        let inner = self.wait_while(None).expect("unbounded wait always settles");
        match &**inner.outcome.as_ref().expect("terminal state always carries an outcome") {
            Outcome::Ready(value) => Ok(value.clone()),
            Outcome::Error(e) => Err(crate::error::SlokedError::Other(format!("{e}"))),
            Outcome::Cancelled => Err(crate::error::SlokedError::Other("cancelled".to_string())),
        }
    }

    /// Register `listener`, to run exactly once, gated on `lifetime`
    /// (§3: "Listeners fire only if a token can be acquired at delivery
    /// time"). If the result is already terminal, `listener` runs
    /// synchronously under a token acquired right now.
    pub fn notify(&self, listener: impl FnOnce(&Outcome<R, E>) + Send + 'static, lifetime: &SlokedLifetime) -> Detach {
        let mut inner = self.shared.mutex.lock().unwrap();
        if inner.state != TaskState::Pending {
            let outcome = inner.outcome.as_ref().expect("terminal state always carries an outcome").clone();
            drop(inner);
            if let Some(_token) = lifetime.acquire() {
                listener(&outcome);
            }
            return Detach { inner: None };
        }
        let id = inner.next_listener;
        inner.next_listener += 1;
        let lifetime = lifetime.clone();
        let gated: Listener<R, E> = Box::new(move |outcome| {
            if let Some(_token) = lifetime.acquire() {
                listener(outcome);
            }
        });
        inner.listeners.push((id, gated));
        drop(inner);

        let shared = self.shared.clone();
        Detach {
            inner: Some(Box::new(move || {
                shared.mutex.lock().unwrap().listeners.retain(|(lid, _)| *lid != id);
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::thread;

    #[test]
    fn settle_is_terminal_and_single_writer() {
        let (supplier, result) = task_result::<i32, String>();
        supplier.set_result(42).unwrap();
        assert_eq!(result.state(), TaskState::Ready);
        assert!(supplier.set_result(1).is_err());
        assert!(supplier.set_error("nope".to_string()).is_err());
    }

    #[test]
    fn listeners_fire_exactly_once_before_and_after_termination() {
        let (supplier, result) = task_result::<i32, String>();
        let lifetime = SlokedLifetime::new();
        let before_count = Arc::new(AtomicU32::new(0));
        let before2 = before_count.clone();
        result.notify(move |_| { before2.fetch_add(1, Ordering::SeqCst); }, &lifetime);
        supplier.set_result(7).unwrap();

        let after_count = Arc::new(AtomicU32::new(0));
        let after2 = after_count.clone();
        result.notify(move |_| { after2.fetch_add(1, Ordering::SeqCst); }, &lifetime);

        assert_eq!(before_count.load(Ordering::SeqCst), 1);
        assert_eq!(after_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn wait_blocks_until_settled_from_another_thread() {
        let (supplier, result) = task_result::<i32, String>();
        let handle = thread::spawn(move || {
            thread::sleep(std::time::Duration::from_millis(20));
            supplier.set_result(99).unwrap();
        });
        assert_eq!(result.wait(), TaskState::Ready);
        assert_eq!(result.unwrap().unwrap(), 99);
        handle.join().unwrap();
    }

    #[test]
    fn closed_lifetime_suppresses_listener() {
        let (supplier, result) = task_result::<i32, String>();
        let lifetime = SlokedLifetime::new();
        lifetime.close();
        let fired = Arc::new(AtomicU32::new(0));
        let fired2 = fired.clone();
        result.notify(move |_| { fired2.fetch_add(1, Ordering::SeqCst); }, &lifetime);
        supplier.set_result(1).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
