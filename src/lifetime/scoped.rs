//! `SlokedScopedExecutor` / `SlokedScopedScheduler` — wrap a plain thread
//! spawner/timer with task-id tracking so `close()` can cancel every live
//! task and wait for the garbage to drain (§4.6).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Polling step `close()` uses while waiting for cancelled tasks to drain
/// (§4.6: "waits (with a 10 ms polling step)").
const CLOSE_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Handed to a task spawned on a `ScopedExecutor` so it can cooperatively
/// check whether its scope has been cancelled. Threads cannot be killed
/// outright, so cancellation here is always cooperative.
#[derive(Clone)]
pub struct CancelFlag {
    flag: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

struct TrackedTask {
    cancel: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

/// Wraps plain OS threads with a live-task table, reclaiming each entry on
/// completion and cancelling every live entry on `close()`.
pub struct ScopedExecutor {
    tasks: Mutex<HashMap<u64, TrackedTask>>,
    next_id: AtomicU64,
}

impl ScopedExecutor {
    pub fn new() -> ScopedExecutor {
        ScopedExecutor { tasks: Mutex::new(HashMap::new()), next_id: AtomicU64::new(0) }
    }

    /// Spawn `task` on its own thread, handing it a `CancelFlag` it should
    /// poll cooperatively. Returns the task id `cancel`/nothing else needs.
    pub fn spawn<F>(self: &Arc<Self>, task: F) -> u64
    where
        F: FnOnce(CancelFlag) + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let cancel = Arc::new(AtomicBool::new(false));
        let flag = CancelFlag { flag: cancel.clone() };
        let this = self.clone();
        let handle = thread::spawn(move || {
            task(flag);
            this.tasks.lock().unwrap().remove(&id);
        });
        self.tasks.lock().unwrap().insert(id, TrackedTask { cancel, handle: Some(handle) });
        id
    }

    /// Request cancellation of a still-live task. A no-op if it already
    /// completed.
    pub fn cancel(&self, id: u64) {
        if let Some(task) = self.tasks.lock().unwrap().get(&id) {
            task.cancel.store(true, Ordering::SeqCst);
        }
    }

    /// Cancel every live task and block until the table drains, then join
    /// every thread so no task outlives `close()`.
    pub fn close(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut tasks = self.tasks.lock().unwrap();
            for task in tasks.values() {
                task.cancel.store(true, Ordering::SeqCst);
            }
            tasks.values_mut().filter_map(|t| t.handle.take()).collect()
        };
        loop {
            if self.tasks.lock().unwrap().is_empty() {
                break;
            }
            thread::sleep(CLOSE_POLL_INTERVAL);
        }
        for handle in handles {
            let _ = handle.join();
        }
    }
}

impl Default for ScopedExecutor {
    fn default() -> Self {
        ScopedExecutor::new()
    }
}

struct TrackedTimer {
    cancel: Arc<AtomicBool>,
}

/// Wraps a delay-based timer the same way `ScopedExecutor` wraps a thread
/// spawner: a numeric id per scheduled task, reclaimed on fire or cancel.
pub struct ScopedScheduler {
    tasks: Mutex<HashMap<u64, TrackedTimer>>,
    next_id: AtomicU64,
}

impl ScopedScheduler {
    pub fn new() -> ScopedScheduler {
        ScopedScheduler { tasks: Mutex::new(HashMap::new()), next_id: AtomicU64::new(0) }
    }

    pub fn schedule_after<F>(self: &Arc<Self>, delay: Duration, task: F) -> u64
    where
        F: FnOnce() + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let cancel = Arc::new(AtomicBool::new(false));
        self.tasks.lock().unwrap().insert(id, TrackedTimer { cancel: cancel.clone() });
        let this = self.clone();
        thread::spawn(move || {
            thread::sleep(delay);
            let cancelled = cancel.load(Ordering::SeqCst);
            this.tasks.lock().unwrap().remove(&id);
            if !cancelled {
                task();
            }
        });
        id
    }

    pub fn cancel(&self, id: u64) {
        if let Some(timer) = self.tasks.lock().unwrap().get(&id) {
            timer.cancel.store(true, Ordering::SeqCst);
        }
    }

    pub fn close(&self) {
        {
            let tasks = self.tasks.lock().unwrap();
            for timer in tasks.values() {
                timer.cancel.store(true, Ordering::SeqCst);
            }
        }
        loop {
            if self.tasks.lock().unwrap().is_empty() {
                break;
            }
            thread::sleep(CLOSE_POLL_INTERVAL);
        }
    }
}

impl Default for ScopedScheduler {
    fn default() -> Self {
        ScopedScheduler::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::time::Instant;

    #[test]
    fn close_cancels_and_joins_live_task() {
        let executor = Arc::new(ScopedExecutor::new());
        let observed_cancel = Arc::new(AtomicBool::new(false));
        let observed2 = observed_cancel.clone();
        executor.spawn(move |cancel| {
            for _ in 0..50 {
                if cancel.is_cancelled() {
                    observed2.store(true, Ordering::SeqCst);
                    return;
                }
                thread::sleep(Duration::from_millis(2));
            }
        });
        thread::sleep(Duration::from_millis(10));
        let start = Instant::now();
        executor.close();
        assert!(observed_cancel.load(Ordering::SeqCst));
        assert!(start.elapsed() < Duration::from_millis(200));
    }

    #[test]
    fn scheduler_cancel_prevents_fire() {
        let scheduler = Arc::new(ScopedScheduler::new());
        let fired = Arc::new(AtomicU32::new(0));
        let fired2 = fired.clone();
        let id = scheduler.schedule_after(Duration::from_millis(30), move || {
            fired2.fetch_add(1, Ordering::SeqCst);
        });
        scheduler.cancel(id);
        thread::sleep(Duration::from_millis(60));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn scheduler_fires_when_not_cancelled() {
        let scheduler = Arc::new(ScopedScheduler::new());
        let fired = Arc::new(AtomicU32::new(0));
        let fired2 = fired.clone();
        scheduler.schedule_after(Duration::from_millis(10), move || {
            fired2.fetch_add(1, Ordering::SeqCst);
        });
        thread::sleep(Duration::from_millis(40));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
