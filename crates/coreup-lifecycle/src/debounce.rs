use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::warn;

#[derive(Debug, Default)]
struct Pending {
    deadline: Option<Instant>,
    shutdown: bool,
}

type Shared = Arc<(Mutex<Pending>, Condvar)>;

/// Coalesces bursts of triggers into one call of `action`, run `delay` after
/// the last trigger on a dedicated worker thread.
pub struct Debouncer {
    shared: Shared,
    delay: Duration,
    worker: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn spawn(name: &str, delay: Duration, action: impl Fn() + Send + 'static) -> Self {
        let shared: Shared = Arc::new((Mutex::new(Pending::default()), Condvar::new()));
        let worker_shared = Arc::clone(&shared);
        let worker = match thread::Builder::new()
            .name(format!("debounce-{name}"))
            .spawn(move || run_worker(&worker_shared, &action))
        {
            Ok(handle) => Some(handle),
            Err(err) => {
                warn!(%err, "failed to spawn debounce worker");
                None
            }
        };
        Self {
            shared,
            delay,
            worker,
        }
    }

    /// (Re)arms the timer. Without a worker thread the action never fires;
    /// callers can still refresh synchronously.
    pub fn trigger(&self) {
        let (lock, wake) = &*self.shared;
        let mut pending = lock_pending(lock);
        pending.deadline = Some(Instant::now() + self.delay);
        wake.notify_one();
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        {
            let (lock, wake) = &*self.shared;
            lock_pending(lock).shutdown = true;
            wake.notify_one();
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn lock_pending(lock: &Mutex<Pending>) -> MutexGuard<'_, Pending> {
    lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn run_worker(shared: &Shared, action: &dyn Fn()) {
    let (lock, wake) = &**shared;
    let mut pending = lock_pending(lock);
    loop {
        if pending.shutdown {
            return;
        }
        match pending.deadline {
            None => {
                pending = wake
                    .wait(pending)
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
            }
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    pending.deadline = None;
                    drop(pending);
                    action();
                    pending = lock_pending(lock);
                } else {
                    pending = wake
                        .wait_timeout(pending, deadline - now)
                        .map(|(guard, _)| guard)
                        .unwrap_or_else(|poisoned| poisoned.into_inner().0);
                }
            }
        }
    }
}
