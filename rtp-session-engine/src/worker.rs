//! Named serialized task workers
//!
//! Each worker owns a FIFO task queue plus a list of delayed tasks and runs
//! them one at a time, parking until a new task arrives or the earliest
//! delayed deadline is reached. Components use `is_current` to short-circuit
//! re-enqueueing when already executing on the target worker.
// Copyright 2025 Francisco F. Pinochet
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::info;

/// A unit of work executed on a worker.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

enum Command {
    Run(Task),
    RunDelayed { run_at: Instant, task: Task },
    Stop,
}

// Workers are identified by id, not name: several sessions may each spawn
// a worker with the same role name.
static NEXT_WORKER_ID: AtomicU64 = AtomicU64::new(1);

tokio::task_local! {
    static CURRENT_WORKER: u64;
}

struct WorkerInner {
    name: String,
    id: u64,
    tx: mpsc::UnboundedSender<Command>,
}

/// Handle to a named serialized worker. Cloning shares the same queue.
#[derive(Clone)]
pub struct Worker {
    inner: Arc<WorkerInner>,
}

impl Worker {
    /// Spawn a worker onto the current tokio runtime.
    pub fn spawn(name: &str) -> Worker {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = NEXT_WORKER_ID.fetch_add(1, Ordering::Relaxed);
        tokio::spawn(CURRENT_WORKER.scope(id, worker_loop(name.to_string(), rx)));
        Worker {
            inner: Arc::new(WorkerInner {
                name: name.to_string(),
                id,
                tx,
            }),
        }
    }

    /// Enqueue a task for immediate execution (FIFO).
    pub fn push(&self, task: impl FnOnce() + Send + 'static) {
        let _ = self.inner.tx.send(Command::Run(Box::new(task)));
    }

    /// Enqueue a task to run `delay_ms` from now.
    pub fn push_delayed(&self, delay_ms: u64, task: impl FnOnce() + Send + 'static) {
        let run_at = Instant::now() + Duration::from_millis(delay_ms);
        let _ = self.inner.tx.send(Command::RunDelayed {
            run_at,
            task: Box::new(task),
        });
    }

    /// Request termination. Queued tasks that have not started are dropped.
    pub fn stop(&self) {
        let _ = self.inner.tx.send(Command::Stop);
    }

    /// True when called from a task executing on this worker.
    pub fn is_current(&self) -> bool {
        CURRENT_WORKER
            .try_with(|id| *id == self.inner.id)
            .unwrap_or(false)
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }
}

async fn worker_loop(name: String, mut rx: mpsc::UnboundedReceiver<Command>) {
    info!(worker = %name, "worker started");
    // (deadline, arrival counter, task); the counter keeps pops FIFO among
    // equal deadlines.
    let mut delayed: Vec<(Instant, u64, Task)> = Vec::new();
    let mut arrival: u64 = 0;
    loop {
        // Run everything that has come due.
        loop {
            let now = Instant::now();
            let due = delayed
                .iter()
                .enumerate()
                .filter(|(_, (run_at, _, _))| *run_at <= now)
                .min_by_key(|(_, (run_at, counter, _))| (*run_at, *counter))
                .map(|(i, _)| i);
            match due {
                Some(i) => {
                    let (_, _, task) = delayed.remove(i);
                    task();
                }
                None => break,
            }
        }
        let next_deadline = delayed.iter().map(|(run_at, _, _)| *run_at).min();
        tokio::select! {
            command = rx.recv() => match command {
                Some(Command::Run(task)) => task(),
                Some(Command::RunDelayed { run_at, task }) => {
                    arrival += 1;
                    delayed.push((run_at, arrival, task));
                }
                Some(Command::Stop) | None => break,
            },
            _ = async {
                match next_deadline {
                    Some(deadline) => sleep_until(deadline).await,
                    None => futures::future::pending::<()>().await,
                }
            } => {}
        }
    }
    info!(worker = %name, "worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_tasks_run_in_push_order() {
        let worker = Worker::spawn("test-order");
        let log = Arc::new(Mutex::new(Vec::new()));
        let (done_tx, done_rx) = oneshot::channel();
        for i in 0..10 {
            let log = log.clone();
            worker.push(move || log.lock().unwrap().push(i));
        }
        worker.push(move || {
            let _ = done_tx.send(());
        });
        done_rx.await.unwrap();
        assert_eq!(*log.lock().unwrap(), (0..10).collect::<Vec<i32>>());
    }

    #[tokio::test]
    async fn test_delayed_task_waits() {
        let worker = Worker::spawn("test-delay");
        let (tx, rx) = oneshot::channel();
        let started = Instant::now();
        worker.push_delayed(50, move || {
            let _ = tx.send(Instant::now());
        });
        let ran_at = rx.await.unwrap();
        assert!(ran_at.duration_since(started) >= Duration::from_millis(45));
    }

    #[tokio::test]
    async fn test_is_current_only_inside_worker() {
        let worker = Worker::spawn("test-current");
        assert!(!worker.is_current());
        let (tx, rx) = oneshot::channel();
        let probe = worker.clone();
        let other = Worker::spawn("test-other");
        worker.push(move || {
            let _ = tx.send((probe.is_current(), other.is_current()));
        });
        let (on_self, on_other) = rx.await.unwrap();
        assert!(on_self);
        assert!(!on_other);
    }

    #[tokio::test]
    async fn test_stop_discards_pending() {
        let worker = Worker::spawn("test-stop");
        let ran = Arc::new(AtomicBool::new(false));
        worker.stop();
        let flag = ran.clone();
        worker.push(move || flag.store(true, Ordering::SeqCst));
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!ran.load(Ordering::SeqCst));
    }
}
