//! Resizable worker pool for per-element face baking.
//!
//! One task bakes one model element. The pool size follows a
//! caller-supplied policy, re-read by a control thread on a fixed interval
//! so the pool tracks changing host load without restarts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, select, tick, unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use crate::error::{RasterError, Result};

/// How often the control thread re-reads the sizing policy.
pub const DEFAULT_RESIZE_INTERVAL: Duration = Duration::from_secs(30);

/// How long an idle worker waits before re-checking its stop flag.
const IDLE_RECHECK: Duration = Duration::from_millis(500);

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A fixed-size, dynamically resizable worker pool.
pub struct RenderPool {
    state: Arc<PoolState>,
    jobs: Mutex<Option<Sender<Job>>>,
    valid: AtomicBool,
    control_stop: Mutex<Option<Sender<()>>>,
    control: Mutex<Option<JoinHandle<()>>>,
}

struct PoolState {
    receiver: Receiver<Job>,
    workers: Mutex<Vec<Worker>>,
    policy: Box<dyn Fn() -> usize + Send + Sync>,
}

struct Worker {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl PoolState {
    /// Bring the worker count in line with the sizing policy. Shrinking is
    /// cooperative: surplus workers finish their current job and exit.
    fn resize_to_policy(&self) {
        let target = (self.policy)().max(1);
        let mut workers = self.workers.lock();
        while workers.len() > target {
            if let Some(worker) = workers.pop() {
                worker.stop.store(true, Ordering::Release);
            }
        }
        while workers.len() < target {
            let index = workers.len();
            if let Some(worker) = spawn_worker(index, self.receiver.clone()) {
                workers.push(worker);
            } else {
                break;
            }
        }
    }
}

fn spawn_worker(index: usize, receiver: Receiver<Job>) -> Option<Worker> {
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();
    let spawned = std::thread::Builder::new()
        .name(format!("model-raster-worker-{index}"))
        .spawn(move || loop {
            if stop_flag.load(Ordering::Acquire) {
                break;
            }
            match receiver.recv_timeout(IDLE_RECHECK) {
                Ok(job) => job(),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        });
    match spawned {
        Ok(handle) => Some(Worker {
            stop,
            handle: Some(handle),
        }),
        Err(e) => {
            log::error!("unable to spawn render worker: {e}");
            None
        }
    }
}

impl RenderPool {
    /// Create a pool sized by `policy`, re-checked every
    /// [`DEFAULT_RESIZE_INTERVAL`].
    pub fn new(policy: impl Fn() -> usize + Send + Sync + 'static) -> RenderPool {
        Self::with_resize_interval(policy, DEFAULT_RESIZE_INTERVAL)
    }

    /// Create a pool with a custom policy re-check interval.
    pub fn with_resize_interval(
        policy: impl Fn() -> usize + Send + Sync + 'static,
        interval: Duration,
    ) -> RenderPool {
        let (jobs_tx, jobs_rx) = unbounded();
        let state = Arc::new(PoolState {
            receiver: jobs_rx,
            workers: Mutex::new(Vec::new()),
            policy: Box::new(policy),
        });
        state.resize_to_policy();

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let control_state = state.clone();
        let control = std::thread::Builder::new()
            .name("model-raster-pool-control".to_string())
            .spawn(move || {
                let ticker = tick(interval);
                loop {
                    select! {
                        recv(stop_rx) -> _ => break,
                        recv(ticker) -> _ => control_state.resize_to_policy(),
                    }
                }
            })
            .ok();

        RenderPool {
            state,
            jobs: Mutex::new(Some(jobs_tx)),
            valid: AtomicBool::new(true),
            control_stop: Mutex::new(Some(stop_tx)),
            control: Mutex::new(control),
        }
    }

    /// Submit a job. Fails once the pool is closed.
    pub fn execute(&self, job: Job) -> Result<()> {
        if !self.is_valid() {
            return Err(RasterError::Closed("render pool"));
        }
        let guard = self.jobs.lock();
        let sender = guard.as_ref().ok_or(RasterError::Closed("render pool"))?;
        sender
            .send(job)
            .map_err(|_| RasterError::RenderPool("worker queue disconnected".to_string()))
    }

    /// Current number of workers.
    pub fn size(&self) -> usize {
        self.state.workers.lock().len()
    }

    /// Re-read the sizing policy immediately instead of waiting for the
    /// control interval.
    pub fn resize_now(&self) {
        self.state.resize_to_policy();
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    /// Stop the control thread, drain the workers and reject further
    /// submissions. Idempotent.
    pub fn close(&self) {
        if self.valid.swap(false, Ordering::AcqRel) {
            self.control_stop.lock().take();
            if let Some(handle) = self.control.lock().take() {
                let _ = handle.join();
            }
            // Dropping the sender disconnects idle workers.
            self.jobs.lock().take();
            let mut workers = std::mem::take(&mut *self.state.workers.lock());
            for worker in &workers {
                worker.stop.store(true, Ordering::Release);
            }
            for worker in &mut workers {
                if let Some(handle) = worker.handle.take() {
                    let _ = handle.join();
                }
            }
        }
    }
}

impl Drop for RenderPool {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_executes_jobs() {
        let pool = RenderPool::new(|| 2);
        let (tx, rx) = bounded(8);
        for i in 0..8 {
            let tx = tx.clone();
            pool.execute(Box::new(move || {
                tx.send(i).unwrap();
            }))
            .unwrap();
        }
        let mut seen: Vec<i32> = (0..8).map(|_| rx.recv().unwrap()).collect();
        seen.sort();
        assert_eq!(seen, (0..8).collect::<Vec<_>>());
        pool.close();
    }

    #[test]
    fn test_resize_follows_policy() {
        let target = Arc::new(AtomicUsize::new(2));
        let policy_target = target.clone();
        let pool = RenderPool::new(move || policy_target.load(Ordering::Relaxed));
        assert_eq!(pool.size(), 2);

        target.store(5, Ordering::Relaxed);
        pool.resize_now();
        assert_eq!(pool.size(), 5);

        target.store(1, Ordering::Relaxed);
        pool.resize_now();
        assert_eq!(pool.size(), 1);
        pool.close();
    }

    #[test]
    fn test_zero_policy_keeps_one_worker() {
        let pool = RenderPool::new(|| 0);
        assert_eq!(pool.size(), 1);
        pool.close();
    }

    #[test]
    fn test_close_rejects_jobs() {
        let pool = RenderPool::new(|| 1);
        pool.close();
        assert!(!pool.is_valid());
        assert!(pool.execute(Box::new(|| {})).is_err());
        // A second close is a no-op.
        pool.close();
    }
}
