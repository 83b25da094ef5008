//! A fixed-size work-stealing thread pool.
//!
//! Each worker owns a `Mutex<VecDeque<Callback>>`. Jobs are submitted
//! round-robin across workers; an idle worker first drains its own queue
//! LIFO (freshest job first, favoring cache-warm work) and, finding it
//! empty, steals FIFO from a random victim (oldest job first, so a steal
//! doesn't starve whichever job the victim queued first).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rand::Rng;

use crate::config::ThreadPoolConfig;
use crate::wait::Wait;

type Callback = Box<dyn FnOnce() + Send + 'static>;

struct Worker {
    queue: Mutex<VecDeque<Callback>>,
}

/// A pool of worker threads drawing from per-worker queues, with idle
/// workers stealing from one another rather than blocking on a single
/// shared queue.
pub struct ThreadPool {
    workers: Arc<Vec<Worker>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    next_worker: AtomicUsize,
    queued_jobs: Arc<AtomicUsize>,
    clearing: Arc<AtomicBool>,
    shutting_down: Arc<AtomicBool>,
    steal_retry_delay: Duration,
}

impl ThreadPool {
    pub fn new() -> Self {
        Self::with_config(ThreadPoolConfig::default())
    }

    pub fn with_config(config: ThreadPoolConfig) -> Self {
        let thread_count = adjust_threads(config.threads);
        let workers: Arc<Vec<Worker>> =
            Arc::new((0..thread_count).map(|_| Worker { queue: Mutex::new(VecDeque::new()) }).collect());
        let queued_jobs = Arc::new(AtomicUsize::new(0));
        let clearing = Arc::new(AtomicBool::new(false));
        let shutting_down = Arc::new(AtomicBool::new(false));

        let handles = (0..thread_count)
            .map(|id| {
                let workers = workers.clone();
                let queued_jobs = queued_jobs.clone();
                let clearing = clearing.clone();
                let shutting_down = shutting_down.clone();
                let retry_delay = config.steal_retry_delay;
                thread::spawn(move || thread_payload(id, &workers, &queued_jobs, &clearing, &shutting_down, retry_delay))
            })
            .collect();

        ThreadPool {
            workers,
            handles: Mutex::new(handles),
            next_worker: AtomicUsize::new(0),
            queued_jobs,
            clearing,
            shutting_down,
            steal_retry_delay: config.steal_retry_delay,
        }
    }

    /// Submits `call` to the next worker in round-robin order. A no-op
    /// while [`ThreadPool::clear`] is in progress.
    pub fn insert(&self, call: impl FnOnce() + Send + 'static) {
        if self.clearing.load(Ordering::Acquire) {
            return;
        }
        let i = self.next_worker.fetch_add(1, Ordering::Relaxed) % self.workers.len();
        self.queued_jobs.fetch_add(1, Ordering::AcqRel);
        self.workers[i].queue.lock().unwrap().push_back(Box::new(call));
    }

    /// Drops every queued (not yet started) job across all workers and
    /// blocks until any already-running jobs finish.
    pub fn clear(&self) {
        self.clearing.store(true, Ordering::Release);
        for worker in self.workers.iter() {
            let mut queue = worker.queue.lock().unwrap();
            self.queued_jobs.fetch_sub(queue.len(), Ordering::AcqRel);
            queue.clear();
        }
        while self.pending() > 0 {
            thread::sleep(self.steal_retry_delay);
        }
        self.clearing.store(false, Ordering::Release);
    }

    pub fn pending(&self) -> usize {
        self.queued_jobs.load(Ordering::Acquire)
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }
}

impl Wait for ThreadPool {
    /// Blocks until every currently-queued job has been picked up and run
    /// (new jobs submitted concurrently are not waited on).
    fn wait_for(&self, timeout: Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            if self.pending() == 0 {
                return true;
            }
            if timeout.is_zero() || std::time::Instant::now() >= deadline {
                return false;
            }
            thread::sleep(self.steal_retry_delay.min(Duration::from_millis(1)));
        }
    }
}

impl Default for ThreadPool {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.clear();
        self.shutting_down.store(true, Ordering::Release);
        for handle in self.handles.lock().unwrap().drain(..) {
            let _ = handle.join();
        }
    }
}

fn adjust_threads(requested: usize) -> usize {
    if requested == 0 {
        thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
    } else {
        requested
    }
    .max(1)
}

fn thread_payload(
    id: usize,
    workers: &[Worker],
    queued_jobs: &AtomicUsize,
    clearing: &AtomicBool,
    shutting_down: &AtomicBool,
    retry_delay: Duration,
) {
    let mut rng = rand::thread_rng();
    loop {
        let own = workers[id].queue.lock().unwrap().pop_back();
        let call = own.or_else(|| {
            if workers.len() < 2 {
                return None;
            }
            let victim = rng.gen_range(0..workers.len());
            if victim == id {
                return None;
            }
            workers[victim].queue.lock().unwrap().pop_front()
        });

        match call {
            Some(call) => {
                call();
                queued_jobs.fetch_sub(1, Ordering::AcqRel);
            }
            None if shutting_down.load(Ordering::Acquire) && !clearing.load(Ordering::Acquire) => break,
            None => thread::sleep(retry_delay),
        }
    }
}
