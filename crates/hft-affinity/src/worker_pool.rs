//! A fixed pool of OS threads, one per configured CPU index, dispatching
//! work off a mutex-protected FIFO queue behind a condition variable.
//!
//! This is deliberately not lock-free: it is only ever used for
//! initialization, background maintenance, and shutdown work, never on the
//! hot path the rings in `hft-core` serve.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use crate::affinity::spawn_pinned;
use crate::error::{WorkerPanicked, WorkerPoolError};

type Task = Box<dyn FnOnce() + Send + 'static>;

struct Shared {
    queue: Mutex<VecDeque<Task>>,
    not_empty: Condvar,
    not_full: Condvar,
    stopped: AtomicBool,
}

/// Runtime statistics for a [`WorkerPool`], sampled from atomics.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoolStats {
    pub worker_count: usize,
    pub submitted: u64,
    pub completed: u64,
    pub panicked: u64,
}

#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicU64,
    completed: AtomicU64,
    panicked: AtomicU64,
}

/// A blocking handle to a task's eventual result. The pool has no async
/// runtime to poll a `Future` against, so completion is observed by
/// joining this handle.
pub struct TaskHandle<R> {
    inner: std::sync::mpsc::Receiver<std::thread::Result<R>>,
}

impl<R> TaskHandle<R> {
    pub fn join(self) -> Result<R, WorkerPanicked> {
        match self.inner.recv() {
            Ok(Ok(value)) => Ok(value),
            _ => Err(WorkerPanicked),
        }
    }
}

/// A pool of worker threads pinned one-per-CPU-index, running tasks off a
/// bounded FIFO queue. Panics inside a task are caught; the worker that ran
/// it keeps running.
pub struct WorkerPool {
    shared: Arc<Shared>,
    counters: Arc<Counters>,
    capacity: usize,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns one worker thread pinned to each CPU index in `cpu_indices`.
    /// `queue_capacity` bounds the number of pending tasks `try_enqueue`
    /// will admit before refusing.
    #[must_use]
    pub fn new(cpu_indices: &[usize], queue_capacity: usize) -> Self {
        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::with_capacity(queue_capacity)),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            stopped: AtomicBool::new(false),
        });
        let counters = Arc::new(Counters::default());

        let mut workers = Vec::with_capacity(cpu_indices.len());
        for (worker_index, &cpu) in cpu_indices.iter().enumerate() {
            let shared = Arc::clone(&shared);
            let counters = Arc::clone(&counters);
            let name = format!("hft-worker-{worker_index}");
            let handle = spawn_pinned(cpu, &name, move || worker_loop(&shared, &counters));
            workers.push(handle);
        }

        Self {
            shared,
            counters,
            capacity: queue_capacity,
            workers,
        }
    }

    /// Enqueues `task`, blocking on the internal mutex and condvar (never on
    /// a kernel wait primitive beyond that) until the bounded queue has room.
    /// Returns a handle the caller can join for the result.
    pub fn enqueue<F, R>(&self, task: F) -> TaskHandle<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = std::sync::mpsc::channel();
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        let boxed: Task = Box::new(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(task));
            let _ = tx.send(result);
        });
        {
            let mut queue = self.shared.queue.lock().unwrap();
            while queue.len() >= self.capacity && !self.shared.stopped.load(Ordering::Acquire) {
                queue = self.shared.not_full.wait(queue).unwrap();
            }
            queue.push_back(boxed);
        }
        self.shared.not_empty.notify_one();
        TaskHandle { inner: rx }
    }

    /// Non-blocking variant: returns [`WorkerPoolError::QueueFull`] or
    /// [`WorkerPoolError::Shutdown`] instead of waiting.
    pub fn try_enqueue<F, R>(&self, task: F) -> Result<TaskHandle<R>, WorkerPoolError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.shared.stopped.load(Ordering::Acquire) {
            return Err(WorkerPoolError::Shutdown);
        }
        let mut queue = match self.shared.queue.try_lock() {
            Ok(queue) => queue,
            Err(_) => return Err(WorkerPoolError::QueueFull),
        };
        if queue.len() >= self.capacity {
            return Err(WorkerPoolError::QueueFull);
        }
        let (tx, rx) = std::sync::mpsc::channel();
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        let boxed: Task = Box::new(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(task));
            let _ = tx.send(result);
        });
        queue.push_back(boxed);
        drop(queue);
        self.shared.not_empty.notify_one();
        Ok(TaskHandle { inner: rx })
    }

    #[must_use]
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            worker_count: self.workers.len(),
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            panicked: self.counters.panicked.load(Ordering::Relaxed),
        }
    }
}

fn worker_loop(shared: &Shared, counters: &Counters) {
    loop {
        let task = {
            let mut queue = shared.queue.lock().unwrap();
            loop {
                if let Some(task) = queue.pop_front() {
                    break Some(task);
                }
                if shared.stopped.load(Ordering::Acquire) {
                    break None;
                }
                queue = shared.not_empty.wait(queue).unwrap();
            }
        };
        shared.not_full.notify_one();

        match task {
            Some(task) => {
                let outcome = panic::catch_unwind(AssertUnwindSafe(task));
                match outcome {
                    Ok(()) => {
                        counters.completed.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(_) => {
                        counters.panicked.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
            None => break,
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shared.stopped.store(true, Ordering::Release);
        self.shared.not_empty.notify_all();
        self.shared.not_full.notify_all();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}
