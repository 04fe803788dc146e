// Copyright 2026 The CHost Authors
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

//! General-purpose thread pool for background work.
//!
//! Workers drain the [`BlockedQueue`] and sleep on a condition variable
//! when it runs dry. Each worker carries its own stop flag so a hot
//! shrink can detach surplus threads and let them exit on the next wake.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use crate::queue::BlockedQueue;

type Job = Box<dyn FnOnce() + Send + 'static>;

struct Shared {
    queue: BlockedQueue<Job>,
    lock: Mutex<()>,
    wakeup: Condvar,
    idle: AtomicUsize,
    terminated: AtomicBool,
}

struct Worker {
    handle: JoinHandle<()>,
    stop: Arc<AtomicBool>,
}

/// Handle to one submitted task; [`Task::wait`] blocks for its result.
pub struct Task<R> {
    result: Mutex<mpsc::Receiver<R>>,
}

impl<R> Task<R> {
    /// The task's result, or `None` if it panicked or was discarded by
    /// [`ThreadPool::stop`] before running.
    pub fn wait(self) -> Option<R> {
        self.result.into_inner().unwrap().recv().ok()
    }
}

pub struct ThreadPool {
    shared: Arc<Shared>,
    workers: Vec<Worker>,
}

impl ThreadPool {
    pub fn new(threads: usize) -> Self {
        let mut pool = ThreadPool {
            shared: Arc::new(Shared {
                queue: BlockedQueue::new(),
                lock: Mutex::new(()),
                wakeup: Condvar::new(),
                idle: AtomicUsize::new(0),
                terminated: AtomicBool::new(false),
            }),
            workers: Vec::new(),
        };
        pool.launch(threads);
        pool
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    pub fn idle_threads(&self) -> usize {
        self.shared.idle.load(Ordering::Relaxed)
    }

    fn launch(&mut self, count: usize) {
        for _ in 0..count {
            let stop = Arc::new(AtomicBool::new(false));
            let shared = Arc::clone(&self.shared);
            let flag = Arc::clone(&stop);
            let handle = thread::spawn(move || worker_loop(shared, flag));
            self.workers.push(Worker { handle, stop });
        }
    }

    /// Queues a closure and wakes one worker. The returned handle yields
    /// the closure's result.
    pub fn submit<F, R>(&self, f: F) -> Task<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        self.shared.queue.push(Box::new(move || {
            let _ = tx.send(f());
        }));
        let _guard = self.shared.lock.lock().unwrap();
        self.shared.wakeup.notify_one();
        Task { result: Mutex::new(rx) }
    }

    /// Grows or shrinks the pool. Shrinking detaches the surplus workers;
    /// they finish their current task and exit on the next wake. Returns
    /// false once the pool is stopped.
    pub fn resize(&mut self, threads: usize) -> bool {
        if self.shared.terminated.load(Ordering::Relaxed) {
            return false;
        }
        if threads > self.workers.len() {
            let grow = threads - self.workers.len();
            self.launch(grow);
        } else if threads < self.workers.len() {
            for worker in self.workers.drain(threads..) {
                worker.stop.store(true, Ordering::Relaxed);
                drop(worker.handle); // detach
            }
            let _guard = self.shared.lock.lock().unwrap();
            self.shared.wakeup.notify_all();
        }
        true
    }

    /// Stops every worker, joins them and drops any tasks still queued.
    pub fn stop(&mut self) {
        if self.shared.terminated.swap(true, Ordering::Relaxed) {
            return;
        }
        {
            let _guard = self.shared.lock.lock().unwrap();
            self.shared.wakeup.notify_all();
        }
        for worker in self.workers.drain(..) {
            if worker.handle.join().is_err() {
                log::error!("a pool worker panicked");
            }
        }
        self.shared.queue.clear();
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop(shared: Arc<Shared>, stop: Arc<AtomicBool>) {
    let mut task = shared.queue.pop();
    loop {
        while let Some(job) = task.take() {
            job();
            if stop.load(Ordering::Relaxed) {
                return;
            }
            task = shared.queue.pop();
        }

        let mut guard = shared.lock.lock().unwrap();
        shared.idle.fetch_add(1, Ordering::Relaxed);
        loop {
            task = shared.queue.pop();
            if task.is_some()
                || shared.terminated.load(Ordering::Relaxed)
                || stop.load(Ordering::Relaxed)
            {
                break;
            }
            guard = shared.wakeup.wait(guard).unwrap();
        }
        shared.idle.fetch_sub(1, Ordering::Relaxed);
        if task.is_none() {
            return;
        }
        drop(guard);
    }
}
