//! Worker pools that run deferred registry work and protocol tasks.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;

/// A unit of deferred work
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs jobs somewhere other than the caller's critical section
pub trait Executor: Send + Sync {
    fn execute(&self, job: Job);
}

/// Fixed-size pool of named worker threads fed by a crossbeam channel
pub struct ThreadPoolExecutor {
    name: String,
    sender: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl ThreadPoolExecutor {
    pub fn new(name: &str, size: usize) -> io::Result<Self> {
        let (sender, receiver) = channel::unbounded::<Job>();
        let mut workers = Vec::with_capacity(size);
        for index in 0..size.max(1) {
            let receiver = receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("{}-{}", name, index))
                .spawn(move || run_worker(receiver))?;
            workers.push(handle);
        }
        tracing::debug!("Started executor '{}' with {} worker(s)", name, workers.len());

        Ok(Self {
            name: name.to_string(),
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stop accepting jobs, let queued jobs finish and join the workers
    pub fn shutdown(&self) {
        drop(self.sender.lock().take());
        let workers = std::mem::take(&mut *self.workers.lock());
        let current = thread::current().id();
        for worker in workers {
            if worker.thread().id() == current {
                continue;
            }
            if worker.join().is_err() {
                tracing::error!("Worker of executor '{}' terminated abnormally", self.name);
            }
        }
        tracing::debug!("Executor '{}' shut down", self.name);
    }
}

impl Executor for ThreadPoolExecutor {
    fn execute(&self, job: Job) {
        let sender = self.sender.lock();
        match sender.as_ref() {
            Some(sender) => {
                if sender.send(job).is_err() {
                    tracing::warn!("Executor '{}' has no workers left, dropping job", self.name);
                }
            }
            None => tracing::warn!("Executor '{}' is shut down, dropping job", self.name),
        }
    }
}

impl Drop for ThreadPoolExecutor {
    fn drop(&mut self) {
        drop(self.sender.lock().take());
    }
}

fn run_worker(receiver: Receiver<Job>) {
    while let Ok(job) = receiver.recv() {
        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            tracing::error!("Job panicked on {:?}", thread::current().name());
        }
    }
}

/// Runs every job on the calling thread
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl Executor for InlineExecutor {
    fn execute(&self, job: Job) {
        job();
    }
}
