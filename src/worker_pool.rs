//! A shared pool of long-lived `std::thread` workers pulling jobs off one
//! `crossbeam_channel::Receiver` (§4.11, backing §6.4's worker-pool interface). One `WorkerPool`
//! is created per [`crate::vfs::VfsContext`] and handed to every DST track's MT pipeline.

use crossbeam_channel::{Receiver, Sender};
use std::thread::JoinHandle;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// `N` worker threads sharing one job queue. Jobs are plain closures; the MT pipeline (§4.5) is
/// responsible for routing each job's result back to the originating file's ordered queue.
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `n_workers` threads. `n_workers` is clamped to at least 1.
    pub fn new(n_workers: usize) -> Self {
        let n_workers = n_workers.max(1);
        let (sender, receiver): (Sender<Job>, Receiver<Job>) = crossbeam_channel::unbounded();

        let handles = (0..n_workers)
            .map(|i| {
                let receiver = receiver.clone();
                std::thread::Builder::new()
                    .name(format!("sacdfs-worker-{i}"))
                    .spawn(move || {
                        for job in receiver {
                            job();
                        }
                    })
                    .expect("failed to spawn worker thread")
            })
            .collect();

        WorkerPool { sender: Some(sender), handles }
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Queue `job` for execution on the next free worker.
    pub fn dispatch(&self, job: impl FnOnce() + Send + 'static) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(Box::new(job));
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Dropping the sender closes the channel once all outstanding jobs drain, letting every
        // worker's `for job in receiver` loop exit; then join so no worker outlives the pool.
        self.sender.take();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn dispatched_jobs_all_run() {
        let pool = WorkerPool::new(4);
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..100 {
            let counter = counter.clone();
            pool.dispatch(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        drop(pool);
        assert_eq!(counter.load(Ordering::SeqCst), 100);
    }

    #[test]
    fn size_reports_worker_count() {
        let pool = WorkerPool::new(3);
        assert_eq!(pool.size(), 3);
    }
}
