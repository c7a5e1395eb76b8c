//! Fixed worker pool.
//!
//! Jobs flow through an unbounded crossbeam channel to long-lived workers;
//! [`ThreadPool::wait`] blocks until every enqueued job has finished, which is
//! the per-round barrier the demo drivers need between fanning batches out and
//! committing them back.

use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use crossbeam_channel as chan;

type Job = Box<dyn FnOnce() + Send + 'static>;

struct Pending {
    count: Mutex<usize>,
    idle: Condvar,
}

pub struct ThreadPool {
    sender: Option<chan::Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    pending: Arc<Pending>,
}

impl ThreadPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let (sender, receiver) = chan::unbounded::<Job>();
        let pending = Arc::new(Pending {
            count: Mutex::new(0),
            idle: Condvar::new(),
        });
        let workers = (0..size)
            .map(|_| {
                let receiver = receiver.clone();
                let pending = Arc::clone(&pending);
                std::thread::spawn(move || {
                    while let Ok(job) = receiver.recv() {
                        job();
                        let mut count = pending.count.lock().expect("pending lock poisoned");
                        *count -= 1;
                        if *count == 0 {
                            pending.idle.notify_all();
                        }
                    }
                })
            })
            .collect();
        Self {
            sender: Some(sender),
            workers,
            pending,
        }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    pub fn enqueue(&self, job: impl FnOnce() + Send + 'static) {
        {
            let mut count = self.pending.count.lock().expect("pending lock poisoned");
            *count += 1;
        }
        if let Some(sender) = &self.sender {
            // workers only exit once the sender is dropped, so this cannot fail
            let _ = sender.send(Box::new(job));
        }
    }

    /// Blocks until every enqueued job has run to completion.
    pub fn wait(&self) {
        let mut count = self.pending.count.lock().expect("pending lock poisoned");
        while *count > 0 {
            count = self.pending.idle.wait(count).expect("pending lock poisoned");
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        // closing the channel lets workers drain outstanding jobs and exit
        self.sender.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}
