//! Fixed-size worker pools and end-of-stream fan-out.
//!
//! Every stage runs on a [`WorkerPool`]: a set of named OS threads started
//! eagerly and joined eagerly. Workers exit only after receiving their own
//! [`Envelope::EndOfStream`]; [`seal`] sends exactly one per consumer.

use crate::error::MgProxyError;
use crate::model::Envelope;
use crossbeam_channel::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, warn};

/// A started pool of identical workers for one stage.
#[derive(Debug)]
pub struct WorkerPool {
    stage: &'static str,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Start `size` threads named `<stage>-<index>`, each running `worker(index)`.
    ///
    /// If a thread cannot be started the error is returned and the threads
    /// already running are left to exit once their queues disconnect.
    pub fn spawn<F>(stage: &'static str, size: usize, worker: F) -> Result<Self, MgProxyError>
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        let worker = Arc::new(worker);
        let mut handles = Vec::with_capacity(size);

        for index in 0..size {
            let worker = Arc::clone(&worker);
            let handle = thread::Builder::new()
                .name(format!("{stage}-{index}"))
                .spawn(move || worker(index))
                .map_err(|source| MgProxyError::WorkerSpawn {
                    stage,
                    index,
                    source,
                })?;
            handles.push(handle);
        }

        debug!("Started {} {} worker(s)", size, stage);
        Ok(Self { stage, handles })
    }

    /// Number of workers in the pool.
    pub fn size(&self) -> usize {
        self.handles.len()
    }

    pub fn stage(&self) -> &'static str {
        self.stage
    }

    /// Block until every worker has exited. Returns how many panicked.
    pub fn join(self) -> usize {
        let mut panicked = 0;
        for (index, handle) in self.handles.into_iter().enumerate() {
            if handle.join().is_err() {
                error!("{} worker {} panicked", self.stage, index);
                panicked += 1;
            }
        }
        debug!("All {} workers exited", self.stage);
        panicked
    }
}

/// Send one end-of-stream marker per consumer. Returns how many were queued.
///
/// Blocks like any other send when the queue is bounded and full. Stops early
/// only if every consumer is already gone.
pub fn seal<T>(queue: &Sender<Envelope<T>>, consumers: usize) -> usize {
    for sent in 0..consumers {
        if queue.send(Envelope::EndOfStream).is_err() {
            warn!(
                "Queue closed after {} of {} end-of-stream markers",
                sent, consumers
            );
            return sent;
        }
    }
    consumers
}
