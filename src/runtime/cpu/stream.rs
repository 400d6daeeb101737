//! Ordered execution stream for the CPU device
//!
//! A `CpuStream` owns one worker thread that drains a FIFO of launches, so
//! work issued on the same stream runs in issue order while the issuing thread
//! returns immediately. Faults raised by a launch are recorded and handed back
//! by the next [`CpuStream::synchronize`].

use parking_lot::{Condvar, Mutex};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread::{JoinHandle, ThreadId};

use crate::error::{Error, Result};
use crate::runtime::LaunchError;

static NEXT_STREAM_ID: AtomicU64 = AtomicU64::new(0);

/// A unit of work queued on a stream
struct Job {
    name: &'static str,
    run: Box<dyn FnOnce() -> Result<()> + Send + 'static>,
}

#[derive(Default)]
struct StreamState {
    enqueued: u64,
    completed: u64,
    fault: Option<Error>,
}

struct Shared {
    state: Mutex<StreamState>,
    done: Condvar,
}

impl Shared {
    fn finish(&self, name: &'static str, outcome: std::thread::Result<Result<()>>) {
        let fault = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(err),
            Err(payload) => Some(Error::DeviceFault {
                kernel: name,
                reason: panic_message(payload.as_ref()),
            }),
        };
        let mut state = self.state.lock();
        state.completed += 1;
        if let Some(err) = fault {
            tracing::debug!(kernel = name, error = %err, "stream job faulted");
            state.fault.get_or_insert(err);
        }
        self.done.notify_all();
    }
}

struct StreamInner {
    id: u64,
    shared: Arc<Shared>,
    sender: Mutex<Option<Sender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: Option<ThreadId>,
}

/// An ordered, asynchronous execution stream
#[derive(Clone)]
pub struct CpuStream {
    inner: Arc<StreamInner>,
}

impl CpuStream {
    /// Create a stream backed by its own worker thread
    ///
    /// If the worker cannot be spawned the stream degrades to inline
    /// execution, which preserves ordering but not asynchrony.
    pub fn new() -> Self {
        let id = NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed);
        let shared = Arc::new(Shared {
            state: Mutex::new(StreamState::default()),
            done: Condvar::new(),
        });
        let (tx, rx) = channel::<Job>();
        let worker_shared = shared.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("linewise-stream-{}", id))
            .spawn(move || worker_loop(rx, worker_shared));

        match spawned {
            Ok(handle) => {
                let worker_id = Some(handle.thread().id());
                Self {
                    inner: Arc::new(StreamInner {
                        id,
                        shared,
                        sender: Mutex::new(Some(tx)),
                        worker: Mutex::new(Some(handle)),
                        worker_id,
                    }),
                }
            }
            Err(err) => {
                tracing::warn!(stream = id, error = %err, "failed to spawn stream worker, running inline");
                Self::with_shared(id, shared)
            }
        }
    }

    /// Create a stream that executes every launch on the issuing thread
    pub fn inline() -> Self {
        let id = NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed);
        let shared = Arc::new(Shared {
            state: Mutex::new(StreamState::default()),
            done: Condvar::new(),
        });
        Self::with_shared(id, shared)
    }

    fn with_shared(id: u64, shared: Arc<Shared>) -> Self {
        Self {
            inner: Arc::new(StreamInner {
                id,
                shared,
                sender: Mutex::new(None),
                worker: Mutex::new(None),
                worker_id: None,
            }),
        }
    }

    /// Stream identifier
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Whether launches run on a dedicated worker thread
    pub fn is_async(&self) -> bool {
        self.inner.worker_id.is_some()
    }

    /// Queue `run` behind all previously enqueued work and return immediately
    pub fn enqueue<F>(&self, name: &'static str, run: F) -> std::result::Result<(), LaunchError>
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let job = Job {
            name,
            run: Box::new(run),
        };
        let sender = self.inner.sender.lock();
        self.inner.shared.state.lock().enqueued += 1;
        match sender.as_ref() {
            Some(tx) => tx.send(job).map_err(|_| {
                let mut state = self.inner.shared.state.lock();
                state.enqueued -= 1;
                LaunchError::StreamClosed
            }),
            None => {
                drop(sender);
                let Job { name, run } = job;
                let outcome = catch_unwind(AssertUnwindSafe(run));
                self.inner.shared.finish(name, outcome);
                Ok(())
            }
        }
    }

    /// Block until every launch enqueued so far has completed
    ///
    /// Returns (and clears) the first fault recorded since the last call.
    pub fn synchronize(&self) -> Result<()> {
        let shared = &self.inner.shared;
        let mut state = shared.state.lock();
        let target = state.enqueued;
        while state.completed < target {
            shared.done.wait(&mut state);
        }
        match state.fault.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Number of launches enqueued but not yet completed
    pub fn pending(&self) -> u64 {
        let state = self.inner.shared.state.lock();
        state.enqueued - state.completed
    }
}

impl Default for CpuStream {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CpuStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpuStream")
            .field("id", &self.inner.id)
            .field("async", &self.is_async())
            .finish()
    }
}

impl Drop for StreamInner {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain what is queued and exit.
        self.sender.lock().take();
        if let Some(handle) = self.worker.lock().take() {
            if Some(std::thread::current().id()) == self.worker_id {
                return;
            }
            if handle.join().is_err() {
                tracing::warn!(stream = self.id, "worker panicked during shutdown");
            }
        }
    }
}

fn worker_loop(rx: Receiver<Job>, shared: Arc<Shared>) {
    for Job { name, run } in rx {
        let outcome = catch_unwind(AssertUnwindSafe(run));
        shared.finish(name, outcome);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "kernel panicked".to_string()
    }
}
