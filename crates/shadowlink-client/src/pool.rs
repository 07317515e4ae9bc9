//! Shared I/O worker pool.
//!
//! Every session runs as a task on one fixed-size multi-threaded runtime.
//! The pool is built once by the binary and handed to the accept loop; tests
//! wrap the handle of their own runtime instead.

use std::future::Future;
use std::io;
use std::time::Duration;

use shadowlink_core::defaults::WORKER_THREAD_NAME;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;

#[derive(Debug)]
pub struct WorkerPool {
    runtime: Option<Runtime>,
    handle: Handle,
    workers: usize,
}

impl WorkerPool {
    /// Build an owned runtime with `workers` I/O threads.
    pub fn new(workers: usize) -> io::Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(workers.max(1))
            .thread_name(WORKER_THREAD_NAME)
            .enable_all()
            .build()?;
        let handle = runtime.handle().clone();
        Ok(Self {
            runtime: Some(runtime),
            handle,
            workers: workers.max(1),
        })
    }

    /// Borrow an existing runtime. The pool does not own or shut it down.
    pub fn from_handle(handle: Handle) -> Self {
        let workers = handle.metrics().num_workers();
        Self {
            runtime: None,
            handle,
            workers,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.handle.spawn(future)
    }

    /// Run `future` to completion on the pool, blocking the calling thread.
    ///
    /// Must not be called from inside an async context.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        match &self.runtime {
            Some(rt) => rt.block_on(future),
            None => self.handle.block_on(future),
        }
    }

    /// Stop the owned runtime, giving in-flight sessions up to `timeout` to finish.
    pub fn shutdown(self, timeout: Duration) {
        if let Some(rt) = self.runtime {
            rt.shutdown_timeout(timeout);
        }
    }
}
