//! Fixed-size connection pool.
//!
//! Connections are opened once at startup and parked in a bounded channel.
//! A request takes one out for its whole lifetime (so `BEGIN`/`COMMIT` never
//! interleave with another request's statements) and the guard puts it back on
//! drop. Waiting is coroutine friendly: the acquiring coroutine sleeps between
//! polls instead of blocking the worker thread.
//!
//! An executor whose last statement failed is health-checked on its next
//! checkout and, if the server is gone, replaced by a fresh connection to the
//! pool's URL.

use crate::connection::{connect, ConnectionError};
use crate::executor::{PgExecutor, StorageError};
use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use std::ops::Deref;
use std::sync::Arc;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(2);

struct Slots {
    idle_tx: Sender<PgExecutor>,
    idle_rx: Receiver<PgExecutor>,
    /// Where replacement connections go; `None` for pools built from executors.
    url: Option<String>,
    size: usize,
    acquire_timeout: Duration,
}

/// Shared handle to the pool; clone freely.
#[derive(Clone)]
pub struct DbPool {
    slots: Arc<Slots>,
}

impl DbPool {
    /// Open `size` connections to `url`.
    ///
    /// # Errors
    ///
    /// Fails on the first connection that cannot be established; no partially
    /// filled pool is returned.
    pub fn connect(url: &str, size: usize, acquire_timeout: Duration) -> Result<Self, ConnectionError> {
        let size = size.max(1);
        let mut executors = Vec::with_capacity(size);
        for _ in 0..size {
            executors.push(PgExecutor::new(connect(url)?));
        }
        log::info!("Opened {} PostgreSQL connection(s)", size);
        Ok(Self::with_slots(executors, Some(url.to_string()), acquire_timeout))
    }

    /// Build a pool from already-open executors. Broken executors in such a
    /// pool cannot be replaced.
    pub fn from_executors(executors: Vec<PgExecutor>, acquire_timeout: Duration) -> Self {
        Self::with_slots(executors, None, acquire_timeout)
    }

    fn with_slots(executors: Vec<PgExecutor>, url: Option<String>, acquire_timeout: Duration) -> Self {
        let size = executors.len();
        let (idle_tx, idle_rx) = bounded(size.max(1));
        for executor in executors {
            // capacity equals the number of executors, so this cannot block
            let _ = idle_tx.send(executor);
        }
        Self {
            slots: Arc::new(Slots {
                idle_tx,
                idle_rx,
                url,
                size,
                acquire_timeout,
            }),
        }
    }

    /// Take a connection for the duration of one request.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Unavailable` when no connection frees up within
    /// the configured timeout.
    pub fn acquire(&self) -> Result<PooledConnection, StorageError> {
        let deadline = Instant::now() + self.slots.acquire_timeout;
        loop {
            match self.slots.idle_rx.try_recv() {
                Ok(executor) => {
                    return Ok(PooledConnection {
                        executor: Some(self.revive(executor)?),
                        idle_tx: self.slots.idle_tx.clone(),
                    })
                }
                Err(TryRecvError::Disconnected) => {
                    return Err(StorageError::Unavailable("connection pool is closed".to_string()))
                }
                Err(TryRecvError::Empty) if Instant::now() >= deadline => {
                    return Err(StorageError::Unavailable(format!(
                        "no connection available after {:?} ({} in pool)",
                        self.slots.acquire_timeout, self.slots.size
                    )))
                }
                Err(TryRecvError::Empty) => may::coroutine::sleep(POLL_INTERVAL),
            }
        }
    }

    /// Hand back `executor` if it is usable, otherwise a replacement.
    ///
    /// On failure the broken executor goes back to the idle queue so the
    /// pool keeps its size and the next checkout retries.
    fn revive(&self, executor: PgExecutor) -> Result<PgExecutor, StorageError> {
        if !executor.is_suspect() || executor.check_health() {
            return Ok(executor);
        }

        log::warn!("Replacing broken PostgreSQL connection");
        let replacement = match &self.slots.url {
            Some(url) => connect(url).map(PgExecutor::new).map_err(|e| e.to_string()),
            None => Err("pool has no connection string".to_string()),
        };
        replacement.map_err(|reason| {
            // the queue has room: this executor's slot is the one being refilled
            let _ = self.slots.idle_tx.send(executor);
            StorageError::Unavailable(format!("reconnect failed: {reason}"))
        })
    }

    /// Number of connections owned by the pool.
    pub fn size(&self) -> usize {
        self.slots.size
    }

    /// Number of connections currently idle.
    pub fn idle(&self) -> usize {
        self.slots.idle_rx.len()
    }
}

/// A connection checked out of [`DbPool`]; returned to the pool on drop.
pub struct PooledConnection {
    executor: Option<PgExecutor>,
    idle_tx: Sender<PgExecutor>,
}

impl Deref for PooledConnection {
    type Target = PgExecutor;

    fn deref(&self) -> &PgExecutor {
        self.executor
            .as_ref()
            .expect("pooled executor is only taken in drop")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(executor) = self.executor.take() {
            let _ = self.idle_tx.send(executor);
        }
    }
}
