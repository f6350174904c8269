//! Best-effort asynchronous error-log sink.
//!
//! Appends formatted diagnostic lines to `logs/error.log`. Enqueueing never
//! blocks the caller: under burst the queue fills and further messages are
//! dropped, with a running drop count exposed for diagnostics. The sink is
//! not part of any correctness contract.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Directory the log file lives in, relative to the working directory.
pub const LOG_DIR: &str = "logs";
/// Log file name inside [`LOG_DIR`].
pub const LOG_FILE_NAME: &str = "error.log";

const QUEUE_CAPACITY: usize = 8192;

/// Handle for submitting error lines to the background writer.
///
/// Cheaply cloneable. The writer task drains the queue and exits once every
/// handle has been dropped, flushing what remains.
#[derive(Clone)]
pub struct FailLog {
    tx: Option<mpsc::Sender<String>>,
    dropped: Arc<AtomicU64>,
}

impl FailLog {
    /// Spawn the writer task appending to `dir/logs/error.log`.
    ///
    /// Returns the handle and the writer task; await the task after
    /// dropping all handles for a clean flush on shutdown.
    pub fn spawn(dir: impl AsRef<Path>) -> (Self, JoinHandle<()>) {
        Self::spawn_with_capacity(dir, QUEUE_CAPACITY)
    }

    fn spawn_with_capacity(dir: impl AsRef<Path>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity);
        let path = dir.as_ref().join(LOG_DIR).join(LOG_FILE_NAME);
        let task = tokio::spawn(writer_loop(path, rx));
        (
            Self {
                tx: Some(tx),
                dropped: Arc::new(AtomicU64::new(0)),
            },
            task,
        )
    }

    /// A no-op handle that discards everything. Useful in tests.
    pub fn disabled() -> Self {
        Self {
            tx: None,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Enqueue a diagnostic line without blocking.
    ///
    /// The line is timestamped and newline-terminated by the sink. If the
    /// queue is full the message is counted as dropped and discarded.
    pub fn write(&self, message: impl Into<String>) {
        let Some(tx) = &self.tx else {
            return;
        };
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let line = format!("[{}] {}\n", millis, message.into());
        if tx.try_send(line).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Enqueue a message together with the error that caused it.
    pub fn write_error(&self, message: &str, error: &dyn std::fmt::Display) {
        self.write(format!("ERROR: {} - {}", message, error));
    }

    /// Number of messages dropped because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

async fn writer_loop(path: PathBuf, mut rx: mpsc::Receiver<String>) {
    if let Some(parent) = path.parent() {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            tracing::error!("failed to create log directory '{}': {}", parent.display(), e);
            // Drain so senders never observe a wedged queue.
            while rx.recv().await.is_some() {}
            return;
        }
    }

    let file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .await;
    let mut file = match file {
        Ok(f) => f,
        Err(e) => {
            tracing::error!("failed to open '{}': {}", path.display(), e);
            while rx.recv().await.is_some() {}
            return;
        }
    };

    let mut batch = String::with_capacity(1024);
    while let Some(line) = rx.recv().await {
        batch.clear();
        batch.push_str(&line);
        // Coalesce whatever else is already queued into one write.
        while batch.len() < 64 * 1024 {
            match rx.try_recv() {
                Ok(next) => batch.push_str(&next),
                Err(_) => break,
            }
        }
        if let Err(e) = file.write_all(batch.as_bytes()).await {
            tracing::error!("error-log write failed: {}", e);
        }
    }
    let _ = file.flush().await;
}
