//! Write engine: a dedicated writer task per connection.
//!
//! Send operations are queued onto an mpsc channel and drained by one task
//! that owns the write half. Queueing whole frames means concurrent senders
//! can never interleave frame bytes, and completed writes are observed in
//! the order they were enqueued. Partial writes are absorbed by the write
//! loop; the frame buffer returns to its pool on every path because it
//! travels as a [`PooledBuffer`] guard inside the operation context.
//!
//! A failed write closes the channel: the loop rejects everything still
//! queued with `ChannelClosed`, shuts the writer down, and exits.

use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::callback::SendCallback;
use crate::error::FramewireError;
use crate::pool::PooledBuffer;

/// Frames that may be queued before senders start waiting.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// State for one in-flight send: the framed buffer and its completion
/// callback.
pub struct WriteOp {
    /// Fully assembled frame, borrowed from the pool.
    pub buffer: PooledBuffer,
    /// Completion callback, if the caller wants one.
    pub callback: Option<Arc<dyn SendCallback>>,
}

/// Handle for queueing frames onto the writer task.
///
/// Cheaply cloneable; the writer task stops once every handle is dropped
/// and the queue is drained.
#[derive(Clone)]
pub struct WriteHandle {
    tx: mpsc::Sender<WriteOp>,
}

impl WriteHandle {
    /// Queue a frame for writing.
    ///
    /// If the channel is already closed the buffer is returned to the pool
    /// and the callback's exception path is invoked with `ChannelClosed`;
    /// the channel itself is not touched.
    pub async fn submit(&self, op: WriteOp) {
        if let Err(mpsc::error::SendError(op)) = self.tx.send(op).await {
            tracing::warn!("attempted to send on a closed channel");
            notify_exception(&op.callback, &FramewireError::ChannelClosed);
            // op.buffer drops here and goes back to the pool
        }
    }

    /// Whether the writer task has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Spawn the writer task owning `writer`.
pub fn spawn_write_engine<W>(writer: W) -> (WriteHandle, JoinHandle<()>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(DEFAULT_QUEUE_CAPACITY);
    let task = tokio::spawn(write_loop(writer, rx));
    (WriteHandle { tx }, task)
}

async fn write_loop<W>(mut writer: W, mut rx: mpsc::Receiver<WriteOp>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(op) = rx.recv().await {
        let WriteOp { buffer, callback } = op;

        let result = async {
            writer.write_all(&buffer[..]).await?;
            writer.flush().await
        }
        .await;

        // The frame either went out whole or the connection is dead;
        // the buffer goes home first in both cases.
        drop(buffer);

        match result {
            Ok(()) => {
                tracing::trace!("frame sent successfully");
                if let Some(cb) = &callback {
                    cb.on_send_complete();
                }
            }
            Err(e) => {
                let error = classify_write_error(e);
                tracing::error!("error during asynchronous data send: {}", error);
                notify_exception(&callback, &error);
                break;
            }
        }
    }

    // Reject whatever is still queued, then close the channel.
    rx.close();
    while let Ok(op) = rx.try_recv() {
        notify_exception(&op.callback, &FramewireError::ChannelClosed);
    }
    let _ = writer.shutdown().await;
}

fn notify_exception(callback: &Option<Arc<dyn SendCallback>>, error: &FramewireError) {
    if let Some(cb) = callback {
        cb.on_exception(error);
    }
}

/// A closed or reset connection reads as the peer going away; anything
/// else stays an I/O error.
fn classify_write_error(e: std::io::Error) -> FramewireError {
    use std::io::ErrorKind;
    match e.kind() {
        ErrorKind::BrokenPipe
        | ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::UnexpectedEof
        | ErrorKind::WriteZero => FramewireError::PeerClosed,
        _ => FramewireError::Io(e),
    }
}
