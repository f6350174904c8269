//! Outbound pipeline: per-connection send façade.
//!
//! Wires a write engine and a frame encoder for one connection's write
//! half. Applications describe a send as a [`Request`] — a typed message
//! plus an optional completion callback — and the pipeline picks the
//! encoder operation from the message tag.

use std::sync::Arc;

use tokio::io::AsyncWrite;
use tokio::task::JoinHandle;

use crate::callback::SendCallback;
use crate::connection::spawn_write_engine;
use crate::pool::BufferPool;
use crate::protocol::{FrameEncoder, Message};

/// One send: the message and who to tell about the outcome.
pub struct Request {
    message: Message,
    callback: Option<Arc<dyn SendCallback>>,
}

impl Request {
    /// A request with no completion callback.
    pub fn new(message: impl Into<Message>) -> Self {
        Self {
            message: message.into(),
            callback: None,
        }
    }

    /// A request whose outcome is reported to `callback`.
    pub fn with_callback(message: impl Into<Message>, callback: Arc<dyn SendCallback>) -> Self {
        Self {
            message: message.into(),
            callback: Some(callback),
        }
    }

    pub fn message(&self) -> &Message {
        &self.message
    }
}

/// Outbound façade for a single connection.
pub struct PipelineOut {
    encoder: FrameEncoder,
    writer_task: JoinHandle<()>,
}

impl PipelineOut {
    /// Wire up the write engine and encoder over a write half.
    pub fn spawn<W>(writer: W, pool: Arc<BufferPool>) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (handle, writer_task) = spawn_write_engine(writer);
        Self {
            encoder: FrameEncoder::new(pool, handle),
            writer_task,
        }
    }

    /// Encode and queue one request.
    pub async fn handle(&self, request: Request) {
        let Request { message, callback } = request;
        self.encoder.send_message(&message, callback).await;
    }

    /// Direct access to the per-type send operations.
    pub fn encoder(&self) -> &FrameEncoder {
        &self.encoder
    }

    /// Abort the writer task, closing the connection's write half.
    pub fn shutdown(&self) {
        self.writer_task.abort();
    }
}
