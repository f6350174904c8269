//! Inbound pipeline: per-connection receive façade.
//!
//! Owns the frame decoder, type dispatcher and read engine for one
//! connection's read half. The read loop starts on construction; decoded
//! messages flow to the current receive callback, which can be replaced
//! atomically mid-stream.

use std::sync::Arc;

use tokio::io::AsyncRead;
use tokio::task::JoinHandle;

use crate::callback::{ReceiveCallback, ReceiverCell};
use crate::connection::{spawn_read_engine, ReadConfig};
use crate::faillog::FailLog;
use crate::pool::BufferPool;

/// Inbound façade for a single connection.
pub struct PipelineIn {
    receiver: Arc<ReceiverCell>,
    reader_task: JoinHandle<()>,
}

impl PipelineIn {
    /// Start the read loop for `reader`, delivering to `initial_callback`.
    pub fn spawn<R>(
        reader: R,
        pool: Arc<BufferPool>,
        config: ReadConfig,
        initial_callback: Arc<dyn ReceiveCallback>,
        faillog: FailLog,
    ) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let receiver = Arc::new(ReceiverCell::new(initial_callback));
        let reader_task = spawn_read_engine(reader, pool, receiver.clone(), config, faillog);
        Self {
            receiver,
            reader_task,
        }
    }

    /// Replace the receive callback. Deliveries already in flight keep the
    /// callback they loaded; the next frame sees the new one.
    pub fn set_receive_callback(&self, callback: Arc<dyn ReceiveCallback>) {
        self.receiver.replace(callback);
    }

    /// Wait for the read loop to finish (peer close, timeout, or fatal
    /// framing error).
    pub async fn closed(self) {
        let _ = self.reader_task.await;
    }

    /// Abort the read loop, closing the connection's read half.
    pub fn shutdown(&self) {
        self.reader_task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FramewireError;
    use crate::protocol::{Message, START_MARKER};
    use std::sync::Mutex;
    use tokio::io::{duplex, AsyncWriteExt};

    struct Collector {
        messages: Mutex<Vec<Message>>,
    }

    impl Collector {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                messages: Mutex::new(Vec::new()),
            })
        }
    }

    impl ReceiveCallback for Collector {
        fn receive(&self, message: Message) {
            self.messages.lock().unwrap().push(message);
        }

        fn exception(&self, _error: FramewireError) {}
    }

    fn frame(marker: u8, payload: &[u8]) -> Vec<u8> {
        let mut bytes = vec![START_MARKER];
        bytes.extend_from_slice(&(1 + payload.len() as u32).to_be_bytes());
        bytes.push(marker);
        bytes.extend_from_slice(payload);
        bytes
    }

    #[tokio::test]
    async fn test_read_loop_starts_on_construction() {
        let pool = BufferPool::new(4);
        let collector = Collector::new();
        let (mut writer, reader) = duplex(4096);

        let pipeline = PipelineIn::spawn(
            reader,
            pool,
            ReadConfig {
                keep_alive: false,
                ..ReadConfig::default()
            },
            collector.clone(),
            FailLog::disabled(),
        );

        writer.write_all(&frame(0x00, &[])).await.unwrap();
        drop(writer);
        pipeline.closed().await;

        assert_eq!(
            collector.messages.lock().unwrap().clone(),
            vec![Message::Heartbeat]
        );
    }

    #[tokio::test]
    async fn test_set_receive_callback_redirects() {
        let pool = BufferPool::new(4);
        let first = Collector::new();
        let second = Collector::new();
        let (mut writer, reader) = duplex(4096);

        let pipeline = PipelineIn::spawn(
            reader,
            pool,
            ReadConfig {
                keep_alive: false,
                ..ReadConfig::default()
            },
            first.clone(),
            FailLog::disabled(),
        );

        pipeline.set_receive_callback(second.clone());
        writer
            .write_all(&frame(0x02, &9i32.to_be_bytes()))
            .await
            .unwrap();
        drop(writer);
        pipeline.closed().await;

        assert!(first.messages.lock().unwrap().is_empty());
        assert_eq!(
            second.messages.lock().unwrap().clone(),
            vec![Message::Int32(9)]
        );
    }
}
