//! Read engine: the self-sustaining read loop for one connection.
//!
//! Each pass leases one LARGE buffer from the pool, performs a single read
//! into it, feeds the bytes to the frame decoder, dispatches every complete
//! frame to the current receive callback, and returns the buffer before the
//! next pass. The lease is scoped to one read: the decoder copies any
//! unconsumed tail into its own state, so the pooled buffer never outlives
//! the pass.
//!
//! When keep-alive is enabled the read is bounded by the configured
//! timeout; inactivity closes the connection.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;

use crate::callback::ReceiverCell;
use crate::faillog::FailLog;
use crate::pool::{BufferPool, LARGE_SIZE};
use crate::protocol::{dispatch, FrameDecoder};

/// Per-connection read-loop configuration.
#[derive(Debug, Clone)]
pub struct ReadConfig {
    /// Largest FRAME_LENGTH the decoder will accept.
    pub max_frame_length: u32,
    /// Whether reads are bounded by `timeout`.
    pub keep_alive: bool,
    /// Inactivity window when `keep_alive` is set.
    pub timeout: Duration,
}

impl Default for ReadConfig {
    fn default() -> Self {
        Self {
            max_frame_length: LARGE_SIZE as u32,
            keep_alive: true,
            timeout: Duration::from_secs(30),
        }
    }
}

impl From<&crate::config::ServerOptions> for ReadConfig {
    fn from(options: &crate::config::ServerOptions) -> Self {
        Self {
            max_frame_length: LARGE_SIZE as u32,
            keep_alive: options.keep_alive,
            timeout: options.keep_alive_timeout,
        }
    }
}

/// Spawn the read loop for `reader`.
///
/// The task ends when the peer disconnects, the keep-alive window expires,
/// a read fails, or the decoder reports a fatal framing error. Dropping
/// the reader on exit closes the read half.
pub fn spawn_read_engine<R>(
    reader: R,
    pool: Arc<BufferPool>,
    receiver: Arc<ReceiverCell>,
    config: ReadConfig,
    faillog: FailLog,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(read_loop(reader, pool, receiver, config, faillog))
}

async fn read_loop<R>(
    mut reader: R,
    pool: Arc<BufferPool>,
    receiver: Arc<ReceiverCell>,
    config: ReadConfig,
    faillog: FailLog,
) where
    R: AsyncRead + Unpin,
{
    let mut decoder = FrameDecoder::new(config.max_frame_length);

    loop {
        // One buffer per read arm; the guard releases it at the end of
        // the pass no matter how the pass ends.
        let mut buffer = match pool.acquire(LARGE_SIZE).await {
            Ok(buf) => buf,
            Err(e) => {
                tracing::error!("failed to acquire buffer for read operation: {}", e);
                faillog.write_error("failed to acquire buffer for read operation", &e);
                return;
            }
        };

        let read = reader.read_buf(&mut *buffer);
        let n = if config.keep_alive {
            match tokio::time::timeout(config.timeout, read).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!("timeout: client inactive, closing connection");
                    return;
                }
            }
        } else {
            read.await
        };

        let n = match n {
            Ok(0) => {
                tracing::info!("client disconnected");
                return;
            }
            Ok(n) => n,
            Err(e) => {
                tracing::error!("read operation failed: {}", e);
                faillog.write_error("read operation failed", &e);
                return;
            }
        };

        let frames = match decoder.push(&buffer[..n]) {
            Ok(frames) => frames,
            Err(e) => {
                tracing::warn!("invalid frame length received: {}. Closing connection.", e);
                faillog.write_error("frame decoder rejected the stream", &e);
                return;
            }
        };
        drop(buffer);

        for frame in frames {
            // Load once per delivery: a swap mid-stream applies from the
            // next frame on.
            let callback = receiver.current();
            match dispatch(frame.marker, &frame.payload) {
                Ok(message) => callback.receive(message),
                Err(e) => callback.exception(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::ReceiveCallback;
    use crate::error::FramewireError;
    use crate::pool::SizeClass;
    use crate::protocol::{Message, START_MARKER};
    use std::sync::Mutex;
    use tokio::io::{duplex, AsyncWriteExt};

    struct Collector {
        messages: Mutex<Vec<Message>>,
        errors: Mutex<Vec<FramewireError>>,
    }

    impl Collector {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                messages: Mutex::new(Vec::new()),
                errors: Mutex::new(Vec::new()),
            })
        }

        fn messages(&self) -> Vec<Message> {
            self.messages.lock().unwrap().clone()
        }
    }

    impl ReceiveCallback for Collector {
        fn receive(&self, message: Message) {
            self.messages.lock().unwrap().push(message);
        }

        fn exception(&self, error: FramewireError) {
            self.errors.lock().unwrap().push(error);
        }
    }

    fn frame(marker: u8, payload: &[u8]) -> Vec<u8> {
        let mut bytes = vec![START_MARKER];
        bytes.extend_from_slice(&(1 + payload.len() as u32).to_be_bytes());
        bytes.push(marker);
        bytes.extend_from_slice(payload);
        bytes
    }

    fn no_keep_alive() -> ReadConfig {
        ReadConfig {
            keep_alive: false,
            ..ReadConfig::default()
        }
    }

    #[tokio::test]
    async fn test_frames_are_dispatched_in_order() {
        let pool = BufferPool::new(4);
        let collector = Collector::new();
        let receiver = Arc::new(ReceiverCell::new(collector.clone()));
        let (mut writer, reader) = duplex(4096);

        let task = spawn_read_engine(
            reader,
            pool,
            receiver,
            no_keep_alive(),
            FailLog::disabled(),
        );

        writer.write_all(&frame(0x00, &[])).await.unwrap();
        writer
            .write_all(&frame(0x02, &41i32.to_be_bytes()))
            .await
            .unwrap();
        drop(writer);
        task.await.unwrap();

        assert_eq!(
            collector.messages(),
            vec![Message::Heartbeat, Message::Int32(41)]
        );
    }

    #[tokio::test]
    async fn test_dispatch_error_does_not_stop_the_loop() {
        let pool = BufferPool::new(4);
        let collector = Collector::new();
        let receiver = Arc::new(ReceiverCell::new(collector.clone()));
        let (mut writer, reader) = duplex(4096);

        let task = spawn_read_engine(
            reader,
            pool,
            receiver,
            no_keep_alive(),
            FailLog::disabled(),
        );

        // Unknown marker, then a valid frame: both frames stay in sync.
        writer.write_all(&frame(0x7F, &[1, 2, 3])).await.unwrap();
        writer
            .write_all(&frame(0x02, &7i32.to_be_bytes()))
            .await
            .unwrap();
        drop(writer);
        task.await.unwrap();

        assert_eq!(collector.messages(), vec![Message::Int32(7)]);
        assert_eq!(collector.errors.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fatal_frame_length_closes_connection() {
        let pool = BufferPool::new(4);
        let collector = Collector::new();
        let receiver = Arc::new(ReceiverCell::new(collector.clone()));
        let (mut writer, reader) = duplex(4096);

        let task = spawn_read_engine(
            reader,
            pool.clone(),
            receiver,
            no_keep_alive(),
            FailLog::disabled(),
        );

        let mut poisoned = vec![START_MARKER];
        poisoned.extend_from_slice(&0u32.to_be_bytes());
        poisoned.push(0x02);
        writer.write_all(&poisoned).await.unwrap();

        // The loop must stop on its own, without the writer closing.
        task.await.unwrap();
        assert!(collector.messages().is_empty());
        // Buffer conservation after the fatal path.
        assert_eq!(pool.available(SizeClass::Large), 4);
    }

    #[tokio::test]
    async fn test_keep_alive_timeout_closes_connection() {
        let pool = BufferPool::new(4);
        let collector = Collector::new();
        let receiver = Arc::new(ReceiverCell::new(collector.clone()));
        let (_writer, reader) = duplex(4096);

        let config = ReadConfig {
            keep_alive: true,
            timeout: Duration::from_millis(50),
            ..ReadConfig::default()
        };
        let task = spawn_read_engine(reader, pool.clone(), receiver, config, FailLog::disabled());

        // No bytes ever arrive; the loop must end by itself.
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("read loop should time out")
            .unwrap();
        assert_eq!(pool.available(SizeClass::Large), 4);
    }

    #[tokio::test]
    async fn test_callback_swap_applies_mid_stream() {
        let pool = BufferPool::new(4);
        let first = Collector::new();
        let second = Collector::new();
        let receiver = Arc::new(ReceiverCell::new(first.clone()));
        let (mut writer, reader) = duplex(4096);

        let task = spawn_read_engine(
            reader,
            pool,
            receiver.clone(),
            no_keep_alive(),
            FailLog::disabled(),
        );

        writer
            .write_all(&frame(0x02, &1i32.to_be_bytes()))
            .await
            .unwrap();
        // Let the first frame land before swapping.
        tokio::time::sleep(Duration::from_millis(50)).await;
        receiver.replace(second.clone());
        writer
            .write_all(&frame(0x02, &2i32.to_be_bytes()))
            .await
            .unwrap();
        drop(writer);
        task.await.unwrap();

        assert_eq!(first.messages(), vec![Message::Int32(1)]);
        assert_eq!(second.messages(), vec![Message::Int32(2)]);
    }

    #[tokio::test]
    async fn test_eof_between_frames_loses_nothing() {
        let pool = BufferPool::new(4);
        let collector = Collector::new();
        let receiver = Arc::new(ReceiverCell::new(collector.clone()));
        let (mut writer, reader) = duplex(4096);

        let task = spawn_read_engine(
            reader,
            pool,
            receiver,
            no_keep_alive(),
            FailLog::disabled(),
        );

        // Two complete frames, then a partial one, then EOF.
        writer
            .write_all(&frame(0x02, &1i32.to_be_bytes()))
            .await
            .unwrap();
        writer
            .write_all(&frame(0x02, &2i32.to_be_bytes()))
            .await
            .unwrap();
        let partial = frame(0x02, &3i32.to_be_bytes());
        writer.write_all(&partial[..4]).await.unwrap();
        drop(writer);
        task.await.unwrap();

        // Both complete frames delivered; no partial frame surfaces.
        assert_eq!(
            collector.messages(),
            vec![Message::Int32(1), Message::Int32(2)]
        );
    }
}
