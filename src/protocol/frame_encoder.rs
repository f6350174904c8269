//! Frame assembly: one typed value into one pooled, framed buffer.
//!
//! Each `send_*` operation computes the exact frame size, leases a pooled
//! buffer that covers it, writes the header and payload big-endian, and
//! hands the buffer to the write engine. Assembly failures release the
//! buffer and signal the callback's exception path; they are fatal to the
//! single operation, never to the connection.

use std::sync::Arc;

use bytes::BufMut;

use super::message::Message;
use super::wire_format::{
    frame_length, TypeMarker, FRAME_OVERHEAD, LENGTH_PREFIX_SIZE, START_MARKER,
};
use crate::callback::SendCallback;
use crate::connection::{WriteHandle, WriteOp};
use crate::error::FramewireError;
use crate::pool::{BufferPool, PooledBuffer};

/// Builds frames into pooled buffers and feeds the write engine.
pub struct FrameEncoder {
    pool: Arc<BufferPool>,
    writer: WriteHandle,
}

impl FrameEncoder {
    pub fn new(pool: Arc<BufferPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }

    /// Send a payload-less keep-alive frame.
    pub async fn send_heartbeat(&self, callback: Option<Arc<dyn SendCallback>>) {
        self.build_and_send(TypeMarker::Heartbeat, 0, callback, |_| {})
            .await;
    }

    /// Send UTF-8 text, preceded by its redundant 4-byte length prefix.
    pub async fn send_string(&self, data: &str, callback: Option<Arc<dyn SendCallback>>) {
        let bytes = data.as_bytes();
        let payload_size = LENGTH_PREFIX_SIZE + bytes.len();
        self.build_and_send(TypeMarker::Text, payload_size, callback, |buf| {
            buf.put_u32(bytes.len() as u32);
            buf.put_slice(bytes);
        })
        .await;
    }

    /// Send a 32-bit signed integer.
    pub async fn send_i32(&self, data: i32, callback: Option<Arc<dyn SendCallback>>) {
        self.build_and_send(TypeMarker::Int32, 4, callback, |buf| {
            buf.put_i32(data);
        })
        .await;
    }

    /// Send a 32-bit float.
    pub async fn send_f32(&self, data: f32, callback: Option<Arc<dyn SendCallback>>) {
        self.build_and_send(TypeMarker::Float32, 4, callback, |buf| {
            buf.put_f32(data);
        })
        .await;
    }

    /// Send a 64-bit float.
    pub async fn send_f64(&self, data: f64, callback: Option<Arc<dyn SendCallback>>) {
        self.build_and_send(TypeMarker::Float64, 8, callback, |buf| {
            buf.put_f64(data);
        })
        .await;
    }

    /// Send a UTF-16 code unit.
    pub async fn send_char(&self, data: u16, callback: Option<Arc<dyn SendCallback>>) {
        self.build_and_send(TypeMarker::Char, 2, callback, |buf| {
            buf.put_u16(data);
        })
        .await;
    }

    /// Send raw bytes, preceded by their redundant 4-byte length prefix.
    pub async fn send_byte_array(&self, data: &[u8], callback: Option<Arc<dyn SendCallback>>) {
        let payload_size = LENGTH_PREFIX_SIZE + data.len();
        self.build_and_send(TypeMarker::ByteArray, payload_size, callback, |buf| {
            buf.put_u32(data.len() as u32);
            buf.put_slice(data);
        })
        .await;
    }

    /// Send any [`Message`] by switching on its tag.
    pub async fn send_message(&self, message: &Message, callback: Option<Arc<dyn SendCallback>>) {
        match message {
            Message::Heartbeat => self.send_heartbeat(callback).await,
            Message::Text(s) => self.send_string(s, callback).await,
            Message::Int32(v) => self.send_i32(*v, callback).await,
            Message::Float32(v) => self.send_f32(*v, callback).await,
            Message::Float64(v) => self.send_f64(*v, callback).await,
            Message::Char(c) => self.send_char(*c, callback).await,
            Message::Bytes(b) => self.send_byte_array(b, callback).await,
        }
    }

    /// Acquire a buffer, assemble the full frame, hand it to the write
    /// engine.
    async fn build_and_send<F>(
        &self,
        marker: TypeMarker,
        payload_size: usize,
        callback: Option<Arc<dyn SendCallback>>,
        write_payload: F,
    ) where
        F: FnOnce(&mut PooledBuffer),
    {
        let total_packet_size = FRAME_OVERHEAD + payload_size;

        let mut buffer = match self.pool.acquire(total_packet_size).await {
            Ok(buf) => buf,
            Err(e) => {
                tracing::error!("failed to acquire buffer to send data: {}", e);
                notify_exception(&callback, &e);
                return;
            }
        };

        if buffer.capacity() < total_packet_size {
            let e = FramewireError::EncoderInternal(format!(
                "acquired buffer is smaller than required packet size: required={}, actual={}",
                total_packet_size,
                buffer.capacity()
            ));
            tracing::error!("{}", e);
            drop(buffer);
            notify_exception(&callback, &e);
            return;
        }

        buffer.put_u8(START_MARKER);
        buffer.put_u32(frame_length(payload_size));
        buffer.put_u8(marker.as_u8());
        write_payload(&mut buffer);

        if buffer.len() != total_packet_size {
            let e = FramewireError::EncoderInternal(format!(
                "assembled frame is {} bytes, expected {}",
                buffer.len(),
                total_packet_size
            ));
            tracing::error!("error while assembling the frame: {}", e);
            drop(buffer);
            notify_exception(&callback, &e);
            return;
        }

        self.writer.submit(WriteOp { buffer, callback }).await;
    }
}

fn notify_exception(callback: &Option<Arc<dyn SendCallback>>, error: &FramewireError) {
    if let Some(cb) = callback {
        cb.on_exception(error);
    }
}
