//! # framewire
//!
//! High-throughput typed message framing over TCP.
//!
//! framewire lets application code exchange discrete, self-describing
//! values — strings, integers, floats, doubles, UTF-16 code units, byte
//! arrays and keep-alive heartbeats — over a reliable byte stream without
//! dealing with partial reads, message concatenation or buffer lifetimes.
//!
//! ## Architecture
//!
//! - **Buffer pool**: fixed-capacity buffers in three size classes,
//!   recycled for the lifetime of the process.
//! - **Frame encoder / write engine**: a typed value becomes one framed
//!   pooled buffer, queued onto a per-connection writer task.
//! - **Frame decoder / read engine**: a self-sustaining read loop feeds a
//!   resynchronizing decoder that emits complete typed payloads.
//! - **Pipelines**: per-connection façades composing the above for each
//!   accepted stream.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use framewire::{attach, connect, BufferPool, Message, ReadConfig, Request};
//!
//! #[tokio::main]
//! async fn main() -> framewire::Result<()> {
//!     let pool = BufferPool::new(128);
//!     let stream = connect("127.0.0.1:9000").await?;
//!     let (inbound, outbound) = attach(
//!         stream,
//!         pool,
//!         ReadConfig::default(),
//!         Arc::new(MyReceiver),
//!         framewire::FailLog::disabled(),
//!     );
//!
//!     outbound.handle(Request::new("hello")).await;
//!     outbound.handle(Request::new(Message::Heartbeat)).await;
//!     inbound.closed().await;
//!     Ok(())
//! }
//! ```

pub mod callback;
pub mod config;
pub mod connection;
pub mod error;
pub mod faillog;
pub mod listener;
pub mod pipeline;
pub mod pool;
pub mod protocol;

pub use callback::{ReceiveCallback, SendCallback};
pub use config::ServerOptions;
pub use connection::ReadConfig;
pub use error::{FramewireError, Result};
pub use faillog::FailLog;
pub use listener::{connect, ConnectionHandler, Listener};
pub use pipeline::{attach, PipelineIn, PipelineOut, Request};
pub use pool::BufferPool;
pub use protocol::Message;
