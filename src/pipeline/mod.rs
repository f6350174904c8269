//! Per-connection pipelines.
//!
//! A connection is served by two independent façades: [`PipelineIn`]
//! drives the read loop and delivers decoded messages; [`PipelineOut`]
//! frames and queues outgoing messages. [`attach`] builds both from an
//! accepted TCP stream.

mod inbound;
mod outbound;

use std::sync::Arc;

use tokio::net::TcpStream;

use crate::callback::ReceiveCallback;
use crate::connection::ReadConfig;
use crate::faillog::FailLog;
use crate::pool::BufferPool;

pub use inbound::PipelineIn;
pub use outbound::{PipelineOut, Request};

/// Split an accepted stream into its inbound and outbound pipelines.
///
/// The read loop starts immediately, delivering to `initial_callback`.
pub fn attach(
    stream: TcpStream,
    pool: Arc<BufferPool>,
    config: ReadConfig,
    initial_callback: Arc<dyn ReceiveCallback>,
    faillog: FailLog,
) -> (PipelineIn, PipelineOut) {
    let (read_half, write_half) = stream.into_split();
    let inbound = PipelineIn::spawn(
        read_half,
        pool.clone(),
        config,
        initial_callback,
        faillog,
    );
    let outbound = PipelineOut::spawn(write_half, pool);
    (inbound, outbound)
}
