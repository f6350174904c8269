//! Echo server - frames every received value straight back.
//!
//! Demonstrates:
//! - Loading `server_options.properties` and sizing the runtime from it
//! - Binding a listener and serving each accepted connection
//! - Attaching per-connection pipelines with an echoing receive callback
//!
//! Run with `cargo run --example echo_server`, then start
//! `cargo run --example echo_client` in another terminal.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpStream;

use framewire::{
    ConnectionHandler, FailLog, FramewireError, Listener, Message, PipelineIn, PipelineOut,
    ReadConfig, ReceiveCallback, Request, ServerOptions,
};
use framewire::pool::BufferPool;

/// Receive callback that sends every message back on the same connection.
struct EchoReceiver {
    out: Arc<PipelineOut>,
}

impl ReceiveCallback for EchoReceiver {
    fn receive(&self, message: Message) {
        let out = self.out.clone();
        tokio::spawn(async move {
            out.handle(Request::new(message)).await;
        });
    }

    fn exception(&self, error: FramewireError) {
        tracing::warn!("malformed payload from client: {}", error);
    }
}

/// Accept handler: attach pipelines to every new connection.
struct EchoHandler {
    pool: Arc<BufferPool>,
    config: ReadConfig,
    faillog: FailLog,
}

impl ConnectionHandler for EchoHandler {
    fn on_connection_accepted(&self, stream: TcpStream, peer: SocketAddr) {
        tracing::info!("client connected: {}", peer);
        let (read_half, write_half) = stream.into_split();
        let out = Arc::new(PipelineOut::spawn(write_half, self.pool.clone()));
        let receiver = Arc::new(EchoReceiver { out });
        // The read loop runs detached until the client goes away.
        let _ = PipelineIn::spawn(
            read_half,
            self.pool.clone(),
            self.config.clone(),
            receiver,
            self.faillog.clone(),
        );
    }

    fn on_connection_failed(&self, error: FramewireError) {
        tracing::error!("accept failed: {}", error);
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let options = ServerOptions::load();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(options.threads_number)
        .enable_all()
        .build()?;
    runtime.block_on(run(options))
}

async fn run(options: ServerOptions) -> Result<(), Box<dyn std::error::Error>> {
    let (faillog, _faillog_task) = FailLog::spawn(".");
    let pool = BufferPool::new(options.buffer_pools);
    let listener = Listener::bind("127.0.0.1:9000", &options).await?;

    let handler = Arc::new(EchoHandler {
        pool,
        config: ReadConfig::from(&options),
        faillog,
    });
    listener.listen(handler).await;
    Ok(())
}
