//! Echo client - sends one value of each type and prints the echoes.
//!
//! Run `cargo run --example echo_server` first, then
//! `cargo run --example echo_client`.

use std::sync::Arc;

use tokio::sync::mpsc;

use framewire::{
    attach, connect, FailLog, FramewireError, Message, ReadConfig, ReceiveCallback, Request,
    SendCallback,
};
use framewire::pool::BufferPool;

/// Forwards every received message to the main task.
struct Printer {
    tx: mpsc::UnboundedSender<Message>,
}

impl ReceiveCallback for Printer {
    fn receive(&self, message: Message) {
        let _ = self.tx.send(message);
    }

    fn exception(&self, error: FramewireError) {
        tracing::warn!("receive error: {}", error);
    }
}

/// Logs send completions.
struct LoggingSend;

impl SendCallback for LoggingSend {
    fn on_send_complete(&self) {
        tracing::debug!("frame written");
    }

    fn on_exception(&self, error: &FramewireError) {
        tracing::error!("send failed: {}", error);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let pool = BufferPool::new(16);
    let stream = connect("127.0.0.1:9000").await?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let (_inbound, outbound) = attach(
        stream,
        pool,
        ReadConfig::default(),
        Arc::new(Printer { tx }),
        FailLog::disabled(),
    );

    let callback: Arc<dyn SendCallback> = Arc::new(LoggingSend);
    outbound
        .handle(Request::with_callback("hello from framewire", callback.clone()))
        .await;
    outbound
        .handle(Request::with_callback(i32::MAX, callback.clone()))
        .await;
    outbound
        .handle(Request::with_callback(std::f64::consts::PI, callback.clone()))
        .await;
    outbound
        .handle(Request::with_callback(Message::Heartbeat, callback.clone()))
        .await;
    outbound
        .handle(Request::with_callback(vec![0xDEu8, 0xAD, 0xBE, 0xEF], callback))
        .await;

    // The server echoes all five back, heartbeat included.
    for _ in 0..5 {
        match rx.recv().await {
            Some(message) => println!("echoed: {:?}", message),
            None => break,
        }
    }

    Ok(())
}
