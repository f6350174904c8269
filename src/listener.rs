//! TCP listener and connection helpers.
//!
//! [`Listener`] binds the server socket, logs the startup status banner
//! and runs the accept loop, handing each accepted stream to a
//! [`ConnectionHandler`]. [`connect`] is the client-side counterpart.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};

use crate::config::ServerOptions;
use crate::error::{FramewireError, Result};

/// Receives server connection events from the accept loop.
pub trait ConnectionHandler: Send + Sync {
    /// A client connection was accepted. Typical implementations attach
    /// pipelines here.
    fn on_connection_accepted(&self, stream: TcpStream, peer: SocketAddr);

    /// Accepting a connection failed. The loop continues afterwards.
    fn on_connection_failed(&self, error: FramewireError);
}

/// Accepting server socket.
pub struct Listener {
    inner: TcpListener,
}

impl Listener {
    /// Bind the server socket and log the startup banner.
    pub async fn bind(addr: impl ToSocketAddrs, options: &ServerOptions) -> Result<Self> {
        let inner = TcpListener::bind(addr).await?;
        let local = inner.local_addr()?;
        log_server_status(options, local);
        Ok(Self { inner })
    }

    /// Address the socket is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.inner.local_addr()?)
    }

    /// Accept one connection.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr)> {
        Ok(self.inner.accept().await?)
    }

    /// Run the accept loop forever, reporting each outcome to `handler`.
    pub async fn listen(self, handler: Arc<dyn ConnectionHandler>) {
        loop {
            match self.inner.accept().await {
                Ok((stream, peer)) => {
                    handler.on_connection_accepted(stream, peer);
                }
                Err(e) => {
                    tracing::error!("error accepting connection: {}", e);
                    handler.on_connection_failed(FramewireError::Io(e));
                }
            }
        }
    }
}

/// Open a client connection to a framewire server.
pub async fn connect(addr: impl ToSocketAddrs) -> Result<TcpStream> {
    Ok(TcpStream::connect(addr).await?)
}

/// Log the formatted server status banner.
fn log_server_status(options: &ServerOptions, addr: SocketAddr) {
    tracing::info!("┌─ S E R V E R   S T A T U S ─────────────────────────┐");
    tracing::info!("│ Server Name       : {}", options.server_name);
    tracing::info!("│ Listening on Port : {}", addr.port());
    tracing::info!("│ Worker Threads    : {}", options.threads_number);
    tracing::info!("│ Buffer Pools      : {}", options.buffer_pools);
    tracing::info!(
        "│ Keep-Alive        : {} (Timeout: {}s)",
        options.keep_alive,
        options.keep_alive_timeout.as_secs()
    );
    tracing::info!("│ Status            : ONLINE");
    tracing::info!("└─────────────────────────────────────────────────────┘");
}
