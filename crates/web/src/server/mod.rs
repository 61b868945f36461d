//! The accept loop wiring handlers to connections.

use std::fmt;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::connection::HttpConnection;
use crate::handler::{ErrorHandler, Handler};

/// Binds a port and serves connections with a [`Handler`].
///
/// An optional [`ErrorHandler`] substitutes responses for failed
/// transactions; without one, failures produce a generic 500 response.
pub struct WebServer {
    port: u16,
    error_handler: Option<Arc<ErrorHandler>>,
}

impl WebServer {
    pub fn new(port: u16) -> Self {
        Self { port, error_handler: None }
    }

    pub fn with_error_handler(mut self, error_handler: Arc<ErrorHandler>) -> Self {
        self.error_handler = Some(error_handler);
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Binds the port and serves until the listener fails.
    ///
    /// Each accepted connection runs on its own task; per-connection failures
    /// are logged, never propagated.
    pub async fn start<H>(self, handler: Arc<H>) -> std::io::Result<()>
    where
        H: Handler + 'static,
    {
        let listener = TcpListener::bind(("0.0.0.0", self.port)).await?;
        info!(port = self.port, "start listening");

        loop {
            let (stream, remote_addr) = match listener.accept().await {
                Ok(stream_and_addr) => stream_and_addr,
                Err(e) => {
                    warn!(cause = %e, "failed to accept");
                    continue;
                }
            };

            let handler = Arc::clone(&handler);
            let error_handler = self.error_handler.clone();

            tokio::spawn(async move {
                let (reader, writer) = stream.into_split();
                let connection = HttpConnection::new(reader, writer);
                match connection.process(handler, error_handler).await {
                    Ok(()) => info!(remote = %remote_addr, "finished process, connection shutdown"),
                    Err(e) => error!(remote = %remote_addr, cause = %e, "connection failed, shutdown"),
                }
            });
        }
    }
}

impl fmt::Debug for WebServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebServer")
            .field("port", &self.port)
            .field("error_handler", &self.error_handler.as_ref().map(|_| "..."))
            .finish()
    }
}
