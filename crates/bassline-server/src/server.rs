//! HTTP server.
//!
//! A hyper HTTP/1 accept loop in front of a [`Transport`]. Connections are
//! capped by a [`ConnectionLimiter`]; on shutdown the listener stops
//! accepting, open connections finish their in-flight request, and the
//! server waits up to the configured shutdown timeout for them to drain.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use bassline_core::{NotFoundHandler, SiteConfig};
//! use bassline_server::{Server, ServerConfig, Transport};
//! use bassline_session::{MemoryStore, StoreDirectory};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::builder().http_addr("127.0.0.1:8080").build();
//!     let transport = Transport::new(
//!         Arc::new(NotFoundHandler),
//!         Arc::new(StoreDirectory::new(Arc::new(MemoryStore::new()))),
//!         SiteConfig::default(),
//!     );
//!
//!     Server::new(config, transport).run().await?;
//!     Ok(())
//! }
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::shutdown::{ConnectionLimiter, ShutdownSignal};
use crate::transport::Transport;

/// An HTTP server that is not yet listening.
#[derive(Debug)]
pub struct Server {
    config: ServerConfig,
    transport: Arc<Transport>,
}

impl Server {
    /// Creates a server. The transport's limits are taken from `config`.
    #[must_use]
    pub fn new(config: ServerConfig, transport: Transport) -> Self {
        let transport = Arc::new(transport.with_limits(&config));
        Self { config, transport }
    }

    /// Returns the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Binds the listener without accepting yet.
    ///
    /// # Errors
    ///
    /// Fails when the address does not parse or cannot be bound.
    pub async fn bind(self) -> Result<BoundServer, ServerError> {
        let addr = self
            .config
            .socket_addr()
            .map_err(|e| ServerError::InvalidAddress {
                addr: self.config.http_addr().to_string(),
                reason: e.to_string(),
            })?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;

        Ok(BoundServer {
            listener,
            local_addr,
            limiter: ConnectionLimiter::new(self.config.max_connections()),
            config: self.config,
            transport: self.transport,
        })
    }

    /// Runs until SIGTERM or SIGINT.
    ///
    /// # Errors
    ///
    /// Fails when the listener cannot be bound.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_with_shutdown(ShutdownSignal::with_os_signals()).await
    }

    /// Runs until `shutdown` triggers.
    ///
    /// # Errors
    ///
    /// Fails when the listener cannot be bound.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        self.bind().await?.serve(shutdown).await;
        Ok(())
    }
}

/// A server with a bound listener.
#[derive(Debug)]
pub struct BoundServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    limiter: ConnectionLimiter,
    config: ServerConfig,
    transport: Arc<Transport>,
}

impl BoundServer {
    /// The address actually bound; useful with port 0.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accepts connections until `shutdown` triggers, then drains.
    pub async fn serve(self, shutdown: ShutdownSignal) {
        tracing::info!(
            addr = %self.local_addr,
            max_connections = self.config.max_connections(),
            "server listening"
        );

        loop {
            let permit = tokio::select! {
                permit = self.limiter.acquire() => permit,
                () = shutdown.recv() => break,
            };
            let Some(permit) = permit else { break };

            tokio::select! {
                result = self.listener.accept() => match result {
                    Ok((stream, remote_addr)) => {
                        let transport = Arc::clone(&self.transport);
                        let shutdown = shutdown.clone();
                        tokio::spawn(async move {
                            serve_connection(stream, remote_addr, transport, shutdown).await;
                            drop(permit);
                        });
                    }
                    Err(e) => tracing::error!(error = %e, "failed to accept connection"),
                },
                () = shutdown.recv() => break,
            }
        }

        tracing::info!("shutdown signal received, stopping listener");
        drop(self.listener);

        let timeout = self.config.shutdown_timeout();
        tracing::info!(
            active = self.limiter.active(),
            timeout = ?timeout,
            "waiting for connections to close"
        );
        if tokio::time::timeout(timeout, self.limiter.wait_idle())
            .await
            .is_err()
        {
            tracing::warn!(
                active = self.limiter.active(),
                "shutdown timeout reached with connections still open"
            );
        }

        tracing::info!("server stopped");
    }
}

async fn serve_connection(
    stream: TcpStream,
    remote_addr: SocketAddr,
    transport: Arc<Transport>,
    shutdown: ShutdownSignal,
) {
    let service = service_fn(move |request: Request<Incoming>| {
        let transport = Arc::clone(&transport);
        async move { Ok::<_, Infallible>(transport.handle(request).await) }
    });

    let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
    tokio::pin!(conn);

    let result = tokio::select! {
        result = conn.as_mut() => result,
        () = shutdown.recv() => {
            tracing::debug!(%remote_addr, "closing connection for shutdown");
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    };

    if let Err(e) = result {
        tracing::debug!(%remote_addr, error = %e, "connection error");
    }
}
