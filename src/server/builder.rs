// ────────────────────────────────
// src/server/builder.rs
// ────────────────────────────────
use crate::server::listener::bind_tcp;
use anyhow::{Context, Result};
use hyper::{server::conn::Http, Body, Request, Response};
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower::Service;

/// Builder so binaries and tests can inject the API handler.
pub struct ServerBuilder<H>
where
    H: Service<Request<Body>, Response = Response<Body>> + Send + Clone + 'static,
    H::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    H::Future: Send + 'static,
{
    addr: SocketAddr,
    handler: Option<H>,
}

impl<H> ServerBuilder<H>
where
    H: Service<Request<Body>, Response = Response<Body>> + Send + Clone + 'static,
    H::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    H::Future: Send + 'static,
{
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr, handler: None }
    }

    pub fn with_handler(mut self, handler: H) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Serve until the process is killed.
    pub async fn serve(self) -> Result<()> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Serve until `signal` resolves. In-flight connections are left to
    /// finish on their own tasks.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let (listener, handler) = self.bind().await?;
        accept_loop(listener, handler, signal).await
    }

    /// Bind and run the accept loop in the background. Returns the bound
    /// address, which is how callers learn an ephemeral port.
    pub async fn spawn(self) -> Result<(SocketAddr, JoinHandle<Result<()>>)> {
        let (listener, handler) = self.bind().await?;
        let local_addr = listener.local_addr()?;
        let task = tokio::spawn(accept_loop(listener, handler, std::future::pending()));
        Ok((local_addr, task))
    }

    async fn bind(self) -> Result<(TcpListener, H)> {
        let handler = self
            .handler
            .context("handler must be set via with_handler()")?;

        let listener = bind_tcp(self.addr).await?;
        tracing::info!("HTTP server listening on {}", listener.local_addr()?);
        Ok((listener, handler))
    }
}

async fn accept_loop<H, F>(listener: TcpListener, handler: H, signal: F) -> Result<()>
where
    H: Service<Request<Body>, Response = Response<Body>> + Send + Clone + 'static,
    H::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    H::Future: Send + 'static,
    F: Future<Output = ()>,
{
    tokio::pin!(signal);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = accepted?;
                let svc = handler.clone();

                // One task per connection.
                tokio::spawn(async move {
                    let http = Http::new();
                    if let Err(err) = http.serve_connection(stream, svc).await {
                        tracing::warn!(%peer, %err, "connection error");
                    }
                });
            }
            _ = &mut signal => {
                tracing::info!("HTTP server stopped accepting connections");
                return Ok(());
            }
        }
    }
}
