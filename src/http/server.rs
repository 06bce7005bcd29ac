//! HTTP server.
//!
//! # Responsibilities
//! - Bind the listening socket
//! - Serve HTTP/1.1 and HTTP/2 connections through the composed router
//! - Stop accepting on the stop signal, drain in-flight requests, and abort
//!   what is left once the deadline passes
//!
//! # Design Decisions
//! - Connections are tracked in a `JoinSet` so they can be aborted; the
//!   graceful watcher only asks them to finish
//! - The read timeout bounds how long a client may take to send the request
//!   head

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto::Builder;
use hyper_util::server::graceful::GracefulShutdown;
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tracing::instrument::WithSubscriber;

use crate::lifecycle::Shutdown;

/// Backoff after a failed accept (e.g. out of file descriptors).
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// How a shutdown ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Every connection finished before the deadline.
    pub drained: bool,
    /// Connections aborted at the deadline.
    pub aborted: usize,
}

/// HTTP server bound to a socket, not yet serving.
pub struct HttpServer {
    listener: TcpListener,
    router: Router,
    read_timeout: Option<Duration>,
}

impl HttpServer {
    pub async fn bind(
        addr: SocketAddr,
        router: Router,
        read_timeout: Option<Duration>,
    ) -> Result<Self, std::io::Error> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            router,
            read_timeout,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.listener.local_addr()
    }

    /// Serve until `stop` is triggered, then shut down within `exit_delay`.
    pub async fn run(self, stop: Shutdown, exit_delay: Duration) -> ShutdownReport {
        let Self {
            listener,
            router,
            read_timeout,
        } = self;

        let mut builder = Builder::new(TokioExecutor::new());
        if let Some(timeout) = read_timeout {
            builder
                .http1()
                .timer(TokioTimer::new())
                .header_read_timeout(timeout);
        }

        if let Ok(addr) = listener.local_addr() {
            tracing::info!(address = %addr, "HTTP server starting");
        }

        let graceful = GracefulShutdown::new();
        let mut connections = JoinSet::new();
        let requested = stop.requested();
        tokio::pin!(requested);

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let service = TowerToHyperService::new(router.clone());
                        let connection = builder
                            .serve_connection_with_upgrades(TokioIo::new(stream), service)
                            .into_owned();
                        let connection = graceful.watch(connection);
                        connections.spawn(
                            async move {
                                if let Err(err) = connection.await {
                                    tracing::debug!(peer = %peer, error = %err, "Connection closed with error");
                                }
                            }
                            .with_current_subscriber(),
                        );
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "Accept failed");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
                _ = &mut requested => break,
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        drop(listener);
        tracing::info!(
            connections = connections.len(),
            deadline_ms = exit_delay.as_millis() as u64,
            "Stopped accepting, draining connections"
        );

        let drained = tokio::time::timeout(exit_delay, graceful.shutdown())
            .await
            .is_ok();
        let aborted = if drained {
            0
        } else {
            let remaining = connections.len();
            connections.abort_all();
            tracing::warn!(aborted = remaining, "Shutdown deadline reached, aborting connections");
            remaining
        };
        while connections.join_next().await.is_some() {}

        tracing::info!("HTTP server stopped");
        ShutdownReport { drained, aborted }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;

    async fn start(router: Router, exit_delay: Duration) -> (SocketAddr, Shutdown, tokio::task::JoinHandle<ShutdownReport>) {
        let server = HttpServer::bind("127.0.0.1:0".parse().unwrap(), router, None)
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        let stop = Shutdown::new();
        let handle = tokio::spawn(server.run(stop.clone(), exit_delay));
        (addr, stop, handle)
    }

    fn client() -> reqwest::Client {
        reqwest::Client::builder().no_proxy().build().unwrap()
    }

    #[tokio::test]
    async fn serves_and_drains() {
        let (addr, stop, handle) = start(
            Router::new().route("/", get(|| async { "up" })),
            Duration::from_secs(1),
        )
        .await;

        let body = client()
            .get(format!("http://{addr}/"))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "up");

        stop.trigger();
        let report = handle.await.unwrap();
        assert!(report.drained);
        assert_eq!(report.aborted, 0);
        assert!(tokio::net::TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn aborts_after_deadline() {
        let router = Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                "late"
            }),
        );
        let (addr, stop, handle) = start(router, Duration::from_millis(200)).await;

        let request = tokio::spawn(client().get(format!("http://{addr}/slow")).send());
        tokio::time::sleep(Duration::from_millis(100)).await;

        let started = std::time::Instant::now();
        stop.trigger();
        let report = handle.await.unwrap();
        assert!(!report.drained);
        assert_eq!(report.aborted, 1);
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(request.await.unwrap().is_err());
    }
}
