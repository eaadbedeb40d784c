//! HTTP server: middleware installation, dispatch, graceful shutdown.
//!
//! # Pipeline shape
//!
//! ```text
//! hyper connection → dispatch → middleware::trace → Next → Router → handler
//!                                (when enabled)
//! ```
//!
//! The trace flag is read exactly once, in [`Server::serve`]; the pipeline
//! either contains the middleware or it does not, for the lifetime of the
//! server. Each request passes through the middleware at most once.
//!
//! # Graceful shutdown
//!
//! On **SIGTERM** (Kubernetes, systemd) or **Ctrl-C** the server stops
//! accepting new connections, lets every in-flight connection task run to
//! completion, then returns from [`Server::serve`]. Set your pod's
//! `terminationGracePeriodSeconds` longer than your slowest request.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::Full;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::error::Error;
use crate::middleware::{self, Next, TraceConfig};
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
    trace: TraceConfig,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called. Request tracing defaults to enabled.
    ///
    /// # Panics
    ///
    /// Panics if `addr` is not a valid `host:port` string.
    pub fn bind(addr: &str) -> Self {
        let addr: SocketAddr = addr.parse().expect("invalid socket address");
        Self {
            addr,
            trace: TraceConfig::default(),
        }
    }

    /// Overrides the trace middleware configuration.
    ///
    /// ```rust,no_run
    /// use obi::{Server, TraceConfig};
    ///
    /// // Honour the OBI_TRACE environment variable:
    /// let server = Server::bind("0.0.0.0:3000").trace(TraceConfig::from_env());
    /// ```
    pub fn trace(mut self, config: TraceConfig) -> Self {
        self.trace = config;
        self
    }

    /// Starts accepting connections and dispatching them through `router`.
    ///
    /// Returns only after a full graceful shutdown (SIGTERM or Ctrl-C,
    /// followed by all in-flight requests completing).
    pub async fn serve(self, router: Router) -> Result<(), Error> {
        let listener = TcpListener::bind(self.addr).await?;

        // Read once; the pipeline shape is fixed from here on.
        let trace_enabled = self.trace.enabled;

        // The continuation below the middleware: route and call the handler.
        // One Arc'd closure shared by every connection task.
        let router = Arc::new(router);
        let next = Next::new(move |req: Request| {
            let router = Arc::clone(&router);
            async move { router.dispatch(req).await }
        });

        info!(addr = %self.addr, trace = trace_enabled, "obi listening");

        // JoinSet tracks every spawned connection task so we can wait for
        // them all to finish during graceful shutdown.
        let mut tasks = tokio::task::JoinSet::new();

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // `biased` checks arms top-to-bottom: a SIGTERM stops the
                // accept loop even if more connections are queued.
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let next = next.clone();
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // The closure runs once per request on the
                        // connection, not once per connection.
                        let svc = service_fn(move |req| {
                            let next = next.clone();
                            async move { dispatch(next, trace_enabled, req).await }
                        });

                        // Serves HTTP/1.1 and HTTP/2, whatever the client
                        // negotiates.
                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks so the JoinSet does not grow
                // without bound.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        // Drain: every in-flight connection finishes before we return.
        while tasks.join_next().await.is_some() {}

        info!("obi stopped");
        Ok(())
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Buffers one hyper request and hands it to the pipeline.
///
/// The error type is [`Infallible`]: failures become HTTP responses here, so
/// hyper never sees an error.
async fn dispatch(
    next: Next,
    trace_enabled: bool,
    req: hyper::Request<hyper::body::Incoming>,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let req = match Request::from_hyper(req).await {
        Ok(req) => req,
        Err(e) => {
            warn!("failed to read request body: {e}");
            return Ok(Response::status(StatusCode::BAD_REQUEST).into_inner());
        }
    };

    Ok(handle(next, trace_enabled, req).await.into_inner())
}

/// Runs one request through the pipeline, with or without the trace
/// middleware.
async fn handle(next: Next, trace_enabled: bool, req: Request) -> Response {
    if trace_enabled {
        middleware::trace(req, next).await
    } else {
        next.run(req).await
    }
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal the process receives.
///
/// On Unix this listens for both **SIGTERM** and **SIGINT** (Ctrl-C). On
/// Windows only Ctrl-C is available.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let sigterm = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use http::{HeaderMap, Method};

    use super::*;
    use crate::middleware::REQUEST_ID_HEADER;
    use crate::test_support::{capture, lines_with};

    fn req(path: &str) -> Request {
        Request::new(Method::GET, path, HeaderMap::new(), Bytes::new())
    }

    fn text_next() -> Next {
        Next::new(|_req: Request| async { Response::text("ok") })
    }

    #[tokio::test]
    async fn disabled_trace_is_a_passthrough() {
        let (_guard, sink) = capture();
        let res = handle(text_next(), false, req("/orders")).await;

        assert_eq!(res.status_code(), StatusCode::OK);
        assert!(res.header(REQUEST_ID_HEADER).is_none());
        assert!(sink.contents().is_empty());
    }

    #[tokio::test]
    async fn enabled_trace_sets_header_and_logs() {
        let (_guard, sink) = capture();
        let res = handle(text_next(), true, req("/orders")).await;

        assert!(res.header(REQUEST_ID_HEADER).is_some());
        let logs = sink.contents();
        assert_eq!(lines_with(&logs, "enter").len(), 1);
        assert_eq!(lines_with(&logs, "exit").len(), 1);
    }
}
