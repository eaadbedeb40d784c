//! Middleware layer.
//!
//! Middleware intercepts requests and responses ahead of routing and is the
//! right place for cross-cutting concerns that endpoint handlers should
//! never reimplement. obi ships one middleware, and it is the point of the
//! crate: [`trace`], which correlates and access-logs every request.
//!
//! A middleware receives the [`Request`] and a [`Next`] continuation and
//! returns the [`Response`]:
//!
//! ```text
//! async fn trace(req: Request, next: Next) -> Response
//! ```
//!
//! [`Next`] is invoked exactly once per request. The server wires the chain
//! `trace → router → handler` automatically when tracing is enabled (the
//! default); [`Next::new`] exists so the middleware can also be composed
//! around any handler directly, which is how the tests drive it without a
//! socket.

mod trace;

pub use trace::{REQUEST_ID_HEADER, TraceConfig, trace};

use crate::handler::{BoxedHandler, Handler};
use crate::request::Request;
use crate::response::Response;

/// The downstream continuation: the rest of the request-processing pipeline.
///
/// Consumed by [`run`](Next::run) — the pipeline below the middleware runs
/// exactly once per request. Cloning is cheap (one `Arc` increment), which is
/// how the server reuses one continuation across all connections.
#[derive(Clone)]
pub struct Next {
    handler: BoxedHandler,
}

impl Next {
    /// Wraps any handler as a continuation.
    pub fn new(handler: impl Handler) -> Self {
        Self {
            handler: handler.into_boxed_handler(),
        }
    }

    /// Runs the downstream pipeline to completion.
    pub async fn run(self, req: Request) -> Response {
        self.handler.call(req).await
    }
}
