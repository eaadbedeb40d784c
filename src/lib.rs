//! # obi
//!
//! Request correlation and access logging for small HTTP services.
//! Every request in, two log lines out, one id tying them together.
//!
//! ## The contract
//!
//! Endpoint handlers should never implement their own request logging:
//! some forget, the rest drift apart, and the fleet ends up with
//! unsearchable logs. obi owns that concern at the pipeline level:
//!
//! - **Correlation id** — an inbound `x-request-id` header is echoed
//!   verbatim; a missing or blank one is replaced by a fresh UUID. The id
//!   appears on the response, on both log lines, and on every log call a
//!   handler makes while the request is in flight.
//! - **Enter/exit lines** — one line when the request reaches the pipeline
//!   (id, method, path), one when it leaves (same fields plus status and
//!   duration in milliseconds). The exit line is emitted even when the
//!   handler panics or the request is cancelled mid-flight.
//! - **Scoped context** — request metadata lives in a [`tracing`] span bound
//!   to the request future. It is gone the moment the request finishes;
//!   nothing leaks into logging done for the next request on the same
//!   worker.
//!
//! The hosting pipeline is deliberately small: a hyper server, a radix-tree
//! router, and thin request/response wrappers — just enough to install the
//! middleware ahead of routing and drive it end to end.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use obi::{Request, Response, Router, Server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = Router::new()
//!         .get("/orders/{id}", get_order)
//!         .post("/orders", create_order);
//!
//!     // Tracing is on by default; Server::trace can turn it off.
//!     Server::bind("0.0.0.0:3000").serve(app).await.unwrap();
//! }
//!
//! async fn get_order(req: Request) -> Response {
//!     let id = req.param("id").unwrap_or("unknown");
//!     Response::json(format!(r#"{{"id":"{id}"}}"#).into_bytes())
//! }
//!
//! async fn create_order(req: Request) -> Response {
//!     if req.body().is_empty() {
//!         return Response::status(obi::StatusCode::BAD_REQUEST);
//!     }
//!     Response::json(br#"{"id":"7"}"#.to_vec())
//! }
//! ```
//!
//! ```text
//! $ curl -H 'x-request-id: abc-123' http://localhost:3000/orders/7
//! INFO request{cid=abc-123 method=GET path=/orders/7}: enter
//! INFO request{cid=abc-123 method=GET path=/orders/7 status=200 dur_ms=2}: exit
//! ```

mod error;
mod handler;
mod request;
mod response;
mod router;
mod server;
#[cfg(test)]
mod test_support;

pub mod middleware;

pub use error::Error;
pub use handler::Handler;
pub use http::{Method, StatusCode};
pub use middleware::{Next, REQUEST_ID_HEADER, TraceConfig};
pub use request::Request;
pub use response::{IntoResponse, Response};
pub use router::Router;
pub use server::Server;
