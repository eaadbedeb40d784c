//! Request tracing middleware: correlation ids and enter/exit access logs.
//!
//! Every request that passes through [`trace`] gets:
//!
//! - a **correlation id** — the inbound `x-request-id` value if one is
//!   present and non-blank, a fresh UUID v4 otherwise. The id is injected
//!   into the request headers before delegation (handlers and their outbound
//!   calls can forward it) and written onto the response unconditionally
//!   after delegation, replacing anything a handler set under that name.
//! - a **request span** carrying `cid`, `method` and `path` — every log call
//!   a handler makes while the request is in flight picks these fields up
//!   automatically. `status` and `dur_ms` are recorded at exit. The span is
//!   dropped when the request finishes, so none of its fields are visible to
//!   logging done afterwards on the same worker.
//! - an **enter** line (cid, method, path) and an **exit** line (cid, method,
//!   path, status, dur_ms). The exit line is owned by a guard whose `Drop`
//!   runs on every path out of the middleware: a handler panic or a
//!   cancelled request still produces an exit line, with status `0` standing
//!   in for the response that never materialised, and the panic keeps
//!   propagating.

use std::time::Instant;

use tracing::field::Empty;
use tracing::{Instrument, Span, info, info_span};
use uuid::Uuid;

use crate::middleware::Next;
use crate::request::Request;
use crate::response::Response;

/// Correlation header: read from requests, set on every traced response.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Status logged when downstream never produced a response (panic or
/// cancellation).
const STATUS_UNKNOWN: u16 = 0;

// ── Configuration ─────────────────────────────────────────────────────────────

/// Controls whether [`trace`] is installed into the pipeline.
///
/// Enabled by default. The server reads the flag once, at pipeline
/// construction; flipping it later has no effect on a running server.
#[derive(Clone, Debug)]
pub struct TraceConfig {
    pub enabled: bool,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl TraceConfig {
    /// Environment variable consulted by [`from_env`](TraceConfig::from_env).
    pub const ENV_VAR: &'static str = "OBI_TRACE";

    /// Reads the flag from the environment: `0`, `false`, `off` or `no`
    /// (any case) disable tracing; anything else, or an unset variable,
    /// leaves it enabled.
    pub fn from_env() -> Self {
        Self {
            enabled: parse_enabled(std::env::var(Self::ENV_VAR).ok().as_deref()),
        }
    }

    pub fn disabled() -> Self {
        Self { enabled: false }
    }
}

fn parse_enabled(value: Option<&str>) -> bool {
    let Some(value) = value else { return true };
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "off" | "no"
    )
}

// ── The middleware ────────────────────────────────────────────────────────────

/// Correlates and access-logs one request, then delegates to `next`.
///
/// Invoked by the server for every request when tracing is enabled. Exposed
/// publicly so it can be composed around any handler via [`Next::new`].
pub async fn trace(mut req: Request, next: Next) -> Response {
    let cid = correlation_id(&req);
    let method = req.method().clone();
    let path = req.path().to_owned();

    // Downstream sees the resolved id whether the client sent one or not.
    req.set_header(REQUEST_ID_HEADER, &cid);

    let span = info_span!(
        "request",
        cid = %cid,
        method = %method,
        path = %path,
        status = Empty,
        dur_ms = Empty,
    );
    let guard_span = span.clone();

    async move {
        let mut guard = ExitGuard {
            span: guard_span,
            cid,
            method,
            path,
            start: Instant::now(),
            emitted: false,
        };

        info!(cid = %guard.cid, method = %guard.method, path = %guard.path, "enter");

        let mut res = next.run(req).await;

        res.set_header(REQUEST_ID_HEADER, &guard.cid);
        guard.exit(res.status_code().as_u16());
        res
    }
    .instrument(span)
    .await
}

/// Resolves the correlation id for a request.
///
/// A present, non-blank inbound header is used verbatim (untrimmed); blank
/// or missing falls back to a fresh UUID v4.
fn correlation_id(req: &Request) -> String {
    match req.header(REQUEST_ID_HEADER) {
        Some(value) if !value.trim().is_empty() => value.to_owned(),
        _ => Uuid::new_v4().to_string(),
    }
}

// ── Exit guard ────────────────────────────────────────────────────────────────

/// Owns the exit line.
///
/// The normal path calls [`exit`](ExitGuard::exit) with the real status.
/// If the request future unwinds or is dropped mid-flight instead, `Drop`
/// emits the line with [`STATUS_UNKNOWN`]. Either way the span handle held
/// here is released, which closes the request's logging context.
struct ExitGuard {
    span: Span,
    cid: String,
    method: http::Method,
    path: String,
    start: Instant,
    emitted: bool,
}

impl ExitGuard {
    fn exit(&mut self, status: u16) {
        self.emitted = true;
        self.emit(status);
    }

    fn emit(&self, status: u16) {
        let dur_ms = self.start.elapsed().as_millis() as u64;
        self.span.record("status", status);
        self.span.record("dur_ms", dur_ms);
        // Entered explicitly: on the Drop path this code runs outside the
        // instrumented future.
        let _entered = self.span.enter();
        info!(
            cid = %self.cid,
            method = %self.method,
            path = %self.path,
            status,
            dur_ms,
            "exit"
        );
    }
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        if !self.emitted {
            self.emit(STATUS_UNKNOWN);
        }
    }
}
