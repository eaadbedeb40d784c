//! Minimal obi demo — two endpoints behind the trace middleware.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   # inbound id is echoed on the response and both log lines
//!   curl -i -H 'x-request-id: abc-123' http://localhost:3000/orders/7
//!
//!   # no inbound id: obi generates one
//!   curl -i -X POST http://localhost:3000/orders -d '{"sku":"tea"}'
//!
//!   # disable tracing for a run
//!   OBI_TRACE=0 cargo run --example basic

use obi::{Request, Response, Router, Server, StatusCode, TraceConfig};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let app = Router::new()
        .get("/orders/{id}", get_order)
        .post("/orders", create_order);

    Server::bind("0.0.0.0:3000")
        .trace(TraceConfig::from_env())
        .serve(app)
        .await
        .expect("server error");
}

// GET /orders/{id}
//
// Handler logs automatically carry cid, method and path — no parameter
// threading needed.
async fn get_order(req: Request) -> Response {
    let id = req.param("id").unwrap_or("unknown");
    tracing::info!(order = id, "looking up order");
    Response::json(format!(r#"{{"id":"{id}","status":"shipped"}}"#).into_bytes())
}

// POST /orders
async fn create_order(req: Request) -> Response {
    if req.body().is_empty() {
        return Response::status(StatusCode::BAD_REQUEST);
    }

    Response::builder()
        .status(StatusCode::CREATED)
        .header("location", "/orders/99")
        .json(br#"{"id":"99"}"#.to_vec())
}
