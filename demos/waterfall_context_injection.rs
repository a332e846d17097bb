//! Waterfall Middleware: Simple Context Injection
//!
//! This example demonstrates using `Waterfall` and `Step` to inject context
//! into a request before it reaches the final handler, and to stop the chain
//! early when a request is rejected.
use eventide::{Flow, Next, Step, Waterfall};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

// Request flowing through the chain
#[derive(Debug, Clone, PartialEq)]
struct Request {
    path: String,
    request_id: Option<u64>,
}

type Reply = String;

fn main() {
    let pipeline = Waterfall::<&str, Request, Reply>::new();

    // Tracer: injects a request id, then continues
    let ids = Arc::new(AtomicU64::new(1));
    pipeline.on(
        "http",
        Step::new(move |mut request: Request, next: Next<'_, Request, Reply>| {
            request.request_id = Some(ids.fetch_add(1, Ordering::Relaxed));
            next.call(request)
        }),
    );

    // Guard: rejects private paths without calling `next`
    pipeline.on(
        "http",
        Step::new(|request: Request, next: Next<'_, Request, Reply>| {
            if request.path.starts_with("/private") {
                return format!("403 for request {:?}", request.request_id);
            }
            next.call(request)
        }),
    );

    let handler =
        |request: Request| format!("200 {} (request {:?})", request.path, request.request_id);

    for path in ["/index", "/private/keys"] {
        let request = Request {
            path: path.to_string(),
            request_id: None,
        };
        let Flow { ok, value } = pipeline.waterfall_with(&"http", request, handler);
        println!("[{path}] completed: {ok}, reply: {value}");
    }
}
