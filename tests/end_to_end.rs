//! Cross-module scenarios that unit tests inside each module don't reach:
//! a full request through router + worker pool + response delivery, and a
//! response whose stream closes before the worker finishes.

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};

use triage_core::limits::{LoadShedder, LoadShedderPolicy};
use triage_core::message::Message;
use triage_core::observability::{current_span_ids, Counter, MetricsProvider, Provider};
use triage_core::request::{Request, RequestData};
use triage_core::response::{Response, ResponseHandle};
use triage_core::router::Router;
use triage_core::server::dispatch_message;
use triage_core::trace::TraceContext;
use triage_core::workerpool::WorkerPool;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap()
}

#[test]
fn a_request_travels_through_the_worker_pool_and_router_to_delivery() {
    let rt = runtime();
    let mut router = Router::new();
    router.route("GET", "/health", |_request, mut response| {
        response.set_status(200);
        response.write(b"ok");
        response.close();
    });
    let router = Arc::new(router);

    let captured: Arc<Mutex<Option<(u16, Vec<u8>)>>> = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&captured);
    let handle = ResponseHandle::new(rt.handle().clone(), move |status, _headers, body| {
        *sink.lock().unwrap() = Some((status, body));
    });
    let response = Response::new(&handle);
    let request_data = RequestData::new("GET", "/health").shared();
    let request = Request::new(&request_data);

    let dispatch_router = Arc::clone(&router);
    let pool = WorkerPool::start(2, move |message: Message| {
        if let triage_core::message::Payload::HttpRequest { request, response } = message.payload {
            dispatch_router.dispatch(request, response);
        }
    });

    pool.submit(Message::http_request(0, TraceContext::root([7; 16], [8; 8]), request, response));
    pool.shutdown();
    rt.block_on(async { tokio::task::yield_now().await });

    let (status, body) = captured.lock().unwrap().take().unwrap();
    assert_eq!(status, 200);
    assert_eq!(body, b"ok");
}

#[test]
fn a_response_closed_after_its_stream_is_gone_is_dropped_and_counted() {
    let rt = runtime();
    // close() always reports through the process-wide provider, so we read
    // the counter before and after rather than asserting an absolute value
    // (other tests in this binary may share the same process-wide registry).
    let dropped_before = Provider::current().metrics().counter("responses.dropped").value();

    let status_seen = Arc::new(AtomicU16::new(0));
    let seen = Arc::clone(&status_seen);
    let mut response = {
        let handle = ResponseHandle::new(rt.handle().clone(), move |status, _headers, _body| {
            seen.store(status, Ordering::SeqCst);
        });
        Response::new(&handle)
        // `handle` drops here; the stream is gone before the worker responds.
    };
    response.set_status(200);
    response.close();
    rt.block_on(async { tokio::task::yield_now().await });

    assert_eq!(status_seen.load(Ordering::SeqCst), 0, "a dropped handle must never receive a send");
    assert_eq!(Provider::current().metrics().counter("responses.dropped").value(), dropped_before + 1);
}

#[test]
fn static_route_shadows_a_param_route_at_the_same_depth() {
    let rt = runtime();
    let mut router = Router::new();
    router.route("GET", "/links/new", |_request, mut response| {
        response.set_status(200);
        response.write(b"static");
        response.close();
    });
    router.route("GET", "/links/:code", |_request, mut response| {
        response.set_status(200);
        response.write(b"param");
        response.close();
    });

    let captured: Arc<Mutex<Option<Vec<u8>>>> = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&captured);
    let handle = ResponseHandle::new(rt.handle().clone(), move |_status, _headers, body| {
        *sink.lock().unwrap() = Some(body);
    });
    let request = Request::new(&RequestData::new("GET", "/links/new").shared());
    router.dispatch(request, Response::new(&handle));
    rt.block_on(async { tokio::task::yield_now().await });
    assert_eq!(captured.lock().unwrap().take().unwrap(), b"static");
}

#[test]
fn worker_dispatch_correlates_logs_with_the_inbound_trace_context() {
    let rt = runtime();
    let seen_ids: Arc<Mutex<Option<(Option<String>, Option<String>)>>> = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&seen_ids);
    let mut router = Router::new();
    router.route("GET", "/traced", move |_request, mut response| {
        *sink.lock().unwrap() = Some(current_span_ids());
        response.set_status(200);
        response.close();
    });

    let handle = ResponseHandle::new(rt.handle().clone(), |_status, _headers, _body| {});
    let response = Response::new(&handle);
    let request = Request::new(&RequestData::new("GET", "/traced").shared());

    let inbound =
        TraceContext::parse_traceparent("00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01").unwrap();
    let message = Message::http_request(0, inbound.clone(), request, response);

    let shedder = LoadShedder::new(LoadShedderPolicy::new("test", 100).unwrap());
    dispatch_message(&router, &shedder, message);
    rt.block_on(async { tokio::task::yield_now().await });

    let (trace_id, span_id) = seen_ids.lock().unwrap().take().unwrap();
    assert_eq!(trace_id, Some(inbound.trace_id_hex()));
    assert_ne!(span_id, Some(inbound.span_id_hex()));
}
