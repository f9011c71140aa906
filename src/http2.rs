//! `h2` adapter: binds the real HTTP/2 server implementation to
//! [`crate::request::RequestData`]/[`crate::response::ResponseHandle`] and
//! submits one [`crate::message::Message`] per request to the worker pool.
//!
//! One tokio task per connection accepts streams; one further task per
//! stream races the client's reset signal against the eventual worker-thread
//! delivery and calls `mark_closed` the moment either resolves.

use std::future::poll_fn;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::message::{default_affinity_key, Message};
use crate::observability::provider::Provider;
use crate::request::{HeaderMap, Request, RequestData};
use crate::response::{Response, ResponseHandle};
use crate::trace::TraceContext;

/// `submit` hands a fully-assembled [`Message`] to the worker pool; it is
/// typically [`crate::workerpool::WorkerPool::submit`] wrapped in an `Arc`.
/// `max_body_bytes` rejects an oversized request with 413 before it ever
/// reaches the worker pool; `idle_timeout` closes a connection that accepts
/// no new stream within the window.
pub async fn serve_connection<IO>(
    io: IO,
    submit: Arc<dyn Fn(Message) + Send + Sync>,
    max_body_bytes: usize,
    idle_timeout: Duration,
) where
    IO: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let mut connection = match h2::server::handshake(io).await {
        Ok(connection) => connection,
        Err(err) => {
            Provider::current().logger().warn(&format!("h2 handshake failed: {err}"));
            return;
        }
    };

    let reactor = tokio::runtime::Handle::current();
    loop {
        match tokio::time::timeout(idle_timeout, connection.accept()).await {
            Ok(Some(Ok((request, respond)))) => {
                let submit = Arc::clone(&submit);
                let reactor = reactor.clone();
                tokio::spawn(drive_stream(request, respond, submit, reactor, max_body_bytes));
            }
            Ok(Some(Err(err))) => {
                Provider::current().logger().debug(&format!("h2 stream accept error: {err}"));
                break;
            }
            Ok(None) => break,
            Err(_elapsed) => {
                Provider::current().logger().debug("connection idle timeout elapsed; closing");
                break;
            }
        }
    }
}

async fn drive_stream(
    request: http::Request<h2::RecvStream>,
    mut respond: h2::server::SendResponse<Bytes>,
    submit: Arc<dyn Fn(Message) + Send + Sync>,
    reactor: tokio::runtime::Handle,
    max_body_bytes: usize,
) {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let trace_context = request
        .headers()
        .get("traceparent")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| TraceContext::parse_traceparent(value).ok())
        .unwrap_or_else(fresh_root_trace_context);

    let mut data = RequestData::new(method.clone(), path.clone());
    for (name, value) in request.headers() {
        if let Ok(value) = value.to_str() {
            data.headers.insert(name.as_str(), value);
        }
    }
    if let Some(query) = request.uri().query() {
        for pair in query.split('&') {
            if let Some((key, value)) = pair.split_once('=') {
                data.query_params.insert(key.to_string(), value.to_string());
            }
        }
    }

    let mut body_stream = request.into_body();
    let mut body = Vec::new();
    while let Some(chunk) = body_stream.data().await {
        match chunk {
            Ok(bytes) => {
                let _ = body_stream.flow_control().release_capacity(bytes.len());
                if body.len() + bytes.len() > max_body_bytes {
                    Provider::current()
                        .logger()
                        .warn(&format!("request body exceeded {max_body_bytes} bytes; rejecting with 413"));
                    deliver(&mut respond, 413, HeaderMap::new(), Vec::new());
                    return;
                }
                body.extend_from_slice(&bytes);
            }
            Err(err) => {
                Provider::current().logger().debug(&format!("h2 body read error: {err}"));
                break;
            }
        }
    }
    data.body = body;

    let shared_request = data.shared();
    let request_view = Request::new(&shared_request);

    let (delivery_tx, delivery_rx) = tokio::sync::oneshot::channel::<(u16, HeaderMap, Vec<u8>)>();
    let response_handle = ResponseHandle::new(reactor, move |status, headers, body| {
        let _ = delivery_tx.send((status, headers, body));
    });
    let response_view = Response::new(&response_handle);

    let affinity_key = default_affinity_key(&method, &path);
    submit(Message::http_request(affinity_key, trace_context, request_view, response_view));

    tokio::select! {
        reset = poll_fn(|cx| respond.poll_reset(cx)) => {
            if let Ok(reason) = reset {
                Provider::current().logger().debug(&format!("h2 stream reset by peer: {reason}"));
            }
            response_handle.mark_closed();
        }
        delivered = delivery_rx => {
            if let Ok((status, headers, body)) = delivered {
                deliver(&mut respond, status, headers, body);
            }
            response_handle.mark_closed();
        }
    }
}

fn deliver(respond: &mut h2::server::SendResponse<Bytes>, status: u16, headers: HeaderMap, body: Vec<u8>) {
    let mut builder = http::Response::builder().status(status);
    for (name, value) in headers.iter() {
        builder = builder.header(name, value);
    }
    let response = match builder.body(()) {
        Ok(response) => response,
        Err(_) => http::Response::new(()),
    };
    match respond.send_response(response, false) {
        Ok(mut send_stream) => {
            let _ = send_stream.send_data(Bytes::from(body), true);
        }
        Err(err) => {
            Provider::current().logger().warn(&format!("h2 send_response failed: {err}"));
        }
    }
}

fn fresh_root_trace_context() -> TraceContext {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    let value = COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut trace_id = [0u8; TraceContext::TRACE_ID_LEN];
    trace_id[..8].copy_from_slice(&value.to_be_bytes());
    trace_id[8..].copy_from_slice(&std::process::id().to_be_bytes());
    let mut span_id = [0u8; TraceContext::SPAN_ID_LEN];
    span_id.copy_from_slice(&value.to_be_bytes());
    TraceContext::root(trace_id, span_id).mark_sampled()
}
