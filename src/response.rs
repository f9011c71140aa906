//! `ResponseHandle` (the cross-thread delivery bridge) and the `Response`
//! view workers populate.
//!
//! Delivery is at-most-once: the alive flag is checked inside the posted
//! closure, not at post time, so a stream that closes between submission
//! and execution is still caught. Scoped resources release when the handle
//! itself is destroyed.

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};


use crate::observability::provider::Provider;
use crate::request::HeaderMap;

type SendPrimitive = dyn FnOnce(u16, HeaderMap, Vec<u8>) + Send;

struct Inner {
    alive: AtomicBool,
    send_primitive: Mutex<Option<Box<SendPrimitive>>>,
    reactor: tokio::runtime::Handle,
    scoped: Mutex<Vec<Box<dyn Any + Send>>>,
}

/// Thread-safe bridge from a worker thread back to the reactor-owned stream.
///
/// Cloning shares the same underlying state (it is an `Arc` handle); the one
/// `Response` view that should ever commit through it holds only a `Weak`
/// reference, obtained internally via `downgrade_inner`.
#[derive(Clone)]
pub struct ResponseHandle {
    inner: Arc<Inner>,
}

impl ResponseHandle {
    /// `send_primitive` serializes status+headers+body into the stream; it
    /// runs on `reactor`, never on the calling thread. `reactor` is a handle
    /// to the I/O reactor's async runtime (the `h2` adapter's tokio runtime).
    pub fn new(
        reactor: tokio::runtime::Handle,
        send_primitive: impl FnOnce(u16, HeaderMap, Vec<u8>) + Send + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                alive: AtomicBool::new(true),
                send_primitive: Mutex::new(Some(Box::new(send_primitive))),
                reactor,
                scoped: Mutex::new(Vec::new()),
            }),
        }
    }

    fn from_inner(inner: Arc<Inner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade_inner(&self) -> Weak<Inner> {
        Arc::downgrade(&self.inner)
    }

    /// May be called from any thread. Posts a single closure to the reactor;
    /// the closure re-reads the alive flag there and either invokes the send
    /// primitive exactly once or returns without side effects. A second call
    /// finds the primitive already taken and is a no-op; "at most once" is
    /// enforced even if a caller bypasses `Response::close`'s own
    /// single-commit guard.
    pub fn send(&self, status: u16, headers: HeaderMap, body: Vec<u8>) {
        let inner = Arc::clone(&self.inner);
        let reactor = inner.reactor.clone();
        reactor.spawn(async move {
            if !inner.alive.load(Ordering::Acquire) {
                return;
            }
            let primitive = inner.send_primitive.lock().unwrap().take();
            if let Some(primitive) = primitive {
                primitive(status, headers, body);
            }
        });
    }

    /// Called by the reactor when the stream closes, local or peer-initiated.
    pub fn mark_closed(&self) {
        self.inner.alive.store(false, Ordering::Release);
    }

    /// Advisory: a `true` result may race to `false` before a concurrently
    /// posted `send` runs.
    pub fn is_alive(&self) -> bool {
        self.inner.alive.load(Ordering::Acquire)
    }

    /// Appends a scoped resource (e.g. a [`crate::limits::LoadShedderGuard`])
    /// released when the last strong reference to this handle drops.
    pub fn attach_scoped(&self, resource: impl Any + Send + 'static) {
        self.inner.scoped.lock().unwrap().push(Box::new(resource));
    }
}

/// A copyable view over shared response state plus a weak reference to the
/// one [`ResponseHandle`] that can actually deliver it. `close()` is the
/// single commit point per logical response; copies each carry independent
/// status/headers/body/closed state, so copying before `close()` and
/// closing each copy commits independently; callers must hold a single
/// logical owner per request (documented, not prevented).
#[derive(Clone)]
pub struct Response {
    status: Option<u16>,
    headers: HeaderMap,
    body: Vec<u8>,
    closed: bool,
    handle: Weak<Inner>,
}

impl Response {
    pub fn new(handle: &ResponseHandle) -> Self {
        Self { status: None, headers: HeaderMap::new(), body: Vec::new(), closed: false, handle: handle.downgrade_inner() }
    }

    pub fn set_status(&mut self, status: u16) {
        self.status = Some(status);
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Overwrites on a duplicate key; the supplied casing is kept.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        let slot = self.headers.iter().position(|(k, _)| k.eq_ignore_ascii_case(&name));
        if let Some(slot) = slot {
            // HeaderMap has no direct indexed overwrite; rebuild minus the
            // stale entry then re-insert so the new casing wins.
            let mut rebuilt = HeaderMap::new();
            for (i, (k, v)) in self.headers.iter().enumerate() {
                if i != slot {
                    rebuilt.insert(k, v);
                }
            }
            rebuilt.insert(name, value);
            self.headers = rebuilt;
        } else {
            self.headers.insert(name, value);
        }
    }

    pub fn write(&mut self, bytes: &[u8]) {
        self.body.extend_from_slice(bytes);
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn attach_scoped(&self, resource: impl Any + Send + 'static) {
        if let Some(inner) = self.handle.upgrade() {
            ResponseHandle::from_inner(inner).attach_scoped(resource);
        }
    }

    /// The single commit point. Unset status delivers 500 with a warning;
    /// a second call is a no-op; a call after the handle has expired drops
    /// silently, logs at debug level, and increments `responses.dropped`.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let logger = Provider::current().logger();
        let status = self.status.unwrap_or_else(|| {
            logger.warn("response closed without set_status; defaulting to 500");
            500
        });
        match self.handle.upgrade() {
            Some(inner) => {
                let handle = ResponseHandle::from_inner(inner);
                handle.send(status, std::mem::take(&mut self.headers), std::mem::take(&mut self.body));
            }
            None => {
                logger.debug("response closed after its stream handle expired; dropping");
                Provider::current().metrics().counter("responses.dropped").inc();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap()
    }

    #[test]
    fn close_with_status_delivers_body_once() {
        let rt = runtime();
        let (tx, rx) = mpsc::channel();
        let handle = ResponseHandle::new(rt.handle().clone(), move |status, _headers, body| {
            tx.send((status, body)).unwrap();
        });
        let mut response = Response::new(&handle);
        response.set_status(200);
        response.write(b"hello");
        response.close();
        rt.block_on(async { tokio::task::yield_now().await });
        let (status, body) = rx.recv().unwrap();
        assert_eq!(status, 200);
        assert_eq!(body, b"hello");
    }

    #[test]
    fn close_without_status_delivers_500() {
        let rt = runtime();
        let (tx, rx) = mpsc::channel();
        let handle = ResponseHandle::new(rt.handle().clone(), move |status, _headers, _body| {
            tx.send(status).unwrap();
        });
        let mut response = Response::new(&handle);
        response.close();
        rt.block_on(async { tokio::task::yield_now().await });
        assert_eq!(rx.recv().unwrap(), 500);
    }

    #[test]
    fn second_close_is_a_no_op() {
        let rt = runtime();
        let (tx, rx) = mpsc::channel::<u16>();
        let handle = ResponseHandle::new(rt.handle().clone(), move |status, _headers, _body| {
            tx.send(status).unwrap();
        });
        let mut response = Response::new(&handle);
        response.set_status(201);
        response.close();
        response.close();
        rt.block_on(async { tokio::task::yield_now().await });
        assert_eq!(rx.try_iter().count(), 1);
    }

    #[test]
    fn close_after_handle_dropped_is_silent() {
        let rt = runtime();
        let mut response = {
            let handle = ResponseHandle::new(rt.handle().clone(), |_status, _headers, _body| {
                panic!("must not be invoked after the handle is gone");
            });
            Response::new(&handle)
        };
        response.set_status(200);
        response.close();
        rt.block_on(async { tokio::task::yield_now().await });
    }

    #[test]
    fn send_after_mark_closed_is_dropped() {
        let rt = runtime();
        let (tx, rx) = mpsc::channel::<u16>();
        let handle = ResponseHandle::new(rt.handle().clone(), move |status, _headers, _body| {
            tx.send(status).unwrap();
        });
        handle.mark_closed();
        let mut response = Response::new(&handle);
        response.set_status(200);
        response.close();
        rt.block_on(async { tokio::task::yield_now().await });
        assert!(rx.try_recv().is_err());
    }
}
