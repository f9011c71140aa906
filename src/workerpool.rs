//! Session-affine worker pool: fixed-size, sticky-routed by
//! [`crate::message::Message::affinity_key`].
//!
//! Plain `std::thread` workers, not a future executor: each lane is a FIFO
//! guarded by a mutex and condvar, and a panicking dispatch is caught at the
//! worker boundary so one bad message never kills its lane.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use crate::error::codes;
use crate::message::Message;
use crate::observability::logging::LogSeverity;

use crate::observability::provider::Provider;

struct Lane {
    queue: Mutex<VecDeque<Message>>,
    condvar: Condvar,
}

impl Lane {
    fn new() -> Self {
        Self { queue: Mutex::new(VecDeque::new()), condvar: Condvar::new() }
    }

    fn push(&self, message: Message) {
        self.queue.lock().unwrap().push_back(message);
        self.condvar.notify_one();
    }

    /// Blocks until a message is available or the pool is shutting down and
    /// the lane has drained.
    fn pop(&self, shutting_down: &std::sync::atomic::AtomicBool) -> Option<Message> {
        let mut queue = self.queue.lock().unwrap();
        loop {
            if let Some(message) = queue.pop_front() {
                return Some(message);
            }
            if shutting_down.load(std::sync::atomic::Ordering::Acquire) {
                return None;
            }
            queue = self.condvar.wait(queue).unwrap();
        }
    }
}

/// A fixed set of worker threads, each with its own FIFO lane. A message's
/// `affinity_key % lane_count` picks its lane deterministically, so two
/// messages with the same affinity key are always processed in submission
/// order relative to each other, never interleaved across threads.
pub struct WorkerPool {
    lanes: Vec<Arc<Lane>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    shutting_down: Arc<std::sync::atomic::AtomicBool>,
}

impl WorkerPool {
    /// Spawns `lane_count` worker threads, each running `dispatch` for every
    /// message it pops. `dispatch` must not panic across the `catch_unwind`
    /// boundary in a way that poisons shared state; a panicking dispatch is
    /// caught per-message so one bad request never kills its worker thread.
    pub fn start(lane_count: usize, dispatch: impl Fn(Message) + Send + Sync + 'static) -> Self {
        assert!(lane_count > 0, "lane_count must be at least 1");
        let dispatch = Arc::new(dispatch);
        let shutting_down = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let lanes: Vec<Arc<Lane>> = (0..lane_count).map(|_| Arc::new(Lane::new())).collect();
        let mut handles = Vec::with_capacity(lane_count);
        for (index, lane) in lanes.iter().cloned().enumerate() {
            let dispatch = Arc::clone(&dispatch);
            let shutting_down = Arc::clone(&shutting_down);
            let handle = std::thread::Builder::new()
                .name(format!("triage-worker-{index}"))
                .spawn(move || {
                    while let Some(message) = lane.pop(&shutting_down) {
                        let dispatch = Arc::clone(&dispatch);
                        let affinity_key = message.affinity_key;
                        let trace_context = message.trace_context.clone();
                        let outcome = panic::catch_unwind(AssertUnwindSafe(|| dispatch(message)));
                        if outcome.is_err() {
                            Provider::current().metrics().counter("responses.worker_panic").inc();
                            Provider::current().logger().log_at(
                                LogSeverity::Error,
                                &format!("worker dispatch panicked on affinity_key={affinity_key}; continuing"),
                                vec![
                                    ("code", codes::WORKER_PANIC.to_string()),
                                    ("trace_id", trace_context.trace_id_hex()),
                                    ("span_id", trace_context.span_id_hex()),
                                ],
                            );
                        }
                    }
                })
                .expect("failed to spawn worker thread");
            handles.push(handle);
        }
        Self { lanes, handles: Mutex::new(handles), shutting_down }
    }

    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    /// Routes `message` to lane `affinity_key % lane_count`.
    pub fn submit(&self, message: Message) {
        let lane_index = (message.affinity_key % self.lanes.len() as u64) as usize;
        self.lanes[lane_index].push(message);
    }

    /// Signals every lane to drain and stop, then joins all worker threads.
    /// Messages already queued are processed before each worker exits;
    /// nothing submitted after this call is guaranteed to run.
    pub fn shutdown(self) {
        self.shutting_down.store(true, std::sync::atomic::Ordering::Release);
        for lane in &self.lanes {
            lane.condvar.notify_all();
        }
        for handle in self.handles.lock().unwrap().drain(..) {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::default_affinity_key;
    use crate::trace::TraceContext;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::mpsc;

    fn query_message(affinity_key: u64, tag: u64) -> Message {
        Message::downstream_query(affinity_key, TraceContext::root([1; 16], [2; 8]), "tag", tag.to_be_bytes().to_vec())
    }

    #[test]
    fn messages_with_equal_affinity_key_land_on_the_same_lane_in_order() {
        let (tx, rx) = mpsc::channel();
        let pool = WorkerPool::start(4, move |message: Message| {
            if let crate::message::Payload::DownstreamQuery { body, .. } = message.payload {
                let tag = u64::from_be_bytes(body.try_into().unwrap());
                tx.send(tag).unwrap();
            }
        });
        let key = default_affinity_key("GET", "/same");
        for tag in 0..5 {
            pool.submit(query_message(key, tag));
        }
        pool.shutdown();
        let received: Vec<u64> = rx.try_iter().collect();
        assert_eq!(received, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn a_panicking_dispatch_does_not_stop_the_lane_and_is_counted() {
        let panics_before = Provider::current().metrics().counter("responses.worker_panic").value();

        let processed = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&processed);
        let pool = WorkerPool::start(1, move |message: Message| {
            if let crate::message::Payload::DownstreamQuery { body, .. } = message.payload {
                if body == b"boom" {
                    panic!("simulated handler panic");
                }
            }
            counter.fetch_add(1, Ordering::SeqCst);
        });
        pool.submit(Message::downstream_query(0, TraceContext::root([1; 16], [2; 8]), "t", b"boom".to_vec()));
        pool.submit(Message::downstream_query(0, TraceContext::root([1; 16], [2; 8]), "t", b"ok".to_vec()));
        pool.shutdown();
        assert_eq!(processed.load(Ordering::SeqCst), 1);
        assert_eq!(
            Provider::current().metrics().counter("responses.worker_panic").value(),
            panics_before + 1
        );
    }
}
