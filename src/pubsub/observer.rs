// SPDX-License-Identifier: Apache-2.0
use std::fmt::Display;
use std::sync::Arc;
use tracing::Span;

/// Side channel the adapter reports its notable transitions to
///
/// Every method has an empty default so implementations only pick what they need.
/// Notifications are sent after the adapter released its lock, so an observer may
/// query the adapter it observes.
pub trait StreamObserver {
    /// An item could not be matched to a waiting request and was buffered
    fn item_buffered(&self, _buffered: usize) {}

    /// A request abandoned by its caller was skipped while matching an item
    fn cancelled_request_skipped(&self) {}

    /// The producer terminated normally, `waiting` requests got the end of stream
    fn producer_completed(&self, _waiting: usize) {}

    /// The producer failed, `waiting` requests got the failure
    fn producer_failed(&self, _error: &dyn Display, _waiting: usize) {}

    /// The adapter was disposed, releasing `waiting` requests
    fn disposed(&self, _waiting: usize) {}
}

pub type Observer = Arc<dyn StreamObserver + 'static + Sync + Send>;

/// Observer that drops every notification
pub struct NoopObserver;

impl StreamObserver for NoopObserver {}

impl NoopObserver {
    pub fn new() -> Observer {
        Arc::new(NoopObserver)
    }
}

/// Observer that records the notifications as `tracing` events under the given span
pub struct TracingObserver {
    span: Span,
}

impl TracingObserver {

    /// Create a new ARC wrapped observer reporting under `span`
    pub fn new(span: Span) -> Observer {
        Arc::new(TracingObserver { span })
    }
}

impl StreamObserver for TracingObserver {
    fn item_buffered(&self, buffered: usize) {
        tracing::trace!(parent: &self.span, buffered, "item buffered");
    }

    fn cancelled_request_skipped(&self) {
        tracing::debug!(parent: &self.span, "skipped an abandoned pull request");
    }

    fn producer_completed(&self, waiting: usize) {
        tracing::debug!(parent: &self.span, waiting, "producer completed");
    }

    fn producer_failed(&self, error: &dyn Display, waiting: usize) {
        tracing::warn!(parent: &self.span, waiting, "producer failed: {}", error);
    }

    fn disposed(&self, waiting: usize) {
        tracing::debug!(parent: &self.span, waiting, "stream disposed");
    }
}
