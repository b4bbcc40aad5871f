// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;

/// Receiver side of a push producer
///
/// The producer calls `on_next` zero or more times, followed by exactly one of
/// `on_error` or `on_complete`, and nothing after that.
pub trait ProducerSubscriber<T, E> {
    /// A new item is available
    fn on_next(&self, item: T);

    /// The producer terminated with a failure
    fn on_error(&self, error: E);

    /// The producer terminated normally
    fn on_complete(&self);
}

pub type Subscriber<T, E> = Arc<dyn ProducerSubscriber<T, E> + 'static + Sync + Send>;
