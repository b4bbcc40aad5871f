// SPDX-License-Identifier: Apache-2.0
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Outcome of a single pull
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pulled<T, E> {
    /// The next item in production order
    Item(T),

    /// The stream has no more items
    EndOfStream,

    /// The producer failed, the failure is the one it emitted
    Failed(E),
}

/// Adapter side of an outstanding pull
pub(crate) struct PendingRequest<T, E> {
    sender: oneshot::Sender<Pulled<T, E>>,
}

/// Create a connected request/pull pair
pub(crate) fn pending<T, E>() -> (PendingRequest<T, E>, PendingPull<T, E>) {
    let (sender, receiver) = oneshot::channel();
    (PendingRequest { sender }, PendingPull { receiver })
}

impl<T, E> PendingRequest<T, E> {

    /// Whether the caller abandoned the pull
    pub fn is_abandoned(&self) -> bool {
        self.sender.is_closed()
    }

    /// Offer an item to the caller, handing it back if the pull was abandoned
    pub fn offer(self, item: T) -> Result<(), T> {
        match self.sender.send(Pulled::Item(item)) {
            Ok(()) => Ok(()),
            Err(Pulled::Item(item)) => Err(item),
            // send returns exactly the value it was given
            Err(_) => Ok(()),
        }
    }

    /// Resolve with a terminal outcome, an abandoned pull simply drops it
    pub fn resolve(self, outcome: Pulled<T, E>) {
        let _ = self.sender.send(outcome);
    }
}

/// Caller side of an outstanding pull
///
/// Resolves exactly once. Dropping it, or calling [`PendingPull::cancel`], abandons the
/// request: the adapter will never deliver an item to it and passes the item on to the
/// next request instead.
#[must_use = "a pull does nothing unless awaited, dropping it abandons the request"]
pub struct PendingPull<T, E> {
    receiver: oneshot::Receiver<Pulled<T, E>>,
}

impl<T, E> PendingPull<T, E> {

    /// Abandon the request
    ///
    /// Returns the outcome if the adapter resolved the pull before the cancellation took
    /// effect, so a racing item is never silently dropped.
    pub fn cancel(mut self) -> Option<Pulled<T, E>> {
        self.receiver.close();
        self.receiver.try_recv().ok()
    }
}

impl<T, E> Future for PendingPull<T, E> {
    type Output = Pulled<T, E>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            // The adapter went away without resolving us
            Poll::Ready(Err(_)) => Poll::Ready(Pulled::EndOfStream),
            Poll::Pending => Poll::Pending,
        }
    }
}
