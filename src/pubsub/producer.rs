// SPDX-License-Identifier: Apache-2.0
use futures_util::{pin_mut, Stream, StreamExt as _};
use tokio::task::AbortHandle;
use crate::pubsub::subscriber::Subscriber;

/// Handle on a running producer pump
pub struct Subscription {
    handle: AbortHandle,
}

impl Subscription {

    /// Stop forwarding the producer, dropping the producer itself
    pub fn cancel(self) {
        self.handle.abort();
    }

    /// Whether the pump is done, either because the producer terminated or it was cancelled
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Subscribe `subscriber` to `producer`
///
/// The producer is driven on its own tokio task, every emission is forwarded to the
/// subscriber as soon as it is available. The first `Err` terminates the subscription.
/// Must be called from within a tokio runtime.
pub fn subscribe<S, T, E>(producer: S, subscriber: Subscriber<T, E>) -> Subscription
    where
        S: Stream<Item = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
{
    let handle = tokio::spawn(async move {
        pin_mut!(producer);

        while let Some(next) = producer.next().await {
            match next {
                Ok(item) => subscriber.on_next(item),
                Err(e) => {
                    subscriber.on_error(e);
                    return;
                }
            }
        }

        subscriber.on_complete();
    });

    Subscription {
        handle: handle.abort_handle()
    }
}
