// SPDX-License-Identifier: Apache-2.0
use std::collections::VecDeque;
use std::fmt::Display;
use std::sync::Arc;
use futures_util::Stream;
use parking_lot::Mutex;
use crate::pubsub::observer::Observer;
use crate::pubsub::pending::{pending, PendingPull, PendingRequest, Pulled};
use crate::pubsub::producer::{subscribe, Subscription};
use crate::pubsub::subscriber::ProducerSubscriber;

/// Lifecycle of an adapter, once it leaves `Active` it never returns
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AdapterState {
    Active,
    Completed,
    Failed,
    Disposed,
}

enum Phase<E> {
    Active,
    Completed,
    Failed(E),
    Disposed,
}

/// Items produced but not yet pulled, and pulls waiting for an item.
/// At most one of the two queues is non-empty at any time.
struct Rendezvous<T, E> {
    phase: Phase<E>,
    buffer: VecDeque<T>,
    requests: VecDeque<PendingRequest<T, E>>,
}

/// State shared between the pulling side and the producer pump
struct PullChannel<T, E> {
    state: Mutex<Rendezvous<T, E>>,
    observer: Observer,
}

impl<T, E> PullChannel<T, E> {

    /// Resolve every waiting request with `outcome`, in registration order
    fn release_requests(requests: VecDeque<PendingRequest<T, E>>, outcome: impl Fn() -> Pulled<T, E>) {
        for request in requests {
            request.resolve(outcome());
        }
    }
}

impl<T, E> ProducerSubscriber<T, E> for PullChannel<T, E>
    where
        E: Clone + Display,
{
    fn on_next(&self, item: T) {
        // Observer calls happen after the lock is released
        let (skipped, buffered) = {
            let mut state = self.state.lock();

            // Nothing is accepted after a terminal signal or a dispose
            if !matches!(state.phase, Phase::Active) {
                return;
            }

            let mut item = item;
            let mut skipped = 0;
            loop {
                match state.requests.pop_front() {
                    Some(request) => match request.offer(item) {
                        Ok(()) => break (skipped, None),
                        Err(returned) => {
                            skipped += 1;
                            item = returned;
                        }
                    },
                    None => {
                        state.buffer.push_back(item);
                        break (skipped, Some(state.buffer.len()));
                    }
                }
            }
        };

        for _ in 0..skipped {
            self.observer.cancelled_request_skipped();
        }
        if let Some(buffered) = buffered {
            self.observer.item_buffered(buffered);
        }
    }

    fn on_error(&self, error: E) {
        let requests = {
            let mut state = self.state.lock();
            if !matches!(state.phase, Phase::Active) {
                return;
            }

            state.phase = Phase::Failed(error.clone());
            std::mem::take(&mut state.requests)
        };

        self.observer.producer_failed(&error, requests.len());
        Self::release_requests(requests, || Pulled::Failed(error.clone()));
    }

    fn on_complete(&self) {
        let requests = {
            let mut state = self.state.lock();
            if !matches!(state.phase, Phase::Active) {
                return;
            }

            state.phase = Phase::Completed;
            std::mem::take(&mut state.requests)
        };

        self.observer.producer_completed(requests.len());
        Self::release_requests(requests, || Pulled::EndOfStream);
    }
}

/// Turns a push producer into a sequence of pulls
///
/// Items are handed out in production order, each to exactly one pull. Items that arrive
/// while nobody is pulling are buffered, pulls issued while nothing is buffered wait for
/// the next item. A pull abandoned before it is resolved is skipped, the item goes to the
/// next pull in line instead.
pub struct PushPullAdapter<T, E> {
    channel: Arc<PullChannel<T, E>>,
    subscription: Mutex<Option<Subscription>>,
}

impl<T, E> PushPullAdapter<T, E>
    where
        T: Send + 'static,
        E: Clone + Display + Send + 'static,
{

    /// Bind a new adapter to `producer`, driving it on the current tokio runtime
    pub fn subscribe<S>(producer: S, observer: Observer) -> PushPullAdapter<T, E>
        where
            S: Stream<Item = Result<T, E>> + Send + 'static,
    {
        let adapter = PushPullAdapter::new(observer);
        let subscription = subscribe(producer, adapter.channel.clone());
        *adapter.subscription.lock() = Some(subscription);
        adapter
    }

    fn new(observer: Observer) -> PushPullAdapter<T, E> {
        PushPullAdapter {
            channel: Arc::new(PullChannel {
                state: Mutex::new(Rendezvous {
                    phase: Phase::Active,
                    buffer: VecDeque::new(),
                    requests: VecDeque::new(),
                }),
                observer,
            }),
            subscription: Mutex::new(None),
        }
    }

    /// Ask for the next item
    ///
    /// Never fails by itself: the returned pull resolves with the next item, the end of the
    /// stream, or the failure that terminated the producer.
    pub fn request_next(&self) -> PendingPull<T, E> {
        let (request, pull) = pending();
        let mut guard = self.channel.state.lock();
        let state = &mut *guard;

        // Buffered items are served first, even after the producer failed
        if let Some(item) = state.buffer.pop_front() {
            // The pull was created just above, it cannot have been abandoned yet
            let _ = request.offer(item);
            return pull;
        }

        match &state.phase {
            Phase::Active => {
                state.requests.retain(|waiting| !waiting.is_abandoned());
                state.requests.push_back(request);
            }
            Phase::Completed | Phase::Disposed => request.resolve(Pulled::EndOfStream),
            Phase::Failed(error) => request.resolve(Pulled::Failed(error.clone())),
        }

        pull
    }
}

impl<T, E> PushPullAdapter<T, E> {

    /// Release the producer and end every waiting pull
    ///
    /// Items already buffered can still be pulled, once they are drained every pull yields
    /// the end of the stream. Calling it again has no effect.
    pub fn dispose(&self) {
        let requests = {
            let mut state = self.channel.state.lock();
            if matches!(state.phase, Phase::Disposed) {
                return;
            }
            state.phase = Phase::Disposed;
            std::mem::take(&mut state.requests)
        };

        if let Some(subscription) = self.subscription.lock().take() {
            subscription.cancel();
        }

        self.channel.observer.disposed(requests.len());
        PullChannel::release_requests(requests, || Pulled::EndOfStream);
    }

    /// Current lifecycle state
    pub fn state(&self) -> AdapterState {
        match self.channel.state.lock().phase {
            Phase::Active => AdapterState::Active,
            Phase::Completed => AdapterState::Completed,
            Phase::Failed(_) => AdapterState::Failed,
            Phase::Disposed => AdapterState::Disposed,
        }
    }

    /// Number of items produced but not pulled yet
    pub fn buffered(&self) -> usize {
        self.channel.state.lock().buffer.len()
    }

    /// Number of queued pulls, including abandoned ones not pruned yet
    pub fn waiting(&self) -> usize {
        self.channel.state.lock().requests.len()
    }
}

impl<T, E> Drop for PushPullAdapter<T, E> {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod test {
    use std::fmt::Display;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use futures::stream;
    use tokio::sync::mpsc;
    use tokio_stream::wrappers::UnboundedReceiverStream;
    use crate::pubsub::adapter::{AdapterState, PushPullAdapter};
    use crate::pubsub::observer::{NoopObserver, Observer, StreamObserver};
    use crate::pubsub::pending::Pulled;
    use crate::pubsub::subscriber::ProducerSubscriber;

    type Adapter = PushPullAdapter<&'static str, String>;

    fn adapter() -> Adapter {
        PushPullAdapter::new(NoopObserver::new())
    }

    /// Drive the adapter through its producer callbacks directly
    fn producer(adapter: &Adapter) -> &dyn ProducerSubscriber<&'static str, String> {
        adapter.channel.as_ref()
    }

    #[derive(Default)]
    struct Counting {
        skipped: AtomicUsize,
        failed: AtomicUsize,
        disposed: AtomicUsize,
    }

    impl StreamObserver for Counting {
        fn cancelled_request_skipped(&self) {
            self.skipped.fetch_add(1, Ordering::SeqCst);
        }

        fn producer_failed(&self, _error: &dyn Display, _waiting: usize) {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }

        fn disposed(&self, _waiting: usize) {
            self.disposed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn buffered_items_are_pulled_in_order() {
        let adapter = adapter();
        producer(&adapter).on_next("A");
        producer(&adapter).on_next("B");
        producer(&adapter).on_complete();

        assert_eq!(Pulled::Item("A"), adapter.request_next().await);
        assert_eq!(Pulled::Item("B"), adapter.request_next().await);
        assert_eq!(Pulled::EndOfStream, adapter.request_next().await);
        assert_eq!(Pulled::EndOfStream, adapter.request_next().await);
    }

    #[tokio::test]
    async fn waiting_pulls_are_resolved_in_registration_order() {
        let adapter = adapter();
        let mut first = adapter.request_next();
        let mut second = adapter.request_next();
        assert!(futures::poll!(&mut first).is_pending());
        assert!(futures::poll!(&mut second).is_pending());
        assert_eq!(2, adapter.waiting());

        producer(&adapter).on_next("A");
        producer(&adapter).on_next("B");

        assert_eq!(Pulled::Item("A"), first.await);
        assert_eq!(Pulled::Item("B"), second.await);
        assert_eq!(0, adapter.buffered());
        assert_eq!(0, adapter.waiting());
    }

    #[tokio::test]
    async fn cancelled_pull_is_skipped() {
        let observer = Arc::new(Counting::default());
        let adapter: Adapter = PushPullAdapter::new(observer.clone());

        let _ = adapter.request_next().cancel();
        producer(&adapter).on_next("A");

        assert_eq!(1, observer.skipped.load(Ordering::SeqCst));
        assert_eq!(1, adapter.buffered());
        assert_eq!(0, adapter.waiting());
        assert_eq!(Pulled::Item("A"), adapter.request_next().await);
    }

    #[tokio::test]
    async fn item_goes_to_the_next_live_pull() {
        let adapter = adapter();
        let abandoned = adapter.request_next();
        let live = adapter.request_next();
        drop(abandoned);

        producer(&adapter).on_next("A");

        assert_eq!(Pulled::Item("A"), live.await);
        assert_eq!(0, adapter.buffered());
    }

    #[tokio::test]
    async fn timed_out_pull_does_not_swallow_the_item() {
        let adapter = adapter();
        let timed_out = tokio::time::timeout(Duration::from_millis(10), adapter.request_next()).await;
        assert!(timed_out.is_err());

        producer(&adapter).on_next("A");
        assert_eq!(Pulled::Item("A"), adapter.request_next().await);
    }

    #[tokio::test]
    async fn abandoned_pulls_are_pruned_on_registration() {
        let adapter = adapter();
        let _ = adapter.request_next().cancel();
        let _ = adapter.request_next().cancel();
        let _live = adapter.request_next();
        assert_eq!(1, adapter.waiting());
    }

    #[tokio::test]
    async fn buffered_items_drain_before_the_failure() {
        let observer = Arc::new(Counting::default());
        let adapter: Adapter = PushPullAdapter::new(observer.clone());
        producer(&adapter).on_next("A");
        producer(&adapter).on_error("disk on fire".to_string());

        assert_eq!(AdapterState::Failed, adapter.state());
        assert_eq!(1, observer.failed.load(Ordering::SeqCst));
        assert_eq!(Pulled::Item("A"), adapter.request_next().await);
        assert_eq!(Pulled::Failed("disk on fire".to_string()), adapter.request_next().await);
        assert_eq!(Pulled::Failed("disk on fire".to_string()), adapter.request_next().await);
    }

    #[tokio::test]
    async fn failure_reaches_every_waiting_pull() {
        let adapter = adapter();
        let first = adapter.request_next();
        let second = adapter.request_next();
        producer(&adapter).on_error("broken pipe".to_string());

        assert_eq!(Pulled::Failed("broken pipe".to_string()), first.await);
        assert_eq!(Pulled::Failed("broken pipe".to_string()), second.await);
    }

    #[tokio::test]
    async fn completion_ends_every_waiting_pull() {
        let adapter = adapter();
        let first = adapter.request_next();
        let second = adapter.request_next();
        producer(&adapter).on_complete();

        assert_eq!(AdapterState::Completed, adapter.state());
        assert_eq!(Pulled::EndOfStream, first.await);
        assert_eq!(Pulled::EndOfStream, second.await);
    }

    #[tokio::test]
    async fn nothing_is_accepted_after_termination() {
        let adapter = adapter();
        producer(&adapter).on_complete();
        producer(&adapter).on_next("late");
        producer(&adapter).on_error("late".to_string());

        assert_eq!(AdapterState::Completed, adapter.state());
        assert_eq!(0, adapter.buffered());
        assert_eq!(Pulled::EndOfStream, adapter.request_next().await);
    }

    #[tokio::test]
    async fn dispose_ends_waiting_pulls_once() {
        let observer = Arc::new(Counting::default());
        let adapter: Adapter = PushPullAdapter::new(observer.clone());
        let waiting = adapter.request_next();

        adapter.dispose();
        adapter.dispose();

        assert_eq!(1, observer.disposed.load(Ordering::SeqCst));
        assert_eq!(AdapterState::Disposed, adapter.state());
        assert_eq!(Pulled::EndOfStream, waiting.await);
        assert_eq!(Pulled::EndOfStream, adapter.request_next().await);
    }

    #[tokio::test]
    async fn dispose_keeps_buffered_items_pullable() {
        let adapter = adapter();
        producer(&adapter).on_next("A");
        producer(&adapter).on_next("B");
        adapter.dispose();

        assert_eq!(AdapterState::Disposed, adapter.state());
        assert_eq!(2, adapter.buffered());
        assert_eq!(Pulled::Item("A"), adapter.request_next().await);
        assert_eq!(Pulled::Item("B"), adapter.request_next().await);
        assert_eq!(Pulled::EndOfStream, adapter.request_next().await);

        // Nothing produced after the dispose is accepted
        producer(&adapter).on_next("C");
        assert_eq!(Pulled::EndOfStream, adapter.request_next().await);
    }

    /// Observer that reads the adapter state back on every notification
    struct Reentrant {
        adapter: parking_lot::Mutex<Option<Arc<Adapter>>>,
        seen: AtomicUsize,
    }

    impl Reentrant {
        fn inspect(&self) {
            if let Some(adapter) = self.adapter.lock().as_ref() {
                let _ = adapter.buffered();
                let _ = adapter.waiting();
                let _ = adapter.state();
                self.seen.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    impl StreamObserver for Reentrant {
        fn item_buffered(&self, _buffered: usize) {
            self.inspect();
        }

        fn cancelled_request_skipped(&self) {
            self.inspect();
        }

        fn producer_completed(&self, _waiting: usize) {
            self.inspect();
        }

        fn producer_failed(&self, _error: &dyn Display, _waiting: usize) {
            self.inspect();
        }
    }

    #[tokio::test]
    async fn observer_may_call_back_into_the_adapter() {
        let observer = Arc::new(Reentrant { adapter: parking_lot::Mutex::new(None), seen: AtomicUsize::new(0) });
        let adapter: Arc<Adapter> = Arc::new(PushPullAdapter::new(observer.clone()));
        *observer.adapter.lock() = Some(adapter.clone());

        let _ = adapter.request_next().cancel();
        producer(&adapter).on_next("A");
        producer(&adapter).on_complete();

        // skipped + buffered + completed
        assert_eq!(3, observer.seen.load(Ordering::SeqCst));
        assert_eq!(Pulled::Item("A"), adapter.request_next().await);

        // Break the cycle between the adapter and its observer
        observer.adapter.lock().take();
    }

    #[tokio::test]
    async fn observer_sees_the_failure_without_deadlocking() {
        let observer = Arc::new(Reentrant { adapter: parking_lot::Mutex::new(None), seen: AtomicUsize::new(0) });
        let adapter: Arc<Adapter> = Arc::new(PushPullAdapter::new(observer.clone()));
        *observer.adapter.lock() = Some(adapter.clone());

        let waiting = adapter.request_next();
        producer(&adapter).on_error("boom".to_string());

        assert_eq!(1, observer.seen.load(Ordering::SeqCst));
        assert_eq!(Pulled::Failed("boom".to_string()), waiting.await);
        observer.adapter.lock().take();
    }

    #[tokio::test]
    async fn dispose_after_completion_keeps_ending_the_stream() {
        let adapter = adapter();
        producer(&adapter).on_complete();
        adapter.dispose();
        assert_eq!(AdapterState::Disposed, adapter.state());
        assert_eq!(Pulled::EndOfStream, adapter.request_next().await);
    }

    #[tokio::test]
    async fn dropping_the_adapter_releases_waiting_pulls() {
        let adapter = adapter();
        let waiting = adapter.request_next();
        drop(adapter);
        assert_eq!(Pulled::EndOfStream, waiting.await);
    }

    #[tokio::test]
    async fn subscribed_producer_is_pulled_to_the_end() {
        let producer = stream::iter(vec![Ok::<u32, String>(1), Ok(2), Ok(3)]);
        let adapter = PushPullAdapter::subscribe(producer, NoopObserver::new());

        assert_eq!(Pulled::Item(1), adapter.request_next().await);
        assert_eq!(Pulled::Item(2), adapter.request_next().await);
        assert_eq!(Pulled::Item(3), adapter.request_next().await);
        assert_eq!(Pulled::EndOfStream, adapter.request_next().await);
    }

    #[tokio::test]
    async fn dispose_stops_the_producer() {
        let (sender, receiver) = mpsc::unbounded_channel::<Result<u32, String>>();
        let adapter = PushPullAdapter::subscribe(UnboundedReceiverStream::new(receiver), NoopObserver::new());

        sender.send(Ok(1)).expect("producer is subscribed");
        assert_eq!(Pulled::Item(1), adapter.request_next().await);

        adapter.dispose();

        // The pump task is aborted, dropping the receiving end of the producer
        while !sender.is_closed() {
            tokio::task::yield_now().await;
        }
        assert_eq!(Pulled::EndOfStream, adapter.request_next().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_production_and_consumption_keeps_order() {
        let total = 10_000u32;
        let (sender, receiver) = mpsc::unbounded_channel::<Result<u32, String>>();
        let observer: Observer = NoopObserver::new();
        let adapter = Arc::new(PushPullAdapter::subscribe(UnboundedReceiverStream::new(receiver), observer));

        let produce = tokio::spawn(async move {
            for i in 0..total {
                sender.send(Ok(i)).expect("producer is subscribed");
                if i % 100 == 0 {
                    tokio::task::yield_now().await;
                }
            }
        });

        let consumer = adapter.clone();
        let consume = tokio::spawn(async move {
            let mut received = Vec::with_capacity(total as usize);
            loop {
                match consumer.request_next().await {
                    Pulled::Item(i) => received.push(i),
                    Pulled::EndOfStream => return received,
                    Pulled::Failed(e) => panic!("unexpected failure {}", e),
                }
            }
        });

        produce.await.expect("producer panicked");
        let received = consume.await.expect("consumer panicked");
        assert_eq!((0..total).collect::<Vec<_>>(), received);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_cancellations_never_lose_items() {
        let total = 2_000u32;
        let (sender, receiver) = mpsc::unbounded_channel::<Result<u32, String>>();
        let adapter = Arc::new(PushPullAdapter::subscribe(UnboundedReceiverStream::new(receiver), NoopObserver::new()));

        let produce = tokio::spawn(async move {
            for i in 0..total {
                sender.send(Ok(i)).expect("producer is subscribed");
                tokio::task::yield_now().await;
            }
        });

        let mut received = Vec::with_capacity(total as usize);
        loop {
            // Every other pull is abandoned straight away, an outcome that won the race is kept
            let raced = adapter.request_next().cancel();
            let outcome = match raced {
                Some(outcome) => outcome,
                None => adapter.request_next().await,
            };
            match outcome {
                Pulled::Item(i) => received.push(i),
                Pulled::EndOfStream => break,
                Pulled::Failed(e) => panic!("unexpected failure {}", e),
            }
        }

        produce.await.expect("producer panicked");
        assert_eq!((0..total).collect::<Vec<_>>(), received);
    }
}
