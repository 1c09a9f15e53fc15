//! A replaceable publish/subscribe hub for session events.
//!
//! Every subscriber owns a bounded queue. Publishing never blocks: an event is dropped for a subscriber whose queue
//! is full.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use std::task::{Context, Poll};

use futures_core::Stream;
use once_cell::sync::Lazy;
use tokio::sync::mpsc;
use tracing::trace;

use crate::event::{Event, EventAction, EventData, EventKind, EventPayload};

/// The number of events buffered for each subscriber.
pub const SUBSCRIBER_CAPACITY: usize = 10;

/// The backing implementation of an [`EventBus`].
pub trait EventHandler: Send + Sync + 'static {
    /// Delivers `event` to the subscribers of `kind`. Must not block.
    fn publish(&self, kind: EventKind, event: Event<EventData>);

    /// Creates a subscription to `kind`.
    fn subscribe(&self, kind: EventKind) -> Subscription;
}

/// A live subscription to an event topic.
///
/// The subscription is released when it is dropped or [`unsubscribe`][Subscription::unsubscribe] is called.
pub struct Subscription {
    receiver: mpsc::Receiver<Event<EventData>>,
    active: bool,
    unsubscribe: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("active", &self.active).finish()
    }
}

impl Subscription {
    /// Creates a subscription from a receiver and the function that releases it.
    pub fn new(receiver: mpsc::Receiver<Event<EventData>>, unsubscribe: impl FnOnce() + Send + Sync + 'static) -> Self {
        Subscription {
            receiver,
            active: true,
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    /// A subscription that never receives anything.
    pub fn closed() -> Self {
        let (_, receiver) = mpsc::channel(1);
        Subscription {
            receiver,
            active: false,
            unsubscribe: None,
        }
    }

    /// Whether this subscription can ever receive events.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Waits for the next event. Returns `None` once the subscription is closed and drained.
    pub async fn recv(&mut self) -> Option<Event<EventData>> {
        self.receiver.recv().await
    }

    /// Returns the next buffered event without waiting.
    pub fn try_recv(&mut self) -> Option<Event<EventData>> {
        self.receiver.try_recv().ok()
    }

    /// Releases the subscription. Events already buffered can still be received. Calling this more than once has
    /// no effect.
    pub fn unsubscribe(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
        self.active = false;
        self.receiver.close();
    }

    fn poll_recv(&mut self, cx: &mut Context<'_>) -> Poll<Option<Event<EventData>>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl Stream for Subscription {
    type Item = Event<EventData>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().poll_recv(cx)
    }
}

/// A subscription to events with payload `T`.
pub struct Subscriber<T> {
    inner: Subscription,
    _payload: PhantomData<fn() -> T>,
}

impl<T> std::fmt::Debug for Subscriber<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Subscriber").field(&self.inner).finish()
    }
}

impl<T: EventPayload> Subscriber<T> {
    fn new(inner: Subscription) -> Self {
        Subscriber {
            inner,
            _payload: PhantomData,
        }
    }

    /// Whether this subscription can ever receive events.
    pub fn is_active(&self) -> bool {
        self.inner.is_active()
    }

    /// Waits for the next event. Returns `None` once the subscription is closed and drained.
    pub async fn recv(&mut self) -> Option<Event<T>> {
        loop {
            if let Some(event) = self.inner.recv().await?.downcast() {
                return Some(event);
            }
        }
    }

    /// Returns the next buffered event of this payload without waiting.
    pub fn try_recv(&mut self) -> Option<Event<T>> {
        while let Some(event) = self.inner.try_recv() {
            if let Some(event) = event.downcast() {
                return Some(event);
            }
        }
        None
    }

    /// Releases the subscription. Calling this more than once has no effect.
    pub fn unsubscribe(&mut self) {
        self.inner.unsubscribe();
    }
}

impl<T: EventPayload> Stream for Subscriber<T> {
    type Item = Event<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match this.inner.poll_recv(cx) {
                Poll::Ready(Some(event)) => {
                    if let Some(event) = event.downcast() {
                        return Poll::Ready(Some(event));
                    }
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

type Sender = mpsc::Sender<Event<EventData>>;

#[derive(Default)]
struct Topics {
    next_id: u64,
    subscribers: HashMap<EventKind, Vec<(u64, Sender)>>,
}

impl Topics {
    fn deliver(&mut self, kind: EventKind, event: &Event<EventData>) {
        let Some(subscribers) = self.subscribers.get_mut(&kind) else {
            return;
        };

        subscribers.retain(|(id, sender)| match sender.try_send(event.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                trace!(subscriber = id, %kind, "subscriber queue full, dropping event");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }
}

/// The default in-process event handler.
#[derive(Clone, Default)]
pub struct DefaultHandler {
    topics: Arc<Mutex<Topics>>,
}

impl DefaultHandler {
    /// Creates a handler with no subscribers.
    pub fn new() -> Self {
        Default::default()
    }
}

impl std::fmt::Debug for DefaultHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultHandler").finish_non_exhaustive()
    }
}

impl EventHandler for DefaultHandler {
    fn publish(&self, kind: EventKind, event: Event<EventData>) {
        let mut topics = self.topics.lock().unwrap_or_else(PoisonError::into_inner);
        topics.deliver(kind, &event);
        if kind != EventKind::All {
            topics.deliver(EventKind::All, &event);
        }
    }

    fn subscribe(&self, kind: EventKind) -> Subscription {
        let (sender, receiver) = mpsc::channel(SUBSCRIBER_CAPACITY);

        let id = {
            let mut topics = self.topics.lock().unwrap_or_else(PoisonError::into_inner);
            let id = topics.next_id;
            topics.next_id += 1;
            topics.subscribers.entry(kind).or_default().push((id, sender));
            id
        };

        let topics: Weak<Mutex<Topics>> = Arc::downgrade(&self.topics);
        Subscription::new(receiver, move || {
            if let Some(topics) = topics.upgrade() {
                let mut topics = topics.lock().unwrap_or_else(PoisonError::into_inner);
                if let Some(subscribers) = topics.subscribers.get_mut(&kind) {
                    subscribers.retain(|(x, _)| *x != id);
                }
            }
        })
    }
}

/// An event handler that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NilHandler;

impl EventHandler for NilHandler {
    fn publish(&self, _kind: EventKind, _event: Event<EventData>) {}

    fn subscribe(&self, _kind: EventKind) -> Subscription {
        Subscription::closed()
    }
}

static GLOBAL: Lazy<EventBus> = Lazy::new(EventBus::new);

/// A handle to an event hub. Clones share the same hub.
#[derive(Clone)]
pub struct EventBus {
    handler: Arc<RwLock<Arc<dyn EventHandler>>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus").finish_non_exhaustive()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        EventBus::new()
    }
}

impl EventBus {
    /// Creates a hub backed by a [`DefaultHandler`].
    pub fn new() -> Self {
        EventBus::with_handler(DefaultHandler::new())
    }

    /// Creates a hub backed by `handler`.
    pub fn with_handler(handler: impl EventHandler) -> Self {
        EventBus {
            handler: Arc::new(RwLock::new(Arc::new(handler))),
        }
    }

    /// Creates a hub that discards every event.
    pub fn disabled() -> Self {
        EventBus::with_handler(NilHandler)
    }

    /// The process-wide hub.
    pub fn global() -> &'static EventBus {
        &GLOBAL
    }

    /// Replaces the handler for this hub and all of its clones. Existing subscriptions stay attached to the old
    /// handler.
    pub fn register_handler(&self, handler: impl EventHandler) {
        *self.handler.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(handler);
    }

    /// Swaps in a [`NilHandler`].
    pub fn disable(&self) {
        self.register_handler(NilHandler);
    }

    fn handler(&self) -> Arc<dyn EventHandler> {
        self.handler.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Publishes a typed event.
    pub fn publish<T: EventPayload>(&self, action: EventAction, data: T) {
        self.publish_event(Event::new(action, data.into_data()));
    }

    /// Publishes an event under the topic of its payload.
    pub fn publish_event(&self, event: Event<EventData>) {
        self.handler().publish(event.kind(), event);
    }

    /// Subscribes to events with payload `T`.
    pub fn subscribe<T: EventPayload>(&self) -> Subscriber<T> {
        Subscriber::new(self.handler().subscribe(T::KIND))
    }

    /// Subscribes to a topic. [`EventKind::All`] receives every event.
    pub fn subscribe_kind(&self, kind: EventKind) -> Subscription {
        self.handler().subscribe(kind)
    }
}
