use std::sync::{Arc, Mutex};
use std::time::Duration;

use bluetuith::event::EventData;
use bluetuith::eventbus::{EventHandler, Subscription, SUBSCRIBER_CAPACITY};
use bluetuith::*;

fn device(n: u8) -> DeviceData {
    DeviceData {
        address: Address::new([0, 0, 0, 0, 0, n]),
        ..Default::default()
    }
}

#[tokio::test]
async fn slow_subscribers_never_block_publishers() {
    let bus = EventBus::new();
    let mut devices = bus.subscribe::<DeviceData>();

    let publisher = bus.clone();
    let publish = tokio::task::spawn_blocking(move || {
        for n in 0..100 {
            publisher.publish(EventAction::Updated, device(n));
        }
    });
    tokio::time::timeout(Duration::from_secs(5), publish)
        .await
        .expect("publishing blocked")
        .unwrap();

    let mut received = Vec::new();
    while let Some(event) = devices.try_recv() {
        received.push(event.data.address);
    }
    assert_eq!(received.len(), SUBSCRIBER_CAPACITY);
    assert_eq!(received[0], device(0).address);
}

#[tokio::test]
async fn typed_subscribers_only_see_their_kind() {
    let bus = EventBus::new();
    let mut adapters = bus.subscribe::<AdapterData>();
    let mut all = bus.subscribe_kind(EventKind::All);

    bus.publish(EventAction::Added, device(1));
    bus.publish(
        EventAction::Added,
        AdapterData {
            name: "hci0".into(),
            ..Default::default()
        },
    );

    let event = adapters.recv().await.unwrap();
    assert_eq!(event.action, EventAction::Added);
    assert_eq!(event.data.name, "hci0");
    assert!(adapters.try_recv().is_none());

    assert_eq!(all.recv().await.unwrap().kind(), EventKind::Device);
    assert_eq!(all.recv().await.unwrap().kind(), EventKind::Adapter);
}

#[tokio::test]
async fn unsubscribing_twice_is_harmless() {
    let bus = EventBus::new();
    let mut devices = bus.subscribe::<DeviceData>();
    bus.publish(EventAction::Added, device(1));

    devices.unsubscribe();
    devices.unsubscribe();
    assert!(!devices.is_active());

    bus.publish(EventAction::Added, device(2));
    assert_eq!(devices.recv().await.unwrap().data.address, device(1).address);
    assert!(devices.recv().await.is_none());
}

#[tokio::test]
async fn disabled_bus_returns_closed_subscriptions() {
    let bus = EventBus::new();
    bus.disable();

    let mut devices = bus.subscribe::<DeviceData>();
    assert!(!devices.is_active());
    bus.publish(EventAction::Added, device(1));
    assert!(devices.recv().await.is_none());
}

#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<(EventKind, EventAction)>>,
}

struct Recording(Arc<Recorder>);

impl EventHandler for Recording {
    fn publish(&self, kind: EventKind, event: Event<EventData>) {
        self.0.seen.lock().unwrap().push((kind, event.action));
    }

    fn subscribe(&self, _kind: EventKind) -> Subscription {
        Subscription::closed()
    }
}

#[tokio::test]
async fn custom_handlers_receive_every_publication() {
    let recorder = Arc::new(Recorder::default());
    let bus = EventBus::new();
    let clone = bus.clone();
    bus.register_handler(Recording(recorder.clone()));

    clone.publish(EventAction::Removed, device(1));
    clone.publish(
        EventAction::None,
        ErrorEventData {
            name: "timeout".into(),
            ..Default::default()
        },
    );

    assert_eq!(
        *recorder.seen.lock().unwrap(),
        [(EventKind::Device, EventAction::Removed), (EventKind::Error, EventAction::None)]
    );
}
