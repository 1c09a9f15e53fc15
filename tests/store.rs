use std::sync::Arc;
use std::time::Duration;

use bluetuith::error::ErrorKind;
use bluetuith::*;

fn address(n: u8) -> Address {
    Address::new([0x10, 0, 0, 0, 0, n])
}

#[tokio::test]
async fn reads_wait_for_hydration() {
    let store = Arc::new(SessionStore::new());
    store.wait_initialize();

    let reader = {
        let store = store.clone();
        tokio::spawn(async move { store.adapters().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!reader.is_finished());

    store.add_adapter(AdapterData {
        address: address(1),
        ..Default::default()
    });
    store.add_adapter(AdapterData {
        address: address(2),
        ..Default::default()
    });
    store.done_initialize();

    let adapters = tokio::time::timeout(Duration::from_secs(5), reader).await.unwrap().unwrap();
    assert_eq!(adapters.len(), 2);
}

#[tokio::test]
async fn concurrent_updates_are_not_lost() {
    let store = Arc::new(SessionStore::new());
    store.done_initialize();
    store.add_device(DeviceData {
        address: address(1),
        ..Default::default()
    });

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move {
                for _ in 0..50 {
                    store
                        .update_device(address(1), |device| {
                            device.rssi += 1;
                            Ok(())
                        })
                        .unwrap();
                }
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(store.device(address(1)).await.unwrap().rssi, 400);
}

#[tokio::test]
async fn updates_to_unknown_addresses_fail() {
    let store = SessionStore::new();
    store.done_initialize();

    let err = store.update_adapter(address(9), |_| Ok(())).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AdapterNotFound);
    assert_eq!(err.address(), Some(address(9)));

    let err = store.update_device(address(9), |_| Ok(())).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DeviceNotFound);
    assert_eq!(store.device(address(9)).await.unwrap_err().kind(), ErrorKind::DeviceNotFound);
}

#[tokio::test]
async fn devices_are_listed_per_adapter() {
    let store = SessionStore::new();
    store.done_initialize();
    store.add_adapter(AdapterData {
        address: address(1),
        ..Default::default()
    });
    for n in [7, 5, 6] {
        store.add_device(DeviceData {
            address: address(n),
            associated_adapter: if n == 6 { address(2) } else { address(1) },
            ..Default::default()
        });
    }

    let devices = store.adapter_devices(address(1)).await.unwrap();
    assert_eq!(
        devices.iter().map(|x| x.address).collect::<Vec<_>>(),
        [address(5), address(7)]
    );
    assert_eq!(
        store.adapter_devices(address(2)).await.unwrap_err().kind(),
        ErrorKind::AdapterNotFound
    );

    store.clear();
    assert!(store.devices().await.is_empty());
}
