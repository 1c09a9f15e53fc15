//! The session's cache of adapters and devices.

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::watch;

use crate::error::ErrorKind;
use crate::types::{AdapterData, DeviceData};
use crate::{Address, Error, Result};

/// A concurrent cache of adapters and devices keyed by hardware address.
///
/// Reads wait until the first full hydration has finished (see [`SessionStore::done_initialize`]), so callers never
/// observe a partially populated store.
#[derive(Debug)]
pub struct SessionStore {
    adapters: DashMap<Address, AdapterData>,
    devices: DashMap<Address, DeviceData>,
    initialized: watch::Sender<bool>,
}

impl Default for SessionStore {
    fn default() -> Self {
        SessionStore::new()
    }
}

impl SessionStore {
    /// Creates an empty store. Reads block until [`done_initialize`][SessionStore::done_initialize] is called.
    pub fn new() -> Self {
        SessionStore {
            adapters: DashMap::new(),
            devices: DashMap::new(),
            initialized: watch::Sender::new(false),
        }
    }

    /// Marks the start of a hydration pass. Reads issued from now on wait for it to complete.
    pub fn wait_initialize(&self) {
        self.initialized.send_replace(false);
    }

    /// Marks the end of a hydration pass and releases every waiting reader.
    pub fn done_initialize(&self) {
        self.initialized.send_replace(true);
    }

    /// Whether the first hydration pass has completed.
    pub fn is_initialized(&self) -> bool {
        *self.initialized.borrow()
    }

    /// Returns a guard that calls [`done_initialize`][SessionStore::done_initialize] when dropped, so that a failed
    /// hydration cannot leave readers blocked.
    pub(crate) fn hydrating(&self) -> HydrationGuard<'_> {
        self.wait_initialize();
        HydrationGuard(self)
    }

    /// Completes once the current hydration pass has finished.
    pub(crate) async fn initialized(&self) {
        let mut rx = self.initialized.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|done| *done).await;
    }

    /// Inserts or replaces an adapter.
    pub fn add_adapter(&self, adapter: AdapterData) {
        self.adapters.insert(adapter.address, adapter);
    }

    /// Removes an adapter, returning its last known state.
    pub fn remove_adapter(&self, address: Address) -> Option<AdapterData> {
        self.adapters.remove(&address).map(|(_, v)| v)
    }

    /// Applies `merge` to the adapter at `address` and returns the merged value.
    ///
    /// The merge runs on a copy while holding exclusive access to the entry. The entry is only replaced if `merge`
    /// succeeds. Fails with [`ErrorKind::AdapterNotFound`] if no such adapter is cached.
    pub fn update_adapter<F>(&self, address: Address, merge: F) -> Result<AdapterData>
    where
        F: FnOnce(&mut AdapterData) -> Result<()>,
    {
        let mut entry = self
            .adapters
            .get_mut(&address)
            .ok_or_else(|| Error::from(ErrorKind::AdapterNotFound).with_address(address))?;

        let mut merged = entry.clone();
        merge(&mut merged)?;
        merged.address = address;
        *entry = merged.clone();
        Ok(merged)
    }

    /// All cached adapters, ordered by address.
    pub async fn adapters(&self) -> Vec<AdapterData> {
        self.initialized().await;
        let mut adapters: Vec<_> = self.adapters.iter().map(|x| x.value().clone()).collect();
        adapters.sort_by_key(|x| x.address);
        adapters
    }

    /// The cached adapter at `address`.
    pub async fn adapter(&self, address: Address) -> Result<AdapterData> {
        self.initialized().await;
        self.adapter_now(address)
    }

    pub(crate) fn adapter_now(&self, address: Address) -> Result<AdapterData> {
        self.adapters
            .get(&address)
            .map(|x| x.value().clone())
            .ok_or_else(|| Error::from(ErrorKind::AdapterNotFound).with_address(address))
    }

    /// Inserts or replaces a device.
    pub fn add_device(&self, device: DeviceData) {
        self.devices.insert(device.address, device);
    }

    /// Removes a device, returning its last known state.
    pub fn remove_device(&self, address: Address) -> Option<DeviceData> {
        self.devices.remove(&address).map(|(_, v)| v)
    }

    /// Applies `merge` to the device at `address` and returns the merged value.
    ///
    /// See [`update_adapter`][SessionStore::update_adapter]. Fails with [`ErrorKind::DeviceNotFound`] if no such
    /// device is cached.
    pub fn update_device<F>(&self, address: Address, merge: F) -> Result<DeviceData>
    where
        F: FnOnce(&mut DeviceData) -> Result<()>,
    {
        let mut entry = self
            .devices
            .get_mut(&address)
            .ok_or_else(|| Error::from(ErrorKind::DeviceNotFound).with_address(address))?;

        let mut merged = entry.clone();
        merge(&mut merged)?;
        merged.address = address;
        *entry = merged.clone();
        Ok(merged)
    }

    /// All cached devices, ordered by address.
    pub async fn devices(&self) -> Vec<DeviceData> {
        self.initialized().await;
        let mut devices: Vec<_> = self.devices.iter().map(|x| x.value().clone()).collect();
        devices.sort_by_key(|x| x.address);
        devices
    }

    /// The cached devices known to the adapter at `adapter`, ordered by address.
    pub async fn adapter_devices(&self, adapter: Address) -> Result<Vec<DeviceData>> {
        self.initialized().await;
        if !self.adapters.contains_key(&adapter) {
            return Err(Error::from(ErrorKind::AdapterNotFound).with_address(adapter));
        }

        let mut devices: Vec<_> = self
            .devices
            .iter()
            .filter(|x| x.associated_adapter == adapter)
            .map(|x| x.value().clone())
            .collect();
        devices.sort_by_key(|x| x.address);
        Ok(devices)
    }

    /// The cached device at `address`.
    pub async fn device(&self, address: Address) -> Result<DeviceData> {
        self.initialized().await;
        self.device_now(address)
    }

    pub(crate) fn device_now(&self, address: Address) -> Result<DeviceData> {
        self.devices
            .get(&address)
            .map(|x| x.value().clone())
            .ok_or_else(|| Error::from(ErrorKind::DeviceNotFound).with_address(address))
    }

    /// Removes every cached object.
    pub fn clear(&self) {
        self.devices.clear();
        self.adapters.clear();
    }
}

/// Ends a hydration pass when dropped.
pub(crate) struct HydrationGuard<'a>(&'a SessionStore);

impl Drop for HydrationGuard<'_> {
    fn drop(&mut self) {
        self.0.done_initialize();
    }
}

/// Overlays the fields present in `patch` onto `target`.
///
/// Objects are merged key by key, any other value replaces the existing one. `null` values in `patch` are ignored.
pub(crate) fn merge_json<T>(target: &mut T, patch: serde_json::Value) -> Result<()>
where
    T: Serialize + DeserializeOwned,
{
    let mut value = serde_json::to_value(&*target)?;
    overlay(&mut value, patch);
    *target = serde_json::from_value(value)?;
    Ok(())
}

fn overlay(base: &mut serde_json::Value, patch: serde_json::Value) {
    use serde_json::Value;

    match patch {
        Value::Null => {}
        Value::Object(patch) => {
            if let Value::Object(base) = base {
                for (key, value) in patch {
                    match base.get_mut(&key) {
                        Some(slot) => overlay(slot, value),
                        None => {
                            base.insert(key, value);
                        }
                    }
                }
            } else {
                *base = Value::Object(patch);
            }
        }
        patch => *base = patch,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn merge_overlays_only_present_fields() {
        let mut device = DeviceData {
            name: "Headphones".into(),
            paired: true,
            percentage: Some(40),
            ..Default::default()
        };

        merge_json(&mut device, json!({ "connected": true, "percentage": 87, "name": null })).unwrap();

        assert_eq!(device.name, "Headphones");
        assert!(device.paired);
        assert!(device.connected);
        assert_eq!(device.percentage, Some(87));
    }

    #[test]
    fn merge_rejects_mistyped_fields() {
        let mut adapter = AdapterData::default();
        let err = merge_json(&mut adapter, json!({ "powered": "yes" })).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn failed_merge_leaves_entry_untouched() {
        let store = SessionStore::new();
        let address = Address::new([1, 0, 0, 0, 0, 1]);
        store.add_adapter(AdapterData {
            address,
            powered: true,
            ..Default::default()
        });

        let res = store.update_adapter(address, |adapter| {
            adapter.powered = false;
            Err(ErrorKind::Decode.into())
        });
        assert!(res.is_err());
        assert!(store.adapter_now(address).unwrap().powered);
    }
}
