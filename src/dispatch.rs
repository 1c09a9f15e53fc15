//! Folding backend notifications into the store and publishing the resulting events.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::event::{ErrorEventData, EventAction};
use crate::eventbus::EventBus;
use crate::store::SessionStore;
use crate::types::{AdapterData, DeviceData, FileTransferData, MediaEventData};
use crate::{Address, Error, Result};

/// Applies adds, updates and removals to a [`SessionStore`] and publishes the matching events.
///
/// Shared by both backends.
#[derive(Debug, Clone)]
pub(crate) struct StoreDispatcher {
    store: Arc<SessionStore>,
    bus: EventBus,
}

impl StoreDispatcher {
    pub fn new(store: Arc<SessionStore>, bus: EventBus) -> Self {
        StoreDispatcher { store, bus }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn adapter_added(&self, adapter: AdapterData) {
        debug!(address = %adapter.address, "adapter added");
        self.store.add_adapter(adapter.clone());
        self.bus.publish(EventAction::Added, adapter);
    }

    pub fn adapter_updated<F>(&self, address: Address, merge: F) -> Result<()>
    where
        F: FnOnce(&mut AdapterData) -> Result<()>,
    {
        let adapter = self.store.update_adapter(address, merge)?;
        self.bus.publish(EventAction::Updated, adapter);
        Ok(())
    }

    pub fn adapter_removed(&self, address: Address) {
        debug!(%address, "adapter removed");
        let adapter = self.store.remove_adapter(address).unwrap_or(AdapterData {
            address,
            ..Default::default()
        });
        self.bus.publish(EventAction::Removed, adapter);
    }

    pub fn device_added(&self, device: DeviceData) {
        debug!(address = %device.address, adapter = %device.associated_adapter, "device added");
        self.store.add_device(device.clone());
        self.bus.publish(EventAction::Added, device);
    }

    pub fn device_updated<F>(&self, address: Address, merge: F) -> Result<()>
    where
        F: FnOnce(&mut DeviceData) -> Result<()>,
    {
        let device = self.store.update_device(address, merge)?;
        self.bus.publish(EventAction::Updated, device);
        Ok(())
    }

    /// Removes a device. `adapter` stamps the event when the device was not cached.
    pub fn device_removed(&self, address: Address, adapter: Address) {
        debug!(%address, %adapter, "device removed");
        let mut device = self.store.remove_device(address).unwrap_or(DeviceData {
            address,
            ..Default::default()
        });
        if device.associated_adapter.is_zero() {
            device.associated_adapter = adapter;
        }
        self.bus.publish(EventAction::Removed, device);
    }

    pub fn media_player(&self, action: EventAction, media: MediaEventData) {
        self.bus.publish(action, media);
    }

    pub fn file_transfer(&self, action: EventAction, transfer: FileTransferData) {
        self.bus.publish(action, transfer);
    }

    /// Publishes a listener error as an error event.
    pub fn error(&self, err: &Error) {
        warn!(error = %err, "session listener error");
        self.bus.publish(EventAction::None, ErrorEventData::from(err));
    }

    /// Publishes a remote error event as is.
    pub fn remote_error(&self, err: ErrorEventData) {
        warn!(name = %err.name, description = %err.description, "remote error");
        self.bus.publish(EventAction::None, err);
    }
}
