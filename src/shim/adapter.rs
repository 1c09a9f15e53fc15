use std::sync::Arc;

use super::command;
use super::session::SessionInner;
use crate::types::{AdapterData, DeviceData};
use crate::{Address, Result};

/// An adapter driven through the helper process.
#[derive(Debug, Clone)]
pub struct AdapterImpl {
    session: Arc<SessionInner>,
    address: Address,
}

impl PartialEq for AdapterImpl {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.session, &other.session) && self.address == other.address
    }
}

impl Eq for AdapterImpl {}

impl AdapterImpl {
    pub(super) fn new(session: Arc<SessionInner>, address: Address) -> Self {
        AdapterImpl { session, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub async fn set_powered_state(&self, enable: bool) -> Result<()> {
        self.session
            .run(command::set_powered_state(self.address, enable), self.address)
            .await
            .map(drop)
    }

    pub async fn set_discoverable_state(&self, enable: bool) -> Result<()> {
        self.session
            .run(command::set_discoverable_state(self.address, enable), self.address)
            .await
            .map(drop)
    }

    pub async fn set_pairable_state(&self, enable: bool) -> Result<()> {
        self.session
            .run(command::set_pairable_state(self.address, enable), self.address)
            .await
            .map(drop)
    }

    pub async fn start_discovery(&self) -> Result<()> {
        self.session
            .run(command::start_discovery(self.address), self.address)
            .await
            .map(drop)
    }

    pub async fn stop_discovery(&self) -> Result<()> {
        self.session
            .run(command::stop_discovery(self.address), self.address)
            .await
            .map(drop)
    }

    pub async fn properties(&self) -> Result<AdapterData> {
        self.session.transport().map_err(|e| e.with_address(self.address))?;
        self.session.store().adapter(self.address).await
    }

    pub async fn devices(&self) -> Result<Vec<DeviceData>> {
        self.session.transport().map_err(|e| e.with_address(self.address))?;
        self.session.store().adapter_devices(self.address).await
    }
}
