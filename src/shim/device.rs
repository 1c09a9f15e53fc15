use std::sync::Arc;

use super::command;
use super::session::SessionInner;
use crate::types::DeviceData;
use crate::{Address, Result, Uuid};

/// A remote device driven through the helper process.
#[derive(Debug, Clone)]
pub struct DeviceImpl {
    session: Arc<SessionInner>,
    address: Address,
}

impl PartialEq for DeviceImpl {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.session, &other.session) && self.address == other.address
    }
}

impl Eq for DeviceImpl {}

impl DeviceImpl {
    pub(super) fn new(session: Arc<SessionInner>, address: Address) -> Self {
        DeviceImpl { session, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub async fn pair(&self) -> Result<()> {
        self.session.run(command::pair(self.address), self.address).await.map(drop)
    }

    pub async fn cancel_pairing(&self) -> Result<()> {
        self.session
            .run(command::cancel_pairing(self.address), self.address)
            .await
            .map(drop)
    }

    pub async fn connect(&self) -> Result<()> {
        self.session.run(command::connect(self.address), self.address).await.map(drop)
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.session
            .run(command::disconnect(self.address), self.address)
            .await
            .map(drop)
    }

    pub async fn connect_profile(&self, profile: Uuid) -> Result<()> {
        self.session
            .run(command::connect_profile(self.address, profile), self.address)
            .await
            .map(drop)
    }

    pub async fn disconnect_profile(&self, profile: Uuid) -> Result<()> {
        self.session
            .run(command::disconnect_profile(self.address, profile), self.address)
            .await
            .map(drop)
    }

    pub async fn remove(&self) -> Result<()> {
        self.session.run(command::remove(self.address), self.address).await.map(drop)
    }

    pub async fn properties(&self) -> Result<DeviceData> {
        self.session.transport().map_err(|e| e.with_address(self.address))?;
        self.session.store().device(self.address).await
    }
}
