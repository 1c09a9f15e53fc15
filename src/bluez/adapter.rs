use std::sync::Arc;

use super::proxies::Adapter1Proxy;
use super::session::SessionInner;
use crate::error::ErrorKind;
use crate::types::{AdapterData, DeviceData};
use crate::{Address, Error, Result};

/// A BlueZ adapter.
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

    async fn proxy(&self, operation: &'static str) -> Result<Adapter1Proxy<'static>> {
        let res = async {
            let connection = self.session.connection()?;
            let path = self
                .session
                .signals
                .paths
                .adapter_path(self.address)
                .ok_or_else(|| Error::from(ErrorKind::AdapterNotFound))?;
            Ok::<_, Error>(Adapter1Proxy::builder(&connection).path(path)?.build().await?)
        };
        res.await.map_err(|e| e.at(operation).with_address(self.address))
    }

    async fn call<F, Fut>(&self, operation: &'static str, f: F) -> Result<()>
    where
        F: FnOnce(Adapter1Proxy<'static>) -> Fut,
        Fut: std::future::Future<Output = zbus::Result<()>>,
    {
        let proxy = self.proxy(operation).await?;
        f(proxy)
            .await
            .map_err(|e| Error::from(e).at(operation).with_address(self.address))
    }

    pub async fn set_powered_state(&self, enable: bool) -> Result<()> {
        self.call("adapter-set-powered", |p| async move { p.set_powered(enable).await })
            .await
    }

    pub async fn set_discoverable_state(&self, enable: bool) -> Result<()> {
        self.call("adapter-set-discoverable", |p| async move { p.set_discoverable(enable).await })
            .await
    }

    pub async fn set_pairable_state(&self, enable: bool) -> Result<()> {
        self.call("adapter-set-pairable", |p| async move { p.set_pairable(enable).await })
            .await
    }

    pub async fn start_discovery(&self) -> Result<()> {
        self.call("adapter-start-discovery", |p| async move { p.start_discovery().await })
            .await
    }

    pub async fn stop_discovery(&self) -> Result<()> {
        self.call("adapter-stop-discovery", |p| async move { p.stop_discovery().await })
            .await
    }

    pub async fn properties(&self) -> Result<AdapterData> {
        self.session.connection().map_err(|e| e.with_address(self.address))?;
        self.session.store().adapter(self.address).await
    }

    pub async fn devices(&self) -> Result<Vec<DeviceData>> {
        self.session.connection().map_err(|e| e.with_address(self.address))?;
        self.session.store().adapter_devices(self.address).await
    }
}
