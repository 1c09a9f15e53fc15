use std::sync::Arc;

use zbus::zvariant::ObjectPath;

use super::paths::parent;
use super::proxies::{Adapter1Proxy, Device1Proxy};
use super::session::SessionInner;
use crate::error::ErrorKind;
use crate::types::DeviceData;
use crate::{Address, Error, Result, Uuid};

/// A remote device known to BlueZ.
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

    fn path(&self) -> Result<String> {
        self.session
            .signals
            .paths
            .device_path(self.address)
            .ok_or_else(|| ErrorKind::DeviceNotFound.into())
    }

    async fn call<F, Fut>(&self, operation: &'static str, f: F) -> Result<()>
    where
        F: FnOnce(Device1Proxy<'static>) -> Fut,
        Fut: std::future::Future<Output = zbus::Result<()>>,
    {
        let res = async {
            let connection = self.session.connection()?;
            let proxy = Device1Proxy::builder(&connection).path(self.path()?)?.build().await?;
            Ok::<_, Error>(f(proxy).await?)
        };
        res.await.map_err(|e| e.at(operation).with_address(self.address))
    }

    pub async fn pair(&self) -> Result<()> {
        self.call("device-pair", |p| async move { p.pair().await }).await
    }

    pub async fn cancel_pairing(&self) -> Result<()> {
        self.call("device-cancel-pairing", |p| async move { p.cancel_pairing().await })
            .await
    }

    pub async fn connect(&self) -> Result<()> {
        self.call("device-connect", |p| async move { p.connect().await }).await
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.call("device-disconnect", |p| async move { p.disconnect().await })
            .await
    }

    pub async fn connect_profile(&self, profile: Uuid) -> Result<()> {
        let profile = profile.to_string();
        self.call("device-connect-profile", |p| async move { p.connect_profile(&profile).await })
            .await
    }

    pub async fn disconnect_profile(&self, profile: Uuid) -> Result<()> {
        let profile = profile.to_string();
        self.call("device-disconnect-profile", |p| async move {
            p.disconnect_profile(&profile).await
        })
        .await
    }

    /// Removes the device through the adapter that owns it.
    pub async fn remove(&self) -> Result<()> {
        let res = async {
            let connection = self.session.connection()?;
            let path = self.path()?;
            let adapter = Adapter1Proxy::builder(&connection)
                .path(parent(&path).to_string())?
                .build()
                .await?;
            let device = ObjectPath::try_from(path.as_str()).map_err(zbus::Error::from)?;
            Ok::<_, Error>(adapter.remove_device(&device).await?)
        };
        res.await
            .map_err(|e| e.at("device-remove").with_address(self.address))
    }

    pub async fn properties(&self) -> Result<DeviceData> {
        self.session.connection().map_err(|e| e.with_address(self.address))?;
        self.session.store().device(self.address).await
    }
}
