use crate::types::{AdapterData, DeviceData};
use crate::{sys, Address, Result};

/// A local Bluetooth controller.
///
/// Obtained from [`Session::adapter`][crate::Session::adapter]. Every method fails with
/// [`ErrorKind::SessionNotExist`][crate::error::ErrorKind::SessionNotExist] once the session has stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Adapter(pub(crate) sys::adapter::AdapterImpl);

impl Adapter {
    /// The adapter's hardware address
    #[inline]
    pub fn address(&self) -> Address {
        self.0.address()
    }

    /// Turns the radio on or off
    #[inline]
    pub async fn set_powered_state(&self, enable: bool) -> Result<()> {
        self.0.set_powered_state(enable).await
    }

    /// Makes the adapter visible or invisible to remote devices
    #[inline]
    pub async fn set_discoverable_state(&self, enable: bool) -> Result<()> {
        self.0.set_discoverable_state(enable).await
    }

    /// Allows or refuses incoming pairing requests
    #[inline]
    pub async fn set_pairable_state(&self, enable: bool) -> Result<()> {
        self.0.set_pairable_state(enable).await
    }

    /// Starts looking for remote devices. Found devices are published as device events.
    #[inline]
    pub async fn start_discovery(&self) -> Result<()> {
        self.0.start_discovery().await
    }

    /// Stops looking for remote devices
    #[inline]
    pub async fn stop_discovery(&self) -> Result<()> {
        self.0.stop_discovery().await
    }

    /// The cached properties of this adapter
    #[inline]
    pub async fn properties(&self) -> Result<AdapterData> {
        self.0.properties().await
    }

    /// The cached devices known to this adapter
    #[inline]
    pub async fn devices(&self) -> Result<Vec<DeviceData>> {
        self.0.devices().await
    }
}
