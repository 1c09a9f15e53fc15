use crate::types::DeviceData;
use crate::{sys, Address, Result, Uuid};

/// A remote Bluetooth device.
///
/// Obtained from [`Session::device`][crate::Session::device].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device(pub(crate) sys::device::DeviceImpl);

impl Device {
    /// The device's hardware address
    #[inline]
    pub fn address(&self) -> Address {
        self.0.address()
    }

    /// Pairs with the device. Challenges raised while pairing go to the session's authorizer.
    #[inline]
    pub async fn pair(&self) -> Result<()> {
        self.0.pair().await
    }

    /// Cancels a pairing attempt in progress
    #[inline]
    pub async fn cancel_pairing(&self) -> Result<()> {
        self.0.cancel_pairing().await
    }

    /// Connects every auto-connectable profile
    #[inline]
    pub async fn connect(&self) -> Result<()> {
        self.0.connect().await
    }

    /// Disconnects every profile
    #[inline]
    pub async fn disconnect(&self) -> Result<()> {
        self.0.disconnect().await
    }

    /// Connects the profile identified by `profile`
    #[inline]
    pub async fn connect_profile(&self, profile: Uuid) -> Result<()> {
        self.0.connect_profile(profile).await
    }

    /// Disconnects the profile identified by `profile`
    #[inline]
    pub async fn disconnect_profile(&self, profile: Uuid) -> Result<()> {
        self.0.disconnect_profile(profile).await
    }

    /// Forgets the device, removing its pairing
    #[inline]
    pub async fn remove(&self) -> Result<()> {
        self.0.remove().await
    }

    /// The cached properties of this device
    #[inline]
    pub async fn properties(&self) -> Result<DeviceData> {
        self.0.properties().await
    }
}
