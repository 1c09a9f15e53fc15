use std::sync::Arc;

use crate::auth::SessionAuthorizer;
use crate::config::Configuration;
use crate::eventbus::EventBus;
use crate::features::FeatureSet;
use crate::types::AdapterData;
use crate::{sys, Adapter, Address, Device, MediaPlayer, Network, Obex, Result};

/// A connection to the system's Bluetooth stack.
///
/// On Linux the session talks to BlueZ over the system D-Bus. Everywhere else it launches the helper executable named
/// by [`Configuration::shim_path`] and talks to it over a local socket.
///
/// A session keeps a cache of adapters and devices that is kept current by notifications from the Bluetooth stack.
/// Every change is applied to the cache first and then published on the session's [`EventBus`].
#[derive(Debug, Clone)]
pub struct Session(sys::session::SessionImpl);

impl Default for Session {
    fn default() -> Self {
        Session::new()
    }
}

impl Session {
    /// Creates a stopped session that publishes on [`EventBus::global`].
    #[inline]
    pub fn new() -> Self {
        Session::with_event_bus(EventBus::global().clone())
    }

    /// Creates a stopped session that publishes on `bus`.
    #[inline]
    pub fn with_event_bus(bus: EventBus) -> Self {
        Session(sys::session::SessionImpl::new(bus))
    }

    /// The bus this session publishes events on.
    #[inline]
    pub fn events(&self) -> &EventBus {
        self.0.events()
    }

    /// Starts the session and fills the cache.
    ///
    /// Pairing and transfer challenges are handed to `authorizer`, or accepted if it is `None`. Returns the features
    /// the session supports; features that are unavailable carry the error explaining why.
    ///
    /// Fails with [`ErrorKind::SessionExists`][crate::error::ErrorKind::SessionExists] if the session is already
    /// running.
    #[inline]
    pub async fn start(
        &self,
        authorizer: Option<Arc<dyn SessionAuthorizer>>,
        config: Configuration,
    ) -> Result<FeatureSet> {
        self.0.start(authorizer, config).await
    }

    /// Stops the session and clears the cache.
    ///
    /// Fails with [`ErrorKind::SessionNotExist`][crate::error::ErrorKind::SessionNotExist] if the session is not
    /// running.
    #[inline]
    pub async fn stop(&self) -> Result<()> {
        self.0.stop().await
    }

    /// All known adapters.
    #[inline]
    pub async fn adapters(&self) -> Result<Vec<AdapterData>> {
        self.0.adapters().await
    }

    /// The adapter with the given address.
    #[inline]
    pub fn adapter(&self, address: Address) -> Adapter {
        Adapter(self.0.adapter(address))
    }

    /// The remote device with the given address.
    #[inline]
    pub fn device(&self, address: Address) -> Device {
        Device(self.0.device(address))
    }

    /// File transfer to the remote device with the given address.
    #[inline]
    pub fn obex(&self, address: Address) -> Obex {
        Obex(self.0.obex(address))
    }

    /// Network access through the remote device with the given address.
    #[inline]
    pub fn network(&self, address: Address) -> Network {
        Network(self.0.network(address))
    }

    /// The media player of the remote device with the given address.
    #[inline]
    pub fn media_player(&self, address: Address) -> MediaPlayer {
        MediaPlayer(self.0.media_player(address))
    }
}
