#![warn(missing_docs)]

//! Bluetuith is a cross-platform Bluetooth session library for [Rust]. It manages adapters, pairing, connections,
//! file transfer and media players of classic Bluetooth devices.
//!
//! On Linux the session talks to [BlueZ] over the system D-Bus. On other platforms it launches a native helper
//! executable and exchanges framed JSON messages with it over a local socket (a named pipe on Windows).
//!
//! [Rust]: https://www.rust-lang.org/
//! [BlueZ]: http://www.bluez.org/
//!
//! # Usage
//!
//! ```rust,no_run
//!# use bluetuith::{Configuration, DeviceData, Session};
//!# #[tokio::main]
//!# async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!let session = Session::new();
//!let mut devices = session.events().subscribe::<DeviceData>();
//!
//!let features = session.start(None, Configuration::default()).await?;
//!println!("supported: {}", features.supported());
//!
//!for adapter in session.adapters().await? {
//!    session.adapter(adapter.address).start_discovery().await?;
//!}
//!
//!while let Some(event) = devices.recv().await {
//!    println!("{} {}: {}", event.action, event.data.address, event.data.name);
//!}
//!#    Ok(())
//!# }
//! ```
//!
//! # Overview
//!
//! - A [`Session`] owns the connection to the Bluetooth stack and a cache of adapters and devices
//!   ([`SessionStore`]). Reads from the cache wait until the session has finished filling it.
//! - Changes reported by the Bluetooth stack are applied to the cache and then published on an [`EventBus`].
//!   Subscribers get a bounded queue; a subscriber that falls behind misses events instead of stalling the session.
//! - Pairing and transfer challenges are handed to a [`SessionAuthorizer`]. [`DefaultAuthorizer`] accepts all of
//!   them.
//! - [`Adapter`], [`Device`], [`Obex`], [`Network`] and [`MediaPlayer`] issue commands for one address.
//!
//! # Platform specifics
//!
//! | Feature | Linux (BlueZ) | Helper |
//! |---|---|---|
//! | Connection, pairing | yes | when reported by the helper |
//! | File transfer | no | when reported by the helper |
//! | Media player | yes | no |
//! | Network | no | no |
//!
//! [`Session::start`] reports what is available as a [`FeatureSet`]. Unavailable features carry the error that
//! explains why.

pub mod error;
pub mod event;
pub mod eventbus;

mod adapter;
mod address;
mod auth;
mod config;
mod device;
mod dispatch;
mod features;
mod media_player;
mod network;
mod obex;
mod session;
mod shim;
mod store;
mod types;

#[cfg(target_os = "linux")]
mod bluez;

pub use adapter::Adapter;
pub use address::{Address, InvalidAddress};
pub use auth::{
    AuthEventData, AuthEventKind, AuthReply, AuthReplyMethod, AuthTimeout, DefaultAuthorizer, SessionAuthorizer,
};
pub use config::{Configuration, DEFAULT_AUTH_TIMEOUT, DEFAULT_COMMAND_TIMEOUT};
pub use device::Device;
pub use error::Error;
pub use event::{ErrorEventData, Event, EventAction, EventKind};
pub use eventbus::EventBus;
pub use features::{FeatureSet, Features};
pub use media_player::MediaPlayer;
pub use network::Network;
pub use obex::Obex;
pub use session::Session;
pub use store::SessionStore;
pub use types::{
    AdapterData, DeviceData, DeviceType, FileTransferData, MediaData, MediaEventData, NetworkType, TrackData,
};
pub use uuid::Uuid;

#[cfg(target_os = "linux")]
use crate::bluez as sys;
#[cfg(not(target_os = "linux"))]
use crate::shim as sys;

/// Convenience alias for a result with [`Error`]
pub type Result<T, E = Error> = core::result::Result<T, E>;
