//! Folding BlueZ signals into the session.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value as Json;
use tracing::trace;
use zbus::zvariant::{OwnedObjectPath, OwnedValue};

use super::paths::{parent, PathRegistry};
use super::proxies::{ADAPTER_INTERFACE, BATTERY_INTERFACE, DEVICE_INTERFACE, MEDIA_PLAYER_INTERFACE};
use super::variant::{self, Properties};
use crate::dispatch::StoreDispatcher;
use crate::error::ErrorKind;
use crate::event::{ErrorEventData, EventAction};
use crate::store::merge_json;
use crate::types::{DeviceType, MediaData, MediaEventData};
use crate::{Address, Error, Result};

/// A BlueZ notification, with property values already converted to JSON.
#[derive(Debug, Clone, PartialEq)]
pub(super) enum BluezSignal {
    PropertiesChanged {
        path: String,
        interface: String,
        changed: Properties,
    },
    InterfacesAdded {
        path: String,
        interfaces: HashMap<String, Properties>,
    },
    InterfacesRemoved {
        path: String,
        interfaces: Vec<String>,
    },
}

impl BluezSignal {
    /// Decodes a signal message. Signals the session does not handle yield `None`.
    pub fn from_message(message: &zbus::Message) -> Result<Option<Self>> {
        let header = message.header();
        let (Some(path), Some(member)) = (header.path(), header.member()) else {
            return Ok(None);
        };
        let path = path.as_str().to_string();

        let signal = match member.as_str() {
            "PropertiesChanged" => {
                let (interface, changed, _invalidated): (String, HashMap<String, OwnedValue>, Vec<String>) =
                    message.body().deserialize()?;
                BluezSignal::PropertiesChanged {
                    path,
                    interface,
                    changed: variant::properties(&changed),
                }
            }
            "InterfacesAdded" => {
                let (object, interfaces): (OwnedObjectPath, HashMap<String, HashMap<String, OwnedValue>>) =
                    message.body().deserialize()?;
                BluezSignal::InterfacesAdded {
                    path: object.as_str().to_string(),
                    interfaces: interfaces
                        .iter()
                        .map(|(name, props)| (name.clone(), variant::properties(props)))
                        .collect(),
                }
            }
            "InterfacesRemoved" => {
                let (object, interfaces): (OwnedObjectPath, Vec<String>) = message.body().deserialize()?;
                BluezSignal::InterfacesRemoved {
                    path: object.as_str().to_string(),
                    interfaces,
                }
            }
            _ => return Ok(None),
        };
        Ok(Some(signal))
    }
}

/// Applies BlueZ objects and signals to the store, the path registry and the media player cache.
#[derive(Debug, Clone)]
pub(super) struct SignalDispatcher {
    pub dispatcher: StoreDispatcher,
    pub paths: Arc<PathRegistry>,
    pub players: Arc<DashMap<Address, MediaData>>,
}

impl SignalDispatcher {
    /// Fills the store from a full object enumeration. Adapters are inserted before any device.
    pub fn hydrate(&self, objects: &[(String, HashMap<String, Properties>)]) -> Result<()> {
        let store = self.dispatcher.store();
        store.clear();
        self.paths.clear();
        self.players.clear();

        for (path, interfaces) in objects {
            if let Some(props) = interfaces.get(ADAPTER_INTERFACE) {
                let adapter = variant::decode_adapter(props).map_err(|e| e.at("refresh-adapter"))?;
                self.paths.insert_adapter(path, adapter.address);
                store.add_adapter(adapter);
            }
        }

        for (path, interfaces) in objects {
            if interfaces.contains_key(DEVICE_INTERFACE) {
                let props = merged(interfaces, DEVICE_INTERFACE);
                let device = variant::decode_device(path, &props, &self.paths).map_err(|e| e.at("refresh-device"))?;
                self.paths.insert_device(path, device.address);
                store.add_device(device);
            }
        }

        for (path, interfaces) in objects {
            if let Some(props) = interfaces.get(MEDIA_PLAYER_INTERFACE) {
                if let Some(device) = self.paths.device_address(parent(path)) {
                    self.paths.insert_player(device, path);
                    self.players.insert(device, variant::decode_player(props)?);
                }
            }
        }

        Ok(())
    }

    /// Handles one signal. Failures are published as error events; a failing interface does not stop the others
    /// named by the same signal.
    pub fn handle(&self, signal: BluezSignal) {
        trace!(?signal, "bluez signal");
        match signal {
            BluezSignal::PropertiesChanged {
                path,
                interface,
                changed,
            } => self.report(&path, self.properties_changed(&path, &interface, &changed)),
            BluezSignal::InterfacesAdded { path, interfaces } => {
                for interface in interfaces.keys() {
                    self.report(&path, self.interface_added(&path, interface, &interfaces));
                }
            }
            BluezSignal::InterfacesRemoved { path, interfaces } => {
                for interface in &interfaces {
                    self.report(&path, self.interface_removed(&path, interface));
                }
            }
        }
    }

    fn report(&self, path: &str, res: Result<()>) {
        if let Err(err) = res {
            let mut event = ErrorEventData::from(&err);
            event.metadata.insert("path".into(), path.to_string());
            self.dispatcher.remote_error(event);
        }
    }

    fn properties_changed(&self, path: &str, interface: &str, changed: &Properties) -> Result<()> {
        match interface {
            ADAPTER_INTERFACE => {
                let address = self
                    .paths
                    .adapter_address(path)
                    .ok_or_else(|| Error::from(ErrorKind::AdapterNotFound).at("pchanged-adapter-address"))?;
                let patch = variant::adapter_patch(changed);
                self.dispatcher
                    .adapter_updated(address, |adapter| merge_json(adapter, patch))
                    .map_err(|e| e.at("pchanged-adapter-update"))
            }
            DEVICE_INTERFACE => {
                let address = self.device_at(path, "pchanged-device-address")?;
                let patch = variant::device_patch(changed, &self.paths).map_err(|e| e.at("pchanged-device-decode"))?;
                self.update_device(address, patch, "pchanged-device-update")
            }
            BATTERY_INTERFACE => {
                let percentage = variant::battery_percentage(changed).map_err(|e| e.at("pchanged-batterypct-decode"))?;
                let address = self.device_at(path, "pchanged-battery-address")?;
                self.update_device(
                    address,
                    serde_json::json!({ "percentage": percentage }),
                    "pchanged-battery-update",
                )
            }
            MEDIA_PLAYER_INTERFACE => {
                let address = self.device_at(parent(path), "pchanged-mediaplayer-address")?;
                let patch = variant::player_patch(changed);
                let mut media = self.players.get(&address).map(|x| x.clone()).unwrap_or_default();
                merge_json(&mut media, patch).map_err(|e| e.at("pchanged-mediaplayer-decode"))?;
                self.players.insert(address, media.clone());
                self.dispatcher
                    .media_player(EventAction::Updated, MediaEventData { address, media });
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn interface_added(&self, path: &str, interface: &str, interfaces: &HashMap<String, Properties>) -> Result<()> {
        match interface {
            ADAPTER_INTERFACE => {
                let adapter = variant::decode_adapter(&merged(interfaces, interface))
                    .map_err(|e| e.at("padded-adapter-decode"))?;
                self.paths.insert_adapter(path, adapter.address);
                self.dispatcher.adapter_added(adapter);
            }
            DEVICE_INTERFACE => {
                let device = variant::decode_device(path, &merged(interfaces, interface), &self.paths)
                    .map_err(|e| e.at("padded-device-decode"))?;
                self.paths.insert_device(path, device.address);
                self.dispatcher.device_added(device);
            }
            // A battery announced together with its device was merged into the device above.
            BATTERY_INTERFACE if !interfaces.contains_key(DEVICE_INTERFACE) => {
                let props = &interfaces[interface];
                let percentage = variant::battery_percentage(props).map_err(|e| e.at("padded-batterypct-decode"))?;
                let address = self.device_at(path, "padded-battery-address")?;
                self.update_device(
                    address,
                    serde_json::json!({ "percentage": percentage }),
                    "padded-battery-update",
                )?;
            }
            MEDIA_PLAYER_INTERFACE => {
                let address = self.device_at(parent(path), "padded-mediaplayer-address")?;
                let media = variant::decode_player(&interfaces[interface]).map_err(|e| e.at("padded-mediaplayer-decode"))?;
                self.paths.insert_player(address, path);
                self.players.insert(address, media.clone());
                self.dispatcher
                    .media_player(EventAction::Added, MediaEventData { address, media });
            }
            _ => {}
        }
        Ok(())
    }

    fn interface_removed(&self, path: &str, interface: &str) -> Result<()> {
        match interface {
            ADAPTER_INTERFACE => {
                let address = self
                    .paths
                    .remove_adapter(path)
                    .ok_or_else(|| Error::from(ErrorKind::AdapterNotFound).at("premoved-adapter-address"))?;
                self.dispatcher.adapter_removed(address);
            }
            DEVICE_INTERFACE => {
                let address = self
                    .paths
                    .device_address(path)
                    .ok_or_else(|| Error::from(ErrorKind::DeviceNotFound).at("premoved-device-address"))?;
                let adapter = self.paths.adapter_address(parent(path)).ok_or_else(|| {
                    Error::from(ErrorKind::AdapterNotFound)
                        .at("premoved-device-adapter")
                        .with_address(address)
                })?;
                self.paths.remove_device(path);
                self.dispatcher.device_removed(address, adapter);
            }
            MEDIA_PLAYER_INTERFACE => {
                if let Some(address) = self.paths.device_address(parent(path)) {
                    self.paths.remove_player(address);
                    self.players.remove(&address);
                    self.dispatcher.media_player(
                        EventAction::Removed,
                        MediaEventData {
                            address,
                            ..Default::default()
                        },
                    );
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn device_at(&self, path: &str, operation: &'static str) -> Result<Address> {
        self.paths
            .device_address(path)
            .ok_or_else(|| Error::from(ErrorKind::DeviceNotFound).at(operation))
    }

    fn update_device(&self, address: Address, patch: Json, operation: &'static str) -> Result<()> {
        self.dispatcher
            .device_updated(address, |device| {
                merge_json(device, patch)?;
                device.device_type = DeviceType::from_class(device.class);
                Ok(())
            })
            .map_err(|e| e.at(operation))
    }
}

/// The properties of `interface` with those of its sibling interfaces folded in.
fn merged(interfaces: &HashMap<String, Properties>, interface: &str) -> Properties {
    let mut props = Properties::new();
    for (name, sibling) in interfaces {
        if name != interface {
            props.extend(sibling.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
    }
    if let Some(own) = interfaces.get(interface) {
        props.extend(own.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    props
}
