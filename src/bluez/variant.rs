//! Conversion of BlueZ property maps into the JSON form the store merges.

use std::collections::HashMap;

use serde_json::{Map, Value as Json};
use zbus::zvariant::{OwnedValue, Value};

use super::paths::{parent, PathRegistry};
use crate::error::ErrorKind;
use crate::store::merge_json;
use crate::types::{AdapterData, DeviceData, DeviceType, MediaData};
use crate::{Address, Error, Result};

pub(super) type Properties = Map<String, Json>;

const ADAPTER_PROPERTIES: &[(&str, &str)] = &[
    ("Address", "address"),
    ("Name", "name"),
    ("Alias", "alias"),
    ("Class", "class"),
    ("Powered", "powered"),
    ("Discoverable", "discoverable"),
    ("Pairable", "pairable"),
    ("Discovering", "discovering"),
];

const DEVICE_PROPERTIES: &[(&str, &str)] = &[
    ("Address", "address"),
    ("Name", "name"),
    ("Alias", "alias"),
    ("Class", "class"),
    ("Paired", "paired"),
    ("Connected", "connected"),
    ("Trusted", "trusted"),
    ("Blocked", "blocked"),
    ("Bonded", "bonded"),
    ("LegacyPairing", "legacy_pairing"),
    ("RSSI", "rssi"),
    ("UUIDs", "uuids"),
];

const PLAYER_PROPERTIES: &[(&str, &str)] = &[("Status", "status"), ("Position", "position")];

const TRACK_PROPERTIES: &[(&str, &str)] = &[
    ("Title", "title"),
    ("Album", "album"),
    ("Artist", "artist"),
    ("Duration", "duration"),
    ("TrackNumber", "track_number"),
    ("NumberOfTracks", "total_tracks"),
];

/// Converts a D-Bus property map into JSON, keeping the BlueZ property names.
pub(super) fn properties(props: &HashMap<String, OwnedValue>) -> Properties {
    props.iter().map(|(k, v)| (k.clone(), to_json(v))).collect()
}

pub(super) fn to_json(value: &Value<'_>) -> Json {
    match value {
        Value::U8(x) => Json::from(*x),
        Value::Bool(x) => Json::from(*x),
        Value::I16(x) => Json::from(*x),
        Value::U16(x) => Json::from(*x),
        Value::I32(x) => Json::from(*x),
        Value::U32(x) => Json::from(*x),
        Value::I64(x) => Json::from(*x),
        Value::U64(x) => Json::from(*x),
        Value::F64(x) => Json::from(*x),
        Value::Str(x) => Json::from(x.as_str()),
        Value::ObjectPath(x) => Json::from(x.as_str()),
        Value::Value(x) => to_json(x),
        Value::Array(x) => Json::Array(x.iter().map(to_json).collect()),
        Value::Dict(x) => match x.try_clone().and_then(HashMap::<String, Value<'_>>::try_from) {
            Ok(map) => Json::Object(map.iter().map(|(k, v)| (k.clone(), to_json(v))).collect()),
            Err(_) => Json::Null,
        },
        _ => Json::Null,
    }
}

fn rename(props: &Properties, table: &[(&str, &str)]) -> Properties {
    table
        .iter()
        .filter_map(|(from, to)| props.get(*from).map(|v| (to.to_string(), v.clone())))
        .collect()
}

fn decode_error(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::Decode, None, message.into())
}

pub(super) fn adapter_patch(props: &Properties) -> Json {
    Json::Object(rename(props, ADAPTER_PROPERTIES))
}

/// The device fields present in `props`. The `Adapter` object path is resolved through `paths`.
pub(super) fn device_patch(props: &Properties, paths: &PathRegistry) -> Result<Json> {
    let mut patch = rename(props, DEVICE_PROPERTIES);
    if let Some(path) = props.get("Adapter").and_then(Json::as_str) {
        let adapter = paths
            .adapter_address(path)
            .ok_or_else(|| decode_error(format!("unknown adapter path {path}")))?;
        patch.insert("associated_adapter".into(), Json::from(adapter.to_string()));
    }
    if props.contains_key("Percentage") {
        patch.insert("percentage".into(), Json::from(battery_percentage(props)?));
    }
    Ok(Json::Object(patch))
}

pub(super) fn player_patch(props: &Properties) -> Json {
    let mut patch = rename(props, PLAYER_PROPERTIES);
    if let Some(Json::Object(track)) = props.get("Track") {
        patch.insert("track".into(), Json::Object(rename(track, TRACK_PROPERTIES)));
    }
    Json::Object(patch)
}

/// The battery level in `props`, which must be present and fit in a byte.
pub(super) fn battery_percentage(props: &Properties) -> Result<u8> {
    props
        .get("Percentage")
        .and_then(Json::as_u64)
        .and_then(|x| u8::try_from(x).ok())
        .ok_or_else(|| decode_error("battery percentage is missing or not a byte"))
}

pub(super) fn decode_adapter(props: &Properties) -> Result<AdapterData> {
    let mut adapter = AdapterData::default();
    merge_json(&mut adapter, adapter_patch(props))?;
    if adapter.address.is_zero() {
        return Err(decode_error("adapter has no address"));
    }
    Ok(adapter)
}

/// Decodes a device. `path` is used to find its adapter when the properties do not name one.
pub(super) fn decode_device(path: &str, props: &Properties, paths: &PathRegistry) -> Result<DeviceData> {
    let mut device = DeviceData::default();
    merge_json(&mut device, device_patch(props, paths)?)?;
    if device.address.is_zero() {
        return Err(decode_error("device has no address"));
    }
    if device.associated_adapter.is_zero() {
        if let Some(adapter) = paths.adapter_address(parent(path)) {
            device.associated_adapter = adapter;
        }
    }
    device.device_type = DeviceType::from_class(device.class);
    Ok(device)
}

pub(super) fn decode_player(props: &Properties) -> Result<MediaData> {
    let mut media = MediaData::default();
    merge_json(&mut media, player_patch(props))?;
    Ok(media)
}

/// Recovers a device address from an object path such as `/org/bluez/hci0/dev_AC_80_0A_2F_15_E6`.
pub(super) fn address_from_path(path: &str) -> Option<Address> {
    path.rsplit('/').next()?.strip_prefix("dev_")?.parse().ok()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn props(value: Json) -> Properties {
        match value {
            Json::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn variants_become_json() {
        assert_eq!(to_json(&Value::from(87u8)), json!(87));
        assert_eq!(to_json(&Value::from("hci0")), json!("hci0"));
        assert_eq!(to_json(&Value::from(-60i16)), json!(-60));
        assert_eq!(
            to_json(&Value::from(vec!["0000110b-0000-1000-8000-00805f9b34fb"])),
            json!(["0000110b-0000-1000-8000-00805f9b34fb"])
        );
        assert_eq!(to_json(&Value::new(Value::from(true))), json!(true));
    }

    #[test]
    fn device_properties_decode_with_adapter() {
        let paths = PathRegistry::default();
        let adapter = Address::new([0, 0x1A, 0x7D, 0xDA, 0x71, 0x13]);
        paths.insert_adapter("/org/bluez/hci0", adapter);

        let device = decode_device(
            "/org/bluez/hci0/dev_AC_80_0A_2F_15_E6",
            &props(json!({
                "Address": "AC:80:0A:2F:15:E6",
                "Name": "Headphones",
                "Class": 0x240418,
                "Paired": true,
                "RSSI": -60,
                "Percentage": 87,
                "Icon": "audio-headphones",
            })),
            &paths,
        )
        .unwrap();

        assert_eq!(device.associated_adapter, adapter);
        assert_eq!(device.device_type, DeviceType::Headphones);
        assert_eq!(device.percentage, Some(87));
        assert_eq!(device.rssi, -60);
        assert!(device.paired);
    }

    #[test]
    fn battery_must_be_a_byte() {
        assert_eq!(battery_percentage(&props(json!({ "Percentage": 100 }))).unwrap(), 100);
        for bad in [json!({ "Percentage": -1 }), json!({ "Percentage": 300 }), json!({ "Percentage": "full" }), json!({})] {
            assert_eq!(battery_percentage(&props(bad)).unwrap_err().kind(), ErrorKind::Decode);
        }
    }

    #[test]
    fn player_track_is_renamed() {
        let media = decode_player(&props(json!({
            "Status": "playing",
            "Position": 1200,
            "Track": { "Title": "Song", "Artist": "Band", "NumberOfTracks": 12 },
        })))
        .unwrap();
        assert_eq!(media.status, "playing");
        assert_eq!(media.position, 1200);
        assert_eq!(media.track.title, "Song");
        assert_eq!(media.track.total_tracks, 12);
    }

    #[test]
    fn addresses_from_device_paths() {
        assert_eq!(
            address_from_path("/org/bluez/hci0/dev_AC_80_0A_2F_15_E6"),
            Some(Address::new([0xAC, 0x80, 0x0A, 0x2F, 0x15, 0xE6]))
        );
        assert_eq!(address_from_path("/org/bluez/hci0"), None);
    }
}
