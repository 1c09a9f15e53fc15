use serde::{Deserialize, Serialize};

use crate::{Address, Uuid};

/// The cached properties of a local Bluetooth controller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterData {
    /// The adapter's hardware address
    pub address: Address,
    /// The system name of the adapter
    pub name: String,
    /// The user-visible alias of the adapter
    pub alias: String,
    /// The Bluetooth class of device
    pub class: u32,
    /// Whether the radio is powered on
    pub powered: bool,
    /// Whether the adapter is visible to remote devices
    pub discoverable: bool,
    /// Whether the adapter accepts incoming pairing requests
    pub pairable: bool,
    /// Whether device discovery is running
    pub discovering: bool,
}

/// The cached properties of a remote Bluetooth device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceData {
    /// The device's hardware address
    pub address: Address,
    /// The address of the adapter this device is known to
    pub associated_adapter: Address,
    /// The remote name of the device
    pub name: String,
    /// The user-visible alias of the device
    pub alias: String,
    /// The Bluetooth class of device
    pub class: u32,
    /// The device category, derived from `class`
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    /// Whether the device is paired
    pub paired: bool,
    /// Whether the device is connected
    pub connected: bool,
    /// Whether the device is trusted
    pub trusted: bool,
    /// Whether the device is blocked
    pub blocked: bool,
    /// Whether a long-term bond exists with the device
    pub bonded: bool,
    /// Whether the device is handled by the legacy pairing procedure
    pub legacy_pairing: bool,
    /// Received signal strength in dBm, when discovered
    pub rssi: i16,
    /// The battery level reported by the device, in percent
    pub percentage: Option<u8>,
    /// The service UUIDs advertised by the device
    pub uuids: Vec<Uuid>,
}

/// The general category of a remote device.
#[allow(missing_docs)]
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceType {
    #[default]
    Unknown,
    Computer,
    Phone,
    Modem,
    NetworkAccessPoint,
    Headset,
    Headphones,
    Speaker,
    AudioVideo,
    Keyboard,
    Mouse,
    Gamepad,
    Peripheral,
    Imaging,
    Wearable,
    Toy,
    Health,
}

impl DeviceType {
    /// Derives the device category from a Bluetooth class of device.
    ///
    /// See the Bluetooth Assigned Numbers document, §2.8 (Class of Device).
    pub fn from_class(class: u32) -> Self {
        let major = (class >> 8) & 0x1f;
        let minor = (class >> 2) & 0x3f;

        match major {
            0x01 => DeviceType::Computer,
            0x02 => match minor {
                0x04 | 0x05 => DeviceType::Modem,
                _ => DeviceType::Phone,
            },
            0x03 => DeviceType::NetworkAccessPoint,
            0x04 => match minor {
                0x01 | 0x02 => DeviceType::Headset,
                0x06 => DeviceType::Headphones,
                0x05 | 0x07 | 0x0a => DeviceType::Speaker,
                _ => DeviceType::AudioVideo,
            },
            0x05 => match (minor >> 4, minor & 0x0f) {
                (0x01, _) => DeviceType::Keyboard,
                (0x02, _) => DeviceType::Mouse,
                (_, 0x01) | (_, 0x02) => DeviceType::Gamepad,
                _ => DeviceType::Peripheral,
            },
            0x06 => DeviceType::Imaging,
            0x07 => DeviceType::Wearable,
            0x08 => DeviceType::Toy,
            0x09 => DeviceType::Health,
            _ => DeviceType::Unknown,
        }
    }
}

/// Properties of a media player exposed by a remote device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaData {
    /// Playback status (`playing`, `paused`, `stopped`, ...)
    pub status: String,
    /// Playback position in milliseconds
    pub position: u32,
    /// The current track
    pub track: TrackData,
}

/// Metadata of the track a media player is playing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct TrackData {
    pub title: String,
    pub album: String,
    pub artist: String,
    pub duration: u32,
    pub track_number: u32,
    pub total_tracks: u32,
}

/// A media player update for a device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaEventData {
    /// The device hosting the media player
    pub address: Address,
    /// The updated media player properties
    #[serde(flatten)]
    pub media: MediaData,
}

/// The state of an OBEX object push transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct FileTransferData {
    pub address: Address,
    pub name: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub filename: String,
    pub status: String,
    pub size: u64,
    pub transferred: u64,
}

/// The role requested when connecting to a network access point on a device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    /// Personal area networking user
    #[default]
    Panu,
    /// Dial-up networking
    Dun,
}

impl NetworkType {
    /// The profile name used by the Bluetooth stack.
    pub fn as_str(self) -> &'static str {
        match self {
            NetworkType::Panu => "panu",
            NetworkType::Dun => "dun",
        }
    }
}

impl std::fmt::Display for NetworkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
