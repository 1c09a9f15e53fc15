//! Typed session events.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{AdapterData, DeviceData, FileTransferData, MediaEventData};
use crate::Error;

/// The topic an event is published under.
///
/// [`EventKind::All`] is a wildcard understood by the event handler: subscribing to it receives every event, but
/// nothing is ever published with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum EventKind {
    /// Every event
    #[serde(rename = "*")]
    All = 0,
    /// Errors reported by a background listener
    Error = 1,
    /// Adapter changes
    Adapter = 2,
    /// Device changes
    Device = 3,
    /// OBEX file transfer progress
    FileTransfer = 4,
    /// Media player changes
    MediaPlayer = 5,
}

impl EventKind {
    /// The numeric topic identifier.
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Looks up a topic by its numeric identifier.
    pub fn from_id(id: u8) -> Option<Self> {
        Some(match id {
            0 => EventKind::All,
            1 => EventKind::Error,
            2 => EventKind::Adapter,
            3 => EventKind::Device,
            4 => EventKind::FileTransfer,
            5 => EventKind::MediaPlayer,
            _ => return None,
        })
    }

    /// The topic name.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::All => "*",
            EventKind::Error => "error",
            EventKind::Adapter => "adapter",
            EventKind::Device => "device",
            EventKind::FileTransfer => "filetransfer",
            EventKind::MediaPlayer => "mediaplayer",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to the object an event describes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventAction {
    /// No specific action
    #[default]
    None,
    /// Properties of an existing object changed
    Updated,
    /// A new object appeared
    Added,
    /// An object disappeared
    Removed,
}

impl std::fmt::Display for EventAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            EventAction::None => "none",
            EventAction::Updated => "updated",
            EventAction::Added => "added",
            EventAction::Removed => "removed",
        })
    }
}

/// A session event carrying a payload of type `T`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event<T> {
    /// What happened
    pub action: EventAction,
    /// The event payload
    pub data: T,
}

impl<T> Event<T> {
    /// Creates a new event.
    pub fn new(action: EventAction, data: T) -> Self {
        Event { action, data }
    }
}

impl Event<EventData> {
    /// The topic this event belongs to.
    pub fn kind(&self) -> EventKind {
        self.data.kind()
    }

    /// Converts this event into one with a concrete payload, if the payload has that type.
    pub fn downcast<T: EventPayload>(self) -> Option<Event<T>> {
        let action = self.action;
        T::from_data(self.data).map(|data| Event { action, data })
    }
}

/// An error raised by a background listener, delivered as an event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorEventData {
    /// A short identifier for the error
    pub name: String,
    /// A human-readable description
    pub description: String,
    /// Additional context
    pub metadata: BTreeMap<String, String>,
}

impl From<&Error> for ErrorEventData {
    fn from(err: &Error) -> Self {
        let mut metadata = BTreeMap::new();
        if let Some(operation) = err.operation() {
            metadata.insert("operation".to_string(), operation.to_string());
        }
        if let Some(address) = err.address() {
            metadata.insert("address".to_string(), address.to_string());
        }

        ErrorEventData {
            name: err.kind().as_str().to_string(),
            description: err.to_string(),
            metadata,
        }
    }
}

/// The payload of an event. The variant determines the event's [`EventKind`].
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventData {
    Error(ErrorEventData),
    Adapter(AdapterData),
    Device(DeviceData),
    FileTransfer(FileTransferData),
    MediaPlayer(MediaEventData),
}

impl EventData {
    /// The topic this payload is published under.
    pub fn kind(&self) -> EventKind {
        match self {
            EventData::Error(_) => EventKind::Error,
            EventData::Adapter(_) => EventKind::Adapter,
            EventData::Device(_) => EventKind::Device,
            EventData::FileTransfer(_) => EventKind::FileTransfer,
            EventData::MediaPlayer(_) => EventKind::MediaPlayer,
        }
    }
}

/// A type that can be carried by an [`Event`].
pub trait EventPayload: Sized + Send + 'static {
    /// The topic payloads of this type are published under.
    const KIND: EventKind;

    /// Wraps the payload.
    fn into_data(self) -> EventData;

    /// Unwraps the payload, if `data` holds this type.
    fn from_data(data: EventData) -> Option<Self>;
}

macro_rules! event_payload {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl EventPayload for $ty {
                const KIND: EventKind = EventKind::$variant;

                fn into_data(self) -> EventData {
                    EventData::$variant(self)
                }

                fn from_data(data: EventData) -> Option<Self> {
                    match data {
                        EventData::$variant(x) => Some(x),
                        _ => None,
                    }
                }
            }
        )*
    };
}

event_payload! {
    ErrorEventData => Error,
    AdapterData => Adapter,
    DeviceData => Device,
    FileTransferData => FileTransfer,
    MediaEventData => MediaPlayer,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::Address;

    #[test]
    fn kind_ids_round_trip() {
        for id in 0..=5 {
            assert_eq!(EventKind::from_id(id).unwrap().id(), id);
        }
        assert_eq!(EventKind::from_id(6), None);
        assert_eq!(EventKind::MediaPlayer.to_string(), "mediaplayer");
    }

    #[test]
    fn payload_fixes_kind() {
        let event = Event::new(EventAction::Added, DeviceData::default().into_data());
        assert_eq!(event.kind(), EventKind::Device);
        assert!(event.clone().downcast::<AdapterData>().is_none());
        assert_eq!(event.downcast::<DeviceData>().unwrap().action, EventAction::Added);
    }

    #[test]
    fn action_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&EventAction::Removed).unwrap(), "\"removed\"");
        let action: EventAction = serde_json::from_str("\"updated\"").unwrap();
        assert_eq!(action, EventAction::Updated);
    }

    #[test]
    fn error_event_carries_context() {
        let address = Address::new([1, 2, 3, 4, 5, 6]);
        let err = Error::from(ErrorKind::DeviceNotFound).at("device-pair").with_address(address);
        let data = ErrorEventData::from(&err);
        assert_eq!(data.name, "device-not-found");
        assert_eq!(data.metadata["operation"], "device-pair");
        assert_eq!(data.metadata["address"], "01:02:03:04:05:06");
    }
}
