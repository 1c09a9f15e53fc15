//! Helper commands and their replies.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use super::transport::Transport;
use crate::error::RemoteError;
use crate::features::Features;
use crate::types::{AdapterData, DeviceData, FileTransferData};
use crate::{Address, Error, Result, Uuid};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Argument {
    SocketPath,
    Address,
    State,
    Uuid,
    File,
    OperationId,
    Response,
}

impl Argument {
    fn flag(self) -> &'static str {
        match self {
            Argument::SocketPath => "--socket-path",
            Argument::Address => "--address",
            Argument::State => "--state",
            Argument::Uuid => "--uuid",
            Argument::File => "--file",
            Argument::OperationId => "--operation-id",
            Argument::Response => "--response",
        }
    }
}

fn state(enable: bool) -> &'static str {
    if enable {
        "on"
    } else {
        "off"
    }
}

/// The result of commands that only report errors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct NoResult;

impl<'de> Deserialize<'de> for NoResult {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        serde::de::IgnoredAny::deserialize(deserializer)?;
        Ok(NoResult)
    }
}

/// A helper command returning `T`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Command<T> {
    name: &'static str,
    tokens: Vec<String>,
    _result: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned + Default> Command<T> {
    fn new(name: &'static str) -> Self {
        Command {
            name,
            tokens: name.split_whitespace().map(str::to_string).collect(),
            _result: PhantomData,
        }
    }

    fn arg(mut self, arg: Argument, value: impl ToString) -> Self {
        self.tokens.push(arg.flag().to_string());
        self.tokens.push(value.to_string());
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Runs the command and decodes its result. When a command produces several replies the last result wins.
    pub async fn execute(self, transport: &Transport) -> Result<T> {
        let replies = transport.execute(&self.tokens).await.map_err(|e| e.at(self.name))?;

        let mut result = T::default();
        for reply in replies {
            let response: CommandResponse = serde_json::from_slice(&reply.payload).map_err(|e| Error::from(e).at(self.name))?;
            match response.status {
                Status::Error => return Err(Error::from(response.error).at(self.name)),
                Status::Ok if response.data.is_null() => {}
                Status::Ok => result = decode_data(response.data).map_err(|e| e.at(self.name))?,
            }
        }

        Ok(result)
    }
}

/// Reply data is either the result itself or a map with a single entry holding it.
fn decode_data<T: DeserializeOwned>(data: serde_json::Value) -> Result<T> {
    if let serde_json::Value::Object(map) = &data {
        if map.len() == 1 {
            if let Some(Ok(result)) = map.values().next().map(|x| T::deserialize(x)) {
                return Ok(result);
            }
        }
    }

    Ok(serde_json::from_value(data)?)
}

#[derive(Debug, Serialize)]
pub(crate) struct Request<'a> {
    pub command: &'a [String],
    pub request_id: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Status {
    #[default]
    Ok,
    Error,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CommandResponse {
    status: Status,
    data: serde_json::Value,
    error: RemoteError,
}

pub(crate) fn start_session_args(socket_path: &std::path::Path) -> Vec<std::ffi::OsString> {
    vec![
        "rpc".into(),
        "start-session".into(),
        Argument::SocketPath.flag().into(),
        socket_path.as_os_str().to_owned(),
    ]
}

pub(crate) fn stop_session() -> Command<NoResult> {
    Command::new("rpc stop-session")
}

pub(crate) fn feature_flags() -> Command<Features> {
    Command::new("rpc feature-flags")
}

pub(crate) fn auth_reply(auth_id: i64, response: &str) -> Command<NoResult> {
    Command::new("rpc auth-reply")
        .arg(Argument::OperationId, auth_id)
        .arg(Argument::Response, response)
}

pub(crate) fn adapters() -> Command<Vec<AdapterData>> {
    Command::new("adapter list")
}

pub(crate) fn paired_devices(address: Address) -> Command<Vec<DeviceData>> {
    Command::new("adapter get-paired-devices").arg(Argument::Address, address)
}

pub(crate) fn set_pairable_state(address: Address, enable: bool) -> Command<NoResult> {
    Command::new("adapter set-pairable-state")
        .arg(Argument::Address, address)
        .arg(Argument::State, state(enable))
}

pub(crate) fn set_discoverable_state(address: Address, enable: bool) -> Command<NoResult> {
    Command::new("adapter set-discoverable-state")
        .arg(Argument::Address, address)
        .arg(Argument::State, state(enable))
}

pub(crate) fn set_powered_state(address: Address, enable: bool) -> Command<NoResult> {
    Command::new("adapter set-powered-state")
        .arg(Argument::Address, address)
        .arg(Argument::State, state(enable))
}

pub(crate) fn start_discovery(address: Address) -> Command<NoResult> {
    Command::new("adapter start-discovery").arg(Argument::Address, address)
}

pub(crate) fn stop_discovery(address: Address) -> Command<NoResult> {
    Command::new("adapter stop-discovery").arg(Argument::Address, address)
}

pub(crate) fn pair(address: Address) -> Command<NoResult> {
    Command::new("device pair").arg(Argument::Address, address)
}

pub(crate) fn cancel_pairing(address: Address) -> Command<NoResult> {
    Command::new("device pair cancel").arg(Argument::Address, address)
}

pub(crate) fn connect(address: Address) -> Command<NoResult> {
    Command::new("device connect").arg(Argument::Address, address)
}

pub(crate) fn disconnect(address: Address) -> Command<NoResult> {
    Command::new("device disconnect").arg(Argument::Address, address)
}

pub(crate) fn connect_profile(address: Address, profile: Uuid) -> Command<NoResult> {
    Command::new("device connect profile")
        .arg(Argument::Address, address)
        .arg(Argument::Uuid, profile)
}

pub(crate) fn disconnect_profile(address: Address, profile: Uuid) -> Command<NoResult> {
    Command::new("device disconnect profile")
        .arg(Argument::Address, address)
        .arg(Argument::Uuid, profile)
}

pub(crate) fn remove(address: Address) -> Command<NoResult> {
    Command::new("device remove").arg(Argument::Address, address)
}

pub(crate) fn create_obex_session(address: Address) -> Command<NoResult> {
    Command::new("device opp start-session").arg(Argument::Address, address)
}

pub(crate) fn remove_obex_session() -> Command<NoResult> {
    Command::new("device opp stop-session")
}

pub(crate) fn send_file(path: &std::path::Path) -> Command<FileTransferData> {
    Command::new("device opp send-file").arg(Argument::File, path.display())
}

pub(crate) fn cancel_transfer(address: Address) -> Command<NoResult> {
    Command::new("device opp cancel-transfer").arg(Argument::Address, address)
}

pub(crate) fn suspend_transfer(address: Address) -> Command<NoResult> {
    Command::new("device opp suspend-transfer").arg(Argument::Address, address)
}

pub(crate) fn resume_transfer(address: Address) -> Command<NoResult> {
    Command::new("device opp resume-transfer").arg(Argument::Address, address)
}
