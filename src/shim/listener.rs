//! Applies helper events to the session.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::command;
use super::transport::{Inbound, Transport};
use crate::auth::{AuthEventData, SessionAuthorizer};
use crate::dispatch::StoreDispatcher;
use crate::error::ErrorKind;
use crate::event::EventAction;
use crate::store::merge_json;
use crate::types::{DeviceData, DeviceType};
use crate::{Address, Error, Result};

const EVENT_ERROR: u8 = 1;
const EVENT_ADAPTER: u8 = 2;
const EVENT_DEVICE: u8 = 3;
const EVENT_FILE_TRANSFER: u8 = 4;
const EVENT_MEDIA_PLAYER: u8 = 5;
const EVENT_AUTHENTICATION: u8 = 6;

#[derive(Debug, Deserialize)]
struct ServerEvent {
    #[serde(default)]
    event_action: EventAction,
    /// A single entry keyed by the payload name.
    #[serde(default)]
    event: serde_json::Map<String, Value>,
}

pub(super) struct Listener {
    pub dispatcher: StoreDispatcher,
    pub transport: Arc<Transport>,
    pub authorizer: Arc<dyn SessionAuthorizer>,
    pub auth_timeout: Duration,
}

impl Listener {
    /// Processes events in arrival order once the store has been hydrated.
    pub async fn run(self, mut inbound: mpsc::UnboundedReceiver<Inbound>, cancel: CancellationToken) {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = self.dispatcher.store().initialized() => {}
        }

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => break,
                next = inbound.recv() => next,
            };

            match next {
                Some(Inbound::Event { event_id, payload }) => {
                    if let Err(err) = self.handle_event(event_id, &payload) {
                        self.dispatcher.error(&err);
                    }
                }
                Some(Inbound::Error(err)) => self.dispatcher.error(&err),
                None => break,
            }
        }
        debug!("helper event listener stopped");
    }

    fn handle_event(&self, event_id: u8, payload: &[u8]) -> Result<()> {
        let event: ServerEvent = serde_json::from_slice(payload)?;
        let action = event.event_action;
        let data = event.event.into_iter().next().map(|(_, v)| v).unwrap_or(Value::Null);

        match event_id {
            EVENT_ERROR => self.dispatcher.remote_error(serde_json::from_value(data)?),
            EVENT_ADAPTER => self.adapter_event(action, data)?,
            EVENT_DEVICE => self.device_event(action, data)?,
            EVENT_FILE_TRANSFER => self.dispatcher.file_transfer(action, serde_json::from_value(data)?),
            EVENT_MEDIA_PLAYER => self.dispatcher.media_player(action, serde_json::from_value(data)?),
            EVENT_AUTHENTICATION => self.authenticate(serde_json::from_value(data)?),
            _ => {
                return Err(Error::new(
                    ErrorKind::Decode,
                    None,
                    format!("unknown helper event id {event_id}"),
                ))
            }
        }
        Ok(())
    }

    fn adapter_event(&self, action: EventAction, data: Value) -> Result<()> {
        let address = address_of(&data, "address")?;
        match action {
            EventAction::Added => self.dispatcher.adapter_added(serde_json::from_value(data)?),
            EventAction::Removed => self.dispatcher.adapter_removed(address),
            EventAction::Updated | EventAction::None => {
                self.dispatcher.adapter_updated(address, |adapter| merge_json(adapter, data))?
            }
        }
        Ok(())
    }

    fn device_event(&self, action: EventAction, data: Value) -> Result<()> {
        let address = address_of(&data, "address")?;
        match action {
            EventAction::Added => {
                let mut device: DeviceData = serde_json::from_value(data)?;
                device.device_type = DeviceType::from_class(device.class);
                self.dispatcher.device_added(device);
            }
            EventAction::Removed => {
                let adapter = address_of(&data, "associated_adapter").unwrap_or_default();
                self.dispatcher.device_removed(address, adapter);
            }
            EventAction::Updated | EventAction::None => self.dispatcher.device_updated(address, |device| {
                merge_json(device, data)?;
                device.device_type = DeviceType::from_class(device.class);
                Ok(())
            })?,
        }
        Ok(())
    }

    /// Answers an authentication challenge without blocking the event loop.
    fn authenticate(&self, mut auth: AuthEventData) {
        if auth.timeout_ms == 0 {
            auth.timeout_ms = u64::try_from(self.auth_timeout.as_millis()).unwrap_or(u64::MAX);
        }
        debug!(auth_id = auth.auth_id, event = ?auth.event, address = %auth.address, "authentication request");

        let dispatcher = self.dispatcher.clone();
        let transport = self.transport.clone();
        let authorizer = self.authorizer.clone();
        tokio::spawn(async move {
            let mut response = String::from("no");
            let res = auth
                .call_authorizer(Some(authorizer.as_ref()), |auth, reply, res| match res {
                    Ok(()) => response = reply.reply,
                    Err(err) => debug!(auth_id = auth.auth_id, error = %err, "authentication rejected"),
                })
                .await;

            if let Err(err) = res {
                dispatcher.error(&err.with_address(auth.address));
                return;
            }
            if let Err(err) = command::auth_reply(auth.auth_id, &response).execute(&transport).await {
                dispatcher.error(&err.with_address(auth.address));
            }
        });
    }
}

fn address_of(data: &Value, field: &str) -> Result<Address> {
    let address = data.get(field).and_then(Value::as_str).ok_or_else(|| {
        Error::new(ErrorKind::Decode, None, format!("event payload has no {field}"))
    })?;
    address
        .parse()
        .map_err(|err| Error::new(ErrorKind::Decode, Some(Box::new(err)), String::new()))
}
