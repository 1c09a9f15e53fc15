//! The pairing agent exported to BlueZ.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};
use zbus::zvariant::{ObjectPath, OwnedObjectPath};
use zbus::Connection;

use super::paths::PathRegistry;
use super::proxies::AgentManager1Proxy;
use super::variant::address_from_path;
use crate::auth::{AuthEventData, AuthEventKind, AuthReplyMethod, SessionAuthorizer};
use crate::{Result, Uuid};

const AGENT_PATH: &str = "/org/bluetuith/agent";
const CAPABILITY: &str = "KeyboardDisplay";

#[derive(Debug, zbus::DBusError)]
#[zbus(prefix = "org.bluez.Error")]
enum AgentError {
    #[zbus(error)]
    ZBus(zbus::Error),
    Rejected(String),
}

/// Turns BlueZ agent calls into authorization challenges.
pub(super) struct Agent {
    authorizer: Arc<dyn SessionAuthorizer>,
    paths: Arc<PathRegistry>,
    timeout: Duration,
    next_id: AtomicI64,
}

impl Agent {
    pub fn new(authorizer: Arc<dyn SessionAuthorizer>, paths: Arc<PathRegistry>, timeout: Duration) -> Self {
        Agent {
            authorizer,
            paths,
            timeout,
            next_id: AtomicI64::new(1),
        }
    }

    async fn challenge(
        &self,
        device: &OwnedObjectPath,
        event: AuthEventKind,
        fill: impl FnOnce(&mut AuthEventData) + Send,
    ) -> std::result::Result<String, AgentError> {
        let address = self
            .paths
            .device_address(device.as_str())
            .or_else(|| address_from_path(device.as_str()))
            .ok_or_else(|| AgentError::Rejected(format!("unknown device {}", device.as_str())))?;

        let mut auth = AuthEventData {
            auth_id: self.next_id.fetch_add(1, Ordering::Relaxed),
            event,
            reply_method: match event {
                AuthEventKind::DisplayPinCode | AuthEventKind::DisplayPasskey => AuthReplyMethod::WithInput,
                _ => AuthReplyMethod::YesNo,
            },
            timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            address,
            ..Default::default()
        };
        fill(&mut auth);
        debug!(auth_id = auth.auth_id, event = ?auth.event, %address, "agent challenge");

        let mut outcome = Err(AgentError::Rejected("no reply".to_string()));
        auth.call_authorizer(Some(self.authorizer.as_ref()), |_, reply, res| {
            outcome = match res {
                Ok(()) => Ok(reply.reply),
                Err(err) => Err(AgentError::Rejected(err.to_string())),
            }
        })
        .await
        .map_err(|err| AgentError::Rejected(err.to_string()))?;
        outcome
    }
}

#[zbus::interface(name = "org.bluez.Agent1")]
impl Agent {
    async fn release(&self) {
        debug!("agent released");
    }

    async fn request_pin_code(&self, device: OwnedObjectPath) -> std::result::Result<String, AgentError> {
        Err(AgentError::Rejected(format!("PIN entry is not supported for {}", device.as_str())))
    }

    async fn display_pin_code(&self, device: OwnedObjectPath, pincode: String) -> std::result::Result<(), AgentError> {
        self.challenge(&device, AuthEventKind::DisplayPinCode, |auth| auth.pincode = pincode)
            .await
            .map(drop)
    }

    async fn request_passkey(&self, device: OwnedObjectPath) -> std::result::Result<u32, AgentError> {
        Err(AgentError::Rejected(format!("passkey entry is not supported for {}", device.as_str())))
    }

    async fn display_passkey(
        &self,
        device: OwnedObjectPath,
        passkey: u32,
        entered: u16,
    ) -> std::result::Result<(), AgentError> {
        self.challenge(&device, AuthEventKind::DisplayPasskey, |auth| {
            auth.passkey = passkey;
            auth.entered = entered;
        })
        .await
        .map(drop)
    }

    async fn request_confirmation(&self, device: OwnedObjectPath, passkey: u32) -> std::result::Result<(), AgentError> {
        self.challenge(&device, AuthEventKind::ConfirmPasskey, |auth| auth.passkey = passkey)
            .await
            .map(drop)
    }

    async fn request_authorization(&self, device: OwnedObjectPath) -> std::result::Result<(), AgentError> {
        self.challenge(&device, AuthEventKind::AuthorizePairing, |_| {})
            .await
            .map(drop)
    }

    async fn authorize_service(&self, device: OwnedObjectPath, uuid: String) -> std::result::Result<(), AgentError> {
        let uuid: Uuid = uuid
            .parse()
            .map_err(|_| AgentError::Rejected(format!("invalid service uuid {uuid}")))?;
        self.challenge(&device, AuthEventKind::AuthorizeService, |auth| auth.uuid = uuid)
            .await
            .map(drop)
    }

    async fn cancel(&self) {
        debug!("agent request cancelled");
    }
}

/// Exports `agent` and makes it the default agent.
pub(super) async fn register(conn: &Connection, agent: Agent) -> Result<()> {
    conn.object_server().at(AGENT_PATH, agent).await?;

    let path = ObjectPath::from_static_str_unchecked(AGENT_PATH);
    let manager = AgentManager1Proxy::new(conn).await?;
    manager.register_agent(&path, CAPABILITY).await?;
    manager.request_default_agent(&path).await?;
    info!(path = AGENT_PATH, "pairing agent registered");
    Ok(())
}

pub(super) async fn unregister(conn: &Connection) -> Result<()> {
    let path = ObjectPath::from_static_str_unchecked(AGENT_PATH);
    let manager = AgentManager1Proxy::new(conn).await?;
    let res = manager.unregister_agent(&path).await;
    conn.object_server().remove::<Agent, _>(AGENT_PATH).await?;
    Ok(res?)
}
