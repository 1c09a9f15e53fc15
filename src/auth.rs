//! Authorization of pairing and transfer requests.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::ErrorKind;
use crate::types::FileTransferData;
use crate::{Address, Error, Result, Uuid};

/// The kind of an authorization challenge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum AuthEventKind {
    /// No challenge
    #[default]
    #[serde(rename = "auth-event-none")]
    None,
    /// A PIN code should be displayed to the user
    #[serde(rename = "display-pincode")]
    DisplayPinCode,
    /// A passkey should be displayed to the user
    #[serde(rename = "display-passkey")]
    DisplayPasskey,
    /// The user should confirm that a passkey matches the one shown on the remote device
    #[serde(rename = "confirm-passkey")]
    ConfirmPasskey,
    /// The user should authorize an incoming pairing request
    #[serde(rename = "authorize-pairing")]
    AuthorizePairing,
    /// The user should authorize a remote device's access to a profile
    #[serde(rename = "authorize-service")]
    AuthorizeService,
    /// The user should authorize an incoming file transfer
    #[serde(rename = "authorize-transfer")]
    AuthorizeTransfer,
}

/// How a challenge expects to be answered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AuthReplyMethod {
    /// No answer is expected
    #[default]
    #[serde(rename = "reply-none")]
    None,
    /// The answer is `yes` or `no`
    #[serde(rename = "reply-yes-no")]
    YesNo,
    /// The answer is a string
    #[serde(rename = "reply-with-input")]
    WithInput,
}

/// The answer to an authorization challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthReply {
    /// How the answer is encoded
    pub method: AuthReplyMethod,
    /// The answer
    pub reply: String,
}

impl AuthReply {
    fn accept() -> Self {
        AuthReply {
            method: AuthReplyMethod::YesNo,
            reply: "yes".to_string(),
        }
    }

    fn input(reply: impl Into<String>) -> Self {
        AuthReply {
            method: AuthReplyMethod::WithInput,
            reply: reply.into(),
        }
    }
}

/// An authorization challenge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthEventData {
    /// Identifies the challenge when replying to it
    pub auth_id: i64,
    /// The kind of challenge
    #[serde(rename = "auth_event")]
    pub event: AuthEventKind,
    /// How the challenge expects to be answered
    #[serde(rename = "auth_reply_method")]
    pub reply_method: AuthReplyMethod,
    /// How long the challenge stays valid, in milliseconds
    pub timeout_ms: u64,
    /// The remote device
    pub address: Address,
    /// The PIN code to display
    pub pincode: String,
    /// The passkey to display or confirm
    pub passkey: u32,
    /// The number of passkey digits entered on the remote side
    pub entered: u16,
    /// The profile being authorized
    pub uuid: Uuid,
    /// The transfer being authorized
    pub file_transfer: FileTransferData,
}

impl AuthEventData {
    /// A fresh timeout token for this challenge.
    pub fn timeout(&self) -> AuthTimeout {
        AuthTimeout::new(Duration::from_millis(self.timeout_ms))
    }

    /// Hands this challenge to the matching method of `authorizer`, then passes the reply and the authorizer's
    /// result to `callback`.
    ///
    /// The authorizer is bounded by the challenge timeout; if it expires, `callback` receives an
    /// [`ErrorKind::Timeout`] error. Fails with [`ErrorKind::MethodNotAvailable`] without calling anything if there
    /// is no authorizer or the challenge kind is unknown.
    pub async fn call_authorizer<F>(&self, authorizer: Option<&dyn SessionAuthorizer>, callback: F) -> Result<()>
    where
        F: FnOnce(&AuthEventData, AuthReply, Result<()>) + Send,
    {
        let authorizer = authorizer.ok_or_else(|| {
            Error::new(ErrorKind::MethodNotAvailable, None, "no authorizer is set".to_string())
        })?;

        let timeout = self.timeout();
        let t = timeout.clone();
        let (reply, res) = match self.event {
            AuthEventKind::DisplayPinCode => (
                AuthReply::input(self.pincode.clone()),
                bounded(&timeout, authorizer.display_pin_code(t, self.address, &self.pincode)).await,
            ),
            AuthEventKind::DisplayPasskey => (
                AuthReply::input(self.passkey.to_string()),
                bounded(&timeout, authorizer.display_passkey(t, self.address, self.passkey, self.entered)).await,
            ),
            AuthEventKind::ConfirmPasskey => (
                AuthReply::accept(),
                bounded(&timeout, authorizer.confirm_passkey(t, self.address, self.passkey)).await,
            ),
            AuthEventKind::AuthorizePairing => (
                AuthReply::accept(),
                bounded(&timeout, authorizer.authorize_pairing(t, self.address)).await,
            ),
            AuthEventKind::AuthorizeService => (
                AuthReply::accept(),
                bounded(&timeout, authorizer.authorize_service(t, self.address, self.uuid)).await,
            ),
            AuthEventKind::AuthorizeTransfer => (
                AuthReply::accept(),
                bounded(&timeout, authorizer.authorize_transfer(t, &self.file_transfer)).await,
            ),
            AuthEventKind::None => {
                return Err(Error::new(
                    ErrorKind::MethodNotAvailable,
                    None,
                    format!("no authorizer method for {:?}", self.event),
                ))
            }
        };

        timeout.cancel();
        callback(self, reply, res);
        Ok(())
    }
}

async fn bounded(timeout: &AuthTimeout, fut: impl std::future::Future<Output = Result<()>>) -> Result<()> {
    tokio::select! {
        res = fut => res,
        _ = timeout.done() => Err(Error::new(ErrorKind::Timeout, None, "authorization timed out".to_string())),
    }
}

/// A cancellable deadline handed to authorizers along with each challenge.
#[derive(Debug, Clone)]
pub struct AuthTimeout {
    deadline: Instant,
    token: CancellationToken,
}

impl AuthTimeout {
    /// A token that expires after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        AuthTimeout {
            deadline: Instant::now() + timeout,
            token: CancellationToken::new(),
        }
    }

    /// Completes when the deadline passes or the token is cancelled.
    pub async fn done(&self) {
        tokio::select! {
            _ = tokio::time::sleep_until(self.deadline) => {}
            _ = self.token.cancelled() => {}
        }
    }

    /// Whether the deadline has passed or the token was cancelled.
    pub fn is_done(&self) -> bool {
        self.token.is_cancelled() || Instant::now() >= self.deadline
    }

    /// Time left until the deadline.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Cancels the token. Every clone observes the cancellation.
    pub fn cancel(&self) {
        self.token.cancel();
    }
}

/// Answers authorization challenges on behalf of the user.
///
/// Every method rejects by default. Return `Ok(())` to accept.
#[async_trait]
pub trait SessionAuthorizer: Send + Sync {
    /// A PIN code must be displayed until `timeout` is done.
    async fn display_pin_code(&self, _timeout: AuthTimeout, _address: Address, _pincode: &str) -> Result<()> {
        Err(ErrorKind::NotAuthorized.into())
    }

    /// A passkey must be displayed until `timeout` is done. `entered` counts the digits typed on the remote side.
    async fn display_passkey(&self, _timeout: AuthTimeout, _address: Address, _passkey: u32, _entered: u16) -> Result<()> {
        Err(ErrorKind::NotAuthorized.into())
    }

    /// The user must confirm that `passkey` matches the one shown on the remote device.
    async fn confirm_passkey(&self, _timeout: AuthTimeout, _address: Address, _passkey: u32) -> Result<()> {
        Err(ErrorKind::NotAuthorized.into())
    }

    /// The user must authorize pairing with the remote device.
    async fn authorize_pairing(&self, _timeout: AuthTimeout, _address: Address) -> Result<()> {
        Err(ErrorKind::NotAuthorized.into())
    }

    /// The user must authorize the remote device's use of the profile `uuid`.
    async fn authorize_service(&self, _timeout: AuthTimeout, _address: Address, _uuid: Uuid) -> Result<()> {
        Err(ErrorKind::NotAuthorized.into())
    }

    /// The user must authorize an incoming file transfer.
    async fn authorize_transfer(&self, _timeout: AuthTimeout, _transfer: &FileTransferData) -> Result<()> {
        Err(ErrorKind::NotAuthorized.into())
    }
}

/// An authorizer that accepts every challenge.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultAuthorizer;

#[async_trait]
impl SessionAuthorizer for DefaultAuthorizer {
    async fn display_pin_code(&self, _timeout: AuthTimeout, _address: Address, _pincode: &str) -> Result<()> {
        Ok(())
    }

    async fn display_passkey(&self, _timeout: AuthTimeout, _address: Address, _passkey: u32, _entered: u16) -> Result<()> {
        Ok(())
    }

    async fn confirm_passkey(&self, _timeout: AuthTimeout, _address: Address, _passkey: u32) -> Result<()> {
        Ok(())
    }

    async fn authorize_pairing(&self, _timeout: AuthTimeout, _address: Address) -> Result<()> {
        Ok(())
    }

    async fn authorize_service(&self, _timeout: AuthTimeout, _address: Address, _uuid: Uuid) -> Result<()> {
        Ok(())
    }

    async fn authorize_transfer(&self, _timeout: AuthTimeout, _transfer: &FileTransferData) -> Result<()> {
        Ok(())
    }
}
