use std::path::Path;
use std::sync::Arc;

use super::command;
use super::session::SessionInner;
use crate::types::FileTransferData;
use crate::{Address, Result};

/// Object push to a remote device through the helper process.
#[derive(Debug, Clone)]
pub struct ObexImpl {
    session: Arc<SessionInner>,
    address: Address,
}

impl ObexImpl {
    pub(super) fn new(session: Arc<SessionInner>, address: Address) -> Self {
        ObexImpl { session, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub async fn create_session(&self) -> Result<()> {
        self.session
            .run(command::create_obex_session(self.address), self.address)
            .await
            .map(drop)
    }

    pub async fn remove_session(&self) -> Result<()> {
        self.session
            .run(command::remove_obex_session(), self.address)
            .await
            .map(drop)
    }

    pub async fn send_file(&self, path: &Path) -> Result<FileTransferData> {
        let mut transfer = self.session.run(command::send_file(path), self.address).await?;
        if transfer.address.is_zero() {
            transfer.address = self.address;
        }
        Ok(transfer)
    }

    pub async fn cancel_transfer(&self) -> Result<()> {
        self.session
            .run(command::cancel_transfer(self.address), self.address)
            .await
            .map(drop)
    }

    pub async fn suspend_transfer(&self) -> Result<()> {
        self.session
            .run(command::suspend_transfer(self.address), self.address)
            .await
            .map(drop)
    }

    pub async fn resume_transfer(&self) -> Result<()> {
        self.session
            .run(command::resume_transfer(self.address), self.address)
            .await
            .map(drop)
    }
}
