use std::path::Path;

use crate::error::ErrorKind;
use crate::types::FileTransferData;
use crate::{Address, Error, Result};

/// Object push is not available on the bluez session; every call fails with [`ErrorKind::NotSupported`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObexImpl {
    address: Address,
}

impl ObexImpl {
    pub(super) fn new(address: Address) -> Self {
        ObexImpl { address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub async fn create_session(&self) -> Result<()> {
        Err(self.unsupported("obex-create-session"))
    }

    pub async fn remove_session(&self) -> Result<()> {
        Err(self.unsupported("obex-remove-session"))
    }

    pub async fn send_file(&self, path: &Path) -> Result<FileTransferData> {
        let _ = path;
        Err(self.unsupported("obex-send-file"))
    }

    pub async fn cancel_transfer(&self) -> Result<()> {
        Err(self.unsupported("obex-cancel-transfer"))
    }

    pub async fn suspend_transfer(&self) -> Result<()> {
        Err(self.unsupported("obex-suspend-transfer"))
    }

    pub async fn resume_transfer(&self) -> Result<()> {
        Err(self.unsupported("obex-resume-transfer"))
    }

    fn unsupported(&self, operation: &'static str) -> Error {
        Error::from(ErrorKind::NotSupported)
            .at(operation)
            .with_address(self.address)
    }
}
