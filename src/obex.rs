use std::path::Path;

use crate::types::FileTransferData;
use crate::{sys, Address, Result};

/// Object push file transfer to a remote device.
///
/// Transfer progress is published as file transfer events.
#[derive(Debug, Clone)]
pub struct Obex(pub(crate) sys::obex::ObexImpl);

impl Obex {
    /// The remote device's hardware address
    #[inline]
    pub fn address(&self) -> Address {
        self.0.address()
    }

    /// Opens an object push session with the device
    #[inline]
    pub async fn create_session(&self) -> Result<()> {
        self.0.create_session().await
    }

    /// Closes the object push session
    #[inline]
    pub async fn remove_session(&self) -> Result<()> {
        self.0.remove_session().await
    }

    /// Queues the file at `path` for sending and returns the new transfer
    #[inline]
    pub async fn send_file(&self, path: impl AsRef<Path>) -> Result<FileTransferData> {
        self.0.send_file(path.as_ref()).await
    }

    /// Cancels the running transfer
    #[inline]
    pub async fn cancel_transfer(&self) -> Result<()> {
        self.0.cancel_transfer().await
    }

    /// Pauses the running transfer
    #[inline]
    pub async fn suspend_transfer(&self) -> Result<()> {
        self.0.suspend_transfer().await
    }

    /// Resumes a paused transfer
    #[inline]
    pub async fn resume_transfer(&self) -> Result<()> {
        self.0.resume_transfer().await
    }
}
