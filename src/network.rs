use crate::types::NetworkType;
use crate::{sys, Address, Result};

/// Network access through a remote device.
#[derive(Debug, Clone)]
pub struct Network(pub(crate) sys::network::NetworkImpl);

impl Network {
    /// The remote device's hardware address
    #[inline]
    pub fn address(&self) -> Address {
        self.0.address()
    }

    /// Creates a connection named `name` using `kind`
    #[inline]
    pub async fn connect(&self, name: &str, kind: NetworkType) -> Result<()> {
        self.0.connect(name, kind).await
    }

    /// Tears the connection down
    #[inline]
    pub async fn disconnect(&self) -> Result<()> {
        self.0.disconnect().await
    }
}
