use crate::error::ErrorKind;
use crate::types::NetworkType;
use crate::{Address, Error, Result};

/// Network connections are not available on any session; every call fails with [`ErrorKind::NotSupported`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkImpl {
    address: Address,
}

impl NetworkImpl {
    pub(crate) fn new(address: Address) -> Self {
        NetworkImpl { address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub async fn connect(&self, name: &str, kind: NetworkType) -> Result<()> {
        let _ = (name, kind);
        Err(self.unsupported("network-connect"))
    }

    pub async fn disconnect(&self) -> Result<()> {
        Err(self.unsupported("network-disconnect"))
    }

    fn unsupported(&self, operation: &'static str) -> Error {
        Error::from(ErrorKind::NotSupported)
            .at(operation)
            .with_address(self.address)
    }
}
