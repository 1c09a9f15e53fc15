//! Session errors

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::Address;

/// The error type for Bluetooth session operations
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    message: String,
    operation: Option<&'static str>,
    address: Option<Address>,
}

impl Error {
    pub(crate) fn new(
        kind: ErrorKind,
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
        message: String,
    ) -> Self {
        Error {
            kind,
            source,
            message,
            operation: None,
            address: None,
        }
    }

    /// Attaches the label of the operation that failed (for example `"device-pair"`).
    pub(crate) fn at(mut self, operation: &'static str) -> Self {
        self.operation = Some(operation);
        self
    }

    /// Attaches the hardware address the failed operation was acting on.
    pub(crate) fn with_address(mut self, address: Address) -> Self {
        self.address = Some(address);
        self
    }

    /// Returns the corresponding [ErrorKind] for this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the message for this error.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the label of the operation that produced this error, if known.
    pub fn operation(&self) -> Option<&'static str> {
        self.operation
    }

    /// Returns the address of the adapter or device involved, if known.
    pub fn address(&self) -> Option<Address> {
        self.address
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.message.is_empty(), &self.source) {
            (true, None) => write!(f, "{}", &self.kind)?,
            (false, None) => write!(f, "{}: {}", &self.kind, &self.message)?,
            (true, Some(err)) => write!(f, "{}: {}", &self.kind, err)?,
            (false, Some(err)) => write!(f, "{}: {} ({})", &self.kind, &self.message, err)?,
        }
        if let Some(address) = &self.address {
            write!(f, " [{address}]")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|x| {
            let x: &(dyn std::error::Error + 'static) = &**x;
            x
        })
    }
}

/// A list of general categories of session error.
#[non_exhaustive]
#[derive(Debug, displaydoc::Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorKind {
    /// connection failed
    ConnectionFailed,
    /// connection closed
    ConnectionClosed,
    /// malformed data
    Decode,
    /// the helper process exited
    ProcessExited,
    /// remote error
    Protocol,
    /// timed out
    Timeout,
    /// reply for an unknown request
    StaleRequest,
    /// adapter not found
    AdapterNotFound,
    /// device not found
    DeviceNotFound,
    /// not found
    NotFound,
    /// no method is available to handle this call
    MethodNotAvailable,
    /// permission denied
    NotAuthorized,
    /// the session does not exist
    SessionNotExist,
    /// a session is already running
    SessionExists,
    /// the operation is unsupported
    NotSupported,
    /// invalid parameter
    InvalidParameter,
    /// an internal error has occured
    Internal,
    /// error
    Other,
}

impl ErrorKind {
    /// A short, stable identifier for this kind, used as the name of error events.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ConnectionFailed => "connection-failed",
            ErrorKind::ConnectionClosed => "connection-closed",
            ErrorKind::Decode => "decode",
            ErrorKind::ProcessExited => "process-exited",
            ErrorKind::Protocol => "protocol",
            ErrorKind::Timeout => "timeout",
            ErrorKind::StaleRequest => "stale-request",
            ErrorKind::AdapterNotFound => "adapter-not-found",
            ErrorKind::DeviceNotFound => "device-not-found",
            ErrorKind::NotFound => "not-found",
            ErrorKind::MethodNotAvailable => "method-not-available",
            ErrorKind::NotAuthorized => "not-authorized",
            ErrorKind::SessionNotExist => "session-not-exist",
            ErrorKind::SessionExists => "session-exists",
            ErrorKind::NotSupported => "not-supported",
            ErrorKind::InvalidParameter => "invalid-parameter",
            ErrorKind::Internal => "internal",
            ErrorKind::Other => "other",
        }
    }
}

/// A structured error reported by the remote side of a session (the helper process or the Bluetooth daemon).
///
/// Returned as the [`source`][std::error::Error::source] of errors with kind [`ErrorKind::Protocol`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteError {
    /// The remote error name
    pub name: String,
    /// A human-readable description
    pub description: String,
    /// Additional context
    pub metadata: BTreeMap<String, String>,
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)?;
        f.write_str(": ")?;
        if self.description.is_empty() {
            f.write_str("No information is provided for this error")?;
        } else {
            f.write_str(&self.description)?;
        }
        f.write_str(".")?;

        if !self.metadata.is_empty() {
            f.write_str(" (")?;
            for (i, value) in self.metadata.values().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                f.write_str(value)?;
            }
            f.write_str(")")?;
        }
        Ok(())
    }
}

impl std::error::Error for RemoteError {}

impl From<RemoteError> for Error {
    fn from(err: RemoteError) -> Self {
        Error::new(ErrorKind::Protocol, Some(Box::new(err)), String::new())
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error::new(kind, None, String::new())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::new(ErrorKind::Decode, Some(Box::new(err)), String::new())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::new(kind_from_io(&err.kind()), Some(Box::new(err)), String::new())
    }
}

fn kind_from_io(err: &std::io::ErrorKind) -> ErrorKind {
    use std::io::ErrorKind as StdErrorKind;

    match err {
        StdErrorKind::NotFound => ErrorKind::NotFound,
        StdErrorKind::PermissionDenied => ErrorKind::NotAuthorized,
        StdErrorKind::ConnectionRefused | StdErrorKind::AddrNotAvailable => ErrorKind::ConnectionFailed,
        StdErrorKind::ConnectionReset
        | StdErrorKind::ConnectionAborted
        | StdErrorKind::BrokenPipe
        | StdErrorKind::NotConnected
        | StdErrorKind::UnexpectedEof => ErrorKind::ConnectionClosed,
        StdErrorKind::InvalidData => ErrorKind::Decode,
        StdErrorKind::TimedOut => ErrorKind::Timeout,
        StdErrorKind::Unsupported => ErrorKind::NotSupported,
        StdErrorKind::Other => ErrorKind::Other,
        // None of the other errors have semantic meaning for us
        _ => ErrorKind::Internal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_error_renders_on_one_line() {
        let mut err = RemoteError {
            name: "device-busy".to_string(),
            ..Default::default()
        };
        assert_eq!(err.to_string(), "device-busy: No information is provided for this error.");

        err.description = "The device is busy".to_string();
        err.metadata.insert("address".to_string(), "AA:BB:CC:DD:EE:FF".to_string());
        err.metadata.insert("command".to_string(), "device pair".to_string());
        assert_eq!(
            err.to_string(),
            "device-busy: The device is busy. (AA:BB:CC:DD:EE:FF, device pair)"
        );

        let err = Error::from(err);
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert!(err.to_string().starts_with("remote error: device-busy"));
    }

    #[test]
    fn io_errors_map_to_transport_kinds() {
        let err = Error::from(std::io::Error::from(std::io::ErrorKind::UnexpectedEof));
        assert_eq!(err.kind(), ErrorKind::ConnectionClosed);
        let err = Error::from(std::io::Error::from(std::io::ErrorKind::ConnectionRefused));
        assert_eq!(err.kind(), ErrorKind::ConnectionFailed);
    }
}
