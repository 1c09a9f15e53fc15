use crate::error::{ErrorKind, RemoteError};

impl From<zbus::Error> for crate::Error {
    fn from(err: zbus::Error) -> Self {
        match err {
            zbus::Error::MethodError(name, description, _) => {
                let kind = kind_from_error_name(name.as_str());
                let remote = RemoteError {
                    name: name.to_string(),
                    description: description.unwrap_or_default(),
                    metadata: Default::default(),
                };
                crate::Error::new(kind, Some(Box::new(remote)), String::new())
            }
            err => crate::Error::new(kind_from_zbus(&err), Some(Box::new(err)), String::new()),
        }
    }
}

fn kind_from_zbus(err: &zbus::Error) -> ErrorKind {
    match err {
        zbus::Error::InputOutput(_) | zbus::Error::Address(_) | zbus::Error::Handshake(_) => {
            ErrorKind::ConnectionFailed
        }
        zbus::Error::Variant(_) | zbus::Error::MissingField | zbus::Error::InvalidField => ErrorKind::Decode,
        zbus::Error::Unsupported | zbus::Error::InterfaceNotFound => ErrorKind::NotSupported,
        zbus::Error::NameTaken | zbus::Error::InvalidReply => ErrorKind::Protocol,
        zbus::Error::Failure(_) => ErrorKind::Other,
        _ => ErrorKind::Internal,
    }
}

fn kind_from_error_name(name: &str) -> ErrorKind {
    match name {
        "org.bluez.Error.ConnectionAttemptFailed" | "org.bluez.Error.NotConnected" => ErrorKind::ConnectionFailed,
        "org.bluez.Error.InvalidArguments" | "org.bluez.Error.InvalidLength" | "org.bluez.Error.InvalidOffset" => {
            ErrorKind::InvalidParameter
        }
        "org.bluez.Error.NotAuthorized"
        | "org.bluez.Error.NotPermitted"
        | "org.bluez.Error.AuthenticationFailed"
        | "org.bluez.Error.AuthenticationCanceled"
        | "org.bluez.Error.AuthenticationRejected"
        | "org.bluez.Error.Rejected" => ErrorKind::NotAuthorized,
        "org.bluez.Error.AuthenticationTimeout" => ErrorKind::Timeout,
        "org.bluez.Error.NotSupported" | "org.bluez.Error.NotAvailable" => ErrorKind::NotSupported,
        "org.bluez.Error.DoesNotExist" | "org.bluez.Error.NotFound" => ErrorKind::NotFound,
        "org.freedesktop.DBus.Error.ServiceUnknown" | "org.freedesktop.DBus.Error.NoReply" => {
            ErrorKind::ConnectionFailed
        }
        "org.freedesktop.DBus.Error.UnknownObject" => ErrorKind::NotFound,
        "org.freedesktop.DBus.Error.UnknownMethod" | "org.freedesktop.DBus.Error.UnknownInterface" => {
            ErrorKind::NotSupported
        }
        _ => ErrorKind::Protocol,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bluez_error_names_map_to_kinds() {
        assert_eq!(
            kind_from_error_name("org.bluez.Error.AuthenticationTimeout"),
            ErrorKind::Timeout
        );
        assert_eq!(
            kind_from_error_name("org.bluez.Error.DoesNotExist"),
            ErrorKind::NotFound
        );
        assert_eq!(kind_from_error_name("org.bluez.Error.InProgress"), ErrorKind::Protocol);
    }
}
