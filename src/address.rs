//! Bluetooth hardware addresses.

use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A 48-bit Bluetooth hardware (MAC) address.
///
/// The canonical string form is six upper-case, colon-separated hex octets, most significant first
/// (`"AA:BB:CC:DD:EE:FF"`). This is also the serialized form.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address([u8; 6]);

impl Address {
    /// Creates an address from its six octets, most significant first.
    pub const fn new(octets: [u8; 6]) -> Self {
        Address(octets)
    }

    /// The six octets of this address, most significant first.
    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Whether this is the all-zero address, used for records that have not been decoded yet.
    pub fn is_zero(&self) -> bool {
        self.0 == [0; 6]
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

/// An error returned when parsing an invalid [`Address`] string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidAddress(String);

impl std::fmt::Display for InvalidAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid Bluetooth address: {:?}", self.0)
    }
}

impl std::error::Error for InvalidAddress {}

impl FromStr for Address {
    type Err = InvalidAddress;

    /// Parses `AA:BB:CC:DD:EE:FF`. The BlueZ object path form with underscores (`AA_BB_...`) is accepted as well.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidAddress(s.to_string());

        let mut octets = [0u8; 6];
        let mut parts = s.split([':', '_']);
        for octet in octets.iter_mut() {
            let part = parts.next().ok_or_else(invalid)?;
            if part.len() != 2 {
                return Err(invalid());
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }

        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(Address(octets))
    }
}

impl From<[u8; 6]> for Address {
    fn from(octets: [u8; 6]) -> Self {
        Address(octets)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_formats_canonical_form() {
        let addr: Address = "0a:1B:2c:3D:4e:5F".parse().unwrap();
        assert_eq!(addr.octets(), [0x0a, 0x1b, 0x2c, 0x3d, 0x4e, 0x5f]);
        assert_eq!(addr.to_string(), "0A:1B:2C:3D:4E:5F");
    }

    #[test]
    fn parses_object_path_form() {
        let addr: Address = "AA_BB_CC_DD_EE_FF".parse().unwrap();
        assert_eq!(addr, Address::new([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]));
    }

    #[test]
    fn rejects_malformed_strings() {
        for bad in ["", "AA:BB:CC:DD:EE", "AA:BB:CC:DD:EE:FF:00", "AA:BB:CC:DD:EE:FG", "A:BB:CC:DD:EE:FFF"] {
            assert!(bad.parse::<Address>().is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn orders_by_octets() {
        let lo: Address = "00:00:00:00:00:01".parse().unwrap();
        let hi: Address = "00:00:00:00:01:00".parse().unwrap();
        assert!(lo < hi);
    }

    #[test]
    fn serializes_as_string() {
        let addr = Address::new([1, 2, 3, 4, 5, 6]);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"01:02:03:04:05:06\"");
        assert_eq!(serde_json::from_str::<Address>(&json).unwrap(), addr);
    }
}
