//! Session capabilities.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::Error;

/// A set of session features, stored as a bitmask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Features(u8);

impl Features {
    /// No features.
    pub const NONE: Features = Features(0);
    /// Connecting and disconnecting devices.
    pub const CONNECTION: Features = Features(1 << 1);
    /// Pairing with devices.
    pub const PAIRING: Features = Features(1 << 2);
    /// Sending files over OBEX.
    pub const SEND_FILE: Features = Features(1 << 3);
    /// Receiving files over OBEX.
    pub const RECEIVE_FILE: Features = Features(1 << 4);
    /// PANU/DUN network connections.
    pub const NETWORK: Features = Features(1 << 5);
    /// Media player control.
    pub const MEDIA_PLAYER: Features = Features(1 << 6);

    const ALL: [(Features, &'static str); 6] = [
        (Features::CONNECTION, "Bluetooth Connection"),
        (Features::PAIRING, "Bluetooth Pairing"),
        (Features::SEND_FILE, "OBEX Send Files"),
        (Features::RECEIVE_FILE, "OBEX Receive Files"),
        (Features::NETWORK, "PANU/DUN Network Connection"),
        (Features::MEDIA_PLAYER, "Media Player"),
    ];

    /// Raw transmutation from [`u8`]. Unknown bits are discarded.
    pub fn from_bits(bits: u8) -> Self {
        Features(bits & Features::all().0)
    }

    /// Raw transmutation to [`u8`].
    pub fn bits(self) -> u8 {
        self.0
    }

    /// Every known feature.
    pub fn all() -> Self {
        Features::ALL.iter().fold(Features::NONE, |acc, (f, _)| Features(acc.0 | f.0))
    }

    /// Adds `features` to this set.
    pub fn add(&mut self, features: Features) {
        self.0 |= features.0;
    }

    /// Removes `features` from this set.
    pub fn remove(&mut self, features: Features) {
        self.0 &= !features.0;
    }

    /// Whether every feature in `features` is present.
    pub fn contains(self, features: Features) -> bool {
        features.0 != 0 && self.0 & features.0 == features.0
    }

    /// Whether any feature in `features` is present.
    pub fn intersects(self, features: Features) -> bool {
        self.0 & features.0 != 0
    }

    /// The individual features in this set.
    pub fn iter(self) -> impl Iterator<Item = Features> {
        Features::ALL
            .into_iter()
            .map(|(f, _)| f)
            .filter(move |f| self.intersects(*f))
    }

    /// The known features that are missing from this set.
    pub fn absent(self) -> impl Iterator<Item = Features> {
        Features::ALL
            .into_iter()
            .map(|(f, _)| f)
            .filter(move |f| !self.intersects(*f))
    }
}

impl std::ops::BitOr for Features {
    type Output = Features;

    fn bitor(self, rhs: Self) -> Self::Output {
        Features(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for Features {
    fn bitor_assign(&mut self, rhs: Self) {
        self.add(rhs);
    }
}

impl std::fmt::Display for Features {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (feature, title) in Features::ALL {
            if self.intersects(feature) {
                if !first {
                    f.write_str(", ")?;
                }
                f.write_str(title)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// The features supported by a running session, with the reason each unavailable feature could not be
/// enabled.
#[derive(Debug, Clone, Default)]
pub struct FeatureSet {
    supported: Features,
    errors: BTreeMap<Features, Arc<Error>>,
}

impl FeatureSet {
    pub(crate) fn new(supported: Features) -> Self {
        FeatureSet {
            supported,
            errors: BTreeMap::new(),
        }
    }

    /// Records why `feature` could not be enabled. The feature is removed from the supported set.
    pub(crate) fn push_error(&mut self, feature: Features, error: Error) {
        self.supported.remove(feature);
        self.errors.insert(feature, Arc::new(error));
    }

    /// The supported features.
    pub fn supported(&self) -> Features {
        self.supported
    }

    /// Whether all of `features` are supported.
    pub fn has(&self, features: Features) -> bool {
        self.supported.contains(features)
    }

    /// Whether any of `features` is supported.
    pub fn has_any(&self, features: Features) -> bool {
        self.supported.intersects(features)
    }

    /// The error recorded for `feature`, if any.
    pub fn error(&self, feature: Features) -> Option<&Error> {
        self.errors.get(&feature).map(|e| &**e)
    }

    /// All recorded per-feature errors.
    pub fn errors(&self) -> impl Iterator<Item = (Features, &Error)> {
        self.errors.iter().map(|(f, e)| (*f, &**e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn add_and_remove_mutate_in_place() {
        let mut features = Features::NONE;
        features.add(Features::CONNECTION);
        features.add(Features::PAIRING | Features::NETWORK);
        assert!(features.contains(Features::CONNECTION | Features::PAIRING));

        features.remove(Features::PAIRING);
        assert!(!features.contains(Features::PAIRING));
        assert!(features.contains(Features::CONNECTION | Features::NETWORK));
    }

    #[test]
    fn renders_titles_in_declaration_order() {
        let features = Features::MEDIA_PLAYER | Features::CONNECTION;
        assert_eq!(features.to_string(), "Bluetooth Connection, Media Player");
        assert_eq!(Features::NONE.to_string(), "");
    }

    #[test]
    fn absent_lists_missing_features() {
        let features = Features::all();
        assert_eq!(features.absent().count(), 0);

        let features = Features::CONNECTION | Features::PAIRING;
        let absent: Vec<_> = features.absent().collect();
        assert_eq!(absent.len(), 4);
        assert!(!absent.contains(&Features::CONNECTION));
    }

    #[test]
    fn errors_remove_features_from_the_set() {
        let mut set = FeatureSet::new(Features::CONNECTION | Features::SEND_FILE);
        set.push_error(Features::SEND_FILE, ErrorKind::NotSupported.into());
        assert!(set.has(Features::CONNECTION));
        assert!(!set.has(Features::SEND_FILE));
        assert_eq!(set.error(Features::SEND_FILE).unwrap().kind(), ErrorKind::NotSupported);
    }
}
