use crate::error::ErrorKind;
use crate::types::MediaData;
use crate::{Address, Error, Result};

/// The helper has no media player commands; every call fails with [`ErrorKind::NotSupported`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPlayerImpl {
    address: Address,
}

macro_rules! unsupported {
    ($($name:ident => $op:literal),* $(,)?) => {
        $(
            pub async fn $name(&self) -> Result<()> {
                Err(self.unsupported($op))
            }
        )*
    };
}

impl MediaPlayerImpl {
    pub(super) fn new(address: Address) -> Self {
        MediaPlayerImpl { address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub async fn properties(&self) -> Result<MediaData> {
        Err(self.unsupported("media-properties"))
    }

    unsupported! {
        play => "media-play",
        pause => "media-pause",
        toggle_play_pause => "media-toggle-play-pause",
        next => "media-next",
        previous => "media-previous",
        fast_forward => "media-fast-forward",
        rewind => "media-rewind",
        stop => "media-stop",
    }

    fn unsupported(&self, operation: &'static str) -> Error {
        Error::from(ErrorKind::NotSupported)
            .at(operation)
            .with_address(self.address)
    }
}
