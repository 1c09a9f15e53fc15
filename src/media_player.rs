use crate::types::MediaData;
use crate::{sys, Address, Result};

/// The media player of a remote device.
///
/// Player changes are published as media player events.
#[derive(Debug, Clone)]
pub struct MediaPlayer(pub(crate) sys::media_player::MediaPlayerImpl);

impl MediaPlayer {
    /// The remote device's hardware address
    #[inline]
    pub fn address(&self) -> Address {
        self.0.address()
    }

    /// The current player state
    #[inline]
    pub async fn properties(&self) -> Result<MediaData> {
        self.0.properties().await
    }

    #[allow(missing_docs)]
    #[inline]
    pub async fn play(&self) -> Result<()> {
        self.0.play().await
    }

    #[allow(missing_docs)]
    #[inline]
    pub async fn pause(&self) -> Result<()> {
        self.0.pause().await
    }

    /// Pauses if playing, plays otherwise
    #[inline]
    pub async fn toggle_play_pause(&self) -> Result<()> {
        self.0.toggle_play_pause().await
    }

    /// Skips to the next track
    #[inline]
    pub async fn next(&self) -> Result<()> {
        self.0.next().await
    }

    /// Goes back to the previous track
    #[inline]
    pub async fn previous(&self) -> Result<()> {
        self.0.previous().await
    }

    #[allow(missing_docs)]
    #[inline]
    pub async fn fast_forward(&self) -> Result<()> {
        self.0.fast_forward().await
    }

    #[allow(missing_docs)]
    #[inline]
    pub async fn rewind(&self) -> Result<()> {
        self.0.rewind().await
    }

    #[allow(missing_docs)]
    #[inline]
    pub async fn stop(&self) -> Result<()> {
        self.0.stop().await
    }
}
