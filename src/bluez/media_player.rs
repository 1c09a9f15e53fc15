use std::sync::Arc;

use super::proxies::MediaPlayer1Proxy;
use super::session::SessionInner;
use crate::error::ErrorKind;
use crate::types::MediaData;
use crate::{Address, Error, Result};

/// The media player of a remote device, controlled through BlueZ.
#[derive(Debug, Clone)]
pub struct MediaPlayerImpl {
    session: Arc<SessionInner>,
    address: Address,
}

impl MediaPlayerImpl {
    pub(super) fn new(session: Arc<SessionInner>, address: Address) -> Self {
        MediaPlayerImpl { session, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    async fn call<F, Fut>(&self, operation: &'static str, f: F) -> Result<()>
    where
        F: FnOnce(MediaPlayer1Proxy<'static>) -> Fut,
        Fut: std::future::Future<Output = zbus::Result<()>>,
    {
        let res = async {
            let connection = self.session.connection()?;
            let path = self
                .session
                .signals
                .paths
                .player_path(self.address)
                .ok_or_else(|| Error::new(ErrorKind::NotFound, None, "the device has no media player".to_string()))?;
            let proxy = MediaPlayer1Proxy::builder(&connection).path(path)?.build().await?;
            Ok::<_, Error>(f(proxy).await?)
        };
        res.await.map_err(|e| e.at(operation).with_address(self.address))
    }

    /// The cached player state.
    pub async fn properties(&self) -> Result<MediaData> {
        self.session
            .connection()
            .map_err(|e| e.at("media-properties").with_address(self.address))?;
        self.session
            .signals
            .players
            .get(&self.address)
            .map(|x| x.clone())
            .ok_or_else(|| {
                Error::new(ErrorKind::NotFound, None, "the device has no media player".to_string())
                    .at("media-properties")
                    .with_address(self.address)
            })
    }

    pub async fn play(&self) -> Result<()> {
        self.call("media-play", |p| async move { p.play().await }).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.call("media-pause", |p| async move { p.pause().await }).await
    }

    pub async fn toggle_play_pause(&self) -> Result<()> {
        if self.properties().await?.status == "playing" {
            self.pause().await
        } else {
            self.play().await
        }
    }

    pub async fn next(&self) -> Result<()> {
        self.call("media-next", |p| async move { p.next().await }).await
    }

    pub async fn previous(&self) -> Result<()> {
        self.call("media-previous", |p| async move { p.previous().await }).await
    }

    pub async fn fast_forward(&self) -> Result<()> {
        self.call("media-fast-forward", |p| async move { p.fast_forward().await })
            .await
    }

    pub async fn rewind(&self) -> Result<()> {
        self.call("media-rewind", |p| async move { p.rewind().await }).await
    }

    pub async fn stop(&self) -> Result<()> {
        self.call("media-stop", |p| async move { p.stop().await }).await
    }
}
