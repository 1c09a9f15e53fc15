use std::sync::{Arc, PoisonError, RwLock};

use futures_lite::StreamExt;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use zbus::{Connection, MatchRule, MessageStream};

use super::adapter::AdapterImpl;
use super::agent::{self, Agent};
use super::device::DeviceImpl;
use super::media_player::MediaPlayerImpl;
use super::network::NetworkImpl;
use super::obex::ObexImpl;
use super::proxies::{BluezObjectManagerProxy, SERVICE};
use super::signal::{BluezSignal, SignalDispatcher};
use super::variant;
use crate::auth::{DefaultAuthorizer, SessionAuthorizer};
use crate::config::Configuration;
use crate::dispatch::StoreDispatcher;
use crate::error::ErrorKind;
use crate::eventbus::EventBus;
use crate::features::{FeatureSet, Features};
use crate::store::SessionStore;
use crate::types::AdapterData;
use crate::{Address, Error, Result};

/// A session backed by BlueZ on the system bus.
#[derive(Debug, Clone)]
pub struct SessionImpl {
    inner: Arc<SessionInner>,
}

#[derive(Debug)]
pub(super) struct SessionInner {
    pub(super) signals: SignalDispatcher,
    connection: RwLock<Option<Connection>>,
    running: Mutex<Option<Running>>,
}

#[derive(Debug)]
struct Running {
    connection: Connection,
    cancel: CancellationToken,
    agent: bool,
}

impl SessionInner {
    pub(super) fn store(&self) -> &SessionStore {
        self.signals.dispatcher.store()
    }

    pub(super) fn connection(&self) -> Result<Connection> {
        self.connection
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| ErrorKind::SessionNotExist.into())
    }
}

impl SessionImpl {
    pub fn new(bus: EventBus) -> Self {
        SessionImpl {
            inner: Arc::new(SessionInner {
                signals: SignalDispatcher {
                    dispatcher: StoreDispatcher::new(Arc::new(SessionStore::new()), bus),
                    paths: Arc::default(),
                    players: Arc::default(),
                },
                connection: RwLock::new(None),
                running: Mutex::new(None),
            }),
        }
    }

    pub fn events(&self) -> &EventBus {
        self.inner.signals.dispatcher.bus()
    }

    pub async fn start(
        &self,
        authorizer: Option<Arc<dyn SessionAuthorizer>>,
        config: Configuration,
    ) -> Result<FeatureSet> {
        let mut running = self.inner.running.lock().await;
        if running.is_some() {
            return Err(ErrorKind::SessionExists.into());
        }

        info!("starting bluez session");
        let connection = Connection::system()
            .await
            .map_err(|e| Error::from(e).at("start-systembus"))?;

        // Subscribe before enumerating so that no change is missed in between.
        let rule = MatchRule::builder()
            .msg_type(zbus::message::Type::Signal)
            .sender(SERVICE)?
            .build();
        let stream = MessageStream::for_match_rule(rule, &connection, None)
            .await
            .map_err(|e| Error::from(e).at("start-signals"))?;

        self.hydrate(&connection)
            .await
            .map_err(|e| e.at("refresh-sessionstore"))?;

        let cancel = CancellationToken::new();
        tokio::spawn(dispatch(stream, self.inner.signals.clone(), cancel.clone()));

        let mut features = FeatureSet::new(Features::CONNECTION | Features::PAIRING | Features::MEDIA_PLAYER);
        for feature in [Features::SEND_FILE, Features::RECEIVE_FILE, Features::NETWORK] {
            features.push_error(
                feature,
                Error::new(
                    ErrorKind::NotSupported,
                    None,
                    format!("{feature} is not supported by the bluez session"),
                ),
            );
        }

        let authorizer = authorizer.unwrap_or_else(|| Arc::new(DefaultAuthorizer) as Arc<dyn SessionAuthorizer>);
        let agent = Agent::new(authorizer, self.inner.signals.paths.clone(), config.auth_timeout);
        let agent = match agent::register(&connection, agent).await {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "could not register the pairing agent");
                features.push_error(Features::PAIRING, err.at("agent-initialize"));
                false
            }
        };

        *self.inner.connection.write().unwrap_or_else(PoisonError::into_inner) = Some(connection.clone());
        *running = Some(Running {
            connection,
            cancel,
            agent,
        });
        info!(features = %features.supported(), "bluez session started");
        Ok(features)
    }

    async fn hydrate(&self, connection: &Connection) -> Result<()> {
        let _hydrating = self.inner.store().hydrating();

        let objects = BluezObjectManagerProxy::new(connection)
            .await?
            .get_managed_objects()
            .await?;
        let objects: Vec<_> = objects
            .iter()
            .map(|(path, interfaces)| {
                let interfaces = interfaces
                    .iter()
                    .map(|(name, props)| (name.clone(), variant::properties(props)))
                    .collect();
                (path.as_str().to_string(), interfaces)
            })
            .collect();
        debug!(objects = objects.len(), "enumerated bluez objects");

        self.inner.signals.hydrate(&objects)
    }

    pub async fn stop(&self) -> Result<()> {
        let state = self
            .inner
            .running
            .lock()
            .await
            .take()
            .ok_or_else(|| Error::from(ErrorKind::SessionNotExist))?;
        self.inner.connection.write().unwrap_or_else(PoisonError::into_inner).take();

        info!("stopping bluez session");
        state.cancel.cancel();
        let res = if state.agent {
            agent::unregister(&state.connection)
                .await
                .map_err(|e| e.at("stop-agent"))
        } else {
            Ok(())
        };

        self.inner.store().clear();
        self.inner.signals.paths.clear();
        self.inner.signals.players.clear();
        res
    }

    pub async fn adapters(&self) -> Result<Vec<AdapterData>> {
        self.inner.connection()?;
        Ok(self.inner.store().adapters().await)
    }

    pub fn adapter(&self, address: Address) -> AdapterImpl {
        AdapterImpl::new(self.inner.clone(), address)
    }

    pub fn device(&self, address: Address) -> DeviceImpl {
        DeviceImpl::new(self.inner.clone(), address)
    }

    pub fn obex(&self, address: Address) -> ObexImpl {
        ObexImpl::new(address)
    }

    pub fn network(&self, address: Address) -> NetworkImpl {
        NetworkImpl::new(address)
    }

    pub fn media_player(&self, address: Address) -> MediaPlayerImpl {
        MediaPlayerImpl::new(self.inner.clone(), address)
    }
}

/// Handles signals one at a time, in arrival order.
async fn dispatch(mut stream: MessageStream, signals: SignalDispatcher, cancel: CancellationToken) {
    signals.dispatcher.store().initialized().await;

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            next = stream.next() => next,
        };

        match next {
            Some(Ok(message)) => match BluezSignal::from_message(&message) {
                Ok(Some(signal)) => signals.handle(signal),
                Ok(None) => {}
                Err(err) => signals.dispatcher.error(&err.at("signal-decode")),
            },
            Some(Err(err)) => signals.dispatcher.error(&Error::from(err).at("signal-read")),
            None => break,
        }
    }
    debug!("bluez signal dispatch stopped");
}
