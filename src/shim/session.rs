use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex, PoisonError, RwLock};
use std::time::Duration;

use tokio::process::{Child, Command as Process};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::adapter::AdapterImpl;
use super::command::{self, Command};
use super::device::DeviceImpl;
use super::listener::Listener;
use super::media_player::MediaPlayerImpl;
use super::network::NetworkImpl;
use super::obex::ObexImpl;
use super::transport::Transport;
use crate::auth::{DefaultAuthorizer, SessionAuthorizer};
use crate::config::Configuration;
use crate::dispatch::StoreDispatcher;
use crate::error::ErrorKind;
use crate::eventbus::EventBus;
use crate::features::{FeatureSet, Features};
use crate::store::SessionStore;
use crate::types::{AdapterData, DeviceType};
use crate::{Address, Error, Result, Uuid};

/// How long the helper gets to fail before it is assumed to be listening.
const STARTUP_GRACE: Duration = Duration::from_secs(1);

/// How long a stopping helper gets to exit before it is killed.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// A session backed by the helper process.
#[derive(Debug, Clone)]
pub struct SessionImpl {
    inner: Arc<SessionInner>,
}

pub(super) struct SessionInner {
    dispatcher: StoreDispatcher,
    transport: RwLock<Option<Arc<Transport>>>,
    starting: StdMutex<Option<CancellationToken>>,
    running: Mutex<Option<Running>>,
}

impl std::fmt::Debug for SessionInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionInner")
            .field("transport", &self.transport)
            .finish_non_exhaustive()
    }
}

struct Running {
    transport: Arc<Transport>,
    cancel: CancellationToken,
    child: Child,
    /// Set when the socket path was generated and should be cleaned up.
    generated_socket: Option<PathBuf>,
}

impl SessionInner {
    pub(super) fn store(&self) -> &SessionStore {
        self.dispatcher.store()
    }

    pub(super) fn transport(&self) -> Result<Arc<Transport>> {
        self.transport
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .filter(|x| !x.is_closed())
            .ok_or_else(|| ErrorKind::SessionNotExist.into())
    }

    /// Runs a command on behalf of the adapter or device at `address`.
    pub(super) async fn run<T>(&self, command: Command<T>, address: Address) -> Result<T>
    where
        T: serde::de::DeserializeOwned + Default,
    {
        let transport = self.transport().map_err(|e| e.at(command.name()).with_address(address))?;
        command.execute(&transport).await.map_err(|e| e.with_address(address))
    }
}

impl SessionImpl {
    pub fn new(bus: EventBus) -> Self {
        SessionImpl {
            inner: Arc::new(SessionInner {
                dispatcher: StoreDispatcher::new(Arc::new(SessionStore::new()), bus),
                transport: RwLock::new(None),
                starting: StdMutex::new(None),
                running: Mutex::new(None),
            }),
        }
    }

    pub fn events(&self) -> &EventBus {
        self.inner.dispatcher.bus()
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

        let cancel = CancellationToken::new();
        *self.inner.starting.lock().unwrap_or_else(PoisonError::into_inner) = Some(cancel.clone());

        let res = self.launch(authorizer, config, cancel).await;
        self.inner.starting.lock().unwrap_or_else(PoisonError::into_inner).take();

        let (state, features) = res?;
        *self.inner.transport.write().unwrap_or_else(PoisonError::into_inner) = Some(state.transport.clone());
        *running = Some(state);
        info!(features = %features.supported(), "helper session started");
        Ok(features)
    }

    async fn launch(
        &self,
        authorizer: Option<Arc<dyn SessionAuthorizer>>,
        config: Configuration,
        cancel: CancellationToken,
    ) -> Result<(Running, FeatureSet)> {
        let authorizer = authorizer.unwrap_or_else(|| Arc::new(DefaultAuthorizer) as Arc<dyn SessionAuthorizer>);
        let shim_path = config.shim_path.clone().ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidParameter,
                None,
                "no helper executable is configured".to_string(),
            )
            .at("start-shim")
        })?;
        let (socket_path, generated_socket) = match &config.socket_path {
            Some(path) => (path.clone(), None),
            None => {
                let path = temp_socket_path();
                (path.clone(), Some(path))
            }
        };

        info!(shim = %shim_path.display(), socket = %socket_path.display(), "starting helper session");
        let mut child = Process::new(&shim_path)
            .args(command::start_session_args(&socket_path))
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::from(e).at("start-shim"))?;

        wait_for_startup(&mut child, &cancel)
            .await
            .map_err(|e| e.at("exec-shim"))?;

        let stream = dial(&socket_path).await.map_err(|e| e.at("listener-shim"))?;
        let (transport, inbound) = Transport::spawn(stream, config.command_timeout, cancel.child_token());
        debug!("helper listener connected");

        // Held until hydration ends so that events the helper sends meanwhile wait for it, also on a restart.
        let hydrating = self.inner.store().hydrating();
        let listener = Listener {
            dispatcher: self.inner.dispatcher.clone(),
            transport: transport.clone(),
            authorizer,
            auth_timeout: config.auth_timeout,
        };
        tokio::spawn(listener.run(inbound, cancel.clone()));

        let res = async {
            let supported = command::feature_flags()
                .execute(&transport)
                .await
                .map_err(|e| e.at("shim-features"))?;
            hydrate(&transport, &self.inner.dispatcher)
                .await
                .map_err(|e| e.at("shim-store"))?;
            Ok::<_, Error>(supported)
        }
        .await;

        let supported = match res {
            Ok(supported) => supported,
            Err(err) => {
                warn!(error = %err, "helper session failed to start");
                transport.close().await;
                cancel.cancel();
                let _ = child.kill().await;
                self.inner.store().clear();
                remove_socket(generated_socket.as_deref());
                return Err(err);
            }
        };
        drop(hydrating);

        let mut features = FeatureSet::new(supported);
        for feature in supported.absent() {
            features.push_error(
                feature,
                Error::new(
                    ErrorKind::NotSupported,
                    None,
                    format!("{feature} is not supported by the helper"),
                ),
            );
        }

        let state = Running {
            transport,
            cancel,
            child,
            generated_socket,
        };
        Ok((state, features))
    }

    pub async fn stop(&self) -> Result<()> {
        let cancelled_start = match self.inner.starting.lock().unwrap_or_else(PoisonError::into_inner).take() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        };

        let Some(mut state) = self.inner.running.lock().await.take() else {
            return if cancelled_start {
                Ok(())
            } else {
                Err(ErrorKind::SessionNotExist.into())
            };
        };
        self.inner.transport.write().unwrap_or_else(PoisonError::into_inner).take();

        info!("stopping helper session");
        let res = command::stop_session().execute(&state.transport).await;
        state.transport.close().await;
        state.cancel.cancel();

        if tokio::time::timeout(SHUTDOWN_GRACE, state.child.wait()).await.is_err() {
            debug!("helper did not exit, killing it");
            let _ = state.child.kill().await;
        }
        self.inner.store().clear();
        remove_socket(state.generated_socket.as_deref());

        res.map(drop).map_err(|e| e.at("stop-shim"))
    }

    pub async fn adapters(&self) -> Result<Vec<AdapterData>> {
        self.inner.transport()?;
        Ok(self.inner.store().adapters().await)
    }

    pub fn adapter(&self, address: Address) -> AdapterImpl {
        AdapterImpl::new(self.inner.clone(), address)
    }

    pub fn device(&self, address: Address) -> DeviceImpl {
        DeviceImpl::new(self.inner.clone(), address)
    }

    pub fn obex(&self, address: Address) -> ObexImpl {
        ObexImpl::new(self.inner.clone(), address)
    }

    pub fn network(&self, address: Address) -> NetworkImpl {
        NetworkImpl::new(address)
    }

    pub fn media_player(&self, address: Address) -> MediaPlayerImpl {
        MediaPlayerImpl::new(address)
    }
}

/// Fills the store with every adapter and its paired devices. Runs while the caller holds the hydration barrier.
async fn hydrate(transport: &Transport, dispatcher: &StoreDispatcher) -> Result<()> {
    let store = dispatcher.store();
    store.clear();

    for adapter in command::adapters().execute(transport).await? {
        let address = adapter.address;
        store.add_adapter(adapter);

        let devices = command::paired_devices(address)
            .execute(transport)
            .await
            .map_err(|e| e.with_address(address))?;
        for mut device in devices {
            device.associated_adapter = address;
            device.device_type = DeviceType::from_class(device.class);
            store.add_device(device);
        }
    }

    Ok(())
}

async fn wait_for_startup(child: &mut Child, cancel: &CancellationToken) -> Result<()> {
    tokio::select! {
        status = child.wait() => {
            let status = status?;
            Err(Error::new(
                ErrorKind::ProcessExited,
                None,
                format!("the helper exited during startup ({status})"),
            ))
        }
        _ = cancel.cancelled() => Err(ErrorKind::SessionNotExist.into()),
        _ = tokio::time::sleep(STARTUP_GRACE) => Ok(()),
    }
}

fn temp_socket_path() -> PathBuf {
    let name = format!("shim_sock_{}", Uuid::new_v4().simple());
    #[cfg(windows)]
    {
        PathBuf::from(format!(r"\\.\pipe\{name}"))
    }
    #[cfg(not(windows))]
    {
        std::env::temp_dir().join(name)
    }
}

fn remove_socket(path: Option<&Path>) {
    #[cfg(unix)]
    if let Some(path) = path {
        let _ = std::fs::remove_file(path);
    }
    #[cfg(not(unix))]
    let _ = path;
}

#[cfg(unix)]
async fn dial(path: &Path) -> Result<tokio::net::UnixStream> {
    Ok(tokio::net::UnixStream::connect(path).await?)
}

#[cfg(windows)]
async fn dial(path: &Path) -> Result<tokio::net::windows::named_pipe::NamedPipeClient> {
    Ok(tokio::net::windows::named_pipe::ClientOptions::new().open(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn start_without_helper_path_fails() {
        let session = SessionImpl::new(EventBus::disabled());
        let err = session.start(None, Configuration::default()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
        assert_eq!(session.stop().await.unwrap_err().kind(), ErrorKind::SessionNotExist);
    }

    #[tokio::test]
    async fn commands_on_a_stopped_session_fail() {
        let session = SessionImpl::new(EventBus::disabled());
        let address = Address::new([1, 2, 3, 4, 5, 6]);
        let err = session.device(address).pair().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SessionNotExist);
        assert_eq!(err.address(), Some(address));
        assert_eq!(session.adapters().await.unwrap_err().kind(), ErrorKind::SessionNotExist);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn helper_exiting_early_fails_start() {
        let session = SessionImpl::new(EventBus::disabled());
        let config = Configuration::default().with_shim_path("false");

        let err = session.start(None, config).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProcessExited);
        assert_eq!(err.operation(), Some("exec-shim"));
        assert_eq!(session.stop().await.unwrap_err().kind(), ErrorKind::SessionNotExist);
    }

    #[cfg(unix)]
    mod fake_helper {
        use std::os::unix::fs::PermissionsExt;

        use bytes::{BufMut, BytesMut};
        use serde_json::{json, Value};
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::{UnixListener, UnixStream};

        use super::*;
        use crate::event::{ErrorEventData, EventAction};
        use crate::shim::codec::{Header, API_VERSION, HEADER_LEN};
        use crate::types::DeviceData;

        const ADAPTER: &str = "00:1A:7D:DA:71:13";
        const DEVICE: &str = "AC:80:0A:2F:15:E6";

        async fn write_frame(stream: &mut UnixStream, request_id: i64, event_id: u8, body: Value) {
            let payload = serde_json::to_vec(&body).unwrap();
            let header = Header {
                version: API_VERSION,
                flags: 1,
                event_id,
                request_id,
                operation_id: 0,
                content_length: payload.len() as u32,
            };
            let mut buf = BytesMut::new();
            buf.put_slice(&header.pack());
            buf.put_slice(&payload);
            stream.write_all(&buf).await.unwrap();
        }

        /// Answers the startup commands. A battery change for the paired device is reported right after the
        /// feature flags, before the session has listed anything.
        async fn serve(listener: UnixListener) {
            let (mut stream, _) = listener.accept().await.unwrap();
            loop {
                let mut header = [0u8; HEADER_LEN];
                if stream.read_exact(&mut header).await.is_err() {
                    return;
                }
                let header = Header::unpack(&header).unwrap();
                let mut payload = vec![0u8; header.content_length as usize];
                stream.read_exact(&mut payload).await.unwrap();
                let request: Value = serde_json::from_slice(&payload).unwrap();
                let command: Vec<String> = serde_json::from_value(request["command"].clone()).unwrap();

                let data = match command[..2].join(" ").as_str() {
                    "rpc feature-flags" => json!({ "features": (Features::CONNECTION | Features::PAIRING).bits() }),
                    "adapter list" => json!({ "adapters": [{ "address": ADAPTER, "name": "hci0", "powered": true }] }),
                    "adapter get-paired-devices" => {
                        json!({ "devices": [{ "address": DEVICE, "name": "Headphones", "class": 0x240418, "paired": true }] })
                    }
                    _ => Value::Null,
                };
                write_frame(&mut stream, header.request_id, 0, json!({ "status": "ok", "data": data })).await;

                if command[..2] == ["rpc", "feature-flags"] {
                    let event = json!({
                        "event_id": 3,
                        "event_action": "updated",
                        "event": { "device": { "address": DEVICE, "percentage": 87, "connected": true } },
                    });
                    write_frame(&mut stream, 0, 3, event).await;
                }
            }
        }

        fn sleeper_script(dir: &Path) -> PathBuf {
            let path = dir.join(format!("fake_shim_{}", Uuid::new_v4().simple()));
            std::fs::write(&path, "#!/bin/sh\nsleep 30\n").unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        fn init_tracing() {
            use tracing_subscriber::filter::LevelFilter;
            use tracing_subscriber::prelude::*;
            use tracing_subscriber::{fmt, EnvFilter};

            let _ = tracing_subscriber::registry()
                .with(fmt::layer().with_test_writer())
                .with(
                    EnvFilter::builder()
                        .with_default_directive(LevelFilter::DEBUG.into())
                        .from_env_lossy(),
                )
                .try_init();
        }

        #[tokio::test]
        async fn start_hydrates_and_applies_events() {
            init_tracing();
            let dir = std::env::temp_dir();
            let socket = dir.join(format!("fake_shim_sock_{}", Uuid::new_v4().simple()));
            let script = sleeper_script(&dir);
            let server = tokio::spawn(serve(UnixListener::bind(&socket).unwrap()));

            let bus = EventBus::new();
            let mut devices = bus.subscribe::<DeviceData>();
            let session = SessionImpl::new(bus);
            let config = Configuration::default()
                .with_shim_path(&script)
                .with_socket_path(&socket);

            let features = session.start(None, config.clone()).await.unwrap();
            assert!(features.has(Features::CONNECTION | Features::PAIRING));
            assert_eq!(features.error(Features::SEND_FILE).unwrap().kind(), ErrorKind::NotSupported);
            assert_eq!(
                session.start(None, config).await.unwrap_err().kind(),
                ErrorKind::SessionExists
            );

            let adapter: Address = ADAPTER.parse().unwrap();
            let device: Address = DEVICE.parse().unwrap();
            let adapters = session.adapters().await.unwrap();
            assert_eq!(adapters.len(), 1);
            assert_eq!(adapters[0].address, adapter);

            let event = tokio::time::timeout(Duration::from_secs(5), devices.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(event.action, EventAction::Updated);
            assert_eq!(event.data.address, device);
            assert_eq!(event.data.percentage, Some(87));
            assert_eq!(event.data.name, "Headphones");
            assert_eq!(event.data.associated_adapter, adapter);
            assert_eq!(event.data.device_type, DeviceType::Headphones);

            let cached = session.device(device).properties().await.unwrap();
            assert!(cached.connected);

            session.stop().await.unwrap();
            assert_eq!(session.stop().await.unwrap_err().kind(), ErrorKind::SessionNotExist);

            server.abort();
            let _ = std::fs::remove_file(&socket);
            let _ = std::fs::remove_file(&script);
        }

        #[tokio::test]
        async fn restarted_session_waits_for_hydration_again() {
            init_tracing();
            let dir = std::env::temp_dir();
            let script = sleeper_script(&dir);

            let bus = EventBus::new();
            let mut devices = bus.subscribe::<DeviceData>();
            let mut errors = bus.subscribe::<ErrorEventData>();
            let session = SessionImpl::new(bus);
            let device: Address = DEVICE.parse().unwrap();

            for _ in 0..2 {
                let socket = dir.join(format!("fake_shim_sock_{}", Uuid::new_v4().simple()));
                let server = tokio::spawn(serve(UnixListener::bind(&socket).unwrap()));
                let config = Configuration::default()
                    .with_shim_path(&script)
                    .with_socket_path(&socket);

                session.start(None, config).await.unwrap();
                let event = tokio::time::timeout(Duration::from_secs(5), devices.recv())
                    .await
                    .unwrap()
                    .unwrap();
                assert_eq!(event.action, EventAction::Updated);
                assert_eq!(event.data.address, device);
                assert_eq!(event.data.percentage, Some(87));
                assert_eq!(event.data.name, "Headphones");
                assert!(errors.try_recv().is_none());

                session.stop().await.unwrap();
                assert_eq!(
                    session.inner.store().device_now(device).unwrap_err().kind(),
                    ErrorKind::DeviceNotFound
                );
                server.abort();
                let _ = std::fs::remove_file(&socket);
            }

            let _ = std::fs::remove_file(&script);
        }
    }
}
