#![allow(clippy::let_unit_value)]

use std::path::Path;
use std::sync::Arc;

use bluetuith::eventbus::{Subscriber, Subscription};
use bluetuith::*;
use futures_lite::StreamExt;

fn assert_send<T: Send>(t: T) -> T {
    t
}

async fn check_session_apis(session: Session) -> Result<Adapter> {
    let authorizer: Arc<dyn SessionAuthorizer> = Arc::new(DefaultAuthorizer);
    let _features: Result<FeatureSet> = assert_send(session.start(Some(authorizer), Configuration::default())).await;
    let adapters: Result<Vec<AdapterData>> = assert_send(session.adapters()).await;
    let _res: Result<()> = assert_send(session.stop()).await;

    Ok(session.adapter(adapters?[0].address))
}

async fn check_adapter_apis(session: &Session, adapter: Adapter) -> Result<Device> {
    let _res: Result<()> = assert_send(adapter.set_powered_state(true)).await;
    let _res: Result<()> = assert_send(adapter.set_discoverable_state(true)).await;
    let _res: Result<()> = assert_send(adapter.set_pairable_state(true)).await;
    let _res: Result<()> = assert_send(adapter.start_discovery()).await;
    let _res: Result<()> = assert_send(adapter.stop_discovery()).await;
    let _properties: Result<AdapterData> = assert_send(adapter.properties()).await;
    let devices: Result<Vec<DeviceData>> = assert_send(adapter.devices()).await;

    Ok(session.device(devices?[0].address))
}

async fn check_device_apis(device: Device) -> Result<()> {
    let _address: Address = device.address();
    let _res: Result<()> = assert_send(device.pair()).await;
    let _res: Result<()> = assert_send(device.cancel_pairing()).await;
    let _res: Result<()> = assert_send(device.connect()).await;
    let _res: Result<()> = assert_send(device.disconnect()).await;
    let _res: Result<()> = assert_send(device.connect_profile(Uuid::nil())).await;
    let _res: Result<()> = assert_send(device.disconnect_profile(Uuid::nil())).await;
    let _res: Result<()> = assert_send(device.remove()).await;
    let _properties: Result<DeviceData> = assert_send(device.properties()).await;

    Ok(())
}

async fn check_obex_apis(obex: Obex) -> Result<()> {
    let _res: Result<()> = assert_send(obex.create_session()).await;
    let _transfer: Result<FileTransferData> = assert_send(obex.send_file(Path::new("/tmp/file.txt"))).await;
    let _res: Result<()> = assert_send(obex.suspend_transfer()).await;
    let _res: Result<()> = assert_send(obex.resume_transfer()).await;
    let _res: Result<()> = assert_send(obex.cancel_transfer()).await;
    let _res: Result<()> = assert_send(obex.remove_session()).await;

    Ok(())
}

async fn check_network_apis(network: Network) -> Result<()> {
    let _res: Result<()> = assert_send(network.connect("phone", NetworkType::Panu)).await;
    let _res: Result<()> = assert_send(network.disconnect()).await;

    Ok(())
}

async fn check_media_player_apis(player: MediaPlayer) -> Result<()> {
    let _properties: Result<MediaData> = assert_send(player.properties()).await;
    let _res: Result<()> = assert_send(player.play()).await;
    let _res: Result<()> = assert_send(player.pause()).await;
    let _res: Result<()> = assert_send(player.toggle_play_pause()).await;
    let _res: Result<()> = assert_send(player.next()).await;
    let _res: Result<()> = assert_send(player.previous()).await;
    let _res: Result<()> = assert_send(player.fast_forward()).await;
    let _res: Result<()> = assert_send(player.rewind()).await;
    let _res: Result<()> = assert_send(player.stop()).await;

    Ok(())
}

async fn check_event_apis(bus: EventBus) {
    let mut devices: Subscriber<DeviceData> = bus.subscribe();
    let _event: Option<Event<DeviceData>> = assert_send(devices.recv()).await;
    let _event: Option<Event<DeviceData>> = assert_send(devices.next()).await;

    let mut all: Subscription = bus.subscribe_kind(EventKind::All);
    let _event = assert_send(all.recv()).await;
    all.unsubscribe();
}

#[allow(unused)]
async fn check_apis() -> Result<()> {
    let session = assert_send(Session::new());
    check_event_apis(session.events().clone()).await;

    let adapter = check_session_apis(session.clone()).await?;
    let device = check_adapter_apis(&session, adapter).await?;
    let address = device.address();
    check_device_apis(device).await?;
    check_obex_apis(session.obex(address)).await?;
    check_network_apis(session.network(address)).await?;
    check_media_player_apis(session.media_player(address)).await?;

    Ok(())
}

#[test]
fn session_types_are_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Session>();
    assert_send_sync::<Adapter>();
    assert_send_sync::<Device>();
    assert_send_sync::<Obex>();
    assert_send_sync::<Network>();
    assert_send_sync::<MediaPlayer>();
    assert_send_sync::<EventBus>();
    assert_send_sync::<Error>();
}
