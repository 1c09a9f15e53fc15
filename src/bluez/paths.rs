use dashmap::DashMap;

use crate::Address;

/// Two-way mapping between BlueZ object paths and hardware addresses.
#[derive(Debug, Default)]
pub(super) struct PathRegistry {
    adapters: Paths,
    devices: Paths,
    /// Media player object paths, keyed by the address of the device hosting them.
    players: DashMap<Address, String>,
}

#[derive(Debug, Default)]
struct Paths {
    by_path: DashMap<String, Address>,
    by_address: DashMap<Address, String>,
}

impl Paths {
    fn insert(&self, path: &str, address: Address) {
        self.by_path.insert(path.to_string(), address);
        self.by_address.insert(address, path.to_string());
    }

    fn remove(&self, path: &str) -> Option<Address> {
        let (_, address) = self.by_path.remove(path)?;
        self.by_address.remove_if(&address, |_, x| x == path);
        Some(address)
    }

    fn address(&self, path: &str) -> Option<Address> {
        self.by_path.get(path).map(|x| *x)
    }

    fn path(&self, address: Address) -> Option<String> {
        self.by_address.get(&address).map(|x| x.clone())
    }

    fn clear(&self) {
        self.by_path.clear();
        self.by_address.clear();
    }
}

impl PathRegistry {
    pub fn insert_adapter(&self, path: &str, address: Address) {
        self.adapters.insert(path, address);
    }

    pub fn remove_adapter(&self, path: &str) -> Option<Address> {
        self.adapters.remove(path)
    }

    pub fn adapter_address(&self, path: &str) -> Option<Address> {
        self.adapters.address(path)
    }

    pub fn adapter_path(&self, address: Address) -> Option<String> {
        self.adapters.path(address)
    }

    pub fn insert_device(&self, path: &str, address: Address) {
        self.devices.insert(path, address);
    }

    pub fn remove_device(&self, path: &str) -> Option<Address> {
        self.devices.remove(path)
    }

    pub fn device_address(&self, path: &str) -> Option<Address> {
        self.devices.address(path)
    }

    pub fn device_path(&self, address: Address) -> Option<String> {
        self.devices.path(address)
    }

    pub fn insert_player(&self, device: Address, path: &str) {
        self.players.insert(device, path.to_string());
    }

    pub fn remove_player(&self, device: Address) {
        self.players.remove(&device);
    }

    pub fn player_path(&self, device: Address) -> Option<String> {
        self.players.get(&device).map(|x| x.clone())
    }

    pub fn clear(&self) {
        self.adapters.clear();
        self.devices.clear();
        self.players.clear();
    }
}

/// The path of the object owning `path`, e.g. the device of a media player.
pub(super) fn parent(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) => "/",
        Some(i) => &path[..i],
        None => path,
    }
}
