pub mod adapter;
mod agent;
pub mod device;
mod error;
pub mod media_player;
pub mod obex;
mod paths;
mod proxies;
pub mod session;
mod signal;
mod variant;

pub use crate::shim::network;
