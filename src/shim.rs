#![allow(unused)] // used depending on the target.

pub mod adapter;
pub(crate) mod codec;
pub(crate) mod command;
pub mod device;
mod listener;
pub mod media_player;
pub mod network;
pub mod obex;
pub mod session;
pub(crate) mod transport;
