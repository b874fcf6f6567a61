//! Host bridge for an embedded MWEB daemon.
//!
//! A [`Bridge`] attaches to a named method channel, starts the daemon on the
//! first `start` call and answers every later `start` with the same port.
//! With the `tauri` feature the bridge is also available as a Tauri plugin.

pub mod bridge;
pub mod channel;
pub mod config;
pub mod server;

#[cfg(feature = "tauri")]
mod plugin;

pub use bridge::{Bridge, Command, Response};
pub use channel::{BinaryMessenger, ChannelRegistry, MethodCall, MethodCallHandler, MethodResult};
pub use config::{BridgeConfig, SidecarConfig, PLUGIN_NAME};
pub use server::sidecar::SidecarFactory;
pub use server::{Server, ServerFactory, ServerOptions};

#[cfg(feature = "tauri")]
pub use plugin::{init, BridgeState};
