//! Tauri v2 plugin wiring.
//!
//! The host adds `cw_mweb_lib::init()` to its builder and calls
//! `invoke("plugin:cw-mweb|start", { dataDir })` from the frontend. The
//! daemon is stopped when the app exits or the plugin is dropped.

use std::sync::Arc;

use serde_json::Value;
use tauri::plugin::{Builder, TauriPlugin};
use tauri::{Manager, RunEvent, Runtime, State};

use crate::bridge::{Bridge, Command, Response};
use crate::channel::{ChannelRegistry, MethodCall, MethodResult};
use crate::config::{BridgeConfig, PLUGIN_NAME};
use crate::server::sidecar::SidecarFactory;

/// Managed plugin state.
pub struct BridgeState {
    bridge: Arc<Bridge>,
    registry: Arc<ChannelRegistry>,
}

impl BridgeState {
    fn teardown(&self) {
        self.bridge.detach(&*self.registry);
    }
}

/// Start the daemon (once) and return its port.
///
/// Runs on the blocking pool: the first start waits for the daemon to listen.
#[tauri::command]
async fn start(state: State<'_, BridgeState>, data_dir: Option<String>) -> Result<u16, String> {
    let bridge = state.bridge.clone();
    let command = Command::Start {
        data_dir: data_dir.unwrap_or_default(),
    };

    let response = tauri::async_runtime::spawn_blocking(move || bridge.handle(command))
        .await
        .map_err(|e| format!("start task failed: {}", e))?;

    match response {
        Ok(Response::Port(port)) => Ok(port),
        Err(e) => Err(format!("{:#}", e)),
    }
}

/// Deliver a raw method call on the bridge's channel.
#[tauri::command]
async fn call(
    state: State<'_, BridgeState>,
    method: String,
    arguments: Option<Value>,
) -> Result<MethodResult, String> {
    let bridge = state.bridge.clone();
    let registry = state.registry.clone();
    let call = MethodCall::new(method, arguments.unwrap_or(Value::Null));

    tauri::async_runtime::spawn_blocking(move || registry.dispatch(bridge.channel(), call))
        .await
        .map_err(|e| format!("call task failed: {}", e))
}

/// Build the plugin. Reads an optional [`BridgeConfig`] from `plugins.cw-mweb`.
pub fn init<R: Runtime>() -> TauriPlugin<R, Option<BridgeConfig>> {
    Builder::<R, Option<BridgeConfig>>::new(PLUGIN_NAME)
        .invoke_handler(tauri::generate_handler![start, call])
        .setup(|app, api| {
            let config = api.config().clone().unwrap_or_default();
            let bridge = Bridge::new(&config, SidecarFactory::new(config.daemon.clone()));
            let registry = Arc::new(ChannelRegistry::new());
            bridge.attach(&*registry);
            app.manage(BridgeState { bridge, registry });
            Ok(())
        })
        .on_event(|app, event| {
            if let RunEvent::Exit = event {
                if let Some(state) = app.try_state::<BridgeState>() {
                    state.teardown();
                }
            }
        })
        .on_drop(|app| {
            if let Some(state) = app.try_state::<BridgeState>() {
                state.teardown();
            }
        })
        .build()
}
