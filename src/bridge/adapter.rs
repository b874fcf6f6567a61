use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use log::{debug, error, info, warn};

use super::command::{Command, Response};
use crate::channel::{BinaryMessenger, MethodCall, MethodCallHandler, MethodResult};
use crate::config::BridgeConfig;
use crate::server::{Server, ServerFactory, ServerOptions};

/// Port request that lets the daemon choose.
const EPHEMERAL_PORT: u16 = 0;

/// Code carried by error replies for failures raised while handling a call.
const ERROR_CODE: &str = "error";

/// A started daemon and the port it reported. Only ever stored as a pair.
struct Running {
    server: Box<dyn Server>,
    port: u16,
    data_dir: String,
}

/// Lifecycle of the bridge's daemon. `Stopped` is terminal.
enum State {
    Idle,
    Running(Running),
    Stopped,
}

/// Answers the `start` method on a channel by starting a single daemon.
///
/// The daemon is built lazily on the first `start` and reused for the rest
/// of the bridge's life; later `dataDir` arguments are ignored. Detaching
/// (or dropping) the bridge stops it, after which `start` fails.
pub struct Bridge {
    channel: String,
    network: String,
    proxy: String,
    factory: Box<dyn ServerFactory>,
    state: Mutex<State>,
}

impl Bridge {
    pub fn new(config: &BridgeConfig, factory: impl ServerFactory + 'static) -> Arc<Self> {
        Arc::new(Self {
            channel: config.channel.clone(),
            network: config.network.clone(),
            proxy: config.proxy.clone(),
            factory: Box::new(factory),
            state: Mutex::new(State::Idle),
        })
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// The cached port, if the daemon has been started and not stopped.
    pub fn port(&self) -> Option<u16> {
        match &*self.lock() {
            State::Running(running) => Some(running.port),
            State::Idle | State::Stopped => None,
        }
    }

    /// Register as the handler for this bridge's channel.
    pub fn attach(self: &Arc<Self>, messenger: &dyn BinaryMessenger) {
        let handler: Arc<dyn MethodCallHandler> = self.clone();
        messenger.set_method_call_handler(&self.channel, Some(handler));
        info!("[attach] handling channel '{}'", self.channel);
    }

    /// Unregister from the channel and stop the daemon if one is running.
    pub fn detach(&self, messenger: &dyn BinaryMessenger) {
        messenger.set_method_call_handler(&self.channel, None);
        info!("[detach] released channel '{}'", self.channel);
        self.shutdown();
    }

    /// Stop the daemon, if any, and refuse further starts.
    /// Stop failures are logged, never returned.
    pub fn shutdown(&self) {
        let previous = std::mem::replace(&mut *self.lock(), State::Stopped);
        let State::Running(mut running) = previous else {
            return;
        };
        match running.server.stop() {
            Ok(()) => info!("[stop] daemon on port {} stopped", running.port),
            Err(e) => warn!("[stop] daemon on port {} failed to stop: {:#}", running.port, e),
        }
    }

    pub fn handle(&self, command: Command) -> Result<Response> {
        match command {
            Command::Start { data_dir } => self.start(&data_dir).map(Response::Port),
        }
    }

    fn start(&self, data_dir: &str) -> Result<u16> {
        // Held across construct + start so concurrent callers build at most one daemon.
        let mut state = self.lock();

        match &*state {
            State::Running(existing) => {
                if existing.data_dir != data_dir {
                    debug!(
                        "[start] already running from {:?}, ignoring dataDir {:?}",
                        existing.data_dir, data_dir
                    );
                }
                return Ok(existing.port);
            }
            State::Stopped => anyhow::bail!("bridge on '{}' is detached", self.channel),
            State::Idle => {}
        }

        let options = ServerOptions {
            network: self.network.clone(),
            data_dir: data_dir.to_string(),
            proxy: self.proxy.clone(),
        };
        info!("[start] creating daemon data_dir={:?} network={:?}", data_dir, self.network);

        let mut server = self.factory.new_server(&options)?;
        let port = match server.start(EPHEMERAL_PORT) {
            Ok(port) => port,
            Err(e) => {
                error!("[start] daemon failed to start: {:#}", e);
                if let Err(stop_err) = server.stop() {
                    warn!("[start] cleanup stop failed: {:#}", stop_err);
                }
                return Err(e);
            }
        };

        info!("[start] daemon listening on port {}", port);
        *state = State::Running(Running {
            server,
            port,
            data_dir: data_dir.to_string(),
        });
        Ok(port)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MethodCallHandler for Bridge {
    fn on_method_call(&self, call: MethodCall) -> MethodResult {
        let command = match Command::parse(&call) {
            Ok(Some(command)) => command,
            Ok(None) => {
                debug!("[{}] '{}' not implemented", self.channel, call.method);
                return MethodResult::NotImplemented;
            }
            Err(e) => return MethodResult::error(ERROR_CODE, format!("{:#}", e)),
        };

        match self.handle(command) {
            Ok(response) => response.into(),
            Err(e) => MethodResult::error(ERROR_CODE, format!("{:#}", e)),
        }
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}
