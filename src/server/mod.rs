pub mod sidecar;

use anyhow::Result;

/// Arguments handed to the daemon constructor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerOptions {
    /// Network identifier. Empty means the daemon's default (mainnet).
    pub network: String,
    /// Directory the daemon keeps its chain and UTXO state in. Passed through as-is.
    pub data_dir: String,
    /// Proxy address for peer connections. Empty means direct.
    pub proxy: String,
}

/// A constructed daemon instance.
///
/// The bridge treats this as opaque: whatever threads, sockets or
/// processes sit behind it belong to the implementation.
pub trait Server: Send {
    /// Start serving. A `port` of 0 asks the server to pick one.
    /// Returns the port actually bound.
    fn start(&mut self, port: u16) -> Result<u16>;

    /// Signal the server to stop. Does not promise a synchronous drain.
    fn stop(&mut self) -> Result<()>;
}

/// Builds [`Server`] handles. Equivalent to the daemon library's `newServer`.
pub trait ServerFactory: Send + Sync {
    fn new_server(&self, options: &ServerOptions) -> Result<Box<dyn Server>>;
}
