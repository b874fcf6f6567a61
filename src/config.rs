use serde::Deserialize;

/// Tauri plugin name. Matches the `links` key, minus its `tauri-plugin-` prefix.
pub const PLUGIN_NAME: &str = "cw-mweb";

/// Channel name the bridge answers on unless configured otherwise.
pub const DEFAULT_CHANNEL: &str = "cw_mweb";

/// Bridge configuration.
///
/// Tauri hosts supply it under `plugins.cw-mweb` in their config file;
/// every field is optional.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct BridgeConfig {
    /// Name of the message channel the bridge registers on.
    pub channel: String,
    /// Network identifier passed to the daemon constructor.
    pub network: String,
    /// Proxy address passed to the daemon constructor.
    pub proxy: String,
    /// How to launch the daemon process.
    pub daemon: SidecarConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            channel: DEFAULT_CHANNEL.to_string(),
            network: String::new(),
            proxy: String::new(),
            daemon: SidecarConfig::default(),
        }
    }
}

/// Launch settings for the daemon child process.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct SidecarConfig {
    /// Path or name of the daemon binary. Bare names are looked up on PATH.
    pub program: String,
    /// Appended after the generated arguments.
    pub extra_args: Vec<String>,
    /// How long `start` waits for the daemon to accept connections.
    pub startup_timeout_ms: u64,
}

impl Default for SidecarConfig {
    fn default() -> Self {
        Self {
            program: "mwebd".to_string(),
            extra_args: Vec::new(),
            startup_timeout_ms: 10_000,
        }
    }
}
