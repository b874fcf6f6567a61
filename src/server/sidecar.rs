//! Daemon-as-child-process implementation of [`Server`].
//!
//! The daemon binary is launched with its listen address, data directory and
//! optional network/proxy on the command line. `start` returns only once the
//! daemon accepts TCP connections on the chosen port.

use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::{debug, info, warn};

use super::{Server, ServerFactory, ServerOptions};
use crate::config::SidecarConfig;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Bind an OS-assigned localhost port.
pub fn bind() -> Result<TcpListener> {
    TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).context("failed to bind a localhost port")
}

pub fn bound_port(listener: &TcpListener) -> Result<u16> {
    Ok(listener
        .local_addr()
        .context("listener has no local addr")?
        .port())
}

/// Turn a requested port into a concrete one. 0 picks a free port; the
/// temporary listener is released before returning so the daemon can take it.
fn resolve_port(requested: u16) -> Result<u16> {
    if requested != 0 {
        return Ok(requested);
    }
    let listener = bind()?;
    bound_port(&listener)
}

/// Command line for the daemon. Network and proxy flags are only passed when set.
pub fn daemon_args(options: &ServerOptions, port: u16, extra: &[String]) -> Vec<String> {
    let mut args = vec![
        "-l".to_string(),
        format!("127.0.0.1:{}", port),
        "-d".to_string(),
        options.data_dir.clone(),
    ];
    if !options.network.is_empty() {
        args.push("-c".to_string());
        args.push(options.network.clone());
    }
    if !options.proxy.is_empty() {
        args.push("-proxy".to_string());
        args.push(options.proxy.clone());
    }
    args.extend(extra.iter().cloned());
    args
}

/// Builds [`Sidecar`] servers from a shared launch config.
pub struct SidecarFactory {
    config: SidecarConfig,
}

impl SidecarFactory {
    pub fn new(config: SidecarConfig) -> Self {
        Self { config }
    }
}

impl ServerFactory for SidecarFactory {
    fn new_server(&self, options: &ServerOptions) -> Result<Box<dyn Server>> {
        Ok(Box::new(Sidecar::new(self.config.clone(), options.clone())))
    }
}

/// One daemon child process. Spawned by `start`, killed by `stop` or on drop.
pub struct Sidecar {
    config: SidecarConfig,
    options: ServerOptions,
    child: Option<Child>,
}

impl Sidecar {
    pub fn new(config: SidecarConfig, options: ServerOptions) -> Self {
        Self {
            config,
            options,
            child: None,
        }
    }
}

impl Server for Sidecar {
    fn start(&mut self, port: u16) -> Result<u16> {
        if self.child.is_some() {
            anyhow::bail!("daemon is already running");
        }

        let port = resolve_port(port)?;
        let args = daemon_args(&self.options, port, &self.config.extra_args);

        info!("[sidecar] spawning {} {:?}", self.config.program, args);

        // Inherit stderr so daemon errors land in the host's console.
        let mut child = Command::new(&self.config.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("failed to spawn {}", self.config.program))?;

        let timeout = Duration::from_millis(self.config.startup_timeout_ms);
        if let Err(e) = wait_until_listening(&mut child, port, timeout) {
            let _ = child.kill();
            let _ = child.wait();
            return Err(e);
        }

        info!("[sidecar] daemon pid={} listening on port {}", child.id(), port);
        self.child = Some(child);
        Ok(port)
    }

    fn stop(&mut self) -> Result<()> {
        // The child stays in `self.child` until it is reaped, so a failed
        // kill or wait still leaves it for `Drop` to clean up.
        let Some(child) = self.child.as_mut() else {
            return Ok(());
        };

        if let Some(status) = child.try_wait().context("failed to poll daemon")? {
            debug!("[sidecar] daemon already exited: {}", status);
            self.child = None;
            return Ok(());
        }

        child.kill().context("failed to signal daemon")?;
        let status = child.wait().context("failed to reap daemon")?;
        self.child = None;
        info!("[sidecar] daemon stopped: {}", status);
        Ok(())
    }
}

impl Drop for Sidecar {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            warn!("[sidecar] dropping running daemon pid={}, killing it", child.id());
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Poll until the daemon accepts connections on `port`, it exits, or `timeout` passes.
fn wait_until_listening(child: &mut Child, port: u16, timeout: Duration) -> Result<()> {
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    let deadline = Instant::now() + timeout;

    loop {
        // Connect first, then check the child: an accept only counts while
        // our daemon is alive, not when another process holds the port.
        let connected = TcpStream::connect_timeout(&addr, POLL_INTERVAL).is_ok();
        if let Some(status) = child.try_wait().context("failed to poll daemon")? {
            anyhow::bail!("daemon exited before listening on port {}: {}", port, status);
        }
        if connected {
            return Ok(());
        }
        if Instant::now() >= deadline {
            anyhow::bail!("daemon did not listen on port {} within {:?}", port, timeout);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(data_dir: &str) -> ServerOptions {
        ServerOptions {
            data_dir: data_dir.to_string(),
            ..ServerOptions::default()
        }
    }

    #[test]
    fn args_omit_empty_network_and_proxy() {
        let args = daemon_args(&options("/tmp/a"), 1234, &[]);
        assert_eq!(args, vec!["-l", "127.0.0.1:1234", "-d", "/tmp/a"]);
    }

    #[test]
    fn args_include_network_proxy_and_extras() {
        let opts = ServerOptions {
            network: "testnet".to_string(),
            data_dir: "/data".to_string(),
            proxy: "127.0.0.1:9050".to_string(),
        };
        let args = daemon_args(&opts, 80, &["-v".to_string()]);
        assert_eq!(
            args,
            vec![
                "-l",
                "127.0.0.1:80",
                "-d",
                "/data",
                "-c",
                "testnet",
                "-proxy",
                "127.0.0.1:9050",
                "-v"
            ]
        );
    }

    #[test]
    fn explicit_port_is_kept() {
        assert_eq!(resolve_port(18332).unwrap(), 18332);
    }

    #[test]
    fn zero_port_resolves_to_free_port() {
        let port = resolve_port(0).unwrap();
        assert!(port > 0);
        // Released again, so it can be bound.
        assert!(TcpListener::bind((Ipv4Addr::LOCALHOST, port)).is_ok());
    }

    #[test]
    fn stop_without_start_is_noop() {
        let mut sidecar = Sidecar::new(SidecarConfig::default(), options("/tmp/a"));
        assert!(sidecar.stop().is_ok());
    }

    #[test]
    fn missing_binary_fails_to_start() {
        let config = SidecarConfig {
            program: "/nonexistent/mwebd-binary".to_string(),
            ..SidecarConfig::default()
        };
        let mut sidecar = Sidecar::new(config, options("/tmp/a"));
        let err = sidecar.start(0).unwrap_err();
        assert!(format!("{:#}", err).contains("failed to spawn"));
        assert!(sidecar.child.is_none());
    }

    #[cfg(unix)]
    #[test]
    fn daemon_exiting_early_fails_start() {
        let config = SidecarConfig {
            program: "true".to_string(),
            extra_args: Vec::new(),
            startup_timeout_ms: 5_000,
        };
        let factory = SidecarFactory::new(config);
        let mut server = factory.new_server(&options("/tmp/a")).unwrap();
        let err = server.start(0).unwrap_err();
        assert!(err.to_string().contains("exited before listening"));
        assert!(server.stop().is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn foreign_listener_does_not_count_as_daemon_ready() {
        // Someone else holds the port while our daemon is already gone.
        let listener = bind().unwrap();
        let port = bound_port(&listener).unwrap();
        let mut child = Command::new("true").spawn().unwrap();
        child.wait().unwrap();

        let err = wait_until_listening(&mut child, port, Duration::from_secs(1)).unwrap_err();
        assert!(err.to_string().contains("exited before listening"));
    }

    #[cfg(unix)]
    #[test]
    fn stop_kills_and_reaps_running_child() {
        let mut sidecar = Sidecar::new(SidecarConfig::default(), options("/tmp/a"));
        sidecar.child = Some(Command::new("sleep").arg("30").spawn().unwrap());

        assert!(sidecar.stop().is_ok());
        assert!(sidecar.child.is_none());
        // Second stop has nothing left to do.
        assert!(sidecar.stop().is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn stop_clears_already_exited_child() {
        let mut sidecar = Sidecar::new(SidecarConfig::default(), options("/tmp/a"));
        let mut child = Command::new("true").spawn().unwrap();
        child.wait().unwrap();
        sidecar.child = Some(child);

        assert!(sidecar.stop().is_ok());
        assert!(sidecar.child.is_none());
    }
}
