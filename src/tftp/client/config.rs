use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use serde::Deserialize;

use crate::tftp::core::{Mode, RetryScheduler};

/// Well-known TFTP request port
pub const DEFAULT_PORT: u16 = 69;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// TFTP client configuration
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use tftpc::tftp::client::ClientConfig;
///
/// let config = ClientConfig::new("192.168.1.100".parse().unwrap(), 69)
///     .with_timeout(Duration::from_secs(2))
///     .with_max_retries(3);
/// assert_eq!(config.server_addr().port(), 69);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Server IP address
    pub server_ip: IpAddr,
    /// Server request port (usually 69)
    pub server_port: u16,
    /// Wait per transmission
    pub timeout: Duration,
    /// Transmissions of one packet before giving up
    pub max_retries: u32,
    /// Transfer mode used by `get` and `put`
    pub mode: Mode,
}

impl ClientConfig {
    /// Create new client configuration
    ///
    /// # Arguments
    ///
    /// * `server_ip` - Server IP address
    /// * `server_port` - Server port number (usually 69)
    pub fn new(server_ip: IpAddr, server_port: u16) -> Self {
        Self {
            server_ip,
            server_port,
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            mode: Mode::Octet,
        }
    }

    /// Set timeout duration
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn server_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server_ip, self.server_port)
    }

    pub fn scheduler(&self) -> RetryScheduler {
        RetryScheduler::new(self.max_retries, self.timeout)
    }

    /// Defaults, then the config file, then `TFTPC_*` environment variables
    ///
    /// Without an explicit `path` the first existing file among
    /// `~/.config/tftpc/config.toml` and `/etc/tftpc/config.toml` is used.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = Self::default();

        let file = match path {
            Some(p) => Some(p.to_path_buf()),
            None => config_paths().into_iter().find(|p| p.exists()),
        };
        if let Some(file) = file {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read config file {}", file.display()))?;
            let parsed: FileConfig = toml::from_str(&text)
                .with_context(|| format!("Invalid config file {}", file.display()))?;
            log::debug!("Loaded config from {}", file.display());
            config.apply_file(parsed)?;
        }

        config.apply_env()?;
        Ok(config)
    }

    /// Command-line values override everything else
    pub fn merge_cli(
        mut self,
        server: Option<IpAddr>,
        port: Option<u16>,
        timeout: Option<Duration>,
        retries: Option<u32>,
        mode: Option<Mode>,
    ) -> Self {
        if let Some(server) = server {
            self.server_ip = server;
        }
        if let Some(port) = port {
            self.server_port = port;
        }
        if let Some(timeout) = timeout {
            self.timeout = timeout;
        }
        if let Some(retries) = retries {
            self.max_retries = retries;
        }
        if let Some(mode) = mode {
            self.mode = mode;
        }
        self
    }

    fn apply_file(&mut self, file: FileConfig) -> anyhow::Result<()> {
        if let Some(server) = file.server {
            self.server_ip = server;
        }
        if let Some(port) = file.port {
            self.server_port = port;
        }
        if let Some(timeout) = file.timeout {
            self.timeout = timeout;
        }
        if let Some(retries) = file.retries {
            self.max_retries = retries;
        }
        if let Some(mode) = file.mode {
            self.mode = parse_mode(&mode)?;
        }
        Ok(())
    }

    fn apply_env(&mut self) -> anyhow::Result<()> {
        if let Ok(s) = std::env::var("TFTPC_SERVER") {
            self.server_ip = s
                .parse()
                .with_context(|| format!("Invalid TFTPC_SERVER '{}'", s))?;
        }
        if let Ok(s) = std::env::var("TFTPC_PORT") {
            self.server_port = s
                .parse()
                .with_context(|| format!("Invalid TFTPC_PORT '{}'", s))?;
        }
        if let Ok(s) = std::env::var("TFTPC_TIMEOUT") {
            self.timeout = humantime_serde::re::humantime::parse_duration(&s)
                .with_context(|| format!("Invalid TFTPC_TIMEOUT '{}'", s))?;
        }
        if let Ok(s) = std::env::var("TFTPC_RETRIES") {
            self.max_retries = s
                .parse()
                .with_context(|| format!("Invalid TFTPC_RETRIES '{}'", s))?;
        }
        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_PORT)
    }
}

/// Mode names accepted in configuration and on the command line
pub fn parse_mode(s: &str) -> anyhow::Result<Mode> {
    match s.parse::<Mode>() {
        Ok(mode) => Ok(mode),
        Err(_) => bail!("Unknown transfer mode '{}', expected netascii, octet or mail", s),
    }
}

/// On-disk form, every field optional
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    server: Option<IpAddr>,
    port: Option<u16>,
    #[serde(default, with = "humantime_serde")]
    timeout: Option<Duration>,
    retries: Option<u32>,
    mode: Option<String>,
}

fn config_paths() -> Vec<PathBuf> {
    let mut out = Vec::new();
    if let Some(home) = std::env::var_os("HOME").map(PathBuf::from) {
        out.push(home.join(".config/tftpc/config.toml"));
    }
    out.push(PathBuf::from("/etc/tftpc/config.toml"));
    out
}
