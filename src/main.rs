use std::io::Write;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use humantime_serde::re::humantime::parse_duration;
use log::{info, warn};

use tftpc::tftp::client::{Client, ClientConfig, parse_mode, remove_partial};
use tftpc::tftp::core::Mode;

#[derive(Parser)]
#[command(name = "tftpc", version, about = "TFTP client (RFC 1350)")]
struct Cli {
    /// Config file (default: ~/.config/tftpc/config.toml or /etc/tftpc/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Server IP address
    #[arg(short, long, global = true)]
    server: Option<IpAddr>,

    /// Server port
    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// Transfer mode: netascii or octet
    #[arg(short, long, global = true, value_parser = parse_mode)]
    mode: Option<Mode>,

    /// Wait per transmission, e.g. "2s" or "500ms"
    #[arg(short, long, global = true, value_parser = parse_duration)]
    timeout: Option<Duration>,

    /// Transmissions of each packet before giving up
    #[arg(short, long, global = true)]
    retries: Option<u32>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download a file
    Get {
        remote: String,
        /// Defaults to the remote file name
        local: Option<PathBuf>,
        /// Overwrite an existing local file without asking
        #[arg(short, long)]
        force: bool,
    },
    /// Upload a file
    Put {
        local: PathBuf,
        /// Defaults to the local file name
        remote: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    let config = ClientConfig::load(cli.config.as_deref())?.merge_cli(
        cli.server,
        cli.port,
        cli.timeout,
        cli.retries,
        cli.mode,
    );
    info!(
        "Server {}, timeout {:?}, {} attempt(s), mode {}",
        config.server_addr(),
        config.timeout,
        config.max_retries,
        config.mode
    );

    let client = Client::new(config)?;
    let mut partial = None;
    let transfer = match cli.command {
        Command::Get {
            remote,
            local,
            force,
        } => {
            let local = local.unwrap_or_else(|| default_local(&remote));
            if local.exists() && !force && !confirm_overwrite(&local)? {
                bail!("Not overwriting {}", local.display());
            }
            partial = Some(local.clone());
            tokio::task::spawn_blocking(move || client.get(&remote, &local))
        }
        Command::Put { local, remote } => {
            let remote = match remote {
                Some(remote) => remote,
                None => default_remote(&local)?,
            };
            tokio::task::spawn_blocking(move || client.put(&remote, &local))
        }
    };

    tokio::select! {
        joined = transfer => {
            let bytes = joined.context("Transfer task panicked")??;
            info!("{} bytes transferred", bytes);
            Ok(())
        }
        _ = tokio::signal::ctrl_c() => {
            // The blocking transfer cannot be joined early, so leave without it
            warn!("Interrupted, abandoning transfer");
            if let Some(local) = partial {
                remove_partial(&local);
            }
            std::process::exit(130);
        }
    }
}

fn init_logger(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.args()
            )
        })
        .init();
}

fn confirm_overwrite(local: &Path) -> Result<bool> {
    dialoguer::Confirm::new()
        .with_prompt(format!("{} exists, overwrite?", local.display()))
        .default(false)
        .interact()
        .context("Cannot ask for confirmation, use --force")
}

fn default_local(remote: &str) -> PathBuf {
    let name = remote.rsplit(['/', '\\']).next().unwrap_or(remote);
    PathBuf::from(name)
}

fn default_remote(local: &Path) -> Result<String> {
    let name = local
        .file_name()
        .with_context(|| format!("Cannot derive a remote name from {}", local.display()))?;
    Ok(name.to_string_lossy().into_owned())
}
