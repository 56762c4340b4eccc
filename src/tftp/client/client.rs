use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::Path;

use super::config::ClientConfig;
use super::session::TransferSession;
use super::stream::{BlockReader, BlockWriter};
use crate::tftp::core::{Bind, Mode, NetasciiReader, NetasciiWriter, UdpBinder};
use crate::tftp::error::{Error, TransferError};

/// TFTP client
///
/// Supports file upload (PUT) and download (GET) operations. Each call runs
/// its own [`TransferSession`] from `INIT` to `EXIT`.
///
/// # Example
///
/// ```rust,no_run
/// use tftpc::tftp::client::{Client, ClientConfig};
/// use std::path::Path;
///
/// let config = ClientConfig::new("192.168.1.100".parse().unwrap(), 69);
/// let client = Client::new(config).unwrap();
///
/// // Download file
/// client.get("remote.txt", Path::new("local.txt")).unwrap();
///
/// // Upload file
/// client.put("remote.txt", Path::new("local.txt")).unwrap();
/// ```
pub struct Client<B: Bind = UdpBinder> {
    config: ClientConfig,
    binder: B,
}

impl Client<UdpBinder> {
    /// Create a new TFTP client
    pub fn new(config: ClientConfig) -> anyhow::Result<Self> {
        Ok(Self::with_binder(config, UdpBinder))
    }
}

impl<B: Bind + Clone> Client<B> {
    pub fn with_binder(config: ClientConfig, binder: B) -> Self {
        Self { config, binder }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// A fresh session in `INIT`, for driving a transfer step by step
    pub fn session(&self) -> Result<TransferSession<B>, TransferError> {
        TransferSession::with_binder(
            self.binder.clone(),
            self.config.server_addr(),
            self.config.scheduler(),
        )
    }

    /// Download a file from the server in the configured mode
    ///
    /// # Arguments
    ///
    /// * `remote_file` - File name on the server
    /// * `local_file` - Local save path
    pub fn get(&self, remote_file: &str, local_file: &Path) -> Result<u64, TransferError> {
        self.get_with_mode(remote_file, local_file, self.config.mode)
    }

    /// Download a file, returning the number of bytes received
    ///
    /// A partially written local file is removed when the transfer fails.
    pub fn get_with_mode(
        &self,
        remote_file: &str,
        local_file: &Path,
        mode: Mode,
    ) -> Result<u64, TransferError> {
        log::info!("Downloading {} to {}", remote_file, local_file.display());

        let mut session = self.session()?;
        session.send_read_request(remote_file, mode)?;

        let file = File::create(local_file).map_err(|e| session.abort(Error::File(e)))?;
        let file = BufWriter::new(file);
        let result = match mode {
            Mode::NetAscii => session.get_into(&mut BlockWriter::new(NetasciiWriter::new(file))),
            _ => session.get_into(&mut BlockWriter::new(file)),
        };

        match result {
            Ok(bytes) => {
                log::info!(
                    "Download complete: {} ({} bytes)",
                    local_file.display(),
                    bytes
                );
                Ok(bytes)
            }
            Err(e) => {
                remove_partial(local_file);
                Err(e)
            }
        }
    }

    /// Upload a file to the server in the configured mode
    ///
    /// # Arguments
    ///
    /// * `remote_file` - File name on the server
    /// * `local_file` - Local file path
    pub fn put(&self, remote_file: &str, local_file: &Path) -> Result<u64, TransferError> {
        self.put_with_mode(remote_file, local_file, self.config.mode)
    }

    /// Upload a file, returning the number of bytes sent
    pub fn put_with_mode(
        &self,
        remote_file: &str,
        local_file: &Path,
        mode: Mode,
    ) -> Result<u64, TransferError> {
        log::info!("Uploading {} to {}", local_file.display(), remote_file);

        let file = File::open(local_file).map_err(|e| TransferError {
            block: 0,
            peer: None,
            kind: Error::File(e),
        })?;
        let file = BufReader::new(file);

        let mut session = self.session()?;
        session.send_write_request(remote_file, mode)?;

        let bytes = match mode {
            Mode::NetAscii => session.put_from(&mut BlockReader::new(NetasciiReader::new(file)))?,
            _ => session.put_from(&mut BlockReader::new(file))?,
        };

        log::info!("Upload complete: {} ({} bytes)", remote_file, bytes);
        Ok(bytes)
    }
}

/// Delete what an unfinished download left at `local`
///
/// A missing file is not an error; any other failure is only logged.
pub fn remove_partial(local: &Path) {
    match std::fs::remove_file(local) {
        Ok(()) => log::info!("Removed partial file {}", local.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Could not remove partial file {}: {}", local.display(), e),
    }
}
