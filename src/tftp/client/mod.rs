//! TFTP client implementation
//!
//! - `state`: The nine-state transition table
//! - `session`: One transfer driven step by step over the core engine
//! - `stream`: Sequential 512-byte block reader and writer
//! - `client`: Whole-file `get` and `put`
//! - `config`: Client configuration

#[allow(clippy::module_inception)]
mod client;
mod config;
mod session;
mod state;
mod stream;

// Public client types
pub use client::{Client, remove_partial};
pub use config::{ClientConfig, DEFAULT_MAX_RETRIES, DEFAULT_PORT, DEFAULT_TIMEOUT, parse_mode};
pub use session::{DataBlock, TransferSession};
pub use state::{Direction, Operation, State, is_final};
pub use stream::{BlockReader, BlockSink, BlockSource, BlockWriter};
