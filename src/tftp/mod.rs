//! TFTP (Trivial File Transfer Protocol) client
//!
//! This module implements the client side of
//! [RFC 1350](https://www.rfc-editor.org/rfc/rfc1350) TFTP Protocol version 2:
//! lock-step DATA/ACK transfers in `netascii` and `octet` mode over UDP.
//!
//! ## Module Structure
//!
//! ```text
//! tftp/
//! ├── core/           # Core protocol implementation
//! │   ├── packet      # Packet serialization/deserialization
//! │   ├── socket      # Socket abstraction and TID binding
//! │   ├── retry       # Retransmission on timeout
//! │   └── convert     # NetASCII conversion
//! │
//! ├── client/         # TFTP client
//! │   ├── state       # Transfer state machine
//! │   ├── session     # Step-by-step transfer engine
//! │   ├── stream      # Block reader/writer
//! │   ├── client      # Whole-file get/put
//! │   └── config      # Client configuration
//! │
//! └── error           # Error taxonomy
//! ```
//!
//! ## Usage Examples
//!
//! ### Download a file
//!
//! ```rust,no_run
//! use tftpc::tftp::client::{Client, ClientConfig};
//! use std::path::Path;
//!
//! let config = ClientConfig::new("192.168.1.100".parse().unwrap(), 69);
//! let client = Client::new(config).unwrap();
//! client.get("boot.img", Path::new("/tmp/boot.img")).unwrap();
//! ```
//!
//! ### Drive a transfer by hand
//!
//! ```rust,no_run
//! use tftpc::tftp::client::{ClientConfig, State, TransferSession};
//! use tftpc::tftp::core::Mode;
//!
//! let mut session = TransferSession::new(&ClientConfig::default()).unwrap();
//! session.send_read_request("boot.img", Mode::Octet).unwrap();
//! loop {
//!     let block = session.receive_data_block().unwrap();
//!     if session.can_get_exit(block.packet_len()).unwrap() {
//!         break;
//!     }
//!     session.send_ack().unwrap();
//! }
//! assert_eq!(session.state(), State::Exit);
//! ```

// Submodules
pub mod client;
pub mod core;
pub mod error;

// Re-export commonly used types for convenience
pub use error::{Error, TransferError};
