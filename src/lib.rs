//! wdk-bridge - secure IPC between a wallet host and a sandboxed worker
//!
//! A host process drives wallet operations that run inside an isolated
//! worker. The two talk over a plain byte stream (a Unix socket or the
//! worker's stdio) carrying length-prefixed JSON-RPC frames.
//!
//! - [`ipc`] frames messages, correlates responses with calls, and provides
//!   [`IpcClient`] for the host and [`IpcServer`] for the worker.
//! - [`Dispatcher`] answers the worker's fixed set of [`Method`]s.
//! - [`crypto`] generates entropy, seals secrets with XChaCha20-Poly1305 and
//!   splits them into Shamir shares for backup.
//! - [`wallet`] is the contract with the wallet library the worker hosts.
//!
//! # Example
//!
//! ```rust,ignore
//! use executor_core::tokio::TokioGlobal;
//! use serde_json::json;
//! use wdk_bridge::{IpcClient, IpcConfig};
//!
//! async fn backup(socket: &str) -> Result<Vec<String>, wdk_bridge::IpcError> {
//!     let client = IpcClient::connect(socket, IpcConfig::default(), &TokioGlobal).await?;
//!     let split = client
//!         .call("splitSecret", json!({ "secret": "my mnemonic", "shares": 5, "threshold": 3 }))
//!         .await?;
//!     Ok(serde_json::from_value(split["shares"].clone())?)
//! }
//! ```
//!
//! # Sessions
//!
//! A worker holds at most one wallet. `initializeWDK` replaces it (the old
//! one is disposed first) and `dispose` clears it. Calls that need the
//! wallet fail with `WDK_MANAGER_INIT` until a session exists.

mod config;
pub mod crypto;
mod dispatch;
mod error;
pub mod ipc;
mod session;
pub mod wallet;

pub use config::{IpcConfig, IpcConfigBuilder};
pub use dispatch::{Dispatcher, Method};
pub use error::{Error, Result};
pub use ipc::{ErrorCode, IpcClient, IpcError, IpcServer, Request, Response, RpcError};
pub use session::Session;
pub use wallet::{Account, Wallet, WalletBackend, WalletError};
