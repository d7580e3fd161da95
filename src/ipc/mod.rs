//! Framed JSON-RPC over a byte stream
//!
//! Each message travels as one frame: a 4-byte big-endian length followed by
//! that many bytes of UTF-8 JSON. Both directions use the same format.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use executor_core::tokio::TokioGlobal;
//! use wdk_bridge::{Dispatcher, IpcClient, IpcConfig, IpcServer};
//!
//! // Worker
//! let dispatcher = Arc::new(Dispatcher::new(MyBackend::default()));
//! let server = IpcServer::new(dispatcher, "/tmp/wdk.sock", IpcConfig::default(), TokioGlobal).await?;
//!
//! // Host
//! let client = IpcClient::connect("/tmp/wdk.sock", IpcConfig::default(), &TokioGlobal).await?;
//! let bundle = client.call("generateEntropyAndEncrypt", json!({ "wordCount": 24 })).await?;
//! ```

mod client;
pub mod codec;
mod correlator;
pub mod protocol;
mod server;
mod transport;

pub use client::IpcClient;
pub use codec::{FrameDecoder, FrameError, Frames, MAX_FRAME_LEN, encode_frame};
pub use correlator::{Correlator, PendingCall};
pub use protocol::{ErrorCode, IpcError, Message, Request, Response, RpcError};
pub use server::{IpcServer, serve_connection, serve_stdio};
pub use transport::FrameWriter;
