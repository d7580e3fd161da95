use std::sync::Arc;

use anyhow::Context;
use async_signal::{Signal, Signals};
use executor_core::smol::SmolGlobal;
use futures_lite::StreamExt;
use serde_json::{Map, Value};

use wdk_bridge::ipc::serve_stdio;
use wdk_bridge::wallet::{Account, NetworkConfigs, Wallet, WalletBackend, WalletError};
use wdk_bridge::{Dispatcher, IpcServer};

use crate::cli::ServeArgs;
use crate::config::MergedConfig;
use crate::error::CliResult;

pub async fn execute(args: ServeArgs, config: MergedConfig) -> CliResult<()> {
    let dispatcher = Arc::new(Dispatcher::new(NoWallet));

    if args.stdio {
        tracing::info!("serving on stdio");
        serve_stdio(dispatcher, &config.ipc, &SmolGlobal)
            .await
            .context("stdio connection failed")?;
        return Ok(());
    }

    let socket = config
        .socket
        .context("either --socket or --stdio is required")?;
    let server = IpcServer::new(dispatcher, &socket, config.ipc, SmolGlobal)
        .await
        .with_context(|| format!("failed to listen on {}", socket.display()))?;
    let mut signals =
        Signals::new([Signal::Int, Signal::Term]).context("failed to install signal handlers")?;
    tracing::info!(path = %server.socket_path().display(), "worker listening, Ctrl-C to stop");

    if let Some(signal) = signals.next().await {
        let signal = signal.context("failed to wait for a signal")?;
        tracing::info!(?signal, "shutting down");
    }
    server.stop();
    Ok(())
}

/// Backend for a worker with no wallet library linked in
///
/// Crypto and secret-sharing methods work; `initializeWDK` always fails, so
/// wallet methods never find a session.
struct NoWallet;

enum Unlinked {}

impl WalletBackend for NoWallet {
    type Wallet = Unlinked;

    async fn initialize(&self, _seed: &[u8], _networks: &NetworkConfigs) -> Result<Unlinked, WalletError> {
        Err("no wallet library is linked into this worker".into())
    }
}

impl Wallet for Unlinked {
    type Account = Unlinked;

    async fn account(&self, _network: &str, _index: u32) -> Result<Unlinked, WalletError> {
        match *self {}
    }

    async fn register_network(&mut self, _network: &str, _config: &Map<String, Value>) -> Result<(), WalletError> {
        match *self {}
    }

    async fn register_protocol(
        &mut self,
        _network: &str,
        _label: &str,
        _protocol: &str,
        _config: &Map<String, Value>,
    ) -> Result<(), WalletError> {
        match *self {}
    }

    async fn dispose(self) {
        match self {}
    }
}

impl Account for Unlinked {
    async fn call(&self, _method: &str, _args: Vec<Value>) -> Result<Value, WalletError> {
        match *self {}
    }
}
