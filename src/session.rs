//! The single wallet instance of a worker
//!
//! Handlers that use the wallet hold the read guard for the whole
//! collaborator call. Initialization, disposal and registration take the
//! write guard, so a wallet is never swapped or released under a call that
//! is still using it.

use std::future::Future;

use smol::lock::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::wallet::{Wallet, WalletError};

pub struct Session<W> {
    slot: RwLock<Option<W>>,
}

impl<W: Wallet> Session<W> {
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(None),
        }
    }

    /// Replace the active wallet with the one produced by `init`
    ///
    /// The old wallet is disposed before `init` runs. If `init` fails the
    /// session is left empty.
    pub async fn install<F>(&self, init: F) -> Result<(), WalletError>
    where
        F: Future<Output = Result<W, WalletError>>,
    {
        let mut slot = self.slot.write().await;
        if let Some(previous) = slot.take() {
            tracing::debug!("disposing previous wallet before re-initialization");
            previous.dispose().await;
        }
        *slot = Some(init.await?);
        tracing::info!("wallet session initialized");
        Ok(())
    }

    /// Dispose the active wallet; returns whether there was one
    pub async fn clear(&self) -> bool {
        let mut slot = self.slot.write().await;
        match slot.take() {
            Some(wallet) => {
                wallet.dispose().await;
                tracing::info!("wallet session disposed");
                true
            }
            None => false,
        }
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, Option<W>> {
        self.slot.read().await
    }

    pub async fn write(&self) -> RwLockWriteGuard<'_, Option<W>> {
        self.slot.write().await
    }

    pub async fn is_active(&self) -> bool {
        self.slot.read().await.is_some()
    }
}

impl<W: Wallet> Default for Session<W> {
    fn default() -> Self {
        Self::new()
    }
}
