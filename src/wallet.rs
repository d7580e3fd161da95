//! Contract with the external wallet library
//!
//! The worker does not implement any chain logic. It drives whatever library
//! the embedding crate links in through these three traits:
//!
//! - [`WalletBackend`] builds a wallet from a decrypted seed.
//! - [`Wallet`] is the live instance held in the session.
//! - [`Account`] is one derived account that accepts named method calls.

use std::future::Future;

use serde_json::{Map, Value};

/// Error raised by the wallet library
pub type WalletError = Box<dyn std::error::Error + Send + Sync>;

/// Per-network configuration, keyed by network name
pub type NetworkConfigs = Map<String, Value>;

/// Factory for wallet instances
pub trait WalletBackend: Send + Sync + 'static {
    type Wallet: Wallet;

    /// Create a wallet from `seed` with one entry in `networks` per chain
    fn initialize(
        &self,
        seed: &[u8],
        networks: &NetworkConfigs,
    ) -> impl Future<Output = Result<Self::Wallet, WalletError>> + Send;
}

/// A live wallet instance
pub trait Wallet: Send + Sync + 'static {
    type Account: Account;

    /// Look up the account at `index` on `network`
    fn account(
        &self,
        network: &str,
        index: u32,
    ) -> impl Future<Output = Result<Self::Account, WalletError>> + Send;

    /// Add a network after initialization
    fn register_network(
        &mut self,
        network: &str,
        config: &Map<String, Value>,
    ) -> impl Future<Output = Result<(), WalletError>> + Send;

    /// Attach a protocol (swap, bridge, lending, ...) to a network under `label`
    fn register_protocol(
        &mut self,
        network: &str,
        label: &str,
        protocol: &str,
        config: &Map<String, Value>,
    ) -> impl Future<Output = Result<(), WalletError>> + Send;

    /// Release the instance and any key material it holds
    fn dispose(self) -> impl Future<Output = ()> + Send;
}

/// One account of a [`Wallet`]
pub trait Account: Send + Sync {
    /// Invoke `method` with positional `args`
    fn call(
        &self,
        method: &str,
        args: Vec<Value>,
    ) -> impl Future<Output = Result<Value, WalletError>> + Send;
}

#[cfg(test)]
pub(crate) mod testing {
    //! Recording wallet used by dispatcher and end-to-end tests

    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use serde_json::json;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum Event {
        Initialized { wallet: usize, seed: Vec<u8>, networks: Vec<String> },
        Disposed { wallet: usize },
        RegisteredNetwork { wallet: usize, network: String },
        RegisteredProtocol { wallet: usize, network: String, label: String, protocol: String },
    }

    #[derive(Clone, Default)]
    pub(crate) struct MockBackend {
        pub(crate) events: Arc<Mutex<Vec<Event>>>,
        pub(crate) fail_initialize: bool,
    }

    impl MockBackend {
        pub(crate) fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }
    }

    pub(crate) struct MockWallet {
        id: usize,
        networks: BTreeMap<String, Map<String, Value>>,
        events: Arc<Mutex<Vec<Event>>>,
    }

    pub(crate) struct MockAccount {
        network: String,
        index: u32,
    }

    impl WalletBackend for MockBackend {
        type Wallet = MockWallet;

        async fn initialize(
            &self,
            seed: &[u8],
            networks: &NetworkConfigs,
        ) -> Result<MockWallet, WalletError> {
            if self.fail_initialize {
                return Err("seed rejected by wallet library".into());
            }
            let mut events = self.events.lock().unwrap();
            let id = events
                .iter()
                .filter(|e| matches!(e, Event::Initialized { .. }))
                .count()
                + 1;
            events.push(Event::Initialized {
                wallet: id,
                seed: seed.to_vec(),
                networks: networks.keys().cloned().collect(),
            });
            Ok(MockWallet {
                id,
                networks: networks
                    .iter()
                    .map(|(name, config)| {
                        (name.clone(), config.as_object().cloned().unwrap_or_default())
                    })
                    .collect(),
                events: Arc::clone(&self.events),
            })
        }
    }

    impl Wallet for MockWallet {
        type Account = MockAccount;

        async fn account(&self, network: &str, index: u32) -> Result<MockAccount, WalletError> {
            if !self.networks.contains_key(network) {
                return Err(format!("network {network} is not configured").into());
            }
            Ok(MockAccount {
                network: network.to_string(),
                index,
            })
        }

        async fn register_network(
            &mut self,
            network: &str,
            config: &Map<String, Value>,
        ) -> Result<(), WalletError> {
            self.networks.insert(network.to_string(), config.clone());
            self.events.lock().unwrap().push(Event::RegisteredNetwork {
                wallet: self.id,
                network: network.to_string(),
            });
            Ok(())
        }

        async fn register_protocol(
            &mut self,
            network: &str,
            label: &str,
            protocol: &str,
            _config: &Map<String, Value>,
        ) -> Result<(), WalletError> {
            if !self.networks.contains_key(network) {
                return Err(format!("network {network} is not configured").into());
            }
            self.events.lock().unwrap().push(Event::RegisteredProtocol {
                wallet: self.id,
                network: network.to_string(),
                label: label.to_string(),
                protocol: protocol.to_string(),
            });
            Ok(())
        }

        async fn dispose(self) {
            self.events
                .lock()
                .unwrap()
                .push(Event::Disposed { wallet: self.id });
        }
    }

    impl Account for MockAccount {
        async fn call(&self, method: &str, args: Vec<Value>) -> Result<Value, WalletError> {
            match method {
                "getAddress" => Ok(json!(format!("{}:{}", self.network, self.index))),
                "getBalance" => Ok(json!({ "wei": u64::MAX, "decimals": 18 })),
                "echo" => Ok(Value::Array(args)),
                "sleep" => {
                    let millis = args.first().and_then(Value::as_u64).unwrap_or(0);
                    async_io::Timer::after(Duration::from_millis(millis)).await;
                    Ok(json!(millis))
                }
                _ => Err(format!("method {method} is not supported").into()),
            }
        }
    }
}
