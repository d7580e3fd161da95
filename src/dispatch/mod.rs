//! Worker-side method dispatch
//!
//! A [`Dispatcher`] turns one decoded request into one response. Every
//! failure inside a call ends up in the response's `error` field; nothing a
//! handler does can tear down the connection.

mod method;
mod params;

use serde_json::{Value, json};
use zeroize::Zeroizing;

pub use method::Method;

use crate::crypto::{EntropyStrength, shamir, vault};
use crate::ipc::protocol::{
    ErrorCode, Message, Request, Response, RpcError, stringify_large_integers,
};
use crate::session::Session;
use crate::wallet::{Account, Wallet, WalletBackend, WalletError};
use params::{parse, require_non_empty};

pub struct Dispatcher<B: WalletBackend> {
    backend: B,
    session: Session<B::Wallet>,
}

impl<B: WalletBackend> Dispatcher<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            session: Session::new(),
        }
    }

    pub fn session(&self) -> &Session<B::Wallet> {
        &self.session
    }

    /// Handle one raw frame payload
    ///
    /// Returns `None` when the frame deserves no answer: a response envelope
    /// sent to the worker, or garbage without a recoverable id that is not
    /// worth reporting.
    pub async fn handle_frame(&self, payload: &[u8]) -> Option<Response> {
        match Message::from_slice(payload) {
            Ok(Message::Request(request)) => Some(self.dispatch(request).await),
            Ok(Message::Response(response)) => {
                tracing::warn!(id = ?response.id, "worker received a response envelope, ignoring");
                None
            }
            Err(invalid) => {
                tracing::warn!(id = ?invalid.id, error = %invalid.error, "rejecting malformed request");
                Some(Response::failure(invalid.id, invalid.error))
            }
        }
    }

    /// Run one request to completion
    pub async fn dispatch(&self, request: Request) -> Response {
        let Request { id, method, params } = request;
        let outcome = match Method::from_name(&method) {
            Some(known) => {
                tracing::debug!(id, method = %known, "dispatching");
                self.execute(known, params).await
            }
            None => Err(RpcError::unknown_method(&method)),
        };

        match outcome {
            Ok(mut result) => {
                stringify_large_integers(&mut result);
                Response::success(id, result)
            }
            Err(error) => {
                tracing::warn!(id, method = %method, code = %error.code, "call failed: {}", error.message);
                Response::failure(Some(id), error)
            }
        }
    }

    async fn execute(&self, method: Method, params: Value) -> Result<Value, RpcError> {
        match method {
            Method::Ping => Ok(json!({ "pong": true })),
            Method::GenerateEntropyAndEncrypt => generate_entropy_and_encrypt(parse(method, params)?),
            Method::EncryptSecret => encrypt_secret(&parse(method, params)?),
            Method::DecryptSecret => decrypt_secret(&parse(method, params)?),
            Method::SplitSecret => split_secret(&parse(method, params)?),
            Method::CombineShares => combine_shares(&parse(method, params)?),
            Method::InitializeWdk => self.initialize(&parse(method, params)?).await,
            Method::CallMethod => self.call_method(parse(method, params)?).await,
            Method::RegisterWallet => self.register_wallet(parse(method, params)?).await,
            Method::RegisterProtocol => self.register_protocol(parse(method, params)?).await,
            Method::Dispose => Ok(json!({ "disposed": self.session.clear().await })),
        }
    }

    async fn initialize(&self, p: &params::InitializeWdk) -> Result<Value, RpcError> {
        let key = Zeroizing::new(vault::decode_base64("encryptionKey", &p.encryption_key)?);
        let ciphertext = vault::decode_base64("encryptedSeed", &p.encrypted_seed)?;
        let nonce = vault::decode_base64("nonce", &p.nonce)?;
        let seed = vault::decrypt(&ciphertext, &key, &nonce)?;

        let networks: Vec<&String> = p.config.keys().collect();
        self.session
            .install(self.backend.initialize(&seed, &p.config))
            .await
            .map_err(|e| {
                collaborator_error(
                    ErrorCode::WdkManagerInit,
                    format!("wallet initialization failed: {e}"),
                    json!({ "networks": networks }),
                )
            })?;
        Ok(json!({ "initialized": true }))
    }

    async fn call_method(&self, p: params::CallMethod) -> Result<Value, RpcError> {
        require_non_empty("network", &p.network)?;
        require_non_empty("methodName", &p.method_name)?;

        let context = json!({
            "network": p.network,
            "accountIndex": p.account_index,
            "methodName": p.method_name,
        });
        let wrap = |e: WalletError| {
            collaborator_error(
                ErrorCode::WdkManagerCall,
                format!(
                    "{} on {} account {} failed: {e}",
                    p.method_name, p.network, p.account_index
                ),
                context.clone(),
            )
        };

        let guard = self.session.read().await;
        let wallet = guard.as_ref().ok_or_else(RpcError::not_initialized)?;
        let account = wallet
            .account(&p.network, p.account_index)
            .await
            .map_err(wrap)?;
        account
            .call(&p.method_name, p.args.clone().unwrap_or_default())
            .await
            .map_err(wrap)
    }

    async fn register_wallet(&self, p: params::RegisterWallet) -> Result<Value, RpcError> {
        require_non_empty("network", &p.network)?;

        let mut guard = self.session.write().await;
        let wallet = guard.as_mut().ok_or_else(RpcError::not_initialized)?;
        wallet
            .register_network(&p.network, &p.config)
            .await
            .map_err(|e| {
                collaborator_error(
                    ErrorCode::WdkManagerCall,
                    format!("registering network {} failed: {e}", p.network),
                    json!({ "network": p.network }),
                )
            })?;
        Ok(json!({ "registered": true }))
    }

    async fn register_protocol(&self, p: params::RegisterProtocol) -> Result<Value, RpcError> {
        require_non_empty("network", &p.network)?;
        require_non_empty("label", &p.label)?;
        require_non_empty("protocol", &p.protocol)?;

        let mut guard = self.session.write().await;
        let wallet = guard.as_mut().ok_or_else(RpcError::not_initialized)?;
        wallet
            .register_protocol(&p.network, &p.label, &p.protocol, &p.config)
            .await
            .map_err(|e| {
                collaborator_error(
                    ErrorCode::WdkManagerCall,
                    format!("registering protocol {} on {} failed: {e}", p.label, p.network),
                    json!({ "network": p.network, "label": p.label, "protocol": p.protocol }),
                )
            })?;
        Ok(json!({ "registered": true }))
    }
}

fn collaborator_error(code: ErrorCode, message: String, mut data: Value) -> RpcError {
    if let Some(object) = data.as_object_mut() {
        object.insert("cause".into(), Value::String(message.clone()));
    }
    RpcError::new(code, message).with_data(data)
}

fn generate_entropy_and_encrypt(p: params::GenerateEntropy) -> Result<Value, RpcError> {
    let strength = EntropyStrength::from_word_count(p.word_count).ok_or_else(|| {
        RpcError::bad_request(format!(
            "wordCount must be 12 or 24, got {}",
            p.word_count
        ))
    })?;
    let entropy = vault::generate_entropy(strength.bits())?;
    let bundle = vault::encrypt(&entropy)?;
    Ok(bundle_json(&bundle.to_encoded()))
}

fn encrypt_secret(p: &params::EncryptSecret) -> Result<Value, RpcError> {
    let plaintext = Zeroizing::new(vault::decode_base64("secret", &p.secret)?);
    let bundle = vault::encrypt(&plaintext)?;
    Ok(bundle_json(&bundle.to_encoded()))
}

fn decrypt_secret(p: &vault::EncodedBundle) -> Result<Value, RpcError> {
    let plaintext = p.open()?;
    Ok(json!({ "secret": vault::encode_base64(&plaintext) }))
}

fn split_secret(p: &params::SplitSecret) -> Result<Value, RpcError> {
    let shares = shamir::split(&p.secret, p.shares, p.threshold)?;
    Ok(json!({ "shares": shares }))
}

fn combine_shares(p: &params::CombineShares) -> Result<Value, RpcError> {
    let secret = Zeroizing::new(shamir::combine(p.shares.as_slice())?);
    Ok(json!({ "secret": secret.as_str() }))
}

fn bundle_json(bundle: &vault::EncodedBundle) -> Value {
    json!({
        "key": bundle.key,
        "ciphertext": bundle.ciphertext,
        "nonce": bundle.nonce,
    })
}
