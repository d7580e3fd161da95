use std::io;

use serde_json::json;
use thiserror::Error;

use crate::crypto::{ShareError, VaultError};
use crate::ipc::protocol::RpcError;

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors outside a single call, such as binding the worker socket
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<VaultError> for RpcError {
    fn from(err: VaultError) -> Self {
        match err {
            VaultError::Encryption => RpcError::internal(err.to_string()),
            VaultError::Authentication => RpcError::bad_request(err.to_string())
                .with_data(json!({ "reason": "authentication_failed" })),
            _ => RpcError::bad_request(err.to_string())
                .with_data(json!({ "reason": "malformed_input" })),
        }
    }
}

impl From<ShareError> for RpcError {
    fn from(err: ShareError) -> Self {
        RpcError::bad_request(err.to_string()).with_data(json!({ "reason": "share_constraint" }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::protocol::ErrorCode;

    #[test]
    fn test_authentication_is_distinct_from_malformed_input() {
        let auth = RpcError::from(VaultError::Authentication);
        let malformed = RpcError::from(VaultError::CiphertextTooShort(3));
        assert_eq!(auth.code, ErrorCode::BadRequest);
        assert_eq!(malformed.code, ErrorCode::BadRequest);
        assert_ne!(auth.data, malformed.data);
    }

    #[test]
    fn test_share_constraint_message_names_the_rule() {
        let err = RpcError::from(ShareError::ThresholdExceedsShares {
            threshold: 4,
            shares: 3,
        });
        assert_eq!(err.code, ErrorCode::BadRequest);
        assert!(err.message.contains("threshold 4 exceeds share count 3"));
    }

    #[test]
    fn test_bind_failure_is_io() {
        let err = Error::from(io::Error::new(io::ErrorKind::AddrInUse, "socket taken"));
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.to_string(), "I/O error: socket taken");
    }

    #[test]
    fn test_encryption_failure_is_internal() {
        assert_eq!(
            RpcError::from(VaultError::Encryption).code,
            ErrorCode::InternalError
        );
    }
}
