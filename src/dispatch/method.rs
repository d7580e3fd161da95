use std::fmt;
use std::str::FromStr;

use crate::ipc::protocol::RpcError;

/// Every operation a worker answers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Ping,
    GenerateEntropyAndEncrypt,
    EncryptSecret,
    DecryptSecret,
    SplitSecret,
    CombineShares,
    InitializeWdk,
    CallMethod,
    RegisterWallet,
    RegisterProtocol,
    Dispose,
}

impl Method {
    pub const ALL: [Method; 11] = [
        Method::Ping,
        Method::GenerateEntropyAndEncrypt,
        Method::EncryptSecret,
        Method::DecryptSecret,
        Method::SplitSecret,
        Method::CombineShares,
        Method::InitializeWdk,
        Method::CallMethod,
        Method::RegisterWallet,
        Method::RegisterProtocol,
        Method::Dispose,
    ];

    /// Name on the wire
    pub fn name(self) -> &'static str {
        match self {
            Method::Ping => "ping",
            Method::GenerateEntropyAndEncrypt => "generateEntropyAndEncrypt",
            Method::EncryptSecret => "encryptSecret",
            Method::DecryptSecret => "decryptSecret",
            Method::SplitSecret => "splitSecret",
            Method::CombineShares => "combineShares",
            Method::InitializeWdk => "initializeWDK",
            Method::CallMethod => "callMethod",
            Method::RegisterWallet => "registerWallet",
            Method::RegisterProtocol => "registerProtocol",
            Method::Dispose => "dispose",
        }
    }

    /// Exact, case-sensitive lookup
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|method| method.name() == name)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Method {
    type Err = RpcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| RpcError::unknown_method(s))
    }
}
