//! Contract addresses and scripts.

use serde::{Deserialize, Serialize};
use std::fmt;
use stele_crypto::PublicKeyHash;

/// Address of an account.
///
/// Implicit accounts are keyed by the hash of their manager's public key;
/// originated accounts get a fresh 20-byte address drawn from the
/// origination nonce of the block that created them.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ContractAddress {
    /// An implicit (key-controlled) account.
    Implicit(PublicKeyHash),
    /// An originated (possibly scripted) account.
    Originated([u8; 20]),
}

impl ContractAddress {
    /// The implicit account of a public key hash.
    pub const fn implicit(pkh: PublicKeyHash) -> Self {
        Self::Implicit(pkh)
    }

    /// Whether this is an implicit account.
    pub fn is_implicit(&self) -> bool {
        matches!(self, Self::Implicit(_))
    }

    /// The public key hash, for implicit accounts.
    pub fn as_implicit(&self) -> Option<PublicKeyHash> {
        match self {
            Self::Implicit(pkh) => Some(*pkh),
            Self::Originated(_) => None,
        }
    }

    /// A stable storage key fragment for this address.
    pub fn storage_key(&self) -> String {
        match self {
            Self::Implicit(pkh) => format!("i{}", hex::encode(pkh.as_bytes())),
            Self::Originated(bytes) => format!("o{}", hex::encode(bytes)),
        }
    }
}

impl fmt::Display for ContractAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Implicit(pkh) => write!(f, "imp:{pkh}"),
            Self::Originated(bytes) => write!(f, "org:0x{}", hex::encode(bytes)),
        }
    }
}

impl fmt::Debug for ContractAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl From<PublicKeyHash> for ContractAddress {
    fn from(pkh: PublicKeyHash) -> Self {
        Self::Implicit(pkh)
    }
}

/// An opaque Michelson script: code and current storage.
///
/// The core never interprets these bytes; the script runner does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    /// Compiled script code.
    pub code: Vec<u8>,
    /// Current script storage.
    pub storage: Vec<u8>,
}

impl Script {
    /// Creates a script from code and initial storage.
    pub fn new(code: Vec<u8>, storage: Vec<u8>) -> Self {
        Self { code, storage }
    }
}
