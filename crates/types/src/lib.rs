//! # Stele Types
//!
//! Core type definitions for the Stele transition core.
//!
//! This crate provides the fundamental types threaded through the protocol:
//! - [`Tez`] — mutez amounts with checked arithmetic
//! - [`H256`] — 32-byte digests, with named aliases per use
//! - [`Level`], [`Cycle`], [`CycleLayout`] — block positions in time
//! - [`Roll`] — staking unit ids
//! - [`ContractAddress`], [`Script`] — account identities
//! - [`SignedOperation`], [`Contents`], result types — the wire model
//! - [`BlockHeader`] — the shell/protocol header split
//!
//! ## Example
//!
//! ```rust
//! use stele_types::{CycleLayout, Level, Tez};
//!
//! let layout = CycleLayout::new(16, 4, 8, 32).unwrap();
//! let level = Level::from_raw(21, &layout);
//! assert_eq!(level.cycle.0, 1);
//!
//! let fee = Tez::from_mutez(1_000);
//! assert!(fee.checked_add(Tez::ONE).is_ok());
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod block;
pub mod contract;
pub mod hash;
pub mod level;
pub mod operation;
pub mod roll;
pub mod tez;

// Re-export main types at crate root
pub use block::{BlockHeader, ProtocolData, ShellHeader};
pub use contract::{ContractAddress, Script};
pub use hash::{
    BlockHash, ContextHash, NonceHash, OperationHash, OperationListHash, ProtocolHash, H256,
};
pub use level::{Cycle, CycleLayout, LayoutError, Level};
pub use operation::{
    Ballot, BalanceUpdate, ContentOutcome, Contents, ContentsResult, ErrorDescriptor,
    InternalOperation, InternalOperationResult, ManagerContent, ManagerOperation,
    ManagerOperationResult, OperationResult, SeedNonce, SignedOperation,
};
pub use roll::Roll;
pub use tez::{Tez, TezError, MUTEZ_PER_TEZ};

/// Result type alias for type-level operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when working with Stele types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid hex string.
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// Invalid length for a fixed-size type.
    #[error("invalid length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Expected length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },

    /// Binary codec error.
    #[error("codec error: {0}")]
    Codec(String),

    /// Cycle layout error.
    #[error(transparent)]
    Layout(#[from] LayoutError),
}
