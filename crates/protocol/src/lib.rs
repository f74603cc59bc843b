//! # Stele Protocol
//!
//! The consensus-critical transition engine of the Stele proof-of-stake
//! chain: it validates blocks and their operations, mutates the
//! transactional context, and advances cycle-level economic state.
//!
//! ## Subsystems
//!
//! - [`rolls`] — the roll registry: per-delegate linked lists of staking
//!   units, the limbo freelist, per-cycle ownership snapshots
//! - [`rights`] — deterministic baking/endorsement rights drawn from the
//!   frozen snapshot of a cycle
//! - [`seeds`] — cycle seeds and seed-nonce commitments
//! - [`delegates`] — registration, per-cycle frozen balances, slashing,
//!   activity tracking
//! - [`contracts`] — implicit and originated accounts, with stake routed
//!   to delegates on every balance change
//! - [`votes`] — voting periods, proposals and ballots
//! - [`apply`] — the operation pipeline: precheck and apply for every
//!   operation kind, with internal-operation recursion and backtracking
//! - [`block`] — block lifecycle: begin, apply, finalize, cycle end
//! - [`genesis`] — first-block context preparation
//!
//! ## Block application flow
//!
//! ```text
//! begin_application        header checks, baker rights
//!   └─ apply_operation*    per-operation fork, precheck + apply
//!        └─ finalize_application
//!             ├─ deposits, rewards, fees freeze
//!             ├─ roll snapshot (on schedule)
//!             └─ cycle end: forfeit, clear, freeze, deactivate, vote
//! ```
//!
//! The context is the only mutable state; every function takes it
//! explicitly and failures leave it untouched.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod apply;
pub mod block;
pub mod constants;
pub mod contracts;
pub mod delegates;
pub mod errors;
pub mod genesis;
pub mod michelson;
pub mod rights;
pub mod rolls;
pub mod seeds;
pub mod votes;

// Re-export main entry points at crate root
pub use apply::apply_operation;
pub use block::{begin_application, begin_construction, finalize_application, BlockState};
pub use constants::Constants;
pub use contracts::ManagerKey;
pub use delegates::FrozenBalance;
pub use errors::{Error, Result, Severity};
pub use genesis::{BootstrapDelegate, Commitment};
pub use michelson::{RejectingRunner, ScriptError, ScriptExecution, ScriptRunner};
pub use rights::{baking_rights_owner, endorsement_rights_owner, Purpose};
pub use seeds::NonceState;
pub use votes::PeriodKind;
