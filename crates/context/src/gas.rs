//! Gas and storage-space metering.
//!
//! Both resources share the same shape: an optional limit, a consumed
//! counter, and checkpoint arithmetic. An unlimited meter still counts, so
//! `consumed_since` works in both modes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from resource metering.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MeterError {
    /// The gas limit was exhausted.
    #[error("gas exhausted")]
    GasExhausted,

    /// The storage-space limit was exhausted.
    #[error("storage limit exceeded")]
    StorageLimitExceeded,
}

/// Which resource a meter tracks; selects the exhaustion error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resource {
    /// Computation gas.
    Gas,
    /// Storage space in bytes.
    StorageSpace,
}

/// A bounded, checkpointable resource counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meter {
    resource: Resource,
    limit: Option<u64>,
    consumed: u64,
}

impl Meter {
    /// Creates an unlimited meter for `resource`.
    pub fn unlimited(resource: Resource) -> Self {
        Self {
            resource,
            limit: None,
            consumed: 0,
        }
    }

    /// Sets a limit counted from the current consumption.
    pub fn set_limit(&mut self, limit: u64) {
        self.limit = Some(self.consumed.saturating_add(limit));
    }

    /// Removes the limit.
    pub fn set_unlimited(&mut self) {
        self.limit = None;
    }

    /// Consumes `cost` units, failing when the limit would be crossed.
    pub fn consume(&mut self, cost: u64) -> Result<(), MeterError> {
        let next = self.consumed.saturating_add(cost);
        if let Some(limit) = self.limit {
            if next > limit {
                return Err(match self.resource {
                    Resource::Gas => MeterError::GasExhausted,
                    Resource::StorageSpace => MeterError::StorageLimitExceeded,
                });
            }
        }
        self.consumed = next;
        Ok(())
    }

    /// Total units consumed since creation.
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// A checkpoint for later `consumed_since` queries.
    pub fn checkpoint(&self) -> u64 {
        self.consumed
    }

    /// Units consumed since `checkpoint`.
    pub fn consumed_since(&self, checkpoint: u64) -> u64 {
        self.consumed.saturating_sub(checkpoint)
    }
}
