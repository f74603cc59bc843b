//! # Stele Context
//!
//! The transactional, typed view over the backing store that every protocol
//! call threads through. The context is the only mutable state in the
//! transition core:
//!
//! - **Typed access** — `get`/`set`/`delete`/`mem` on `/`-joined paths,
//!   encoded with the binary codec
//! - **Fork/commit/discard** — a fork buffers every write in a staging
//!   overlay; committing adopts the overlay, dropping the fork discards it.
//!   Failed operations backtrack by discarding their fork
//! - **Snapshots** — immutable copies of a sub-tree keyed by
//!   `(cycle, index)` tags, used by the roll registry
//! - **Metering** — gas and storage-space counters with limits and
//!   checkpoints
//! - **Origination nonce** — deterministic fresh contract addresses per
//!   block
//!
//! Writes become visible to other contexts only on [`Context::commit_block`],
//! which flushes the staged overlay into the shared backing store.
//!
//! ## Example
//!
//! ```rust
//! use stele_context::Context;
//!
//! let mut ctx = Context::new();
//! ctx.set("chain/counter", &7u64).unwrap();
//!
//! let mut fork = ctx.fork();
//! fork.set("chain/counter", &8u64).unwrap();
//!
//! // Not yet committed: the parent still sees 7.
//! assert_eq!(ctx.get::<u64>("chain/counter").unwrap(), 7);
//! ctx.commit(fork);
//! assert_eq!(ctx.get::<u64>("chain/counter").unwrap(), 8);
//! ```

#![deny(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod gas;
pub mod nonce;

pub use gas::{Meter, MeterError, Resource};
pub use nonce::OriginationNonce;

use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, trace};

/// Result type for context operations.
pub type Result<T> = std::result::Result<T, ContextError>;

/// A snapshot tag: `(cycle, index)`.
pub type SnapshotTag = (u32, u32);

/// Errors that can occur in context operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContextError {
    /// A required key was missing.
    #[error("storage error: missing key {0}")]
    Storage(String),

    /// A stored value failed to decode, or a value failed to encode.
    #[error("codec error at {key}: {message}")]
    Codec {
        /// The key being accessed.
        key: String,
        /// The codec failure.
        message: String,
    },

    /// A resource meter was exhausted.
    #[error(transparent)]
    Meter(#[from] MeterError),

    /// A fresh address was requested with no origination nonce set.
    #[error("origination nonce not initialized")]
    OriginationNonceUnset,

    /// A snapshot tag was missing.
    #[error("unknown snapshot ({0}, {1})")]
    UnknownSnapshot(u32, u32),
}

/// Storage prefix reserved for snapshot copies.
const SNAPSHOT_PREFIX: &str = "snapshots";

type Store = BTreeMap<String, Vec<u8>>;

/// The transactional typed context.
///
/// Cloning via [`Context::fork`] is a logical copy: the fork shares the
/// committed backing store and carries its own staging overlay.
#[derive(Debug)]
pub struct Context {
    /// Committed backing store, shared across forks and blocks.
    base: Arc<RwLock<Store>>,
    /// Staged writes; `None` marks a deletion.
    overlay: BTreeMap<String, Option<Vec<u8>>>,
    gas: Meter,
    space: Meter,
    origination_nonce: Option<OriginationNonce>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// Creates a context over an empty backing store.
    pub fn new() -> Self {
        Self {
            base: Arc::new(RwLock::new(BTreeMap::new())),
            overlay: BTreeMap::new(),
            gas: Meter::unlimited(Resource::Gas),
            space: Meter::unlimited(Resource::StorageSpace),
            origination_nonce: None,
        }
    }

    // ---- typed access ----

    /// Reads a required value; missing keys are a storage error.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        match self.get_raw(key) {
            Some(bytes) => decode(key, &bytes),
            None => Err(ContextError::Storage(key.to_string())),
        }
    }

    /// Reads an optional value.
    pub fn get_opt<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get_raw(key) {
            Some(bytes) => decode(key, &bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Writes a value.
    pub fn set<T: Serialize>(&mut self, key: &str, value: &T) -> Result<()> {
        let bytes = encode(key, value)?;
        trace!(key, len = bytes.len(), "context set");
        self.overlay.insert(key.to_string(), Some(bytes));
        Ok(())
    }

    /// Deletes a key. Deleting an absent key is a no-op.
    pub fn delete(&mut self, key: &str) {
        self.overlay.insert(key.to_string(), None);
    }

    /// Whether a key is present.
    pub fn mem(&self, key: &str) -> bool {
        self.get_raw(key).is_some()
    }

    fn get_raw(&self, key: &str) -> Option<Vec<u8>> {
        match self.overlay.get(key) {
            Some(Some(bytes)) => Some(bytes.clone()),
            Some(None) => None,
            None => self.base.read().get(key).cloned(),
        }
    }

    /// All present keys under `prefix` (inclusive of the bare prefix),
    /// sorted.
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let mut keys: Vec<String> = {
            let base = self.base.read();
            base.range(prefix.to_string()..)
                .take_while(|(k, _)| k.starts_with(prefix))
                .map(|(k, _)| k.clone())
                .collect()
        };
        for (key, value) in self
            .overlay
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
        {
            match value {
                Some(_) => {
                    if let Err(pos) = keys.binary_search(key) {
                        keys.insert(pos, key.clone());
                    }
                }
                None => {
                    if let Ok(pos) = keys.binary_search(key) {
                        keys.remove(pos);
                    }
                }
            }
        }
        keys
    }

    /// Deletes every key under `prefix`.
    pub fn delete_prefix(&mut self, prefix: &str) {
        for key in self.keys_with_prefix(prefix) {
            self.overlay.insert(key, None);
        }
    }

    // ---- fork / commit / discard ----

    /// Returns a child context buffering its own writes.
    pub fn fork(&self) -> Context {
        Context {
            base: Arc::clone(&self.base),
            overlay: self.overlay.clone(),
            gas: self.gas,
            space: self.space,
            origination_nonce: self.origination_nonce,
        }
    }

    /// Adopts the writes of a fork of this context.
    ///
    /// The child must have been created by [`Context::fork`] on this
    /// context (or a committed descendant); committing an unrelated context
    /// silently replaces the staged state.
    pub fn commit(&mut self, child: Context) {
        self.overlay = child.overlay;
        self.gas = child.gas;
        self.space = child.space;
        self.origination_nonce = child.origination_nonce;
    }

    /// Flushes the staged overlay into the shared backing store.
    ///
    /// This is the block-commit boundary: only after this call do other
    /// contexts over the same store observe the writes.
    pub fn commit_block(&mut self) {
        let mut base = self.base.write();
        let staged = std::mem::take(&mut self.overlay);
        let (mut writes, mut deletes) = (0usize, 0usize);
        for (key, value) in staged {
            match value {
                Some(bytes) => {
                    base.insert(key, bytes);
                    writes += 1;
                }
                None => {
                    base.remove(&key);
                    deletes += 1;
                }
            }
        }
        debug!(writes, deletes, "context committed to backing store");
    }

    // ---- snapshots ----

    fn snapshot_root(tag: SnapshotTag) -> String {
        format!("{SNAPSHOT_PREFIX}/{}/{}", tag.0, tag.1)
    }

    /// Copies the sub-tree under `prefix` into an immutable handle keyed by
    /// `tag`. Keys inside the snapshot are relative to `prefix`.
    pub fn snapshot(&mut self, prefix: &str, tag: SnapshotTag) -> Result<()> {
        let root = Self::snapshot_root(tag);
        let source = format!("{prefix}/");
        let mut copied = 0usize;
        for key in self.keys_with_prefix(&source) {
            if let Some(bytes) = self.get_raw(&key) {
                let rest = &key[source.len()..];
                self.overlay
                    .insert(format!("{root}/{rest}"), Some(bytes));
                copied += 1;
            }
        }
        // Marker row so empty snapshots still exist.
        self.overlay.insert(root, Some(Vec::new()));
        debug!(prefix, cycle = tag.0, index = tag.1, copied, "sub-tree snapshot taken");
        Ok(())
    }

    /// Whether a snapshot with `tag` exists.
    pub fn snapshot_exists(&self, tag: SnapshotTag) -> bool {
        self.mem(&Self::snapshot_root(tag))
    }

    /// Deletes the snapshot keyed by `tag`.
    pub fn delete_snapshot(&mut self, tag: SnapshotTag) {
        let root = Self::snapshot_root(tag);
        self.delete_prefix(&format!("{root}/"));
        self.delete(&root);
    }

    /// Reads an optional value out of a snapshot.
    pub fn read_snapshot_opt<T: DeserializeOwned>(
        &self,
        tag: SnapshotTag,
        path: &str,
    ) -> Result<Option<T>> {
        if !self.snapshot_exists(tag) {
            return Err(ContextError::UnknownSnapshot(tag.0, tag.1));
        }
        self.get_opt(&format!("{}/{path}", Self::snapshot_root(tag)))
    }

    /// Reads a required value out of a snapshot.
    pub fn read_snapshot<T: DeserializeOwned>(&self, tag: SnapshotTag, path: &str) -> Result<T> {
        self.read_snapshot_opt(tag, path)?
            .ok_or_else(|| ContextError::Storage(format!("{}/{path}", Self::snapshot_root(tag))))
    }

    // ---- metering ----

    /// Sets the gas limit, counted from current consumption.
    pub fn set_gas_limit(&mut self, limit: u64) {
        self.gas.set_limit(limit);
    }

    /// Removes the gas limit.
    pub fn set_gas_unlimited(&mut self) {
        self.gas.set_unlimited();
    }

    /// Consumes gas.
    pub fn consume_gas(&mut self, cost: u64) -> Result<()> {
        self.gas.consume(cost).map_err(ContextError::from)
    }

    /// Checkpoint for [`Context::gas_consumed_since`].
    pub fn gas_checkpoint(&self) -> u64 {
        self.gas.checkpoint()
    }

    /// Gas consumed since a checkpoint.
    pub fn gas_consumed_since(&self, checkpoint: u64) -> u64 {
        self.gas.consumed_since(checkpoint)
    }

    /// Sets the storage-space limit, counted from current consumption.
    pub fn set_storage_limit(&mut self, limit: u64) {
        self.space.set_limit(limit);
    }

    /// Removes the storage-space limit.
    pub fn set_storage_unlimited(&mut self) {
        self.space.set_unlimited();
    }

    /// Consumes storage space.
    pub fn consume_storage(&mut self, bytes: u64) -> Result<()> {
        self.space.consume(bytes).map_err(ContextError::from)
    }

    // ---- origination nonce ----

    /// Initializes the origination nonce from the block hash.
    pub fn init_origination_nonce(&mut self, block_hash: [u8; 32]) {
        self.origination_nonce = Some(OriginationNonce::new(block_hash));
    }

    /// Draws a fresh contract address from the origination nonce.
    pub fn fresh_contract_address(&mut self) -> Result<[u8; 20]> {
        match self.origination_nonce.as_mut() {
            Some(nonce) => Ok(nonce.fresh_address()),
            None => Err(ContextError::OriginationNonceUnset),
        }
    }

    /// Clears the origination nonce at the end of operation application.
    pub fn unset_origination_nonce(&mut self) {
        self.origination_nonce = None;
    }
}

fn encode<T: Serialize>(key: &str, value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| ContextError::Codec {
        key: key.to_string(),
        message: e.to_string(),
    })
}

fn decode<T: DeserializeOwned>(key: &str, bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| ContextError::Codec {
        key: key.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_required_key_is_storage_error() {
        let ctx = Context::new();
        assert_eq!(
            ctx.get::<u64>("nope"),
            Err(ContextError::Storage("nope".to_string()))
        );
    }

    #[test]
    fn test_overlay_delete_shadows_base() {
        let mut ctx = Context::new();
        ctx.set("a", &1u64).unwrap();
        ctx.commit_block();

        ctx.delete("a");
        assert!(!ctx.mem("a"));
        // The backing store still holds the value until commit_block.
        assert!(ctx.base.read().contains_key("a"));
    }

    #[test]
    fn test_keys_with_prefix_merges_overlay() {
        let mut ctx = Context::new();
        ctx.set("p/a", &1u64).unwrap();
        ctx.set("p/b", &2u64).unwrap();
        ctx.commit_block();

        ctx.delete("p/a");
        ctx.set("p/c", &3u64).unwrap();
        assert_eq!(ctx.keys_with_prefix("p/"), vec!["p/b", "p/c"]);
    }
}
