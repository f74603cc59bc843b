//! The script-runner seam.
//!
//! The core never interprets Michelson; it hands a scripted transaction to
//! a [`ScriptRunner`] and consumes the execution summary: new storage, the
//! big-map diff, emitted internal operations and consumed gas. Type
//! checking and interpretation live behind this trait.

use stele_context::Context;
use stele_types::{ContractAddress, InternalOperation, Script, Tez};
use thiserror::Error;

/// A script execution failure, as reported by the runner.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScriptError {
    /// The script raised a runtime failure.
    #[error("script runtime failure: {0}")]
    Runtime(String),

    /// The parameter did not type-check against the script.
    #[error("ill-typed parameter: {0}")]
    IllTypedParameter(String),
}

/// Summary of one script execution.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScriptExecution {
    /// The script's new storage.
    pub storage: Vec<u8>,
    /// Big-map writes: key to new value, `None` deletes.
    pub big_map_diff: Vec<(Vec<u8>, Option<Vec<u8>>)>,
    /// Internal operations emitted, in emission order.
    pub operations: Vec<InternalOperation>,
    /// Gas the execution consumed.
    pub consumed_gas: u64,
}

/// The consumed interpreter interface.
pub trait ScriptRunner {
    /// Executes `script` held by `self_address` with `parameter`, in the
    /// given context.
    ///
    /// `source` is the emitter of the current (possibly internal)
    /// operation; `payer` is the external source paying the fees.
    #[allow(clippy::too_many_arguments)]
    fn execute(
        &self,
        ctx: &mut Context,
        source: &ContractAddress,
        payer: &ContractAddress,
        self_address: &ContractAddress,
        script: &Script,
        amount: Tez,
        parameter: Option<&[u8]>,
    ) -> Result<ScriptExecution, ScriptError>;
}

/// A runner that refuses every script.
///
/// The default for contexts where no interpreter is wired in; transfers to
/// unscripted accounts never reach the runner.
#[derive(Debug, Clone, Copy, Default)]
pub struct RejectingRunner;

impl ScriptRunner for RejectingRunner {
    fn execute(
        &self,
        _ctx: &mut Context,
        _source: &ContractAddress,
        _payer: &ContractAddress,
        _self_address: &ContractAddress,
        _script: &Script,
        _amount: Tez,
        _parameter: Option<&[u8]>,
    ) -> Result<ScriptExecution, ScriptError> {
        Err(ScriptError::Runtime("no interpreter available".to_string()))
    }
}
