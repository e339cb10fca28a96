//! Error types for the lifecycle controller.

use thiserror::Error;

use crate::process::ProbeError;
use crate::provision::ProvisionError;

/// Fatal errors that abort an invocation.
///
/// Termination failures are not listed here: they are recorded in the
/// outcome and the invocation carries on.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Raised when the selected strategy fails.
    #[error(transparent)]
    Provision(#[from] ProvisionError),
    /// Raised when the host process table cannot be read.
    #[error(transparent)]
    Probe(#[from] ProbeError),
}

/// Raised when a desired state name is neither `present` nor `absent`.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("unknown state {0:?}: expected `present` or `absent`")]
pub struct UnknownStateError(pub String);
