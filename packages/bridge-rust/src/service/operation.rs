//! Outcome and error types for bridge operations.

use crate::network::ListenerError;
use crate::service::launcher::LaunchError;

/// Result of a public bridge operation.
pub type Outcome = Result<(), BridgeError>;

/// Why an operation failed.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The shared reply listener could not be started.
    #[error(transparent)]
    Listener(#[from] ListenerError),
    /// The external utility could not be started or reported a failure on launch.
    #[error(transparent)]
    Launch(#[from] LaunchError),
    #[error("operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    /// The utility replied with `error: true`.
    #[error("{message}")]
    Remote { message: String },
    #[error("bridge shut down before the operation settled")]
    ShutDown,
}
