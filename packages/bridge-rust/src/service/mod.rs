//! Operation orchestration on top of the reply hub.
//!
//! 1. **Configuration** (`config`): what to launch and how long to wait
//! 2. **Launching** (`launcher`): starting the external utility
//! 3. **Outcomes** (`operation`): error kinds surfaced to callers
//! 4. **Orchestration** (`bridge`): the public database operations

pub mod bridge;
pub mod config;
pub mod launcher;
pub mod operation;

// Re-export key types for convenient access.
pub use bridge::DatabaseBridge;
pub use config::{timeout_from_millis, BridgeConfig, LaunchMode};
pub use launcher::{LaunchError, Launcher, ProcessLauncher};
pub use operation::{BridgeError, Outcome};
