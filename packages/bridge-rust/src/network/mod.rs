//! Shared reply listener: configuration, correlation registry, connection
//! reading, and the hub that ties the listener lifecycle to the registry.

pub mod config;
pub mod connection;
pub mod listener;
pub mod registry;

pub use config::*;
pub use connection::{read_reply, ReadError};
pub use listener::{ListenerError, Registration, ReplyHub};
pub use registry::{CompletionReceiver, CorrelationRegistry, PendingOperation};
