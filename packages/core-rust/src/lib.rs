//! `airdb` Core: correlation identifiers, the reply wire format, and the
//! command-line model for the external database utility.

pub mod command;
pub mod correlation;
pub mod messages;

pub use command::{Arg, CommandLine, Redacted, WorkCommand};
pub use correlation::{CorrelationId, CorrelationIdGenerator};
pub use messages::{normalize_message, Reply, UNSPECIFIED_REMOTE_ERROR};
