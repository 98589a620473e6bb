//! Correlation identifiers linking a launched command to its asynchronous reply.
//!
//! Identifiers are plain `u64` values on the wire (`socketcb=<id>` on the
//! command line, `"cb": <id>` in the reply). The newtype keeps them from being
//! confused with ports or exit codes inside the bridge.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Integer tag carried by an outbound command and echoed back in its reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(pub u64);

impl CorrelationId {
    /// Returns the raw integer value.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for CorrelationId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Monotonic identifier source.
///
/// The first issued identifier is 1; 0 never appears on the wire. There is no
/// wraparound handling: a `u64` counter outlives any realistic process.
#[derive(Debug, Default)]
pub struct CorrelationIdGenerator {
    last: u64,
}

impl CorrelationIdGenerator {
    /// Creates a generator whose first identifier will be 1.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues the next identifier. Strictly greater than every previous one.
    pub fn next_id(&mut self) -> CorrelationId {
        self.last += 1;
        CorrelationId(self.last)
    }
}
