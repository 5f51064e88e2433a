//! Observable sync phase shared with clients.

use std::fmt;

use serde::Serialize;

use crate::models::RecordKind;

/// Where the orchestrator currently is in a cycle
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", content = "kind", rename_all = "snake_case")]
pub enum SyncPhase {
    #[default]
    Idle,
    Pushing(RecordKind),
    Pulling(RecordKind),
    /// Stopped on rejected credentials until re-authentication
    Halted,
}

impl SyncPhase {
    pub const fn is_busy(self) -> bool {
        matches!(self, Self::Pushing(_) | Self::Pulling(_))
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Pushing(kind) => write!(f, "pushing {}", kind.as_str()),
            Self::Pulling(kind) => write!(f, "pulling {}", kind.as_str()),
            Self::Halted => f.write_str("halted"),
        }
    }
}
