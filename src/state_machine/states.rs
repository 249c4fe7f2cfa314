use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::BatchRecord;

/// Batch lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    /// Stored, jobs not yet all on the queue
    #[default]
    Created,
    /// Jobs outstanding
    Processing,
    /// Every job reported and the batch was never cancelled
    Finished,
    /// Cancelled by a failure or an explicit cancel
    Cancelled,
}

impl BatchState {
    pub fn from_record(record: &BatchRecord) -> Self {
        if record.cancelled_at.is_some() {
            Self::Cancelled
        } else if record.finished_at.is_some() {
            Self::Finished
        } else if record.dispatched_at.is_some() && record.total_jobs > 0 {
            Self::Processing
        } else {
            Self::Created
        }
    }

    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Cancelled)
    }
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Processing => write!(f, "processing"),
            Self::Finished => write!(f, "finished"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for BatchState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "processing" => Ok(Self::Processing),
            "finished" => Ok(Self::Finished),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid batch state: {s}")),
        }
    }
}
