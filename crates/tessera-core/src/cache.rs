//! Cache types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata recorded for a stored entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryMeta {
    pub key: String,
    pub size_bytes: u64,
    /// sha256 of the archived bundle.
    pub checksum: String,
    pub created_at: DateTime<Utc>,
}

/// Result of a restore attempt. A miss is a normal outcome consumed
/// downstream to choose the slower path, never an error.
#[derive(Debug, Clone)]
pub struct RestoreOutcome {
    pub hit: bool,
    pub entry: Option<EntryMeta>,
    pub duration_ms: u64,
}

impl RestoreOutcome {
    pub fn miss(duration_ms: u64) -> Self {
        Self {
            hit: false,
            entry: None,
            duration_ms,
        }
    }
}

/// Result of a save. Saves are idempotent under a fixed key; a repeated
/// save replaces the previous content.
#[derive(Debug, Clone)]
pub struct SaveReceipt {
    pub entry: EntryMeta,
    pub replaced: bool,
    pub duration_ms: u64,
}
