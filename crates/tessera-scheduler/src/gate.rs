//! Trigger admission.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Readiness of the originating change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadyState {
    Draft,
    Ready,
}

/// Event descriptor for a change to validate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub ready_state: ReadyState,
    pub base_branch: String,
}

impl ChangeEvent {
    pub fn ready(base_branch: impl Into<String>) -> Self {
        Self {
            ready_state: ReadyState::Ready,
            base_branch: base_branch.into(),
        }
    }

    pub fn draft(base_branch: impl Into<String>) -> Self {
        Self {
            ready_state: ReadyState::Draft,
            base_branch: base_branch.into(),
        }
    }
}

/// Decides whether a pipeline runs at all.
///
/// Evaluated once, before expansion: a rejected event short-circuits the
/// entire run and zero cells are scheduled.
pub struct TriggerGate;

impl TriggerGate {
    pub fn new() -> Self {
        Self
    }

    pub fn admit(&self, event: &ChangeEvent) -> bool {
        match event.ready_state {
            ReadyState::Draft => {
                debug!(branch = %event.base_branch, "draft change suppressed");
                false
            }
            ReadyState::Ready => true,
        }
    }
}

impl Default for TriggerGate {
    fn default() -> Self {
        Self::new()
    }
}
