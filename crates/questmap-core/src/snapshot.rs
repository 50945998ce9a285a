//! Resumable-session snapshots.
//!
//! A [`SessionSnapshot`] captures everything needed to reconstruct a
//! session on a freshly built map: stage states and visibility, path
//! states, exercise progress, and the remaining budgets. The format
//! carries a version number checked before anything is applied; state
//! names serialize as their lower-case tags, the one string
//! representation in the system.

use serde::{Deserialize, Serialize};

use crate::exercise::ExerciseState;
use crate::id::StageId;
use crate::path::PathState;
use crate::stage::StageState;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Current snapshot format version. Increment when breaking the shape.
pub const FORMAT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur while restoring a snapshot.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("unsupported snapshot version: expected {FORMAT_VERSION}, got {0}")]
    UnsupportedVersion(u32),
}

// ---------------------------------------------------------------------------
// Snapshot shapes
// ---------------------------------------------------------------------------

/// One stage's persisted state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSnapshot {
    pub id: StageId,
    pub state: StageState,
    pub visible: bool,
}

/// One path's persisted state, keyed by its unordered endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSnapshot {
    pub from: StageId,
    pub to: StageId,
    pub state: PathState,
    pub visible: bool,
}

/// One exercise binding's persisted state. The shape matches the
/// embedded activity's own persistence contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseSnapshot {
    pub id: StageId,
    pub state: ExerciseState,
    pub score: u32,
    pub max_score: u32,
    pub remaining_time_ms: Option<u64>,
    pub is_completed: bool,
    pub attempts: u32,
}

/// A complete resumable session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub version: u32,
    pub stages: Vec<StageSnapshot>,
    pub paths: Vec<PathSnapshot>,
    pub exercises: Vec<ExerciseSnapshot>,
    pub lives_left: Option<u32>,
    pub time_left_ms: Option<u64>,
    pub game_done: bool,
}

impl SessionSnapshot {
    /// Verify the format version before applying anything.
    pub fn check_version(&self) -> Result<(), SnapshotError> {
        if self.version != FORMAT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// JSON helpers (data-loader feature)
// ---------------------------------------------------------------------------

#[cfg(feature = "data-loader")]
impl SessionSnapshot {
    /// Serialize to the host's JSON persistence format.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse from the host's JSON persistence format. The version is
    /// not checked here; restore does that.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
