//! Stage runtime state.
//!
//! A [`Stage`] is a node in the map: identity, kind, lifecycle state,
//! neighbor list, and unlock conditions. Stages are created once at map
//! build time and mutated only by the progression controller; a session
//! reset restores them to their initial state, never destroys them.
//!
//! The lifecycle is `locked -> unlocking -> open -> opened -> completed /
//! cleared`, with `sealed` reachable from any state when the session
//! budget runs out. Special stages (finish, extra-life, extra-time) skip
//! `opened`/`completed`: activating them grants their effect and moves
//! them straight to `cleared`.

use serde::{Deserialize, Serialize};

use crate::config::{AccessRestrictions, StageDef, StageKind};
use crate::id::StageId;

// ---------------------------------------------------------------------------
// Stage lifecycle state
// ---------------------------------------------------------------------------

/// The lifecycle state of a stage. One tagged enum for the whole system;
/// the serialized lower-case name is the only string representation and
/// exists solely at the snapshot boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageState {
    /// Not yet unlocked; activation attempts are rejected.
    Locked,
    /// Reachable and adjacent to a cleared stage, but parked behind an
    /// unmet minimum-score restriction.
    Unlocking,
    /// Unlocked, never entered.
    Open,
    /// Entered at least once; the embedded exercise is in play.
    Opened,
    /// The exercise reported a partial (non-full-score) result.
    Completed,
    /// The exercise reported full score, or the special stage granted
    /// its bonus. Terminal except for a whole-map reset.
    Cleared,
    /// The session budget ran out. Rejects activation; stays visible.
    Sealed,
}

impl StageState {
    /// Whether the stage can currently be entered by the player.
    pub fn is_unlocked(self) -> bool {
        matches!(
            self,
            StageState::Open | StageState::Opened | StageState::Completed | StageState::Cleared
        )
    }

    /// Whether an exercise result has been recorded.
    pub fn has_result(self) -> bool {
        matches!(self, StageState::Completed | StageState::Cleared)
    }
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// A single stage at runtime.
#[derive(Debug, Clone)]
pub struct Stage {
    pub id: StageId,
    pub label: String,
    pub kind: StageKind,
    pub state: StageState,
    /// Undirected neighbor relation; already symmetrized and cleaned by
    /// the map builder. Never contains `id` itself.
    pub neighbors: Vec<StageId>,
    pub can_be_start_stage: bool,
    pub access_restrictions: Option<AccessRestrictions>,
    /// Current visibility under the fog policy and reachability.
    pub visible: bool,
}

impl Stage {
    /// Build the initial runtime stage from its descriptor.
    pub fn from_def(def: &StageDef) -> Self {
        Self {
            id: def.id,
            label: def.label.clone(),
            kind: def.kind,
            state: StageState::Locked,
            neighbors: def.neighbors.clone(),
            can_be_start_stage: def.can_be_start_stage,
            access_restrictions: def.access_restrictions,
            visible: false,
        }
    }

    /// Special stages grant a budget bonus instead of hosting an
    /// activity.
    pub fn is_special(&self) -> bool {
        self.kind.is_special()
    }

    /// Attempt to unlock this stage given the current aggregate score.
    ///
    /// From `Locked` or `Unlocking`: opens when the restriction is
    /// absent or satisfied, parks in `Unlocking` when the score floor is
    /// unmet. Returns the new state if anything changed.
    pub fn try_unlock(&mut self, score: u32) -> Option<StageState> {
        if !matches!(self.state, StageState::Locked | StageState::Unlocking) {
            return None;
        }
        let blocked = self
            .access_restrictions
            .is_some_and(|r| score < r.min_score);
        let next = if blocked {
            StageState::Unlocking
        } else {
            StageState::Open
        };
        if next == self.state {
            return None;
        }
        self.state = next;
        Some(next)
    }

    /// Whether a parked `Unlocking` stage should auto-open at the given
    /// aggregate score.
    pub fn auto_opens_at(&self, score: u32) -> bool {
        self.state == StageState::Unlocking
            && self
                .access_restrictions
                .is_some_and(|r| r.open_on_score_sufficient && score >= r.min_score)
    }

    /// Restore the initial runtime state.
    pub fn reset(&mut self) {
        self.state = StageState::Locked;
        self.visible = false;
    }
}

// ===========================================================================
// Tests
// ===========================================================================
