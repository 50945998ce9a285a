//! Typed signals and deferred presentation effects.
//!
//! [`EngineEvent`]s are the controller's outward signals: emitted
//! synchronously as part of the mutation that caused them and drained
//! by the host in batch. [`UiEffect`]s are the presentation-side
//! companions that travel through the deferred queue so animations
//! replay coherently after an overlay closes.

use crate::budget::GameOverReason;
use crate::id::{PathId, StageId};
use crate::path::PathState;
use crate::stage::StageState;

// ---------------------------------------------------------------------------
// Signals
// ---------------------------------------------------------------------------

/// Why an activation request was rejected. Rejections perform no state
/// mutation; they exist for user feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The stage id does not exist in this map.
    UnknownStage,
    /// The stage has not been unlocked yet.
    Locked,
    /// The stage is parked behind an unmet minimum-score restriction.
    ScoreTooLow,
    /// The session budget ran out and the stage was sealed.
    Sealed,
    /// A special stage's bonus was already granted.
    AlreadyCleared,
    /// The session has ended; no further activations are accepted.
    GameDone,
}

/// A signal from the progression controller. All state mutations are
/// committed before the event describing them is recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    // -- Stage / path --
    StageStateChanged {
        stage: StageId,
        state: StageState,
    },
    PathStateChanged {
        paths: Vec<PathId>,
        state: PathState,
    },
    FocusChanged {
        stage: StageId,
    },

    // -- Budget --
    BudgetChanged {
        lives_left: Option<u32>,
        time_left_ms: Option<u64>,
        score: u32,
    },

    // -- Session outcome --
    GameOver {
        reason: GameOverReason,
    },
    GameWon,

    // -- Feedback --
    ActivationRejected {
        stage: StageId,
        reason: RejectReason,
    },
}

// ---------------------------------------------------------------------------
// Deferred presentation effects
// ---------------------------------------------------------------------------

/// A presentation-layer effect handed off through the deferred queue.
/// Effects never carry state the host cannot re-read from the
/// controller; they are cues, not the source of truth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEffect {
    /// Animate a stage's state change (bounce, glow).
    StageUpdated { stage: StageId, state: StageState },
    /// Fade in a newly revealed stage.
    StageRevealed { stage: StageId },
    /// Animate path state changes as one batch.
    PathsUpdated { paths: Vec<PathId>, state: PathState },
    /// Fade in newly revealed paths as one batch.
    PathsRevealed { paths: Vec<PathId> },
    /// Move focus/scroll to a stage.
    Focus { stage: StageId },
}

// ===========================================================================
// Tests
// ===========================================================================
