//! Per-stage exercise bindings.
//!
//! An [`ExerciseBinding`] tracks one embedded activity's local progress
//! independent of presentation: lifecycle state, score, and the optional
//! per-exercise countdown. The binding never decides game-over; local
//! timeouts are signalled to the progression controller, which owns the
//! global budget.

use serde::{Deserialize, Serialize};

use crate::config::StageDef;
use crate::id::StageId;
use crate::snapshot::ExerciseSnapshot;

// ---------------------------------------------------------------------------
// Exercise state
// ---------------------------------------------------------------------------

/// Lifecycle of a single embedded activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExerciseState {
    /// Never entered.
    Unstarted,
    /// Entered at least once; may be in play.
    Opened,
    /// Finished with a partial (non-full) score.
    Completed,
    /// Finished with full score. Terminal except for a reset.
    Cleared,
}

/// What a scoring event did to the binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreOutcome {
    /// Full score; the exercise is cleared.
    Cleared,
    /// Partial score; the exercise is completed but not cleared.
    Completed,
    /// The exercise was already cleared; nothing changed.
    AlreadyCleared,
}

// ---------------------------------------------------------------------------
// ExerciseBinding
// ---------------------------------------------------------------------------

/// Wraps one embedded activity attached to a stage. Created at map
/// build time; reset together with its stage.
#[derive(Debug, Clone)]
pub struct ExerciseBinding {
    pub stage_id: StageId,
    pub state: ExerciseState,
    pub score: u32,
    pub max_score: u32,
    /// Configured countdown, if any. Restored on reset.
    time_limit_ms: Option<u64>,
    /// Remaining countdown. `None` when the stage declares no limit.
    pub remaining_time_ms: Option<u64>,
    /// Number of scored attempts (including timeouts).
    pub attempts: u32,
    /// Whether the countdown is currently running.
    running: bool,
}

impl ExerciseBinding {
    /// Build the initial binding from the stage descriptor.
    pub fn from_def(def: &StageDef) -> Self {
        Self {
            stage_id: def.id,
            state: ExerciseState::Unstarted,
            score: 0,
            max_score: def.max_score.unwrap_or(0),
            time_limit_ms: def.time_limit_ms,
            remaining_time_ms: def.time_limit_ms,
            attempts: 0,
            running: false,
        }
    }

    /// First activation: `Unstarted -> Opened`. Re-entering an already
    /// opened or completed exercise keeps its state.
    pub fn open(&mut self) {
        if self.state == ExerciseState::Unstarted {
            self.state = ExerciseState::Opened;
        }
    }

    /// Begin the per-exercise countdown, if one is configured and time
    /// remains.
    pub fn start(&mut self) {
        if self.remaining_time_ms.is_some_and(|ms| ms > 0)
            && !matches!(self.state, ExerciseState::Cleared)
        {
            self.running = true;
        }
    }

    /// Halt the countdown (overlay closed).
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Whether the countdown is currently running.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Advance the countdown. Returns `true` exactly when the budget
    /// hits zero on this call; the caller decides what a timeout means.
    pub fn tick(&mut self, elapsed_ms: u64) -> bool {
        if !self.running {
            return false;
        }
        let Some(remaining) = self.remaining_time_ms else {
            return false;
        };
        let next = remaining.saturating_sub(elapsed_ms);
        self.remaining_time_ms = Some(next);
        if next == 0 {
            self.running = false;
            return true;
        }
        false
    }

    /// Record a scoring event from the embedded activity. Full score
    /// clears; anything less completes. A cleared exercise never
    /// reverts (idempotent from the caller's perspective).
    pub fn on_scored(&mut self, score: u32, max_score: u32) -> ScoreOutcome {
        if self.state == ExerciseState::Cleared {
            return ScoreOutcome::AlreadyCleared;
        }
        self.attempts += 1;
        self.score = score.min(max_score);
        self.max_score = max_score;
        if score >= max_score && max_score > 0 {
            self.state = ExerciseState::Cleared;
            self.running = false;
            ScoreOutcome::Cleared
        } else {
            self.state = ExerciseState::Completed;
            ScoreOutcome::Completed
        }
    }

    /// Record a local timeout: the attempt ends as a failed (scoreless)
    /// completion. A cleared exercise is unaffected.
    pub fn time_out(&mut self) -> ScoreOutcome {
        if self.state == ExerciseState::Cleared {
            return ScoreOutcome::AlreadyCleared;
        }
        self.attempts += 1;
        self.running = false;
        self.state = ExerciseState::Completed;
        ScoreOutcome::Completed
    }

    /// Whether the exercise has a recorded result.
    pub fn is_completed(&self) -> bool {
        matches!(self.state, ExerciseState::Completed | ExerciseState::Cleared)
    }

    /// Restore the initial state, including the configured countdown.
    pub fn reset(&mut self) {
        self.state = ExerciseState::Unstarted;
        self.score = 0;
        self.remaining_time_ms = self.time_limit_ms;
        self.attempts = 0;
        self.running = false;
    }

    /// Capture the persistence shape of this binding. Matches the
    /// embedded activity's own `getCurrentState` contract.
    pub fn snapshot(&self) -> ExerciseSnapshot {
        ExerciseSnapshot {
            id: self.stage_id,
            state: self.state,
            score: self.score,
            max_score: self.max_score,
            remaining_time_ms: self.remaining_time_ms,
            is_completed: self.is_completed(),
            attempts: self.attempts,
        }
    }

    /// Rehydrate from a captured state (session resumption). The
    /// binding's identity and configured limit stay as built.
    pub fn restore_from(&mut self, snapshot: &ExerciseSnapshot) {
        self.state = snapshot.state;
        self.score = snapshot.score;
        self.max_score = snapshot.max_score.max(self.max_score);
        self.remaining_time_ms = snapshot.remaining_time_ms.or(self.time_limit_ms);
        self.attempts = snapshot.attempts;
        self.running = false;
    }
}

// ===========================================================================
// Tests
// ===========================================================================
