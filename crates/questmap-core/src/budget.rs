//! Session budgets: lives, global time, and aggregate score.
//!
//! One [`BudgetTracker`] per map session, owned by the progression
//! controller and threaded through its methods -- there is no global
//! session state anywhere in the crate.
//!
//! The tracker only does bookkeeping and one-shot detection. It never
//! touches stages itself; the controller reacts to the returned
//! outcomes (seal the map, announce the win) so that state mutation
//! stays in one place.

use serde::{Deserialize, Serialize};

use crate::config::MapSettings;

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameOverReason {
    /// The lives budget reached zero.
    Lives,
    /// The global countdown expired.
    Timeout,
}

/// What a `lose_life` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifeOutcome {
    /// Lives are unlimited; nothing changed.
    Unlimited,
    /// One life lost; at least one remains.
    Lost,
    /// The last life was lost on this call. Fires exactly once.
    Exhausted,
}

// ---------------------------------------------------------------------------
// BudgetTracker
// ---------------------------------------------------------------------------

/// Global resource counters for one map session.
#[derive(Debug, Clone)]
pub struct BudgetTracker {
    lives_left: Option<u32>,
    time_left_ms: Option<u64>,
    initial_lives: Option<u32>,
    initial_time_ms: Option<u64>,
    finish_score: Option<u32>,
    score: u32,
    max_score: u32,
    /// Set once, on the transition that ends the session.
    ended: Option<GameOverReason>,
    /// The win is announced at most once per session.
    win_announced: bool,
}

impl BudgetTracker {
    pub fn new(settings: &MapSettings) -> Self {
        Self {
            lives_left: settings.lives_budget,
            time_left_ms: settings.global_time_limit_ms,
            initial_lives: settings.lives_budget,
            initial_time_ms: settings.global_time_limit_ms,
            finish_score: settings.finish_score,
            score: 0,
            max_score: 0,
            ended: None,
            win_announced: false,
        }
    }

    // -- Queries --

    /// Remaining lives; `None` means unlimited.
    pub fn lives_left(&self) -> Option<u32> {
        self.lives_left
    }

    /// Remaining global time; `None` means untimed.
    pub fn time_left_ms(&self) -> Option<u64> {
        self.time_left_ms
    }

    /// Aggregate score over reachable exercises (uncapped).
    pub fn score(&self) -> u32 {
        self.score
    }

    /// Aggregate maximum score over reachable exercises.
    pub fn max_score(&self) -> u32 {
        self.max_score
    }

    /// The configured finish threshold, if any.
    pub fn finish_score(&self) -> Option<u32> {
        self.finish_score
    }

    /// Whether the session has ended (lost or timed out).
    pub fn is_game_over(&self) -> bool {
        self.ended.is_some()
    }

    pub fn game_over_reason(&self) -> Option<GameOverReason> {
        self.ended
    }

    /// Whether the win has already been announced this session.
    pub fn is_won(&self) -> bool {
        self.win_announced
    }

    /// Whether the finish threshold is met (or absent, in which case a
    /// finish stage alone decides).
    pub fn finish_threshold_met(&self) -> bool {
        match self.finish_score {
            Some(threshold) => self.score >= threshold,
            None => true,
        }
    }

    // -- Lives --

    /// Lose one life. `lives_left` never goes below zero; the
    /// `Exhausted` outcome fires exactly once, at the transition to
    /// zero.
    pub fn lose_life(&mut self) -> LifeOutcome {
        let Some(lives) = self.lives_left else {
            return LifeOutcome::Unlimited;
        };
        if lives == 0 {
            // Already exhausted; the session is over.
            return LifeOutcome::Lost;
        }
        let remaining = lives - 1;
        self.lives_left = Some(remaining);
        if remaining == 0 {
            self.ended = Some(GameOverReason::Lives);
            LifeOutcome::Exhausted
        } else {
            LifeOutcome::Lost
        }
    }

    /// Grant extra lives. No-op when lives are unlimited, the amount is
    /// zero, or the session already ended.
    pub fn add_extra_lives(&mut self, amount: u32) -> bool {
        if amount == 0 || self.ended.is_some() {
            return false;
        }
        match self.lives_left {
            Some(lives) => {
                self.lives_left = Some(lives.saturating_add(amount));
                true
            }
            None => false,
        }
    }

    // -- Global time --

    /// Grant extra global time. No-op when the session is untimed, the
    /// amount is zero, or the session already ended.
    pub fn add_extra_time_ms(&mut self, amount_ms: u64) -> bool {
        if amount_ms == 0 || self.ended.is_some() {
            return false;
        }
        match self.time_left_ms {
            Some(ms) => {
                self.time_left_ms = Some(ms.saturating_add(amount_ms));
                true
            }
            None => false,
        }
    }

    /// Advance the global countdown. Returns `true` exactly when the
    /// budget expires on this call.
    pub fn tick(&mut self, elapsed_ms: u64) -> bool {
        if self.ended.is_some() {
            return false;
        }
        let Some(remaining) = self.time_left_ms else {
            return false;
        };
        let next = remaining.saturating_sub(elapsed_ms);
        self.time_left_ms = Some(next);
        if next == 0 {
            self.ended = Some(GameOverReason::Timeout);
            return true;
        }
        false
    }

    // -- Score --

    /// Recompute the aggregate score. Returns `true` exactly when this
    /// recompute crosses the finish threshold for the first time;
    /// repeated recomputes that still meet the threshold stay silent.
    pub fn set_score(&mut self, score: u32, max_score: u32) -> bool {
        self.score = score;
        self.max_score = max_score;
        if self.win_announced {
            return false;
        }
        let won = self
            .finish_score
            .is_some_and(|threshold| threshold > 0 && score >= threshold);
        if won {
            self.win_announced = true;
        }
        won
    }

    /// Announce the win explicitly (finish-stage activation). Returns
    /// `true` only the first time.
    pub fn announce_win(&mut self) -> bool {
        if self.win_announced {
            return false;
        }
        self.win_announced = true;
        true
    }

    // -- Session lifecycle --

    /// Restore the initial budgets.
    pub fn reset(&mut self) {
        self.lives_left = self.initial_lives;
        self.time_left_ms = self.initial_time_ms;
        self.score = 0;
        self.max_score = 0;
        self.ended = None;
        self.win_announced = false;
    }

    /// Apply a restored session: budgets come from the snapshot, and
    /// both one-shot latches are armed against re-announcing outcomes
    /// the previous session already delivered.
    pub(crate) fn apply_restored(
        &mut self,
        lives_left: Option<u32>,
        time_left_ms: Option<u64>,
        game_done: bool,
        score: u32,
        max_score: u32,
    ) {
        self.lives_left = lives_left.or(self.initial_lives);
        self.time_left_ms = time_left_ms.or(self.initial_time_ms);
        self.score = score;
        self.max_score = max_score;
        self.ended = if game_done {
            match self.lives_left {
                Some(0) => Some(GameOverReason::Lives),
                _ => Some(GameOverReason::Timeout),
            }
        } else {
            None
        };
        self.win_announced = self
            .finish_score
            .is_some_and(|threshold| threshold > 0 && score >= threshold);
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(lives: Option<u32>, time_ms: Option<u64>, finish: Option<u32>) -> MapSettings {
        MapSettings {
            lives_budget: lives,
            global_time_limit_ms: time_ms,
            finish_score: finish,
            ..MapSettings::default()
        }
    }

    #[test]
    fn lives_never_go_below_zero() {
        let mut budget = BudgetTracker::new(&settings(Some(2), None, None));
        assert_eq!(budget.lose_life(), LifeOutcome::Lost);
        assert_eq!(budget.lose_life(), LifeOutcome::Exhausted);
        // Further losses change nothing and never re-fire Exhausted.
        assert_eq!(budget.lose_life(), LifeOutcome::Lost);
        assert_eq!(budget.lives_left(), Some(0));
        assert_eq!(budget.game_over_reason(), Some(GameOverReason::Lives));
    }

    #[test]
    fn unlimited_lives_are_never_consumed() {
        let mut budget = BudgetTracker::new(&settings(None, None, None));
        assert_eq!(budget.lose_life(), LifeOutcome::Unlimited);
        assert_eq!(budget.lives_left(), None);
        assert!(!budget.is_game_over());
    }

    #[test]
    fn extra_lives_are_additive_only_when_finite() {
        let mut finite = BudgetTracker::new(&settings(Some(1), None, None));
        assert!(finite.add_extra_lives(2));
        assert_eq!(finite.lives_left(), Some(3));
        assert!(!finite.add_extra_lives(0));

        let mut unlimited = BudgetTracker::new(&settings(None, None, None));
        assert!(!unlimited.add_extra_lives(2));
    }

    #[test]
    fn timer_expiry_is_a_distinct_game_over() {
        let mut budget = BudgetTracker::new(&settings(Some(3), Some(1000), None));
        assert!(!budget.tick(600));
        assert!(budget.tick(600));
        assert_eq!(budget.time_left_ms(), Some(0));
        assert_eq!(budget.game_over_reason(), Some(GameOverReason::Timeout));
        // Expiry fires once.
        assert!(!budget.tick(100));
    }

    #[test]
    fn extra_time_extends_the_countdown() {
        let mut budget = BudgetTracker::new(&settings(None, Some(500), None));
        assert!(budget.add_extra_time_ms(500));
        assert!(!budget.tick(900));
        assert_eq!(budget.time_left_ms(), Some(100));

        let mut untimed = BudgetTracker::new(&settings(None, None, None));
        assert!(!untimed.add_extra_time_ms(500));
    }

    #[test]
    fn win_announced_exactly_once() {
        let mut budget = BudgetTracker::new(&settings(None, None, Some(10)));
        assert!(!budget.set_score(5, 20));
        assert!(budget.set_score(10, 20));
        // Re-computing a score that still meets the threshold is silent.
        assert!(!budget.set_score(12, 20));
        assert!(!budget.announce_win());
    }

    #[test]
    fn no_finish_score_means_no_automatic_win() {
        let mut budget = BudgetTracker::new(&settings(None, None, None));
        assert!(!budget.set_score(100, 100));
        assert!(budget.finish_threshold_met());
        // A finish stage can still announce it, once.
        assert!(budget.announce_win());
        assert!(!budget.announce_win());
    }

    #[test]
    fn reset_restores_initial_budgets() {
        let mut budget = BudgetTracker::new(&settings(Some(1), Some(1000), Some(5)));
        budget.lose_life();
        budget.tick(400);
        budget.set_score(7, 10);
        budget.reset();
        assert_eq!(budget.lives_left(), Some(1));
        assert_eq!(budget.time_left_ms(), Some(1000));
        assert_eq!(budget.score(), 0);
        assert!(!budget.is_game_over());
        assert!(!budget.is_won());
    }

    #[test]
    fn restore_arms_the_win_latch() {
        let mut budget = BudgetTracker::new(&settings(None, None, Some(10)));
        budget.apply_restored(None, None, false, 12, 20);
        // The previous session already announced this win.
        assert!(!budget.set_score(12, 20));
    }

    #[test]
    fn restore_done_session_is_over() {
        let mut budget = BudgetTracker::new(&settings(Some(3), None, None));
        budget.apply_restored(Some(0), None, true, 4, 10);
        assert!(budget.is_game_over());
        assert_eq!(budget.game_over_reason(), Some(GameOverReason::Lives));
    }
}
