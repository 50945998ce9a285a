//! The progression controller: owns every subsystem of one map session
//! and orchestrates activation, scoring, budgets, and end-of-game.
//!
//! # Architecture
//!
//! The `ProgressionController` owns:
//! - A [`StageGraph`] (nodes) and a [`PathSet`] (undirected connectors)
//! - One [`ExerciseBinding`] per regular stage
//! - A [`BudgetTracker`] (lives, global time, score vs finish threshold)
//! - A [`DeferredQueue`] of [`UiEffect`]s for animation-coherent playback
//! - The drained list of [`EngineEvent`] signals
//!
//! # Ordering
//!
//! Mutations are committed before the signal or deferred effect
//! describing them is recorded, so observers never see an effect
//! referencing uncommitted state. Resetting cancels all pending
//! scheduled entries before reapplying initial state, so a stale effect
//! from a previous session can never fire into a fresh one.
//!
//! Runtime progression failures are absorbed locally and surfaced as
//! signals (`ActivationRejected`, `GameOver`); nothing here raises to
//! the host.

use std::collections::{HashMap, HashSet};

use crate::budget::{BudgetTracker, GameOverReason, LifeOutcome};
use crate::config::{FogMode, MapDefinition, RoamingMode, StageKind};
use crate::event::{EngineEvent, RejectReason, UiEffect};
use crate::exercise::{ExerciseBinding, ScoreOutcome};
use crate::graph::StageGraph;
use crate::id::StageId;
use crate::path::{PathSet, PathState};
use crate::schedule::{DeferredQueue, Delivery, Timing};
use crate::snapshot::{
    FORMAT_VERSION, PathSnapshot, SessionSnapshot, SnapshotError, StageSnapshot,
};
use crate::stage::{Stage, StageState};

// ---------------------------------------------------------------------------
// Animation timing
// ---------------------------------------------------------------------------

/// Slot reserved after a stage state-change animation.
const STAGE_ANIMATION_BLOCK_MS: u64 = 800;
/// Delay before revealed stages and paths fade in.
const REVEAL_DELAY_MS: u64 = 250;
/// Default bonus when an extra-life stage declares no amount.
const DEFAULT_BONUS_LIVES: u32 = 1;
/// Default bonus when an extra-time stage declares no amount (seconds).
const DEFAULT_BONUS_SECONDS: u32 = 30;

// ---------------------------------------------------------------------------
// ProgressionController
// ---------------------------------------------------------------------------

/// Orchestrates one map session. One instance per map; no state lives
/// anywhere else.
#[derive(Debug)]
pub struct ProgressionController {
    definition: MapDefinition,
    graph: StageGraph,
    paths: PathSet,
    exercises: HashMap<StageId, ExerciseBinding>,
    budget: BudgetTracker,
    effects: DeferredQueue<UiEffect>,
    /// Effects already released for the host to play.
    ready_effects: Vec<UiEffect>,
    events: Vec<EngineEvent>,
    /// BFS closure from the start stages. Topology is fixed, so this is
    /// computed once per session.
    reachable: HashSet<StageId>,
    focus: Option<StageId>,
    /// The stage whose exercise overlay is currently up, if any.
    open_stage: Option<StageId>,
    now_ms: u64,
    /// `false` zeroes all replay delays (reduced motion).
    respect_delays: bool,
}

impl ProgressionController {
    /// Build a session from a frozen map definition and open the start
    /// stages.
    pub fn new(definition: MapDefinition) -> Self {
        let graph = StageGraph::new(&definition);
        let paths = PathSet::new(&graph);
        let exercises = definition
            .stages()
            .iter()
            .filter(|d| d.kind == StageKind::Regular)
            .map(|d| (d.id, ExerciseBinding::from_def(d)))
            .collect();
        let budget = BudgetTracker::new(definition.settings());

        let mut controller = Self {
            graph,
            paths,
            exercises,
            budget,
            effects: DeferredQueue::new(),
            ready_effects: Vec::new(),
            events: Vec::new(),
            reachable: HashSet::new(),
            focus: None,
            open_stage: None,
            now_ms: 0,
            respect_delays: true,
            definition,
        };
        controller.start_session();
        controller
    }

    // -----------------------------------------------------------------------
    // Session start
    // -----------------------------------------------------------------------

    fn start_session(&mut self) {
        let roaming = self.settings().roaming;
        let fog = self.settings().fog;

        let (opened, focus) = if roaming == RoamingMode::Free {
            let opened = self.graph.open_all();
            self.reachable = self.graph.ids().collect();
            let focus = opened.first().copied();
            (opened, focus)
        } else {
            let start = self.graph.open_start_stages();
            self.reachable = start.reachable;
            (start.opened, start.focus)
        };

        match fog {
            FogMode::None => {
                self.graph.set_all_visible();
                self.paths.set_all_visible();
            }
            FogMode::Adjacent => {
                for &id in &opened {
                    self.graph.reveal_neighbors(id, &self.reachable);
                }
            }
            FogMode::All => {}
        }
        if fog != FogMode::None {
            for &id in &opened {
                self.paths
                    .update_for_stage(&self.graph, id, StageState::Open, fog);
            }
            self.graph.update_reachability(&self.reachable);
            self.paths.update_reachability(&self.reachable);
        }

        for &id in &opened {
            self.emit(EngineEvent::StageStateChanged {
                stage: id,
                state: StageState::Open,
            });
        }
        self.focus = focus;
        if let Some(stage) = focus {
            self.emit(EngineEvent::FocusChanged { stage });
            self.push_effect(UiEffect::Focus { stage }, Timing::immediate());
        }

        let (score, max_score) = self.aggregate();
        self.budget.set_score(score, max_score);
        self.emit_budget();
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn definition(&self) -> &MapDefinition {
        &self.definition
    }

    fn settings(&self) -> &crate::config::MapSettings {
        self.definition.settings()
    }

    pub fn stage(&self, id: StageId) -> Option<&Stage> {
        self.graph.get(id)
    }

    pub fn stage_state(&self, id: StageId) -> Option<StageState> {
        self.graph.get(id).map(|s| s.state)
    }

    pub fn path_between(&self, a: StageId, b: StageId) -> Option<&crate::path::Path> {
        self.paths.between(a, b)
    }

    pub fn paths(&self) -> impl Iterator<Item = &crate::path::Path> {
        self.paths.iter()
    }

    pub fn exercise(&self, id: StageId) -> Option<&ExerciseBinding> {
        self.exercises.get(&id)
    }

    /// Aggregate score over reachable exercises.
    pub fn score(&self) -> u32 {
        self.budget.score()
    }

    /// Aggregate maximum score over reachable exercises.
    pub fn max_score(&self) -> u32 {
        self.budget.max_score()
    }

    pub fn lives_left(&self) -> Option<u32> {
        self.budget.lives_left()
    }

    pub fn time_left_ms(&self) -> Option<u64> {
        self.budget.time_left_ms()
    }

    pub fn is_game_over(&self) -> bool {
        self.budget.is_game_over()
    }

    pub fn is_won(&self) -> bool {
        self.budget.is_won()
    }

    pub fn focused_stage(&self) -> Option<StageId> {
        self.focus
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Reduced-motion switch: when `false`, replayed effects fire
    /// immediately in original order instead of spacing out.
    pub fn set_respect_delays(&mut self, respect: bool) {
        self.respect_delays = respect;
    }

    // -----------------------------------------------------------------------
    // Signals and effects
    // -----------------------------------------------------------------------

    /// Drain all pending signals. Returns them in emission order.
    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    /// Read-only view of pending signals.
    pub fn pending_events(&self) -> &[EngineEvent] {
        &self.events
    }

    /// Drain the presentation effects that are ready to play.
    pub fn drain_effects(&mut self) -> Vec<UiEffect> {
        std::mem::take(&mut self.ready_effects)
    }

    /// Release every pending effect immediately, in insertion order.
    pub fn flush_effects(&mut self) -> Vec<UiEffect> {
        let mut effects = std::mem::take(&mut self.ready_effects);
        effects.extend(self.effects.flush());
        effects
    }

    fn emit(&mut self, event: EngineEvent) {
        self.events.push(event);
    }

    fn emit_budget(&mut self) {
        let event = EngineEvent::BudgetChanged {
            lives_left: self.budget.lives_left(),
            time_left_ms: self.budget.time_left_ms(),
            score: self.budget.score(),
        };
        self.emit(event);
    }

    fn push_effect(&mut self, effect: UiEffect, timing: Timing) {
        if let Delivery::Immediate(effect) = self.effects.add(effect, timing) {
            self.ready_effects.push(effect);
        }
    }

    // -----------------------------------------------------------------------
    // Activation
    // -----------------------------------------------------------------------

    /// Handle a stage-activation request (the player entered a stage).
    ///
    /// Rejections mutate nothing; they only record an
    /// `ActivationRejected` signal for user feedback.
    pub fn activate_stage(&mut self, id: StageId) {
        if self.budget.is_game_over() {
            self.emit(EngineEvent::ActivationRejected {
                stage: id,
                reason: RejectReason::GameDone,
            });
            return;
        }
        let Some(stage) = self.graph.get(id) else {
            self.emit(EngineEvent::ActivationRejected {
                stage: id,
                reason: RejectReason::UnknownStage,
            });
            return;
        };
        let kind = stage.kind;
        let reject = match stage.state {
            StageState::Sealed => Some(RejectReason::Sealed),
            StageState::Locked => Some(RejectReason::Locked),
            StageState::Unlocking => Some(RejectReason::ScoreTooLow),
            StageState::Cleared if kind.is_special() => Some(RejectReason::AlreadyCleared),
            _ => None,
        };
        if let Some(reason) = reject {
            self.emit(EngineEvent::ActivationRejected { stage: id, reason });
            return;
        }

        self.set_focus(id);

        if kind.is_special() {
            self.activate_special(id, kind);
            return;
        }

        // First entry: open -> opened.
        if self.stage_state(id) == Some(StageState::Open) {
            if let Some(stage) = self.graph.get_mut(id) {
                stage.state = StageState::Opened;
            }
            self.emit(EngineEvent::StageStateChanged {
                stage: id,
                state: StageState::Opened,
            });
        }
        if let Some(binding) = self.exercises.get_mut(&id) {
            binding.open();
            binding.start();
        }
        // Effects triggered while the overlay is up are replayed after
        // it closes.
        self.open_stage = Some(id);
        self.effects.set_skippable(false);
    }

    /// Tell the controller the exercise overlay closed. Queued effects
    /// are scheduled for playback.
    pub fn close_stage(&mut self) {
        if let Some(id) = self.open_stage.take()
            && let Some(binding) = self.exercises.get_mut(&id)
        {
            binding.stop();
        }
        self.effects.set_skippable(true);
        self.effects.schedule_queued(self.now_ms, self.respect_delays);
    }

    fn set_focus(&mut self, id: StageId) {
        if self.focus == Some(id) {
            return;
        }
        self.focus = Some(id);
        self.emit(EngineEvent::FocusChanged { stage: id });
        self.push_effect(UiEffect::Focus { stage: id }, Timing::immediate());
    }

    fn activate_special(&mut self, id: StageId, kind: StageKind) {
        let bonus = self.definition.get(id).and_then(|d| d.bonus);
        match kind {
            StageKind::ExtraLife => {
                if self
                    .budget
                    .add_extra_lives(bonus.unwrap_or(DEFAULT_BONUS_LIVES))
                {
                    self.emit_budget();
                }
            }
            StageKind::ExtraTime => {
                let seconds = bonus.unwrap_or(DEFAULT_BONUS_SECONDS);
                if self.budget.add_extra_time_ms(u64::from(seconds) * 1_000) {
                    self.emit_budget();
                }
            }
            StageKind::Finish => {
                if self.budget.finish_threshold_met() && self.budget.announce_win() {
                    self.emit(EngineEvent::GameWon);
                }
            }
            StageKind::Regular => unreachable!("special activation on a regular stage"),
        }
        self.clear_stage(id);
    }

    // -----------------------------------------------------------------------
    // Exercise results
    // -----------------------------------------------------------------------

    /// A scoring event from the embedded activity attached to a stage.
    ///
    /// Events for stages that are not in play (never entered, or
    /// unknown ids) are absorbed without touching any state.
    pub fn exercise_scored(&mut self, id: StageId, score: u32, max_score: u32) {
        if self.budget.is_game_over() || !self.stage_in_play(id) {
            return;
        }
        let Some(binding) = self.exercises.get_mut(&id) else {
            return;
        };
        match binding.on_scored(score, max_score) {
            ScoreOutcome::AlreadyCleared => return,
            ScoreOutcome::Cleared => {
                self.clear_stage(id);
            }
            ScoreOutcome::Completed => {
                self.complete_stage(id);
            }
        }
        self.refresh_progress();
    }

    /// A progress ping from the embedded activity (answered without a
    /// final score yet).
    pub fn exercise_answered(&mut self, id: StageId) {
        if self.budget.is_game_over() || !self.stage_in_play(id) {
            return;
        }
        if let Some(binding) = self.exercises.get_mut(&id) {
            binding.open();
        }
    }

    /// A stage accepts exercise events once it has been entered.
    fn stage_in_play(&self, id: StageId) -> bool {
        self.graph
            .get(id)
            .is_some_and(|s| matches!(s.state, StageState::Opened | StageState::Completed))
    }

    /// Transition a stage to `Cleared` and propagate: paths, neighbor
    /// unlocks, reveals. Idempotent -- clearing a cleared stage changes
    /// nothing and emits nothing.
    fn clear_stage(&mut self, id: StageId) {
        let Some(stage) = self.graph.get_mut(id) else {
            return;
        };
        if stage.state == StageState::Cleared {
            return;
        }
        stage.state = StageState::Cleared;
        self.emit(EngineEvent::StageStateChanged {
            stage: id,
            state: StageState::Cleared,
        });
        self.push_effect(
            UiEffect::StageUpdated {
                stage: id,
                state: StageState::Cleared,
            },
            Timing::slot(0, STAGE_ANIMATION_BLOCK_MS),
        );
        self.apply_path_updates(id, StageState::Cleared);
        self.unlock_from(id);
    }

    /// Transition a stage to `Completed` (partial result): under
    /// complete-roaming this still unlocks neighbors, and under a
    /// finite lives budget the attempt costs a life.
    fn complete_stage(&mut self, id: StageId) {
        if self.stage_state(id) == Some(StageState::Opened) {
            if let Some(stage) = self.graph.get_mut(id) {
                stage.state = StageState::Completed;
            }
            self.emit(EngineEvent::StageStateChanged {
                stage: id,
                state: StageState::Completed,
            });
            self.push_effect(
                UiEffect::StageUpdated {
                    stage: id,
                    state: StageState::Completed,
                },
                Timing::slot(0, STAGE_ANIMATION_BLOCK_MS),
            );
        }
        if self.settings().roaming == RoamingMode::Complete {
            self.unlock_from(id);
        }
        match self.budget.lose_life() {
            LifeOutcome::Unlimited => {}
            LifeOutcome::Lost => self.emit_budget(),
            LifeOutcome::Exhausted => {
                self.emit_budget();
                self.finish_game(GameOverReason::Lives);
            }
        }
    }

    /// Unlock the neighbors of a passed stage, revealing what the fog
    /// policy allows.
    fn unlock_from(&mut self, id: StageId) {
        let (score, _) = self.aggregate();
        let fog = self.settings().fog;
        let changed = self.graph.unlock_neighbors(id, score);
        for (neighbor, state) in changed {
            self.emit(EngineEvent::StageStateChanged {
                stage: neighbor,
                state,
            });
            if fog != FogMode::None {
                self.reveal_stage(neighbor);
            }
            if state == StageState::Open {
                self.stage_opened(neighbor);
            }
        }
    }

    /// Propagation for a stage that just transitioned to `Open`: under
    /// adjacent fog its direct neighbors become visible (but stay
    /// locked), and its paths are shown.
    fn stage_opened(&mut self, id: StageId) {
        if self.settings().fog == FogMode::Adjacent {
            let revealed = self.graph.reveal_neighbors(id, &self.reachable);
            for stage in revealed {
                self.push_effect(
                    UiEffect::StageRevealed { stage },
                    Timing::after(REVEAL_DELAY_MS),
                );
            }
        }
        self.apply_path_updates(id, StageState::Open);
    }

    fn reveal_stage(&mut self, id: StageId) {
        if let Some(stage) = self.graph.get_mut(id)
            && !stage.visible
        {
            stage.visible = true;
            self.push_effect(
                UiEffect::StageRevealed { stage: id },
                Timing::after(REVEAL_DELAY_MS),
            );
        }
    }

    fn apply_path_updates(&mut self, id: StageId, state: StageState) {
        let fog = self.settings().fog;
        let changes = self.paths.update_for_stage(&self.graph, id, state, fog);
        if !changes.shown.is_empty() {
            self.push_effect(
                UiEffect::PathsRevealed {
                    paths: changes.shown,
                },
                Timing::after(REVEAL_DELAY_MS),
            );
        }
        if !changes.cleared.is_empty() {
            self.emit(EngineEvent::PathStateChanged {
                paths: changes.cleared.clone(),
                state: PathState::Cleared,
            });
            self.push_effect(
                UiEffect::PathsUpdated {
                    paths: changes.cleared,
                    state: PathState::Cleared,
                },
                Timing::after(REVEAL_DELAY_MS),
            );
        }
    }

    /// Recompute the aggregate score, announce the win if this crossed
    /// the threshold, and re-evaluate stages parked in `Unlocking`.
    fn refresh_progress(&mut self) {
        let (score, max_score) = self.aggregate();
        let budget_changed =
            score != self.budget.score() || max_score != self.budget.max_score();
        let won = self.budget.set_score(score, max_score);
        if budget_changed {
            self.emit_budget();
        }
        if won {
            self.emit(EngineEvent::GameWon);
        }

        let fog = self.settings().fog;
        let opened = self.graph.update_unlocking_stages(score);
        for id in opened {
            self.emit(EngineEvent::StageStateChanged {
                stage: id,
                state: StageState::Open,
            });
            if fog != FogMode::None {
                self.reveal_stage(id);
            }
            self.stage_opened(id);
        }
    }

    fn aggregate(&self) -> (u32, u32) {
        let mut score = 0u32;
        let mut max_score = 0u32;
        for (id, binding) in &self.exercises {
            if self.reachable.contains(id) {
                score = score.saturating_add(binding.score);
                max_score = max_score.saturating_add(binding.max_score);
            }
        }
        (score, max_score)
    }

    // -----------------------------------------------------------------------
    // Time
    // -----------------------------------------------------------------------

    /// Advance the session clock: global countdown, the open exercise's
    /// countdown, and deferred-effect playback.
    pub fn advance_time(&mut self, elapsed_ms: u64) {
        self.now_ms = self.now_ms.saturating_add(elapsed_ms);

        if !self.budget.is_game_over() {
            if self.budget.tick(elapsed_ms) {
                self.emit_budget();
                self.finish_game(GameOverReason::Timeout);
            } else if let Some(id) = self.open_stage {
                let timed_out = self
                    .exercises
                    .get_mut(&id)
                    .is_some_and(|b| b.tick(elapsed_ms));
                if timed_out {
                    self.exercise_timed_out(id);
                }
            }
        }

        let due = self.effects.take_due(self.now_ms);
        self.ready_effects.extend(due);
    }

    /// Local countdown expiry: the attempt ends as a failed completion.
    /// The global budget decides whether that also ends the game.
    fn exercise_timed_out(&mut self, id: StageId) {
        let Some(binding) = self.exercises.get_mut(&id) else {
            return;
        };
        if binding.time_out() == ScoreOutcome::AlreadyCleared {
            return;
        }
        self.complete_stage(id);
        self.refresh_progress();
    }

    /// Budget exhaustion: seal the whole map and emit the game-over
    /// signal, with the overlay bookkeeping torn down first.
    fn finish_game(&mut self, reason: GameOverReason) {
        if let Some(id) = self.open_stage.take()
            && let Some(binding) = self.exercises.get_mut(&id)
        {
            binding.stop();
        }
        self.effects.set_skippable(true);
        self.effects.schedule_queued(self.now_ms, self.respect_delays);
        let sealed = self.graph.seal_all();
        for stage in sealed {
            self.emit(EngineEvent::StageStateChanged {
                stage,
                state: StageState::Sealed,
            });
        }
        self.emit(EngineEvent::GameOver { reason });
    }

    // -----------------------------------------------------------------------
    // Reset and persistence
    // -----------------------------------------------------------------------

    /// Restart the session from the map definition. Every pending timer
    /// and queued effect is cancelled before initial state is
    /// reapplied.
    pub fn reset(&mut self) {
        self.clear_transients();
        self.graph.reset();
        self.paths.reset();
        for binding in self.exercises.values_mut() {
            binding.reset();
        }
        self.budget.reset();
        self.now_ms = 0;
        self.focus = None;
        self.start_session();
    }

    fn clear_transients(&mut self) {
        self.effects.clear_queued();
        self.effects.clear_scheduled();
        self.effects.set_skippable(true);
        self.ready_effects.clear();
        self.events.clear();
        self.open_stage = None;
    }

    /// Capture the current session in the host persistence shape.
    pub fn snapshot(&self) -> SessionSnapshot {
        let stages = self
            .graph
            .iter()
            .map(|s| StageSnapshot {
                id: s.id,
                state: s.state,
                visible: s.visible,
            })
            .collect();
        let paths = self
            .paths
            .iter()
            .map(|p| PathSnapshot {
                from: p.from,
                to: p.to,
                state: p.state,
                visible: p.visible,
            })
            .collect();
        let exercises = self
            .graph
            .ids()
            .filter_map(|id| self.exercises.get(&id))
            .map(ExerciseBinding::snapshot)
            .collect();
        SessionSnapshot {
            version: FORMAT_VERSION,
            stages,
            paths,
            exercises,
            lives_left: self.budget.lives_left(),
            time_left_ms: self.budget.time_left_ms(),
            game_done: self.budget.is_game_over(),
        }
    }

    /// Restore a previously captured session onto this map. Snapshot
    /// entries referencing unknown stages are ignored.
    pub fn restore(&mut self, snapshot: &SessionSnapshot) -> Result<(), SnapshotError> {
        snapshot.check_version()?;

        self.clear_transients();
        self.graph.reset();
        self.paths.reset();
        for binding in self.exercises.values_mut() {
            binding.reset();
        }
        self.budget.reset();

        for s in &snapshot.stages {
            if let Some(stage) = self.graph.get_mut(s.id) {
                stage.state = s.state;
                stage.visible = s.visible;
            }
        }
        for p in &snapshot.paths {
            self.paths.apply_restored(p.from, p.to, p.state, p.visible);
        }
        for e in &snapshot.exercises {
            if let Some(binding) = self.exercises.get_mut(&e.id) {
                binding.restore_from(e);
            }
        }

        self.reachable = if self.settings().roaming == RoamingMode::Free {
            self.graph.ids().collect()
        } else {
            self.graph
                .gather_subgraph_ids(&self.graph.start_candidates())
        };

        let (score, max_score) = self.aggregate();
        self.budget.apply_restored(
            snapshot.lives_left,
            snapshot.time_left_ms,
            snapshot.game_done,
            score,
            max_score,
        );

        self.focus = self
            .graph
            .iter()
            .find(|s| s.state.is_unlocked())
            .map(|s| s.id);

        Ok(())
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    fn has_event(controller: &ProgressionController, predicate: impl Fn(&EngineEvent) -> bool) -> bool {
        controller.pending_events().iter().any(predicate)
    }

    // -----------------------------------------------------------------------
    // Activation and rejection
    // -----------------------------------------------------------------------

    #[test]
    fn start_stage_opens_and_gets_focus() {
        let controller = ProgressionController::new(line_map(3));
        assert_eq!(controller.stage_state(StageId(0)), Some(StageState::Open));
        assert_eq!(controller.stage_state(StageId(1)), Some(StageState::Locked));
        assert_eq!(controller.focused_stage(), Some(StageId(0)));
    }

    #[test]
    fn activating_unknown_stage_is_rejected_without_mutation() {
        let mut controller = ProgressionController::new(line_map(2));
        controller.drain_events();
        controller.activate_stage(StageId(99));
        assert_eq!(
            controller.drain_events(),
            vec![EngineEvent::ActivationRejected {
                stage: StageId(99),
                reason: RejectReason::UnknownStage,
            }]
        );
    }

    #[test]
    fn activating_locked_stage_is_rejected() {
        let mut controller = ProgressionController::new(line_map(3));
        controller.drain_events();
        controller.activate_stage(StageId(2));
        assert!(has_event(&controller, |e| matches!(
            e,
            EngineEvent::ActivationRejected {
                stage: StageId(2),
                reason: RejectReason::Locked,
            }
        )));
        assert_eq!(controller.stage_state(StageId(2)), Some(StageState::Locked));
    }

    #[test]
    fn first_activation_opens_the_exercise() {
        let mut controller = ProgressionController::new(line_map(2));
        controller.activate_stage(StageId(0));
        assert_eq!(controller.stage_state(StageId(0)), Some(StageState::Opened));
        assert_eq!(
            controller.exercise(StageId(0)).unwrap().state,
            crate::exercise::ExerciseState::Opened
        );
    }

    // -----------------------------------------------------------------------
    // Clearing and unlock propagation
    // -----------------------------------------------------------------------

    #[test]
    fn clearing_unlocks_neighbors_only() {
        let mut controller = ProgressionController::new(line_map(3));
        clear(&mut controller, StageId(0));
        assert_eq!(controller.stage_state(StageId(0)), Some(StageState::Cleared));
        assert_eq!(controller.stage_state(StageId(1)), Some(StageState::Open));
        assert_eq!(controller.stage_state(StageId(2)), Some(StageState::Locked));
    }

    #[test]
    fn path_clears_only_between_two_cleared_stages() {
        let mut controller = ProgressionController::new(line_map(3));
        clear(&mut controller, StageId(0));
        assert_eq!(
            controller.path_between(StageId(0), StageId(1)).unwrap().state,
            PathState::Open
        );
        clear(&mut controller, StageId(1));
        assert_eq!(
            controller.path_between(StageId(0), StageId(1)).unwrap().state,
            PathState::Cleared
        );
    }

    #[test]
    fn clearing_twice_emits_nothing_new() {
        let mut controller = ProgressionController::new(line_map(2));
        clear(&mut controller, StageId(0));
        let lives_before = controller.lives_left();
        controller.drain_events();

        controller.exercise_scored(StageId(0), 10, 10);
        assert!(controller.drain_events().is_empty());
        assert_eq!(controller.lives_left(), lives_before);
    }

    #[test]
    fn partial_score_completes_and_unlocks_under_complete_roaming() {
        let mut controller = ProgressionController::new(line_map(3));
        controller.activate_stage(StageId(0));
        controller.exercise_scored(StageId(0), 4, 10);
        controller.close_stage();
        assert_eq!(
            controller.stage_state(StageId(0)),
            Some(StageState::Completed)
        );
        // Complete roaming: a partial result still unlocks neighbors.
        assert_eq!(controller.stage_state(StageId(1)), Some(StageState::Open));
    }

    #[test]
    fn partial_score_blocks_under_success_roaming() {
        let map = map_with_settings(3, |s| s.roaming = RoamingMode::Success);
        let mut controller = ProgressionController::new(map);
        controller.activate_stage(StageId(0));
        controller.exercise_scored(StageId(0), 4, 10);
        assert_eq!(controller.stage_state(StageId(1)), Some(StageState::Locked));

        controller.exercise_scored(StageId(0), 10, 10);
        assert_eq!(controller.stage_state(StageId(1)), Some(StageState::Open));
    }

    #[test]
    fn free_roaming_opens_everything_at_start() {
        let map = map_with_settings(4, |s| s.roaming = RoamingMode::Free);
        let controller = ProgressionController::new(map);
        for id in 0..4 {
            assert_eq!(
                controller.stage_state(StageId(id)),
                Some(StageState::Open)
            );
        }
    }

    // -----------------------------------------------------------------------
    // Budgets
    // -----------------------------------------------------------------------

    #[test]
    fn one_life_map_seals_on_first_partial_result() {
        let map = map_with_settings(3, |s| s.lives_budget = Some(1));
        let mut controller = ProgressionController::new(map);
        controller.activate_stage(StageId(0));
        controller.drain_events();

        controller.exercise_scored(StageId(0), 4, 10);

        let events = controller.drain_events();
        assert!(events.iter().any(|e| matches!(
            e,
            EngineEvent::GameOver {
                reason: GameOverReason::Lives,
            }
        )));
        for id in 0..3 {
            assert_eq!(
                controller.stage_state(StageId(id)),
                Some(StageState::Sealed)
            );
        }
        // Activation afterwards is rejected.
        controller.activate_stage(StageId(1));
        assert!(has_event(&controller, |e| matches!(
            e,
            EngineEvent::ActivationRejected {
                reason: RejectReason::GameDone,
                ..
            }
        )));
    }

    #[test]
    fn full_score_never_costs_a_life() {
        let map = map_with_settings(2, |s| s.lives_budget = Some(1));
        let mut controller = ProgressionController::new(map);
        clear(&mut controller, StageId(0));
        assert_eq!(controller.lives_left(), Some(1));
        assert!(!controller.is_game_over());
    }

    #[test]
    fn global_timeout_is_a_distinct_game_over() {
        let map = map_with_settings(2, |s| s.global_time_limit_ms = Some(10_000));
        let mut controller = ProgressionController::new(map);
        controller.drain_events();
        controller.advance_time(9_999);
        assert!(!controller.is_game_over());
        controller.advance_time(1);
        assert!(controller.is_game_over());
        assert!(has_event(&controller, |e| matches!(
            e,
            EngineEvent::GameOver {
                reason: GameOverReason::Timeout,
            }
        )));
    }

    #[test]
    fn win_announced_once_when_score_reaches_threshold() {
        let map = map_with_settings(3, |s| s.finish_score = Some(20));
        let mut controller = ProgressionController::new(map);
        clear(&mut controller, StageId(0));
        assert!(!controller.is_won());

        clear(&mut controller, StageId(1));
        assert!(controller.is_won());
        let events = controller.drain_events();
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, EngineEvent::GameWon))
                .count(),
            1
        );

        // Another clear keeps the threshold met but stays silent.
        clear(&mut controller, StageId(2));
        assert!(
            !controller
                .drain_events()
                .iter()
                .any(|e| matches!(e, EngineEvent::GameWon))
        );
    }

    // -----------------------------------------------------------------------
    // Special stages
    // -----------------------------------------------------------------------

    #[test]
    fn extra_life_stage_grants_once() {
        let mut controller = ProgressionController::new(bonus_map());
        clear(&mut controller, StageId(0));
        assert_eq!(controller.lives_left(), Some(2));

        controller.activate_stage(StageId(1));
        assert_eq!(controller.lives_left(), Some(4));
        assert_eq!(
            controller.stage_state(StageId(1)),
            Some(StageState::Cleared)
        );

        // The bonus is never re-granted.
        controller.drain_events();
        controller.activate_stage(StageId(1));
        assert_eq!(controller.lives_left(), Some(4));
        assert!(has_event(&controller, |e| matches!(
            e,
            EngineEvent::ActivationRejected {
                reason: RejectReason::AlreadyCleared,
                ..
            }
        )));
    }

    #[test]
    fn extra_time_stage_extends_the_global_countdown() {
        let mut controller = ProgressionController::new(bonus_map());
        clear(&mut controller, StageId(0));
        assert_eq!(controller.time_left_ms(), Some(60_000));
        controller.activate_stage(StageId(2));
        assert_eq!(controller.time_left_ms(), Some(75_000));
    }

    #[test]
    fn finish_stage_wins_only_past_the_threshold() {
        let mut controller = ProgressionController::new(bonus_map());
        // Threshold is 10; score only 8 of it, which still unlocks the
        // neighbors under complete roaming.
        controller.activate_stage(StageId(0));
        controller.exercise_scored(StageId(0), 8, 10);
        controller.close_stage();

        controller.activate_stage(StageId(3));
        assert!(!controller.is_won());
        assert_eq!(
            controller.stage_state(StageId(3)),
            Some(StageState::Cleared)
        );

        // Clearing the exercise afterwards crosses the threshold.
        controller.activate_stage(StageId(0));
        controller.exercise_scored(StageId(0), 10, 10);
        controller.close_stage();
        assert!(controller.is_won());
    }

    // -----------------------------------------------------------------------
    // Deferred effects
    // -----------------------------------------------------------------------

    #[test]
    fn effects_queue_while_overlay_is_open() {
        let mut controller = ProgressionController::new(line_map(3));
        controller.activate_stage(StageId(0));
        controller.drain_effects();

        controller.exercise_scored(StageId(0), 10, 10);
        // Overlay still open: nothing plays yet.
        assert!(controller.drain_effects().is_empty());

        controller.close_stage();
        controller.advance_time(60_000);
        let effects = controller.drain_effects();
        assert!(!effects.is_empty());
        assert!(matches!(
            effects[0],
            UiEffect::StageUpdated {
                stage: StageId(0),
                state: StageState::Cleared,
            }
        ));
    }

    #[test]
    fn reduced_motion_replays_everything_at_once() {
        let mut controller = ProgressionController::new(line_map(3));
        controller.set_respect_delays(false);
        controller.activate_stage(StageId(0));
        controller.drain_effects();
        controller.exercise_scored(StageId(0), 10, 10);
        controller.close_stage();
        // No time has to pass at all.
        controller.advance_time(0);
        assert!(!controller.drain_effects().is_empty());
    }

    // -----------------------------------------------------------------------
    // Reset and restore
    // -----------------------------------------------------------------------

    #[test]
    fn reset_cancels_stale_effects_and_relocks() {
        let mut controller = ProgressionController::new(line_map(3));
        controller.activate_stage(StageId(0));
        controller.exercise_scored(StageId(0), 10, 10);
        // Overlay never closed: effects still queued.
        controller.reset();
        controller.advance_time(600_000);

        let effects = controller.drain_effects();
        // Only the fresh session's focus effect; nothing stale.
        assert!(
            effects
                .iter()
                .all(|e| matches!(e, UiEffect::Focus { stage: StageId(0) }))
        );
        assert_eq!(controller.stage_state(StageId(0)), Some(StageState::Open));
        assert_eq!(controller.score(), 0);
    }

    #[test]
    fn snapshot_round_trip_preserves_progress() {
        let mut controller = ProgressionController::new(line_map(3));
        clear(&mut controller, StageId(0));
        controller.activate_stage(StageId(1));
        controller.exercise_scored(StageId(1), 4, 10);
        controller.close_stage();

        let snapshot = controller.snapshot();
        let mut restored = ProgressionController::new(line_map(3));
        restored.restore(&snapshot).unwrap();

        assert_eq!(restored.score(), controller.score());
        assert_eq!(restored.max_score(), controller.max_score());
        assert_eq!(restored.lives_left(), controller.lives_left());
        for id in 0..3 {
            assert_eq!(
                restored.stage_state(StageId(id)),
                controller.stage_state(StageId(id))
            );
        }
        assert_eq!(restored.snapshot(), snapshot);
    }

    #[test]
    fn restore_rejects_unknown_versions() {
        let mut controller = ProgressionController::new(line_map(2));
        let mut snapshot = controller.snapshot();
        snapshot.version = 99;
        assert!(matches!(
            controller.restore(&snapshot),
            Err(SnapshotError::UnsupportedVersion(99))
        ));
    }

    #[test]
    fn restore_ignores_unknown_stage_ids() {
        let mut controller = ProgressionController::new(line_map(2));
        let mut snapshot = controller.snapshot();
        snapshot.stages.push(StageSnapshot {
            id: StageId(42),
            state: StageState::Cleared,
            visible: true,
        });
        controller.restore(&snapshot).unwrap();
        assert_eq!(controller.stage_state(StageId(42)), None);
    }
}
