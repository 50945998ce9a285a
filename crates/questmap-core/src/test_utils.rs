//! Shared test helpers for unit tests, integration tests, and
//! benchmarks (via the `test-utils` feature).

use crate::config::{
    AccessRestrictions, MapBuilder, MapDefinition, MapSettings, StageDef, StageKind,
};
use crate::controller::ProgressionController;
use crate::id::StageId;

// ===========================================================================
// Stage constructors
// ===========================================================================

/// A regular stage with the given neighbors and a max score of 10.
pub fn stage(id: u32, neighbors: &[u32]) -> StageDef {
    let mut def = StageDef::new(StageId(id), format!("Stage {id}"));
    def.neighbors = neighbors.iter().map(|n| StageId(*n)).collect();
    def.max_score = Some(10);
    def
}

/// A stage gated behind a minimum aggregate score.
pub fn gated_stage(id: u32, neighbors: &[u32], min_score: u32, auto_open: bool) -> StageDef {
    let mut def = stage(id, neighbors);
    def.access_restrictions = Some(AccessRestrictions {
        min_score,
        open_on_score_sufficient: auto_open,
    });
    def
}

/// A special stage of the given kind with an optional bonus amount.
pub fn special_stage(id: u32, neighbors: &[u32], kind: StageKind, bonus: Option<u32>) -> StageDef {
    let mut def = stage(id, neighbors);
    def.kind = kind;
    def.max_score = None;
    def.bonus = bonus;
    def
}

// ===========================================================================
// Map factories
// ===========================================================================

/// A straight line of `n` regular stages, stage 0 flagged as start, each
/// worth 10 points. Default settings (complete roaming, adjacent fog).
pub fn line_map(n: u32) -> MapDefinition {
    map_with_settings(n, |_| {})
}

/// A straight line of `n` stages with the settings tweaked by `f`.
pub fn map_with_settings(n: u32, f: impl FnOnce(&mut MapSettings)) -> MapDefinition {
    let mut settings = MapSettings::default();
    f(&mut settings);

    let mut builder = MapBuilder::new();
    builder.settings(settings);
    for id in 0..n {
        let mut def = if id + 1 < n {
            stage(id, &[id + 1])
        } else {
            stage(id, &[])
        };
        def.can_be_start_stage = id == 0;
        builder.add_stage(def).unwrap();
    }
    builder.build().unwrap()
}

/// A hub map with every special stage kind:
///
/// ```text
///          1 (extra-life, +2)
///         /
///   0 -- 2 (extra-time, +15s)
///         \
///          3 (finish)
/// ```
///
/// Stage 0 is the start, worth 10 points. Settings: 2 lives, 60 s
/// global time, finish score 10.
pub fn bonus_map() -> MapDefinition {
    let mut builder = MapBuilder::new();
    builder.settings(MapSettings {
        lives_budget: Some(2),
        global_time_limit_ms: Some(60_000),
        finish_score: Some(10),
        ..MapSettings::default()
    });
    let mut start = stage(0, &[1, 2, 3]);
    start.can_be_start_stage = true;
    builder.add_stage(start).unwrap();
    builder
        .add_stage(special_stage(1, &[0], StageKind::ExtraLife, Some(2)))
        .unwrap();
    builder
        .add_stage(special_stage(2, &[0], StageKind::ExtraTime, Some(15)))
        .unwrap();
    builder
        .add_stage(special_stage(3, &[0], StageKind::Finish, None))
        .unwrap();
    builder.build().unwrap()
}

/// A grid of `width * height` regular stages connected 4-way, stage 0
/// flagged as start. For reachability stress and benchmarks.
pub fn grid_map(width: u32, height: u32) -> MapDefinition {
    let mut builder = MapBuilder::new();
    for y in 0..height {
        for x in 0..width {
            let id = y * width + x;
            let mut neighbors = Vec::new();
            if x + 1 < width {
                neighbors.push(id + 1);
            }
            if y + 1 < height {
                neighbors.push(id + width);
            }
            let mut def = stage(id, &neighbors);
            def.can_be_start_stage = id == 0;
            builder.add_stage(def).unwrap();
        }
    }
    builder.build().unwrap()
}

// ===========================================================================
// Session helpers
// ===========================================================================

/// Activate a stage, score full marks, and close the overlay.
pub fn clear(controller: &mut ProgressionController, id: StageId) {
    controller.activate_stage(id);
    controller.exercise_scored(id, 10, 10);
    controller.close_stage();
}

/// Activate a stage, score partial marks, and close the overlay.
pub fn attempt(controller: &mut ProgressionController, id: StageId, score: u32) {
    controller.activate_stage(id);
    controller.exercise_scored(id, score, 10);
    controller.close_stage();
}
