//! Map walkthrough example: build a map, play it through, and resume it.
//!
//! Creates a five-stage trail with a score-gated shortcut and an
//! extra-life bonus, plays a session with mixed results, prints every
//! signal along the way, then saves and restores the session.
//!
//! Run with: `cargo run -p questmap-examples --example map_walkthrough`

use questmap_core::config::{
    AccessRestrictions, MapBuilder, MapSettings, StageDef, StageKind,
};
use questmap_core::controller::ProgressionController;
use questmap_core::id::StageId;
use questmap_core::snapshot::SessionSnapshot;

fn print_events(controller: &mut ProgressionController) {
    for event in controller.drain_events() {
        println!("  signal: {event:?}");
    }
    for effect in controller.drain_effects() {
        println!("  effect: {effect:?}");
    }
}

fn main() {
    // --- Build the map ---

    let mut builder = MapBuilder::new();
    builder.settings(MapSettings {
        lives_budget: Some(3),
        finish_score: Some(30),
        ..MapSettings::default()
    });

    let mut trailhead = StageDef::new(StageId(0), "Trailhead");
    trailhead.neighbors = vec![StageId(1)];
    trailhead.can_be_start_stage = true;
    trailhead.max_score = Some(10);
    builder.add_stage(trailhead).expect("register Trailhead");

    let mut crossing = StageDef::new(StageId(1), "River Crossing");
    crossing.neighbors = vec![StageId(0), StageId(2), StageId(3)];
    crossing.max_score = Some(10);
    builder.add_stage(crossing).expect("register River Crossing");

    let mut shortcut = StageDef::new(StageId(2), "Cliff Shortcut");
    shortcut.neighbors = vec![StageId(1), StageId(4)];
    shortcut.max_score = Some(10);
    shortcut.access_restrictions = Some(AccessRestrictions {
        min_score: 15,
        open_on_score_sufficient: true,
    });
    builder.add_stage(shortcut).expect("register Cliff Shortcut");

    let mut spring = StageDef::new(StageId(3), "Healing Spring");
    spring.neighbors = vec![StageId(1)];
    spring.kind = StageKind::ExtraLife;
    spring.bonus = Some(1);
    builder.add_stage(spring).expect("register Healing Spring");

    let mut summit = StageDef::new(StageId(4), "Summit");
    summit.neighbors = vec![StageId(2)];
    summit.max_score = Some(10);
    builder.add_stage(summit).expect("register Summit");

    let map = builder.build().expect("freeze map");
    let mut controller = ProgressionController::new(map);

    println!("=== Session start ===");
    print_events(&mut controller);

    // --- Clear the trailhead ---

    println!("\n=== Trailhead: full score ===");
    controller.activate_stage(StageId(0));
    controller.exercise_scored(StageId(0), 10, 10);
    controller.close_stage();
    controller.advance_time(2_000);
    print_events(&mut controller);

    // --- Struggle at the crossing ---

    println!("\n=== River Crossing: partial, then full ===");
    controller.activate_stage(StageId(1));
    controller.exercise_scored(StageId(1), 4, 10);
    controller.close_stage();
    controller.advance_time(2_000);
    print_events(&mut controller);
    println!(
        "  lives left: {:?}, score: {}/{}",
        controller.lives_left(),
        controller.score(),
        controller.max_score()
    );

    controller.activate_stage(StageId(1));
    controller.exercise_scored(StageId(1), 10, 10);
    controller.close_stage();
    controller.advance_time(2_000);
    print_events(&mut controller);
    println!(
        "  shortcut state: {:?} (aggregate {} >= floor 15)",
        controller.stage_state(StageId(2)),
        controller.score()
    );

    // --- Collect the bonus life ---

    println!("\n=== Healing Spring ===");
    controller.activate_stage(StageId(3));
    controller.advance_time(2_000);
    print_events(&mut controller);
    println!("  lives left: {:?}", controller.lives_left());

    // --- Save and resume ---

    println!("\n=== Save / resume ===");
    let json = controller
        .snapshot()
        .to_json()
        .expect("serialize snapshot");
    println!("  snapshot: {} bytes of JSON", json.len());

    let snapshot = SessionSnapshot::from_json(&json).expect("parse snapshot");
    let mut resumed = rebuild_map();
    resumed.restore(&snapshot).expect("restore session");
    resumed.drain_events();

    // --- Finish the trail in the resumed session ---

    println!("\n=== Summit push (resumed session) ===");
    resumed.activate_stage(StageId(2));
    resumed.exercise_scored(StageId(2), 10, 10);
    resumed.close_stage();
    resumed.activate_stage(StageId(4));
    resumed.exercise_scored(StageId(4), 10, 10);
    resumed.close_stage();
    resumed.advance_time(5_000);
    print_events(&mut resumed);

    println!(
        "\nFinal: score {}/{}, won: {}",
        resumed.score(),
        resumed.max_score(),
        resumed.is_won()
    );
    assert!(resumed.is_won());
}

/// The resumed session needs the same frozen definition; in a real host
/// the definition comes from content storage.
fn rebuild_map() -> ProgressionController {
    let mut builder = MapBuilder::new();
    builder.settings(MapSettings {
        lives_budget: Some(3),
        finish_score: Some(30),
        ..MapSettings::default()
    });
    for (id, label, neighbors, kind, max, floor) in [
        (0u32, "Trailhead", vec![1u32], StageKind::Regular, Some(10), None),
        (1, "River Crossing", vec![0, 2, 3], StageKind::Regular, Some(10), None),
        (2, "Cliff Shortcut", vec![1, 4], StageKind::Regular, Some(10), Some(15)),
        (3, "Healing Spring", vec![1], StageKind::ExtraLife, None, None),
        (4, "Summit", vec![2], StageKind::Regular, Some(10), None),
    ] {
        let mut def = StageDef::new(StageId(id), label);
        def.neighbors = neighbors.into_iter().map(StageId).collect();
        def.can_be_start_stage = id == 0;
        def.kind = kind;
        def.max_score = max;
        def.bonus = (kind == StageKind::ExtraLife).then_some(1);
        def.access_restrictions = floor.map(|min_score| AccessRestrictions {
            min_score,
            open_on_score_sufficient: true,
        });
        builder.add_stage(def).expect("register stage");
    }
    ProgressionController::new(builder.build().expect("freeze map"))
}
