//! Map definitions and configuration loading.
//!
//! A map is defined once, at build time, from static configuration: a
//! list of stage descriptors plus global session settings. The
//! [`MapBuilder`] validates and freezes the definition into an immutable
//! [`MapDefinition`]; the `data-loader` feature adds JSON deserialization
//! for content defined in data files.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::id::StageId;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur while freezing a map definition.
#[derive(Debug, thiserror::Error)]
pub enum MapBuildError {
    #[error("duplicate stage id: {0:?}")]
    DuplicateStage(StageId),
    #[error("map has no stages")]
    Empty,
}

// ---------------------------------------------------------------------------
// Stage descriptors
// ---------------------------------------------------------------------------

/// What a stage is. Special kinds grant a budget bonus instead of
/// hosting a scored activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageKind {
    /// Hosts an embedded scored activity.
    Regular,
    /// Announces the win when activated with the finish threshold met.
    Finish,
    /// Grants extra lives when activated.
    ExtraLife,
    /// Grants extra global time when activated.
    ExtraTime,
}

impl StageKind {
    /// Special stages skip the opened/completed lifecycle entirely.
    pub fn is_special(self) -> bool {
        !matches!(self, StageKind::Regular)
    }
}

/// A numeric score floor a stage requires before it may leave
/// `Locked`/`Unlocking`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRestrictions {
    /// Aggregate score required before the stage may open.
    pub min_score: u32,
    /// Whether the stage auto-opens the moment the score suffices, or
    /// waits for the next direct unlock attempt.
    pub open_on_score_sufficient: bool,
}

/// A single stage descriptor. Immutable after the map is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDef {
    /// Unique identifier within the map.
    pub id: StageId,

    /// Display name. Opaque to the engine.
    pub label: String,

    /// Regular activity stage or special bonus stage.
    pub kind: StageKind,

    /// Stages this stage connects to. Undirected; the builder
    /// symmetrizes the relation and drops self references and unknown
    /// ids.
    pub neighbors: Vec<StageId>,

    /// At least one flagged stage becomes reachable with no prior
    /// unlock. When no stage is flagged, every regular stage is a
    /// start candidate.
    pub can_be_start_stage: bool,

    /// Optional score floor gating this stage's unlock.
    pub access_restrictions: Option<AccessRestrictions>,

    /// Per-exercise countdown, if the stage declares one.
    pub time_limit_ms: Option<u64>,

    /// Declared maximum score of the embedded activity, when known at
    /// authoring time. Otherwise learned from the first scoring event.
    pub max_score: Option<u32>,

    /// Bonus amount for special stages: lives for `ExtraLife`, seconds
    /// for `ExtraTime`. Ignored on other kinds.
    pub bonus: Option<u32>,
}

impl StageDef {
    /// A regular stage with the given id and neighbors and default
    /// everything else.
    pub fn new(id: StageId, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            kind: StageKind::Regular,
            neighbors: Vec::new(),
            can_be_start_stage: false,
            access_restrictions: None,
            time_limit_ms: None,
            max_score: None,
            bonus: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Session settings
// ---------------------------------------------------------------------------

/// Whether progressing past a stage requires merely completing it,
/// succeeding at it, or nothing at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoamingMode {
    /// Every stage starts open; no lock progression.
    Free,
    /// Completing a stage (any score) unlocks its neighbors.
    Complete,
    /// Only clearing a stage (full score) unlocks its neighbors.
    Success,
}

/// How far ahead of unlocked stages the player can see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FogMode {
    /// Heaviest fog: a stage is revealed only when it leaves `Locked`.
    All,
    /// Neighbors of a stage are revealed when it opens.
    Adjacent,
    /// No fog: everything is visible from the start. Lock state still
    /// applies to activation.
    None,
}

/// Global session settings for a map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapSettings {
    /// Finite lives budget, or `None` for unlimited.
    pub lives_budget: Option<u32>,

    /// Shared countdown across the whole map, or `None` for untimed.
    pub global_time_limit_ms: Option<u64>,

    /// Aggregate score at which the win is announced. `None` means the
    /// win can only come from a `Finish` stage.
    pub finish_score: Option<u32>,

    /// Unlock progression policy.
    pub roaming: RoamingMode,

    /// Visibility policy.
    pub fog: FogMode,
}

impl Default for MapSettings {
    fn default() -> Self {
        Self {
            lives_budget: None,
            global_time_limit_ms: None,
            finish_score: None,
            roaming: RoamingMode::Complete,
            fog: FogMode::Adjacent,
        }
    }
}

// ---------------------------------------------------------------------------
// MapBuilder -- validation and freeze
// ---------------------------------------------------------------------------

/// Collects stage descriptors, validates them, and freezes an immutable
/// [`MapDefinition`].
///
/// Neighbor hygiene happens here, once: self references are dropped,
/// references to unknown stage ids are ignored (a configuration-quality
/// issue, not a runtime fault), and the relation is symmetrized so every
/// edge is known to both endpoints.
#[derive(Debug, Default)]
pub struct MapBuilder {
    stages: Vec<StageDef>,
    seen: HashSet<StageId>,
    settings: MapSettings,
}

impl MapBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the session settings. Defaults apply otherwise.
    pub fn settings(&mut self, settings: MapSettings) -> &mut Self {
        self.settings = settings;
        self
    }

    /// Add a stage descriptor. The id must be unique.
    pub fn add_stage(&mut self, def: StageDef) -> Result<StageId, MapBuildError> {
        if !self.seen.insert(def.id) {
            return Err(MapBuildError::DuplicateStage(def.id));
        }
        let id = def.id;
        self.stages.push(def);
        Ok(id)
    }

    /// Freeze the definition. Cleans up the neighbor relation and
    /// rejects empty maps.
    pub fn build(mut self) -> Result<MapDefinition, MapBuildError> {
        if self.stages.is_empty() {
            return Err(MapBuildError::Empty);
        }

        let known: HashSet<StageId> = self.stages.iter().map(|s| s.id).collect();

        // Drop self references and unknown ids, and deduplicate.
        for stage in &mut self.stages {
            let id = stage.id;
            let mut kept = HashSet::new();
            stage
                .neighbors
                .retain(|n| *n != id && known.contains(n) && kept.insert(*n));
        }

        // Symmetrize: every declared edge is known to both endpoints.
        let declared: Vec<(StageId, StageId)> = self
            .stages
            .iter()
            .flat_map(|s| s.neighbors.iter().map(move |n| (s.id, *n)))
            .collect();
        for (from, to) in declared {
            let back = self
                .stages
                .iter_mut()
                .find(|s| s.id == to)
                .expect("neighbor filtered against known ids");
            if !back.neighbors.contains(&from) {
                back.neighbors.push(from);
            }
        }

        Ok(MapDefinition {
            stages: self.stages,
            settings: self.settings,
        })
    }
}

// ---------------------------------------------------------------------------
// MapDefinition -- frozen configuration
// ---------------------------------------------------------------------------

/// An immutable, validated map definition. Built once; shared by the
/// controller for the lifetime of the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapDefinition {
    stages: Vec<StageDef>,
    settings: MapSettings,
}

impl MapDefinition {
    /// All stage descriptors, in declaration order.
    pub fn stages(&self) -> &[StageDef] {
        &self.stages
    }

    /// The global session settings.
    pub fn settings(&self) -> &MapSettings {
        &self.settings
    }

    /// Number of stages in the map.
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Look up a stage descriptor by id.
    pub fn get(&self, id: StageId) -> Option<&StageDef> {
        self.stages.iter().find(|s| s.id == id)
    }
}

// ---------------------------------------------------------------------------
// JSON loading (data-loader feature)
// ---------------------------------------------------------------------------

#[cfg(feature = "data-loader")]
pub use loader::{MapLoadError, load_map_json, load_map_json_bytes};

#[cfg(feature = "data-loader")]
mod loader {
    use super::*;

    /// Errors that can occur while loading a map from JSON.
    #[derive(Debug, thiserror::Error)]
    pub enum MapLoadError {
        #[error("JSON parse error: {0}")]
        JsonParse(#[from] serde_json::Error),
        #[error("map build error: {0}")]
        Build(#[from] MapBuildError),
    }

    /// Top-level map data structure for JSON deserialization. Numeric
    /// fields arrive as `f64` and are sanitized here, at the boundary;
    /// nothing downstream ever sees a negative or non-finite value.
    #[derive(Debug, serde::Deserialize)]
    pub struct MapData {
        #[serde(default)]
        pub stages: Vec<StageData>,
        #[serde(default)]
        pub settings: SettingsData,
    }

    /// JSON representation of a stage descriptor.
    #[derive(Debug, serde::Deserialize)]
    pub struct StageData {
        pub id: u32,
        #[serde(default)]
        pub label: String,
        #[serde(default)]
        pub kind: Option<String>, // "regular", "finish", "extra-life", "extra-time"
        #[serde(default)]
        pub neighbors: Vec<u32>,
        #[serde(default)]
        pub can_be_start_stage: bool,
        #[serde(default)]
        pub access_restrictions: Option<AccessData>,
        #[serde(default)]
        pub time_limit_ms: Option<f64>,
        #[serde(default)]
        pub max_score: Option<f64>,
        #[serde(default)]
        pub bonus: Option<f64>,
    }

    /// JSON representation of an access restriction.
    #[derive(Debug, serde::Deserialize)]
    pub struct AccessData {
        pub min_score: f64,
        #[serde(default)]
        pub open_on_score_sufficient: bool,
    }

    /// JSON representation of the session settings.
    #[derive(Debug, Default, serde::Deserialize)]
    pub struct SettingsData {
        #[serde(default)]
        pub lives_budget: Option<f64>,
        #[serde(default)]
        pub global_time_limit_ms: Option<f64>,
        #[serde(default)]
        pub finish_score: Option<f64>,
        #[serde(default)]
        pub roaming: Option<String>, // "free", "complete", "success"
        #[serde(default)]
        pub fog: Option<String>, // "all", "adjacent", "none"
    }

    /// Load a map definition from a JSON string.
    pub fn load_map_json(json: &str) -> Result<MapDefinition, MapLoadError> {
        let data: MapData = serde_json::from_str(json)?;
        Ok(build_map(data)?)
    }

    /// Load a map definition from JSON bytes.
    pub fn load_map_json_bytes(bytes: &[u8]) -> Result<MapDefinition, MapLoadError> {
        let data: MapData = serde_json::from_slice(bytes)?;
        Ok(build_map(data)?)
    }

    /// Clamp a raw score to a non-negative integer. Negative and
    /// non-finite values mean "no restriction"/zero.
    fn sanitize_score(raw: f64) -> u32 {
        if !raw.is_finite() || raw <= 0.0 {
            0
        } else if raw >= u32::MAX as f64 {
            u32::MAX
        } else {
            raw as u32
        }
    }

    /// Clamp a raw duration to positive milliseconds. Non-positive and
    /// non-finite values mean "no limit".
    fn sanitize_ms(raw: f64) -> Option<u64> {
        if !raw.is_finite() || raw <= 0.0 {
            None
        } else {
            Some(raw as u64)
        }
    }

    fn parse_kind(raw: Option<&str>) -> StageKind {
        match raw {
            Some("finish") => StageKind::Finish,
            Some("extra-life") => StageKind::ExtraLife,
            Some("extra-time") => StageKind::ExtraTime,
            // Unknown kinds fall back to regular.
            _ => StageKind::Regular,
        }
    }

    fn parse_roaming(raw: Option<&str>) -> RoamingMode {
        match raw {
            Some("free") => RoamingMode::Free,
            Some("success") => RoamingMode::Success,
            _ => RoamingMode::Complete,
        }
    }

    fn parse_fog(raw: Option<&str>) -> FogMode {
        match raw {
            Some("all") => FogMode::All,
            Some("none") => FogMode::None,
            _ => FogMode::Adjacent,
        }
    }

    fn build_map(data: MapData) -> Result<MapDefinition, MapBuildError> {
        let mut builder = MapBuilder::new();

        builder.settings(MapSettings {
            lives_budget: data
                .settings
                .lives_budget
                .map(sanitize_score)
                .filter(|n| *n > 0),
            global_time_limit_ms: data.settings.global_time_limit_ms.and_then(sanitize_ms),
            finish_score: data
                .settings
                .finish_score
                .map(sanitize_score)
                .filter(|n| *n > 0),
            roaming: parse_roaming(data.settings.roaming.as_deref()),
            fog: parse_fog(data.settings.fog.as_deref()),
        });

        for stage in &data.stages {
            builder.add_stage(StageDef {
                id: StageId(stage.id),
                label: stage.label.clone(),
                kind: parse_kind(stage.kind.as_deref()),
                neighbors: stage.neighbors.iter().map(|n| StageId(*n)).collect(),
                can_be_start_stage: stage.can_be_start_stage,
                access_restrictions: stage.access_restrictions.as_ref().map(|a| {
                    AccessRestrictions {
                        min_score: sanitize_score(a.min_score),
                        open_on_score_sufficient: a.open_on_score_sufficient,
                    }
                }),
                time_limit_ms: stage.time_limit_ms.and_then(sanitize_ms),
                max_score: stage.max_score.map(sanitize_score),
                bonus: stage.bonus.map(sanitize_score).filter(|n| *n > 0),
            })?;
        }

        builder.build()
    }

    // =======================================================================
    // Tests
    // =======================================================================

}

// ===========================================================================
// Tests
// ===========================================================================
