//! Paths: undirected stage connectors.
//!
//! The path set is derived entirely from the stage graph: exactly one
//! [`Path`] per unordered neighbor pair, deduplicated at build time.
//! Paths carry their own open/cleared state and visibility, mirroring
//! what happens to their endpoints.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::config::FogMode;
use crate::graph::StageGraph;
use crate::id::{PathId, StageId};
use crate::stage::StageState;

// ---------------------------------------------------------------------------
// Path state
// ---------------------------------------------------------------------------

/// Lifecycle state of a path. A path is cleared once both of its
/// endpoints have been cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathState {
    Open,
    Cleared,
}

/// A single undirected connector between two stages. `from`/`to` order
/// carries no meaning beyond the declaration order in the map.
#[derive(Debug, Clone)]
pub struct Path {
    pub id: PathId,
    pub from: StageId,
    pub to: StageId,
    pub state: PathState,
    /// Visibility is independent of state: a path can exist but be
    /// hidden under fog.
    pub visible: bool,
}

impl Path {
    /// Whether this path touches the given stage.
    pub fn touches(&self, stage: StageId) -> bool {
        self.from == stage || self.to == stage
    }

    /// The endpoint opposite to `stage`.
    pub fn other_end(&self, stage: StageId) -> StageId {
        if self.from == stage { self.to } else { self.from }
    }
}

/// Path ids whose state or visibility changed in one update, batched so
/// the controller can emit one signal per batch.
#[derive(Debug, Default)]
pub struct PathChanges {
    /// Paths that became visible.
    pub shown: Vec<PathId>,
    /// Paths that transitioned to `Cleared`.
    pub cleared: Vec<PathId>,
}

// ---------------------------------------------------------------------------
// PathSet
// ---------------------------------------------------------------------------

/// Owns all paths of a map and keeps them in sync with their endpoints.
#[derive(Debug)]
pub struct PathSet {
    paths: Vec<Path>,
    /// Indices into `paths`, per touching stage.
    by_stage: HashMap<StageId, Vec<usize>>,
}

impl PathSet {
    /// Derive the path set from the graph's neighbor lists: one path
    /// per unique unordered pair. Unknown endpoints never produce a
    /// path (the map builder already dropped them).
    pub fn new(graph: &StageGraph) -> Self {
        let mut paths = Vec::new();
        let mut by_stage: HashMap<StageId, Vec<usize>> = HashMap::new();
        let mut seen: HashSet<(StageId, StageId)> = HashSet::new();

        for stage in graph.iter() {
            for &n in &stage.neighbors {
                if !graph.contains(n) {
                    continue;
                }
                let key = if stage.id <= n { (stage.id, n) } else { (n, stage.id) };
                if !seen.insert(key) {
                    continue;
                }
                let index = paths.len();
                paths.push(Path {
                    id: PathId(index as u32),
                    from: stage.id,
                    to: n,
                    state: PathState::Open,
                    visible: false,
                });
                by_stage.entry(stage.id).or_default().push(index);
                by_stage.entry(n).or_default().push(index);
            }
        }

        Self { paths, by_stage }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn get(&self, id: PathId) -> Option<&Path> {
        self.paths.get(id.0 as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.paths.iter()
    }

    /// Paths touching the given stage.
    pub fn paths_for(&self, stage: StageId) -> impl Iterator<Item = &Path> {
        self.by_stage
            .get(&stage)
            .into_iter()
            .flatten()
            .map(|&i| &self.paths[i])
    }

    /// Find the path between two stages, in either direction. Self
    /// pairs have no path by construction.
    pub fn between(&self, a: StageId, b: StageId) -> Option<&Path> {
        self.paths_for(a).find(|p| p.other_end(a) == b)
    }

    /// Mirror a stage transition onto the paths touching it.
    ///
    /// - When the stage opens, its paths are shown (unless the fog
    ///   policy shows everything anyway, in which case nothing changes
    ///   here -- they were shown at session start).
    /// - When the stage clears, a touching path clears once its other
    ///   endpoint is cleared too.
    pub fn update_for_stage(
        &mut self,
        graph: &StageGraph,
        stage: StageId,
        new_state: StageState,
        fog: FogMode,
    ) -> PathChanges {
        let mut changes = PathChanges::default();
        let indices = match self.by_stage.get(&stage) {
            Some(indices) => indices.clone(),
            None => return changes,
        };

        for index in indices {
            let path = &mut self.paths[index];
            match new_state {
                StageState::Open | StageState::Opened => {
                    if fog != FogMode::None && !path.visible {
                        path.visible = true;
                        changes.shown.push(path.id);
                    }
                }
                StageState::Cleared => {
                    if !path.visible {
                        path.visible = true;
                        changes.shown.push(path.id);
                    }
                    let other = path.other_end(stage);
                    let other_cleared = graph
                        .get(other)
                        .is_some_and(|s| s.state == StageState::Cleared);
                    if other_cleared && path.state != PathState::Cleared {
                        path.state = PathState::Cleared;
                        changes.cleared.push(path.id);
                    }
                }
                _ => {}
            }
        }
        changes
    }

    /// Hide paths with no reachable endpoint. Returns the paths whose
    /// visibility changed.
    pub fn update_reachability(&mut self, reachable: &HashSet<StageId>) -> Vec<PathId> {
        let mut changed = Vec::new();
        for path in &mut self.paths {
            let is_reachable = reachable.contains(&path.from) || reachable.contains(&path.to);
            if !is_reachable && path.visible {
                path.visible = false;
                changed.push(path.id);
            }
        }
        changed
    }

    /// Make every path visible (no-fog policy). Returns the paths whose
    /// visibility changed.
    pub fn set_all_visible(&mut self) -> Vec<PathId> {
        let mut changed = Vec::new();
        for path in &mut self.paths {
            if !path.visible {
                path.visible = true;
                changed.push(path.id);
            }
        }
        changed
    }

    /// Restore every path to its initial state.
    pub fn reset(&mut self) {
        for path in &mut self.paths {
            path.state = PathState::Open;
            path.visible = false;
        }
    }

    /// Apply a restored state to the path between two stages, if it
    /// exists. Unknown pairs are ignored.
    pub(crate) fn apply_restored(
        &mut self,
        from: StageId,
        to: StageId,
        state: PathState,
        visible: bool,
    ) {
        let index = self
            .paths
            .iter()
            .position(|p| p.touches(from) && p.touches(to) && from != to);
        if let Some(index) = index {
            self.paths[index].state = state;
            self.paths[index].visible = visible;
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
