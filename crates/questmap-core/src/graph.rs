//! The stage graph: flat id-keyed store of all stages with reachability
//! and unlock propagation.
//!
//! The graph is arena-style: stages live in a `HashMap` keyed by
//! [`StageId`] and refer to each other by id, never by pointer, so the
//! cyclic undirected topology needs no reference cycles. Traversal is an
//! explicit breadth-first walk over the id map.
//!
//! Topology never changes during a session; only stage state and
//! visibility do.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::config::{MapDefinition, StageKind};
use crate::id::StageId;
use crate::stage::{Stage, StageState};

// ---------------------------------------------------------------------------
// Start-stage selection result
// ---------------------------------------------------------------------------

/// What [`StageGraph::open_start_stages`] decided.
#[derive(Debug)]
pub struct StartStages {
    /// Stages transitioned to `Open`, in declaration order.
    pub opened: Vec<StageId>,
    /// The one stage granted focus/primary status.
    pub focus: Option<StageId>,
    /// BFS closure of ids reachable from the start stages.
    pub reachable: HashSet<StageId>,
}

// ---------------------------------------------------------------------------
// StageGraph
// ---------------------------------------------------------------------------

/// Owns every stage in a map and answers reachability and unlock
/// questions about them.
#[derive(Debug)]
pub struct StageGraph {
    stages: HashMap<StageId, Stage>,
    /// Declaration order, for deterministic iteration and signals.
    order: Vec<StageId>,
}

impl StageGraph {
    /// Build the graph from a frozen map definition.
    pub fn new(definition: &MapDefinition) -> Self {
        let mut stages = HashMap::with_capacity(definition.stage_count());
        let mut order = Vec::with_capacity(definition.stage_count());
        for def in definition.stages() {
            stages.insert(def.id, Stage::from_def(def));
            order.push(def.id);
        }
        Self { stages, order }
    }

    pub fn get(&self, id: StageId) -> Option<&Stage> {
        self.stages.get(&id)
    }

    pub fn get_mut(&mut self, id: StageId) -> Option<&mut Stage> {
        self.stages.get_mut(&id)
    }

    pub fn contains(&self, id: StageId) -> bool {
        self.stages.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Stage ids in declaration order.
    pub fn ids(&self) -> impl Iterator<Item = StageId> + '_ {
        self.order.iter().copied()
    }

    /// Stages in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Stage> {
        self.order.iter().map(|id| &self.stages[id])
    }

    // -----------------------------------------------------------------------
    // Reachability
    // -----------------------------------------------------------------------

    /// Breadth-first closure over the undirected neighbor relation from
    /// the given seeds. Pure graph closure, independent of stage state:
    /// it answers "what could ever become visible from here", not "what
    /// is currently unlocked".
    pub fn gather_subgraph_ids(&self, seeds: &[StageId]) -> HashSet<StageId> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        for &seed in seeds {
            if self.stages.contains_key(&seed) && seen.insert(seed) {
                queue.push_back(seed);
            }
        }
        while let Some(id) = queue.pop_front() {
            let Some(stage) = self.stages.get(&id) else {
                continue;
            };
            for &n in &stage.neighbors {
                if self.stages.contains_key(&n) && seen.insert(n) {
                    queue.push_back(n);
                }
            }
        }
        seen
    }

    /// Stages flagged as start candidates; when none is flagged, every
    /// regular stage is a candidate.
    pub fn start_candidates(&self) -> Vec<StageId> {
        let flagged: Vec<StageId> = self
            .iter()
            .filter(|s| s.can_be_start_stage)
            .map(|s| s.id)
            .collect();
        if !flagged.is_empty() {
            return flagged;
        }
        self.iter()
            .filter(|s| s.kind == StageKind::Regular)
            .map(|s| s.id)
            .collect()
    }

    /// Transition the start candidates to `Open`, pick exactly one of
    /// them as the focused/primary stage, and compute the reachable id
    /// set from those roots.
    pub fn open_start_stages(&mut self) -> StartStages {
        let candidates = self.start_candidates();
        let mut opened = Vec::new();
        for &id in &candidates {
            let stage = self.stages.get_mut(&id).expect("candidate exists");
            if stage.state == StageState::Locked {
                stage.state = StageState::Open;
                stage.visible = true;
                opened.push(id);
            }
        }
        let reachable = self.gather_subgraph_ids(&candidates);
        StartStages {
            focus: opened.first().copied(),
            opened,
            reachable,
        }
    }

    /// Free-roaming start: every stage opens at once. Special stages
    /// open too; they are activatable from the start.
    pub fn open_all(&mut self) -> Vec<StageId> {
        let mut opened = Vec::new();
        for id in self.order.clone() {
            let stage = self.stages.get_mut(&id).expect("ordered id exists");
            if stage.state == StageState::Locked {
                stage.state = StageState::Open;
                stage.visible = true;
                opened.push(id);
            }
        }
        opened
    }

    /// Hide stages outside the reachable set. Stages inside it keep
    /// their own fog-dependent visibility. Returns the stages whose
    /// visibility changed.
    pub fn update_reachability(&mut self, reachable: &HashSet<StageId>) -> Vec<StageId> {
        let mut changed = Vec::new();
        for id in self.order.clone() {
            let stage = self.stages.get_mut(&id).expect("ordered id exists");
            if !reachable.contains(&id) && stage.visible {
                stage.visible = false;
                changed.push(id);
            }
        }
        changed
    }

    /// Make every stage visible (no-fog policy). Returns the stages
    /// whose visibility changed.
    pub fn set_all_visible(&mut self) -> Vec<StageId> {
        let mut changed = Vec::new();
        for id in self.order.clone() {
            let stage = self.stages.get_mut(&id).expect("ordered id exists");
            if !stage.visible {
                stage.visible = true;
                changed.push(id);
            }
        }
        changed
    }

    // -----------------------------------------------------------------------
    // Neighbor propagation
    // -----------------------------------------------------------------------

    /// Reveal the direct neighbors of a stage (fog look-ahead when the
    /// stage opens). Only neighbors in the reachable set are revealed.
    /// Returns the newly visible neighbors.
    pub fn reveal_neighbors(
        &mut self,
        id: StageId,
        reachable: &HashSet<StageId>,
    ) -> Vec<StageId> {
        let neighbors = match self.stages.get(&id) {
            Some(stage) => stage.neighbors.clone(),
            None => return Vec::new(),
        };
        let mut revealed = Vec::new();
        for n in neighbors {
            if !reachable.contains(&n) {
                continue;
            }
            if let Some(stage) = self.stages.get_mut(&n)
                && !stage.visible
            {
                stage.visible = true;
                revealed.push(n);
            }
        }
        revealed
    }

    /// Unlock the direct neighbors of a cleared (or, under
    /// complete-roaming, completed) stage, subject to each neighbor's
    /// own access restrictions. Returns `(id, new_state)` for every
    /// neighbor that changed.
    pub fn unlock_neighbors(&mut self, id: StageId, score: u32) -> Vec<(StageId, StageState)> {
        let neighbors = match self.stages.get(&id) {
            Some(stage) => stage.neighbors.clone(),
            None => return Vec::new(),
        };
        let mut changed = Vec::new();
        for n in neighbors {
            if let Some(stage) = self.stages.get_mut(&n)
                && let Some(state) = stage.try_unlock(score)
            {
                changed.push((n, state));
            }
        }
        changed
    }

    /// Re-evaluate stages parked in `Unlocking`: those whose restriction
    /// declares `open_on_score_sufficient` auto-open once the aggregate
    /// score reaches their floor. Returns the stages that opened.
    pub fn update_unlocking_stages(&mut self, score: u32) -> Vec<StageId> {
        let mut opened = Vec::new();
        for id in self.order.clone() {
            let stage = self.stages.get_mut(&id).expect("ordered id exists");
            if stage.auto_opens_at(score) {
                stage.state = StageState::Open;
                opened.push(id);
            }
        }
        opened
    }

    // -----------------------------------------------------------------------
    // Session-wide transitions
    // -----------------------------------------------------------------------

    /// Force every stage to `Sealed` (budget exhaustion). Sealed stages
    /// stay visible. Returns the stages that changed.
    pub fn seal_all(&mut self) -> Vec<StageId> {
        let mut changed = Vec::new();
        for id in self.order.clone() {
            let stage = self.stages.get_mut(&id).expect("ordered id exists");
            if stage.state != StageState::Sealed {
                stage.state = StageState::Sealed;
                changed.push(id);
            }
        }
        changed
    }

    /// Restore every stage to its initial state.
    pub fn reset(&mut self) {
        for stage in self.stages.values_mut() {
            stage.reset();
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
