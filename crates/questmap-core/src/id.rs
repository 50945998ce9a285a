use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies a scheduled entry on the deferred-effect timer wheel.
    /// Transient; never serialized.
    pub struct TimerId;
}

/// Identifies a stage in a map. Cheap to copy and compare. Assigned by
/// the map definition; stable across save and restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StageId(pub u32);

/// Identifies a path (undirected stage connector). Assigned by the path
/// set in construction order; stable for a given map definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PathId(pub u32);
