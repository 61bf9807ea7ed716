//! Plain-data snapshot of an editing session.
//!
//! Only the node types, own values and edges are authoritative. Derived state
//! is rebuilt on load; legacy `inputNodes`/`templates` fields are accepted and
//! dropped. Positions, the viewport and any unknown node fields belong to the
//! editor and are passed through untouched.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    error::SnapshotError,
    graph::{Edge, Position},
    param::ParameterValue,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            zoom: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotNode {
    pub id: String,
    #[serde(default)]
    pub position: Position,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SnapshotNode {
    /// Editor node records carry their type under `data.type`.
    pub fn embedded_type(&self) -> Option<&str> {
        self.extra.get("data")?.get("type")?.as_str()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub nodes: Vec<SnapshotNode>,
    pub edges: Vec<Edge>,
    pub viewport: Viewport,
    /// `[nodeId, [value, ...]]` pairs. Kept as raw JSON so one bad entry can
    /// be repaired instead of failing the whole load.
    pub own_values: Vec<(String, Value)>,
    /// `[nodeId, nodeType]` pairs.
    pub types: Vec<(String, String)>,
    #[serde(default, skip_serializing)]
    pub input_nodes: Option<Value>,
    #[serde(default, skip_serializing)]
    pub templates: Option<Value>,
}

impl Snapshot {
    pub fn from_json_str(text: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json_string(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn node_type<'a>(&'a self, node: &'a SnapshotNode) -> Option<&'a str> {
        self.types
            .iter()
            .find(|(id, _)| *id == node.id)
            .map(|(_, ty)| ty.as_str())
            .or_else(|| node.embedded_type())
    }

    /// `None` when the snapshot has no entry for the node, `Some(Err)` when the
    /// entry doesn't decode.
    pub fn own_values_of(
        &self,
        node_id: &str,
    ) -> Option<Result<Vec<ParameterValue>, serde_json::Error>> {
        self.own_values
            .iter()
            .find(|(id, _)| id == node_id)
            .map(|(_, raw)| Vec::<ParameterValue>::deserialize(raw))
    }
}

pub fn load_snapshot_from_path(path: impl AsRef<Path>) -> Result<Snapshot, SnapshotError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Snapshot::from_json_str(&text)
}

pub fn save_snapshot_to_path(snapshot: &Snapshot, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
    let path = path.as_ref();
    let text = snapshot.to_json_string()?;
    std::fs::write(path, text).map_err(|source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    })
}
