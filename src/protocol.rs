use serde::{Deserialize, Serialize};

use crate::{
    graph::Position, param::ParameterValue, shader::UniformBinding, tracker::NodeParameter,
};

pub const PARSE_ERROR: &str = "PARSE_ERROR";
pub const GRAPH_ERROR: &str = "GRAPH_ERROR";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WSMessage<T> {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub timestamp: u64,
    #[serde(rename = "requestId", skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<T>,
}

impl<T> WSMessage<T> {
    pub fn new(msg_type: &str, request_id: Option<String>, payload: Option<T>) -> Self {
        Self {
            msg_type: msg_type.to_string(),
            timestamp: now_millis(),
            request_id,
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddNodePayload {
    /// Allocated by the server when absent.
    #[serde(default)]
    pub id: Option<String>,
    pub node_type: String,
    #[serde(default)]
    pub position: Position,
}

/// Also the payload of the `node_removed` broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeIdPayload {
    pub id: String,
}

/// `move_node` request, echoed to every client as `node_moved`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveNodePayload {
    pub id: String,
    pub position: Position,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectPayload {
    #[serde(default)]
    pub id: Option<String>,
    pub source: String,
    #[serde(default)]
    pub source_handle: Option<String>,
    pub target: String,
    pub target_handle: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectPayload {
    pub edge_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetValuePayload {
    pub node_id: String,
    pub index: usize,
    pub value: ParameterValue,
}

/// Everything a client needs to preview one node. Fields are omitted while
/// the node isn't ready.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeUpdatePayload {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter_definitions: Option<Vec<NodeParameter>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<ParameterValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fragment_shader: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uniforms: Option<Vec<UniformBinding>>,
}

pub fn now_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
