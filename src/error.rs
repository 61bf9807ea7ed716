//! Error types shared across the engine.
//!
//! "Not ready yet" (an unconnected input anywhere upstream) is never an error:
//! it is an absent derived value. Everything here is an invariant violation or
//! a malformed input that the caller has to deal with.

use std::path::PathBuf;

use thiserror::Error;

use crate::param::ValueKind;

/// Violations of graph/store invariants. Any of these aborts the current
/// mutation before state is changed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("unknown node type `{0}`")]
    UnknownNodeType(String),

    #[error("node `{0}` does not exist")]
    UnknownNode(String),

    #[error("node `{0}` already exists")]
    DuplicateNode(String),

    #[error("`{0}` is not a valid node id (expected [A-Za-z_][A-Za-z0-9_]*)")]
    InvalidNodeId(String),

    #[error("edge `{0}` does not exist")]
    UnknownEdge(String),

    #[error("edge `{0}` already exists")]
    DuplicateEdge(String),

    #[error("node `{node_id}` has no input handle `{handle_id}`")]
    UnknownHandle { node_id: String, handle_id: String },

    #[error("input `{handle_id}` of node `{node_id}` is already connected")]
    SlotOccupied { node_id: String, handle_id: String },

    #[error("connecting `{from}` -> `{to}` would create a cycle")]
    CycleDetected { from: String, to: String },

    #[error("node `{0}` has no own values")]
    MissingOwnValues(String),

    #[error("node `{node_id}` has no parameter at index {index}")]
    ParameterIndexOutOfRange { node_id: String, index: usize },

    #[error("parameter `{parameter}` of node `{node_id}` expects a {expected} value, got {actual}")]
    ValueKindMismatch {
        node_id: String,
        parameter: String,
        expected: ValueKind,
        actual: ValueKind,
    },

    #[error(
        "parameter `{parameter}` of node `{node_id}` holds at most {capacity} control points, got {len}"
    )]
    TooManyControlPoints {
        node_id: String,
        parameter: String,
        capacity: usize,
        len: usize,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ColorError {
    #[error("invalid hex color: {0}")]
    InvalidHex(String),

    #[error("color has a non-finite component: {0:?}")]
    NonFinite([f32; 4]),
}

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("failed to read node catalog at {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse node catalog json")]
    Parse(#[from] serde_json::Error),

    #[error("invalid definition for node type `{node_type}`: {message}")]
    InvalidDefinition { node_type: String, message: String },

    #[error("invalid default for parameter `{parameter}` of node type `{node_type}`: {message}")]
    InvalidDefault {
        node_type: String,
        parameter: String,
        message: String,
    },
}

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("failed to access snapshot at {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed snapshot json")]
    Parse(#[from] serde_json::Error),

    #[error("snapshot node `{0}` has no type")]
    MissingNodeType(String),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ShaderError {
    #[error("{definitions} parameter definitions but {values} values")]
    LengthMismatch { definitions: usize, values: usize },

    #[error("uniform `{uniform}` of type {uniform_type} cannot take a {actual} value")]
    ValueKindMismatch {
        uniform: String,
        uniform_type: &'static str,
        actual: ValueKind,
    },

    #[error("too many control points for `{uniform}` (max is {capacity}, got {len})")]
    TooManyControlPoints {
        uniform: String,
        capacity: usize,
        len: usize,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SignatureError {
    #[error("did not find definition of function `{0}`")]
    MissingFunction(String),

    #[error("did not find function parameter `{0}`")]
    MissingParameter(String),

    #[error("parameter `{0}` has no name or type")]
    MalformedParameter(String),
}
