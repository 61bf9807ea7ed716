pub mod catalog;
pub mod color;
pub mod error;
pub mod graph;
pub mod param;
pub mod protocol;
pub mod shader;
pub mod snapshot;
pub mod store;
pub mod template;
pub mod tracker;
pub mod values;
pub mod ws;

pub use catalog::{NodeCatalog, NodeDefinition, load_default_catalog};
pub use error::{GraphError, SnapshotError};
pub use param::ParameterValue;
pub use store::TextureGraph;
