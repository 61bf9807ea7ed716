//! `TextureGraph`: the one owned state object the editor mutates.
//!
//! Every mutation validates first, then changes the graph, then runs
//! propagation before returning. Mutations that change derived state return
//! the ids whose derived state was recomputed so a front end can refresh them.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    catalog::{NodeCatalog, is_identifier},
    error::{GraphError, SnapshotError},
    graph::{Edge, Graph, GraphNode, Position},
    param::ParameterValue,
    shader::assemble_fragment_shader,
    snapshot::{Snapshot, SnapshotNode, Viewport},
    tracker::{DependencyTracker, NodeParameter},
    values::ValueStore,
};

#[derive(Debug, Clone)]
pub struct TextureGraph {
    catalog: Arc<NodeCatalog>,
    graph: Graph,
    tracker: DependencyTracker,
    values: ValueStore,
    viewport: Viewport,
}

impl TextureGraph {
    pub fn new(catalog: Arc<NodeCatalog>) -> Self {
        Self {
            catalog,
            graph: Graph::new(),
            tracker: DependencyTracker::new(),
            values: ValueStore::new(),
            viewport: Viewport::default(),
        }
    }

    pub fn catalog(&self) -> &NodeCatalog {
        &self.catalog
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    /// First free id of the form `n<k>`.
    pub fn allocate_node_id(&self) -> String {
        (1..)
            .map(|k: u64| format!("n{k}"))
            .find(|id| !self.graph.contains_node(id))
            .unwrap_or_default()
    }

    pub fn add_node(
        &mut self,
        id: &str,
        node_type: &str,
        position: Position,
    ) -> Result<Vec<String>, GraphError> {
        if !is_valid_node_id(id) {
            return Err(GraphError::InvalidNodeId(id.to_string()));
        }
        if self.graph.contains_node(id) {
            return Err(GraphError::DuplicateNode(id.to_string()));
        }
        let definition = self.catalog.definition(node_type)?;

        self.values.seed(id, definition);
        self.graph.push_node(GraphNode::new(id, node_type, position));
        debug!(node = %id, node_type, "added node");
        self.tracker.recompute_from(&self.graph, &self.catalog, &[id])
    }

    pub fn remove_node(&mut self, id: &str) -> Result<Vec<String>, GraphError> {
        let successors: Vec<String> = self
            .graph
            .successors(id)
            .into_iter()
            .map(str::to_string)
            .collect();
        let (_, removed_edges) = self
            .graph
            .remove_node(id)
            .ok_or_else(|| GraphError::UnknownNode(id.to_string()))?;
        self.values.remove(id);
        self.tracker.forget(id);
        debug!(node = %id, edges = removed_edges.len(), "removed node");
        self.tracker
            .recompute_from(&self.graph, &self.catalog, &successors)
    }

    pub fn move_node(&mut self, id: &str, position: Position) -> Result<(), GraphError> {
        let node = self
            .graph
            .node_mut(id)
            .ok_or_else(|| GraphError::UnknownNode(id.to_string()))?;
        node.position = position;
        Ok(())
    }

    /// Add `edge`. The target slot must exist and be free, and the edge must
    /// not close a cycle.
    pub fn connect(&mut self, edge: Edge) -> Result<Vec<String>, GraphError> {
        check_edge(&self.graph, &self.catalog, &edge)?;
        debug!(edge = %edge.id, "connected");
        let target = edge.target.clone();
        self.graph.push_edge(edge);
        self.tracker
            .recompute_from(&self.graph, &self.catalog, &[target])
    }

    pub fn disconnect(&mut self, edge_id: &str) -> Result<Vec<String>, GraphError> {
        let edge = self
            .graph
            .remove_edge(edge_id)
            .ok_or_else(|| GraphError::UnknownEdge(edge_id.to_string()))?;
        debug!(edge = %edge.id, "disconnected");
        self.tracker
            .recompute_from(&self.graph, &self.catalog, &[edge.target])
    }

    /// Replace one own value. Returns the ready nodes whose value list
    /// includes the changed slot (the node itself and its ready dependents).
    pub fn set_value(
        &mut self,
        id: &str,
        index: usize,
        value: ParameterValue,
    ) -> Result<Vec<String>, GraphError> {
        let node = self
            .graph
            .node(id)
            .ok_or_else(|| GraphError::UnknownNode(id.to_string()))?;
        let definition = self.catalog.definition(&node.node_type)?;
        self.values.set_value(id, definition, index, value)?;

        let downstream = self.graph.downstream_reachable(id);
        let (order, _) = self.graph.topo_order(Some(&downstream));
        Ok(order
            .into_iter()
            .filter(|n| {
                self.tracker
                    .parameter_definitions(n)
                    .is_some_and(|defs| defs.iter().any(|p| p.node_id == id))
            })
            .collect())
    }

    pub fn template(&self, id: &str) -> Option<&str> {
        self.tracker.template(id)
    }

    pub fn input_node_ids(&self, id: &str) -> Option<&[String]> {
        self.tracker.input_node_ids(id)
    }

    pub fn parameter_definitions(&self, id: &str) -> Option<&[NodeParameter]> {
        self.tracker.parameter_definitions(id)
    }

    pub fn own_values(&self, id: &str) -> Option<&[ParameterValue]> {
        self.values.own_values(id)
    }

    /// Values aligned with [`TextureGraph::parameter_definitions`]. `Ok(None)`
    /// while the node isn't ready.
    pub fn values(&self, id: &str) -> Result<Option<Vec<ParameterValue>>, GraphError> {
        if !self.graph.contains_node(id) {
            return Err(GraphError::UnknownNode(id.to_string()));
        }
        self.tracker
            .parameter_definitions(id)
            .map(|defs| self.values.values_for(defs))
            .transpose()
    }

    /// Complete preview fragment shader for a ready node.
    pub fn fragment_shader(&self, id: &str) -> Option<String> {
        let template = self.tracker.template(id)?;
        let definitions = self.tracker.parameter_definitions(id)?;
        Some(assemble_fragment_shader(template, definitions))
    }

    /// Ids of every node whose template is currently defined, in graph order.
    pub fn ready_nodes(&self) -> Vec<&str> {
        self.graph
            .nodes()
            .iter()
            .map(|n| n.id.as_str())
            .filter(|id| self.tracker.template(id).is_some())
            .collect()
    }

    pub fn snapshot(&self) -> Snapshot {
        let nodes = self.graph.nodes();
        Snapshot {
            nodes: nodes
                .iter()
                .map(|n| SnapshotNode {
                    id: n.id.clone(),
                    position: n.position,
                    extra: n.ui.clone(),
                })
                .collect(),
            edges: self.graph.edges().to_vec(),
            viewport: self.viewport,
            own_values: nodes
                .iter()
                .filter_map(|n| {
                    let values = self.values.own_values(&n.id)?;
                    serde_json::to_value(values)
                        .ok()
                        .map(|raw| (n.id.clone(), raw))
                })
                .collect(),
            types: nodes
                .iter()
                .map(|n| (n.id.clone(), n.node_type.clone()))
                .collect(),
            input_nodes: None,
            templates: None,
        }
    }

    /// Replace the whole state with `snapshot`. Own values that don't fit the
    /// node's definition are reset to defaults; anything else invalid rejects
    /// the snapshot and leaves the current state untouched.
    pub fn load_snapshot(&mut self, snapshot: &Snapshot) -> Result<Vec<String>, SnapshotError> {
        let mut graph = Graph::new();
        let mut values = ValueStore::new();

        for node in &snapshot.nodes {
            let node_type = snapshot
                .node_type(node)
                .ok_or_else(|| SnapshotError::MissingNodeType(node.id.clone()))?;
            if !is_valid_node_id(&node.id) {
                return Err(GraphError::InvalidNodeId(node.id.clone()).into());
            }
            if graph.contains_node(&node.id) {
                return Err(GraphError::DuplicateNode(node.id.clone()).into());
            }
            let definition = self.catalog.definition(node_type)?;

            match snapshot.own_values_of(&node.id) {
                Some(Ok(stored)) if definition.accepts_values(&stored) => {
                    values.insert(&node.id, stored);
                }
                Some(Ok(_)) => {
                    warn!(node = %node.id, "stored values don't match the node definition; using defaults");
                    values.seed(&node.id, definition);
                }
                Some(Err(err)) => {
                    warn!(node = %node.id, error = %err, "stored values are malformed; using defaults");
                    values.seed(&node.id, definition);
                }
                None => {
                    debug!(node = %node.id, "no stored values; using defaults");
                    values.seed(&node.id, definition);
                }
            }

            let mut record = GraphNode::new(node.id.as_str(), node_type, node.position);
            record.ui = node.extra.clone();
            graph.push_node(record);
        }

        for edge in &snapshot.edges {
            check_edge(&graph, &self.catalog, edge)?;
            graph.push_edge(edge.clone());
        }

        let all: Vec<String> = graph.nodes().iter().map(|n| n.id.clone()).collect();
        let mut tracker = DependencyTracker::new();
        let touched = tracker.recompute_from(&graph, &self.catalog, &all)?;

        info!(
            nodes = graph.nodes().len(),
            edges = graph.edges().len(),
            ready = touched
                .iter()
                .filter(|id| tracker.template(id).is_some())
                .count(),
            "loaded snapshot"
        );

        self.graph = graph;
        self.values = values;
        self.tracker = tracker;
        self.viewport = snapshot.viewport;
        Ok(touched)
    }

    pub fn load_snapshot_str(&mut self, text: &str) -> Result<Vec<String>, SnapshotError> {
        let snapshot = Snapshot::from_json_str(text)?;
        self.load_snapshot(&snapshot)
    }
}

/// Node ids become identifier prefixes in generated GLSL.
pub fn is_valid_node_id(id: &str) -> bool {
    is_identifier(id)
}

fn check_edge(graph: &Graph, catalog: &NodeCatalog, edge: &Edge) -> Result<(), GraphError> {
    if !graph.contains_node(&edge.source) {
        return Err(GraphError::UnknownNode(edge.source.clone()));
    }
    let target = graph
        .node(&edge.target)
        .ok_or_else(|| GraphError::UnknownNode(edge.target.clone()))?;
    let definition = catalog.definition(&target.node_type)?;
    if definition.input_slot(&edge.target_handle).is_none() {
        return Err(GraphError::UnknownHandle {
            node_id: edge.target.clone(),
            handle_id: edge.target_handle.clone(),
        });
    }
    if graph.edge(&edge.id).is_some() {
        return Err(GraphError::DuplicateEdge(edge.id.clone()));
    }
    if graph
        .input_source(&edge.target, &edge.target_handle)
        .is_some()
    {
        return Err(GraphError::SlotOccupied {
            node_id: edge.target.clone(),
            handle_id: edge.target_handle.clone(),
        });
    }
    if graph.would_create_cycle(&edge.source, &edge.target) {
        return Err(GraphError::CycleDetected {
            from: edge.source.clone(),
            to: edge.target.clone(),
        });
    }
    Ok(())
}
