//! Node and edge records plus the graph walks the tracker needs.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::GraphError;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    pub id: String,
    /// Key into the node catalog.
    pub node_type: String,
    pub position: Position,
    /// Editor-owned fields carried through snapshots untouched.
    pub ui: Map<String, Value>,
}

impl GraphNode {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>, position: Position) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            position,
            ui: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub source: String,
    #[serde(default)]
    pub source_handle: Option<String>,
    pub target: String,
    pub target_handle: String,
}

impl Edge {
    /// Edge with a generated id. Node ids and catalog handles are
    /// identifiers, so `:` and `-` keep the parts apart.
    pub fn new(
        source: impl Into<String>,
        source_handle: Option<String>,
        target: impl Into<String>,
        target_handle: impl Into<String>,
    ) -> Self {
        let source = source.into();
        let target = target.into();
        let target_handle = target_handle.into();
        let id = format!(
            "xy-edge__{source}:{}-{target}:{target_handle}",
            source_handle.as_deref().unwrap_or_default()
        );
        Self {
            id,
            source,
            source_handle,
            target,
            target_handle,
        }
    }
}

/// Nodes and edges in insertion order. Graphs are human-sized, so lookups
/// are linear scans.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<GraphNode>,
    edges: Vec<Edge>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut GraphNode> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == id)
    }

    /// Inserts the node; the caller checks id validity and uniqueness.
    pub(crate) fn push_node(&mut self, node: GraphNode) {
        self.nodes.push(node);
    }

    pub(crate) fn push_edge(&mut self, edge: Edge) {
        self.edges.push(edge);
    }

    /// Removes the node and every edge touching it. Returns the removed edges.
    pub(crate) fn remove_node(&mut self, id: &str) -> Option<(GraphNode, Vec<Edge>)> {
        let idx = self.nodes.iter().position(|n| n.id == id)?;
        let node = self.nodes.remove(idx);
        let (removed, kept): (Vec<Edge>, Vec<Edge>) = std::mem::take(&mut self.edges)
            .into_iter()
            .partition(|e| e.source == id || e.target == id);
        self.edges = kept;
        Some((node, removed))
    }

    pub(crate) fn remove_edge(&mut self, id: &str) -> Option<Edge> {
        let idx = self.edges.iter().position(|e| e.id == id)?;
        Some(self.edges.remove(idx))
    }

    /// The node wired into `target`'s `handle` slot, if any.
    pub fn input_source(&self, target: &str, handle: &str) -> Option<&str> {
        self.edges
            .iter()
            .find(|e| e.target == target && e.target_handle == handle)
            .map(|e| e.source.as_str())
    }

    /// Direct successors of `id`, deduplicated, in edge order.
    pub fn successors(&self, id: &str) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for e in self.edges.iter().filter(|e| e.source == id) {
            if !out.contains(&e.target.as_str()) {
                out.push(e.target.as_str());
            }
        }
        out
    }

    /// `start` and every node it can reach by following edges forward.
    pub fn downstream_reachable(&self, start: &str) -> HashSet<String> {
        self.reachable(start, |e| (e.source.as_str(), e.target.as_str()))
    }

    /// `start` and every node that can reach it.
    pub fn upstream_reachable(&self, start: &str) -> HashSet<String> {
        self.reachable(start, |e| (e.target.as_str(), e.source.as_str()))
    }

    fn reachable<'a>(
        &'a self,
        start: &'a str,
        direction: impl Fn(&'a Edge) -> (&'a str, &'a str),
    ) -> HashSet<String> {
        let mut next_of: HashMap<&str, Vec<&str>> = HashMap::new();
        for e in &self.edges {
            let (from, to) = direction(e);
            next_of.entry(from).or_default().push(to);
        }

        let mut visited: HashSet<String> = HashSet::new();
        let mut stack: Vec<&str> = vec![start];
        while let Some(n) = stack.pop() {
            if !visited.insert(n.to_string()) {
                continue;
            }
            if let Some(nexts) = next_of.get(n) {
                stack.extend(nexts.iter().copied());
            }
        }
        visited
    }

    /// `true` if adding `from -> to` would close a loop.
    pub fn would_create_cycle(&self, from: &str, to: &str) -> bool {
        self.upstream_reachable(from).contains(to)
    }

    /// Topological order of `subset` (all nodes when `None`), ties broken by
    /// node insertion order. Nodes caught in a cycle are returned separately.
    pub fn topo_order(&self, subset: Option<&HashSet<String>>) -> (Vec<String>, Vec<String>) {
        let in_scope = |id: &str| subset.is_none_or(|s| s.contains(id));

        let mut indeg: HashMap<&str, usize> = self
            .nodes
            .iter()
            .filter(|n| in_scope(&n.id))
            .map(|n| (n.id.as_str(), 0usize))
            .collect();

        let mut outgoing: HashMap<&str, Vec<&str>> = HashMap::new();
        for e in &self.edges {
            if !indeg.contains_key(e.source.as_str()) || !indeg.contains_key(e.target.as_str()) {
                continue;
            }
            if let Some(d) = indeg.get_mut(e.target.as_str()) {
                *d += 1;
            }
            outgoing
                .entry(e.source.as_str())
                .or_default()
                .push(e.target.as_str());
        }

        let mut q: VecDeque<&str> = self
            .nodes
            .iter()
            .map(|n| n.id.as_str())
            .filter(|id| indeg.get(id) == Some(&0))
            .collect();
        let mut order: Vec<String> = Vec::with_capacity(indeg.len());

        while let Some(n) = q.pop_front() {
            order.push(n.to_string());
            for m in outgoing.get(n).into_iter().flatten() {
                if let Some(entry) = indeg.get_mut(m) {
                    *entry -= 1;
                    if *entry == 0 {
                        q.push_back(m);
                    }
                }
            }
        }

        let cyclic: Vec<String> = self
            .nodes
            .iter()
            .filter(|n| indeg.get(n.id.as_str()).is_some_and(|d| *d > 0))
            .map(|n| n.id.clone())
            .collect();
        (order, cyclic)
    }

    pub fn topo_sort(&self) -> Result<Vec<String>, GraphError> {
        let (order, cyclic) = self.topo_order(None);
        match cyclic.first() {
            None => Ok(order),
            Some(id) => Err(GraphError::CycleDetected {
                from: id.clone(),
                to: id.clone(),
            }),
        }
    }
}
