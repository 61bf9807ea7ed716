//! Per-node derived state: the upstream closure, the composed template and
//! the composed parameter definitions.
//!
//! A node's derived state is only defined once every input slot in its
//! upstream subgraph is connected. Until then all three fields are `None`,
//! which callers treat as "nothing to render yet".

use std::collections::{HashMap, HashSet, VecDeque};

use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    catalog::{NodeCatalog, ParameterDescriptor},
    error::GraphError,
    graph::Graph,
    template::build_final_template,
};

/// A parameter descriptor bound to the node that owns it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeParameter {
    pub node_id: String,
    /// Position in the owning node's own parameter list.
    pub index: usize,
    #[serde(flatten)]
    pub descriptor: ParameterDescriptor,
}

impl NodeParameter {
    /// `<node>_<uniform>` as declared in the assembled shader.
    pub fn scoped_uniform_name(&self) -> String {
        format!("{}_{}", self.node_id, self.descriptor.uniform_name)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerivedState {
    pub input_node_ids: Option<Vec<String>>,
    pub template: Option<String>,
    pub parameter_definitions: Option<Vec<NodeParameter>>,
}

impl DerivedState {
    pub fn is_ready(&self) -> bool {
        self.template.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct DependencyTracker {
    derived: HashMap<String, DerivedState>,
}

impl DependencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, id: &str) -> Option<&DerivedState> {
        self.derived.get(id)
    }

    pub fn input_node_ids(&self, id: &str) -> Option<&[String]> {
        self.derived.get(id)?.input_node_ids.as_deref()
    }

    pub fn template(&self, id: &str) -> Option<&str> {
        self.derived.get(id)?.template.as_deref()
    }

    pub fn parameter_definitions(&self, id: &str) -> Option<&[NodeParameter]> {
        self.derived.get(id)?.parameter_definitions.as_deref()
    }

    pub fn forget(&mut self, id: &str) {
        self.derived.remove(id);
    }

    /// Recompute every node reachable downstream from `starts` (inclusive).
    ///
    /// The affected set is discovered with a FIFO worklist and a visited set,
    /// then evaluated in topological order so each node sees its inputs'
    /// final state. Returns the ids that were recomputed, in evaluation order.
    pub fn recompute_from<S: AsRef<str>>(
        &mut self,
        graph: &Graph,
        catalog: &NodeCatalog,
        starts: &[S],
    ) -> Result<Vec<String>, GraphError> {
        let mut affected: HashSet<String> = HashSet::new();
        let mut worklist: VecDeque<&str> = starts
            .iter()
            .map(|s| s.as_ref())
            .filter(|id| graph.contains_node(id))
            .collect();
        while let Some(id) = worklist.pop_front() {
            if !affected.insert(id.to_string()) {
                continue;
            }
            worklist.extend(graph.successors(id));
        }

        let (order, cyclic) = graph.topo_order(Some(&affected));
        for id in &order {
            let state = self.recompute_node(graph, catalog, id)?;
            debug!(
                node = %id,
                ready = state.is_ready(),
                upstream = state.input_node_ids.as_ref().map_or(0, Vec::len),
                "recomputed derived state"
            );
            self.derived.insert(id.clone(), state);
        }
        for id in &cyclic {
            warn!(node = %id, "node is part of a cycle; leaving it unresolved");
            self.derived.insert(id.clone(), DerivedState::default());
        }

        let mut touched = order;
        touched.extend(cyclic);
        Ok(touched)
    }

    /// Derive `id`'s state from the current state of its direct inputs.
    fn recompute_node(
        &self,
        graph: &Graph,
        catalog: &NodeCatalog,
        id: &str,
    ) -> Result<DerivedState, GraphError> {
        let node = graph
            .node(id)
            .ok_or_else(|| GraphError::UnknownNode(id.to_string()))?;
        let definition = catalog.definition(&node.node_type)?;

        let mut direct: Vec<&str> = Vec::with_capacity(definition.inputs.len());
        for slot in &definition.inputs {
            match graph.input_source(id, &slot.handle_id) {
                Some(source) => direct.push(source),
                None => return Ok(DerivedState::default()),
            }
        }

        let mut closure: Vec<String> = Vec::new();
        for source in &direct {
            push_unique(&mut closure, source);
        }
        for source in &direct {
            let Some(upstream) = self.input_node_ids(source) else {
                return Ok(DerivedState::default());
            };
            for ancestor in upstream {
                push_unique(&mut closure, ancestor);
            }
        }

        let input_templates: Option<Vec<&str>> =
            direct.iter().map(|source| self.template(source)).collect();
        let Some(input_templates) = input_templates else {
            return Ok(DerivedState {
                input_node_ids: Some(closure),
                ..DerivedState::default()
            });
        };

        let template = build_final_template(
            id,
            &definition.template,
            &definition.uniform_names(),
            &input_templates,
        );

        let mut parameter_definitions = own_parameters(id, &definition.parameters);
        for ancestor in &closure {
            let ancestor_node = graph
                .node(ancestor)
                .ok_or_else(|| GraphError::UnknownNode(ancestor.clone()))?;
            let ancestor_definition = catalog.definition(&ancestor_node.node_type)?;
            parameter_definitions.extend(own_parameters(ancestor, &ancestor_definition.parameters));
        }

        Ok(DerivedState {
            input_node_ids: Some(closure),
            template: Some(template),
            parameter_definitions: Some(parameter_definitions),
        })
    }
}

fn push_unique(closure: &mut Vec<String>, id: &str) {
    if !closure.iter().any(|c| c == id) {
        closure.push(id.to_string());
    }
}

fn own_parameters(node_id: &str, parameters: &[ParameterDescriptor]) -> Vec<NodeParameter> {
    parameters
        .iter()
        .enumerate()
        .map(|(index, descriptor)| NodeParameter {
            node_id: node_id.to_string(),
            index,
            descriptor: descriptor.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        catalog::{InputKind, InputSlot, NodeDefinition, ScalarType, UiSettings, UniformType},
        graph::{Edge, GraphNode, Position},
        param::ParameterValue,
    };

    fn catalog() -> NodeCatalog {
        let param = |name: &str| ParameterDescriptor {
            name: name.to_string(),
            uniform_name: name.to_string(),
            input_kind: InputKind::Slider,
            uniform_type: UniformType::scalar(ScalarType::Float),
            default_value: ParameterValue::Number(1.0),
            ui: UiSettings::default(),
        };
        NodeCatalog::from_definitions([
            (
                "source".to_string(),
                NodeDefinition {
                    name: "Source".into(),
                    template: "$OUT = vec4($UV, $level, 1.0);\n".into(),
                    parameters: vec![param("level")],
                    inputs: vec![],
                },
            ),
            (
                "blend".to_string(),
                NodeDefinition {
                    name: "Blend".into(),
                    template: "vec2 uv = $UV;\nvec4 a;\n$INPUT0(a, uv)\nvec4 b;\n$INPUT1(b, uv)\n$OUT = mix(a, b, $t);\n".into(),
                    parameters: vec![param("t")],
                    inputs: vec![
                        InputSlot {
                            display_name: "A".into(),
                            handle_id: "a".into(),
                        },
                        InputSlot {
                            display_name: "B".into(),
                            handle_id: "b".into(),
                        },
                    ],
                },
            ),
        ])
        .unwrap()
    }

    fn node(g: &mut Graph, id: &str, ty: &str) {
        g.push_node(GraphNode::new(id, ty, Position::default()));
    }

    #[test]
    fn source_nodes_resolve_immediately() {
        let catalog = catalog();
        let mut g = Graph::new();
        node(&mut g, "s", "source");
        let mut tracker = DependencyTracker::new();
        tracker.recompute_from(&g, &catalog, &["s"]).unwrap();

        assert_eq!(tracker.input_node_ids("s"), Some(&[][..]));
        assert_eq!(tracker.template("s"), Some("$OUT = vec4($UV, s_level, 1.0);\n"));
        let defs = tracker.parameter_definitions("s").unwrap();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].scoped_uniform_name(), "s_level");
    }

    #[test]
    fn partially_connected_node_stays_unresolved() {
        let catalog = catalog();
        let mut g = Graph::new();
        node(&mut g, "s", "source");
        node(&mut g, "m", "blend");
        g.push_edge(Edge::new("s", None, "m", "a"));
        let mut tracker = DependencyTracker::new();
        tracker.recompute_from(&g, &catalog, &["s", "m"]).unwrap();

        assert_eq!(tracker.state("m"), Some(&DerivedState::default()));
    }

    #[test]
    fn diamond_closure_lists_each_ancestor_once() {
        let catalog = catalog();
        let mut g = Graph::new();
        node(&mut g, "s", "source");
        node(&mut g, "l", "blend");
        node(&mut g, "r", "blend");
        node(&mut g, "top", "blend");
        for (from, to, handle) in [
            ("s", "l", "a"),
            ("s", "l", "b"),
            ("s", "r", "a"),
            ("s", "r", "b"),
            ("l", "top", "a"),
            ("r", "top", "b"),
        ] {
            g.push_edge(Edge::new(from, None, to, handle));
        }
        let mut tracker = DependencyTracker::new();
        let touched = tracker.recompute_from(&g, &catalog, &["s"]).unwrap();
        assert_eq!(touched, vec!["s", "l", "r", "top"]);

        assert_eq!(
            tracker.input_node_ids("top").unwrap(),
            &["l".to_string(), "r".to_string(), "s".to_string()]
        );
        let owners: Vec<&str> = tracker
            .parameter_definitions("top")
            .unwrap()
            .iter()
            .map(|p| p.node_id.as_str())
            .collect();
        assert_eq!(owners, vec!["top", "l", "r", "s"]);
        assert!(tracker.template("top").unwrap().contains("s_level"));
    }
}
