//! Own parameter values per node.

use std::collections::HashMap;

use crate::{
    catalog::NodeDefinition,
    error::GraphError,
    param::ParameterValue,
    tracker::NodeParameter,
};

#[derive(Debug, Clone, Default)]
pub struct ValueStore {
    own: HashMap<String, Vec<ParameterValue>>,
}

impl ValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset `node_id` to the catalog defaults of its definition.
    pub fn seed(&mut self, node_id: &str, definition: &NodeDefinition) {
        self.own
            .insert(node_id.to_string(), definition.default_values());
    }

    /// Store `values` as-is. The caller has already checked them against the
    /// node's definition.
    pub(crate) fn insert(&mut self, node_id: &str, values: Vec<ParameterValue>) {
        self.own.insert(node_id.to_string(), values);
    }

    pub fn remove(&mut self, node_id: &str) -> Option<Vec<ParameterValue>> {
        self.own.remove(node_id)
    }

    pub fn own_values(&self, node_id: &str) -> Option<&[ParameterValue]> {
        self.own.get(node_id).map(Vec::as_slice)
    }

    /// Replace one own value after checking it against the descriptor at
    /// `index`. On error nothing is changed.
    pub fn set_value(
        &mut self,
        node_id: &str,
        definition: &NodeDefinition,
        index: usize,
        value: ParameterValue,
    ) -> Result<(), GraphError> {
        let descriptor =
            definition
                .parameters
                .get(index)
                .ok_or_else(|| GraphError::ParameterIndexOutOfRange {
                    node_id: node_id.to_string(),
                    index,
                })?;

        if !descriptor.accepts(&value) {
            return Err(GraphError::ValueKindMismatch {
                node_id: node_id.to_string(),
                parameter: descriptor.uniform_name.clone(),
                expected: descriptor.input_kind.value_kind(),
                actual: value.kind(),
            });
        }
        if let ParameterValue::ColorControlPoints(points) = &value {
            let capacity = descriptor.uniform_type.length;
            if points.len() > capacity {
                return Err(GraphError::TooManyControlPoints {
                    node_id: node_id.to_string(),
                    parameter: descriptor.uniform_name.clone(),
                    capacity,
                    len: points.len(),
                });
            }
        }

        let slot = self
            .own
            .get_mut(node_id)
            .ok_or_else(|| GraphError::MissingOwnValues(node_id.to_string()))?
            .get_mut(index)
            .ok_or_else(|| GraphError::ParameterIndexOutOfRange {
                node_id: node_id.to_string(),
                index,
            })?;
        *slot = value;
        Ok(())
    }

    /// Values aligned one-to-one with `definitions`.
    pub fn values_for(&self, definitions: &[NodeParameter]) -> Result<Vec<ParameterValue>, GraphError> {
        definitions
            .iter()
            .map(|p| {
                let own = self
                    .own
                    .get(&p.node_id)
                    .ok_or_else(|| GraphError::MissingOwnValues(p.node_id.clone()))?;
                own.get(p.index)
                    .cloned()
                    .ok_or_else(|| GraphError::ParameterIndexOutOfRange {
                        node_id: p.node_id.clone(),
                        index: p.index,
                    })
            })
            .collect()
    }
}
