//! The node definition catalog: one immutable [`NodeDefinition`] per node type key.

use std::{collections::HashMap, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    error::{CatalogError, GraphError},
    param::{ParameterValue, ValueKind},
    template::{is_reserved_placeholder, preprocess_template, scan_input_calls},
};

const DEFAULT_NODE_CATALOG_JSON: &str = include_str!("../assets/node-catalog.json");

/// Which editor widget drives a parameter. Determines the value kind it stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InputKind {
    Number,
    Slider,
    Color,
    ColorControlPointArray,
}

impl InputKind {
    pub fn value_kind(self) -> ValueKind {
        match self {
            InputKind::Number | InputKind::Slider => ValueKind::Number,
            InputKind::Color => ValueKind::Color,
            InputKind::ColorControlPointArray => ValueKind::ColorControlPoints,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScalarType {
    Float,
    Uint,
    Int,
    Vec4,
    ColorControlPoint,
}

impl ScalarType {
    /// Returns the GLSL type name for this scalar type.
    pub fn glsl(self) -> &'static str {
        match self {
            ScalarType::Float => "float",
            ScalarType::Uint => "uint",
            ScalarType::Int => "int",
            ScalarType::Vec4 => "vec4",
            ScalarType::ColorControlPoint => "ColorControlPoint",
        }
    }
}

fn one() -> usize {
    1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniformType {
    #[serde(rename = "type")]
    pub scalar: ScalarType,
    #[serde(default = "one")]
    pub length: usize,
    /// Declared as `name[length]`.
    #[serde(default)]
    pub array: bool,
    /// Arrays whose used length changes at runtime get a companion
    /// `int <name>_count` uniform.
    #[serde(default)]
    pub dynamic: bool,
}

impl UniformType {
    pub fn scalar(scalar: ScalarType) -> Self {
        Self {
            scalar,
            length: 1,
            array: false,
            dynamic: false,
        }
    }

    pub fn dynamic_array(scalar: ScalarType, length: usize) -> Self {
        Self {
            scalar,
            length,
            array: true,
            dynamic: true,
        }
    }
}

/// Slider/number bounds. Purely informational for the editor.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct UiSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDescriptor {
    pub name: String,
    pub uniform_name: String,
    pub input_kind: InputKind,
    pub uniform_type: UniformType,
    pub default_value: ParameterValue,
    #[serde(flatten)]
    pub ui: UiSettings,
}

impl ParameterDescriptor {
    /// Every uniform this parameter declares, without the node prefix.
    pub fn uniform_names(&self) -> Vec<String> {
        let mut names = vec![self.uniform_name.clone()];
        if self.uniform_type.array && self.uniform_type.dynamic {
            names.push(format!("{}_count", self.uniform_name));
        }
        names
    }

    pub fn accepts(&self, value: &ParameterValue) -> bool {
        value.kind() == self.input_kind.value_kind()
    }

    /// Control point lists can't outgrow the uniform array they upload to.
    pub fn within_capacity(&self, value: &ParameterValue) -> bool {
        match value {
            ParameterValue::ColorControlPoints(points) => points.len() <= self.uniform_type.length,
            _ => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputSlot {
    pub display_name: String,
    pub handle_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeDefinition {
    pub name: String,
    pub template: String,
    pub parameters: Vec<ParameterDescriptor>,
    /// Slot `k` is spliced in at `$INPUTk(...)`.
    pub inputs: Vec<InputSlot>,
}

impl NodeDefinition {
    pub fn uniform_names(&self) -> Vec<String> {
        self.parameters
            .iter()
            .flat_map(ParameterDescriptor::uniform_names)
            .collect()
    }

    pub fn default_values(&self) -> Vec<ParameterValue> {
        self.parameters
            .iter()
            .map(|p| p.default_value.clone())
            .collect()
    }

    pub fn input_slot(&self, handle_id: &str) -> Option<&InputSlot> {
        self.inputs.iter().find(|s| s.handle_id == handle_id)
    }

    /// `true` when `values` has one entry per parameter and every entry has
    /// the kind its descriptor expects and fits its uniform.
    pub fn accepts_values(&self, values: &[ParameterValue]) -> bool {
        values.len() == self.parameters.len()
            && self
                .parameters
                .iter()
                .zip(values)
                .all(|(p, v)| p.accepts(v) && p.within_capacity(v))
    }

    fn validate(&self, node_type: &str) -> Result<(), CatalogError> {
        let mut errors: Vec<String> = Vec::new();

        let mut seen_uniforms: Vec<String> = Vec::new();
        for p in &self.parameters {
            for name in p.uniform_names() {
                if !is_identifier(&name) {
                    errors.push(format!("uniform name '{name}' is not an identifier"));
                }
                if is_reserved_placeholder(&name) {
                    errors.push(format!("uniform name '{name}' collides with a placeholder"));
                }
                if seen_uniforms.contains(&name) {
                    errors.push(format!("uniform name '{name}' is declared twice"));
                }
                seen_uniforms.push(name);
            }
            if !p.accepts(&p.default_value) {
                errors.push(format!(
                    "default of '{}' is a {} value but the input is {:?}",
                    p.uniform_name,
                    p.default_value.kind(),
                    p.input_kind
                ));
            }
            if !p.within_capacity(&p.default_value) {
                errors.push(format!(
                    "default of '{}' has more control points than its uniform length {}",
                    p.uniform_name, p.uniform_type.length
                ));
            }
            if p.input_kind == InputKind::ColorControlPointArray
                && (p.uniform_type.scalar != ScalarType::ColorControlPoint || !p.uniform_type.array)
            {
                errors.push(format!(
                    "'{}' must be declared as a ColorControlPoint array",
                    p.uniform_name
                ));
            }
        }

        for (i, slot) in self.inputs.iter().enumerate() {
            if !is_identifier(&slot.handle_id) {
                errors.push(format!("input handle '{}' is not an identifier", slot.handle_id));
            }
            if self.inputs[..i].iter().any(|s| s.handle_id == slot.handle_id) {
                errors.push(format!("input handle '{}' is declared twice", slot.handle_id));
            }
        }

        for call in scan_input_calls(&self.template) {
            if call.index >= self.inputs.len() {
                errors.push(format!(
                    "template calls $INPUT{} but only {} input(s) are declared",
                    call.index,
                    self.inputs.len()
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(CatalogError::InvalidDefinition {
                node_type: node_type.to_string(),
                message: errors.join("; "),
            })
        }
    }
}

pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[derive(Debug, Clone, Default)]
pub struct NodeCatalog {
    definitions: HashMap<String, NodeDefinition>,
}

impl NodeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from definitions whose templates are already in final
    /// form. Definitions are validated the same way as JSON ones.
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = (String, NodeDefinition)>,
    ) -> Result<Self, CatalogError> {
        let mut catalog = Self::new();
        for (key, definition) in definitions {
            catalog.insert(key, definition)?;
        }
        Ok(catalog)
    }

    pub fn insert(&mut self, key: String, definition: NodeDefinition) -> Result<(), CatalogError> {
        definition.validate(&key)?;
        self.definitions.insert(key, definition);
        Ok(())
    }

    pub fn get(&self, node_type: &str) -> Option<&NodeDefinition> {
        self.definitions.get(node_type)
    }

    /// Like [`NodeCatalog::get`], but a missing entry is an invariant violation.
    pub fn definition(&self, node_type: &str) -> Result<&NodeDefinition, GraphError> {
        self.get(node_type)
            .ok_or_else(|| GraphError::UnknownNodeType(node_type.to_string()))
    }

    /// Type keys, sorted.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.definitions.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn from_json_str(text: &str) -> Result<Self, CatalogError> {
        let raw: RawCatalog = serde_json::from_str(text)?;
        let mut catalog = Self::new();
        for node in raw.nodes {
            let (key, definition) = node.into_definition()?;
            catalog.insert(key, definition)?;
        }
        Ok(catalog)
    }
}

pub fn load_default_catalog() -> Result<NodeCatalog, CatalogError> {
    NodeCatalog::from_json_str(DEFAULT_NODE_CATALOG_JSON)
}

pub fn load_catalog_from_path(path: impl AsRef<Path>) -> Result<NodeCatalog, CatalogError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    NodeCatalog::from_json_str(&text)
}

#[derive(Debug, Deserialize)]
struct RawCatalog {
    #[serde(rename = "schemaVersion")]
    #[allow(dead_code)]
    schema_version: u32,
    #[serde(default)]
    nodes: Vec<RawNodeDefinition>,
}

/// Templates are easier to author in JSON as one string per line.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTemplate {
    Text(String),
    Lines(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct RawNodeDefinition {
    #[serde(rename = "type")]
    node_type: String,
    name: String,
    template: RawTemplate,
    #[serde(default)]
    parameters: Vec<RawParameter>,
    #[serde(default)]
    inputs: Vec<InputSlot>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawParameter {
    name: String,
    uniform_name: String,
    input_kind: InputKind,
    uniform_type: UniformType,
    default: serde_json::Value,
    #[serde(flatten)]
    ui: UiSettings,
}

impl RawNodeDefinition {
    fn into_definition(self) -> Result<(String, NodeDefinition), CatalogError> {
        let template = match self.template {
            RawTemplate::Text(text) => preprocess_template(&text),
            RawTemplate::Lines(lines) => preprocess_template(&lines.join("\n")),
        };

        let parameters = self
            .parameters
            .into_iter()
            .map(|p| {
                let default_value =
                    ParameterValue::from_json_for_kind(p.input_kind.value_kind(), &p.default)
                        .map_err(|message| CatalogError::InvalidDefault {
                            node_type: self.node_type.clone(),
                            parameter: p.uniform_name.clone(),
                            message,
                        })?;
                Ok(ParameterDescriptor {
                    name: p.name,
                    uniform_name: p.uniform_name,
                    input_kind: p.input_kind,
                    uniform_type: p.uniform_type,
                    default_value,
                    ui: p.ui,
                })
            })
            .collect::<Result<Vec<_>, CatalogError>>()?;

        Ok((
            self.node_type,
            NodeDefinition {
                name: self.name,
                template,
                parameters,
                inputs: self.inputs,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slider(uniform: &str) -> ParameterDescriptor {
        ParameterDescriptor {
            name: uniform.to_string(),
            uniform_name: uniform.to_string(),
            input_kind: InputKind::Slider,
            uniform_type: UniformType::scalar(ScalarType::Float),
            default_value: ParameterValue::Number(1.0),
            ui: UiSettings::default(),
        }
    }

    #[test]
    fn bundled_catalog_loads() {
        let catalog = load_default_catalog().unwrap();
        for key in ["invert", "simplex", "warp", "mix", "solid_color", "color_ramp"] {
            assert!(catalog.get(key).is_some(), "missing bundled node type {key}");
        }
        let simplex = catalog.get("simplex").unwrap();
        assert!(simplex.inputs.is_empty());
        assert!(!simplex.template.starts_with(char::is_whitespace));
        assert_eq!(
            simplex.uniform_names(),
            vec!["seed", "scale", "octave_weight_relation", "octaves"]
        );
    }

    #[test]
    fn dynamic_arrays_declare_a_count_uniform() {
        let catalog = load_default_catalog().unwrap();
        let ramp = catalog.get("color_ramp").unwrap();
        assert_eq!(ramp.uniform_names(), vec!["points", "points_count"]);
    }

    #[test]
    fn stored_values_must_fit_the_uniform_array() {
        let catalog = load_default_catalog().unwrap();
        let ramp = catalog.get("color_ramp").unwrap();
        let points = |n: usize| {
            vec![ParameterValue::ColorControlPoints(vec![
                crate::param::ColorControlPoint {
                    color: [1.0; 4],
                    lightness: 0.5,
                };
                n
            ])]
        };
        assert!(ramp.accepts_values(&points(16)));
        assert!(!ramp.accepts_values(&points(17)));
    }

    #[test]
    fn duplicate_uniform_names_are_rejected() {
        let def = NodeDefinition {
            name: "Dup".into(),
            template: "$OUT = vec4($a);".into(),
            parameters: vec![slider("a"), slider("a")],
            inputs: vec![],
        };
        let err = NodeCatalog::from_definitions([("dup".to_string(), def)]).unwrap_err();
        assert!(err.to_string().contains("declared twice"), "{err}");
    }

    #[test]
    fn reserved_uniform_names_are_rejected() {
        let def = NodeDefinition {
            name: "Bad".into(),
            template: "$OUT = vec4(1.0);".into(),
            parameters: vec![slider("OUT")],
            inputs: vec![],
        };
        assert!(NodeCatalog::from_definitions([("bad".to_string(), def)]).is_err());
    }

    #[test]
    fn input_calls_must_have_a_slot() {
        let def = NodeDefinition {
            name: "Orphan".into(),
            template: "vec4 a;\n$INPUT1(a, uv)\n$OUT = a;".into(),
            parameters: vec![],
            inputs: vec![InputSlot {
                display_name: "In".into(),
                handle_id: "in".into(),
            }],
        };
        assert!(NodeCatalog::from_definitions([("orphan".to_string(), def)]).is_err());
    }

    #[test]
    fn input_handles_must_be_identifiers() {
        let def = NodeDefinition {
            name: "Dashed".into(),
            template: "vec4 a;\n$INPUT0(a, uv)\n$OUT = a;".into(),
            parameters: vec![],
            inputs: vec![InputSlot {
                display_name: "In".into(),
                handle_id: "in-1".into(),
            }],
        };
        let err = NodeCatalog::from_definitions([("dashed".to_string(), def)]).unwrap_err();
        assert!(err.to_string().contains("not an identifier"), "{err}");
    }

    #[test]
    fn mismatched_default_is_reported_with_context() {
        let text = r#"{
            "schemaVersion": 1,
            "nodes": [{
                "type": "solid",
                "name": "Solid",
                "template": "$OUT = $color;",
                "parameters": [{
                    "name": "Color", "uniformName": "color", "inputKind": "color",
                    "uniformType": {"type": "vec4"}, "default": 3.0
                }]
            }]
        }"#;
        match NodeCatalog::from_json_str(text) {
            Err(CatalogError::InvalidDefault { node_type, parameter, .. }) => {
                assert_eq!(node_type, "solid");
                assert_eq!(parameter, "color");
            }
            other => panic!("expected InvalidDefault, got {other:?}"),
        }
    }

    #[test]
    fn unknown_type_lookup_is_an_invariant_violation() {
        let catalog = NodeCatalog::new();
        assert_eq!(
            catalog.definition("nope").unwrap_err(),
            GraphError::UnknownNodeType("nope".into())
        );
    }
}
