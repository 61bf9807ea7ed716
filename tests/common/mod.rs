#![allow(dead_code)]

use std::sync::Arc;

use texture_forge::{
    NodeCatalog, TextureGraph,
    catalog::{
        InputKind, InputSlot, NodeDefinition, ParameterDescriptor, ScalarType, UiSettings,
        UniformType,
    },
    graph::Position,
    param::ParameterValue,
};

pub const SIMPLEX: &str = "vec3 col = vec3(simplex3d(vec3($UV, $seed) * $scale) * 0.5 + 0.5);\n$OUT = vec4(col, 1.0);\n";

pub const INVERT: &str = "vec4 input1;\nvec2 uv1 = $UV;\n$INPUT0(input1, uv1)\nvec3 col = vec3(1.0) - input1.xyz;\n$OUT = vec4(col * $brightness, 1.0);\n";

pub const BLEND: &str = "vec2 uv = $UV;\nvec4 a;\n$INPUT0(a, uv)\nvec4 b;\n$INPUT1(b, uv)\n$OUT = mix(a, b, $tint.a);\n";

pub fn slider(uniform: &str, default: f32) -> ParameterDescriptor {
    ParameterDescriptor {
        name: uniform.to_string(),
        uniform_name: uniform.to_string(),
        input_kind: InputKind::Slider,
        uniform_type: UniformType::scalar(ScalarType::Float),
        default_value: ParameterValue::Number(default),
        ui: UiSettings::default(),
    }
}

pub fn slot(handle: &str) -> InputSlot {
    InputSlot {
        display_name: handle.to_string(),
        handle_id: handle.to_string(),
    }
}

/// `simplex` (no inputs; seed, scale), `invert` (input `in`; brightness) and
/// `blend` (inputs `a`, `b`; a color tint).
pub fn catalog() -> Arc<NodeCatalog> {
    let tint = ParameterDescriptor {
        name: "Tint".into(),
        uniform_name: "tint".into(),
        input_kind: InputKind::Color,
        uniform_type: UniformType::scalar(ScalarType::Vec4),
        default_value: ParameterValue::Color([1.0, 1.0, 1.0, 0.5]),
        ui: UiSettings::default(),
    };
    let catalog = NodeCatalog::from_definitions([
        (
            "simplex".to_string(),
            NodeDefinition {
                name: "Simplex".into(),
                template: SIMPLEX.into(),
                parameters: vec![slider("seed", 0.0), slider("scale", 10.0)],
                inputs: vec![],
            },
        ),
        (
            "invert".to_string(),
            NodeDefinition {
                name: "Invert".into(),
                template: INVERT.into(),
                parameters: vec![slider("brightness", 1.0)],
                inputs: vec![slot("in")],
            },
        ),
        (
            "blend".to_string(),
            NodeDefinition {
                name: "Blend".into(),
                template: BLEND.into(),
                parameters: vec![tint],
                inputs: vec![slot("a"), slot("b")],
            },
        ),
    ])
    .unwrap_or_else(|e| panic!("test catalog is invalid: {e}"));
    Arc::new(catalog)
}

pub fn editor() -> TextureGraph {
    TextureGraph::new(catalog())
}

pub fn at(x: f64, y: f64) -> Position {
    Position { x, y }
}
