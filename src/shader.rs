//! Preview fragment shader assembly and uniform value flattening.

use std::collections::HashSet;

use serde::Serialize;

use crate::{
    catalog::ScalarType,
    error::ShaderError,
    param::ParameterValue,
    template::instantiate_template,
    tracker::NodeParameter,
};

pub const GLSL_UTILS: &str = include_str!("../assets/shaders/utils.glsl");

/// Full-screen triangle; hands `uv` in [0, 1] to the fragment stage.
pub const PREVIEW_VERTEX_SHADER: &str = r#"#version 300 es
precision highp float;

out vec2 uv;

void main() {
  vec2 positions[3];
  positions[0] = vec2(-1.0, -1.0);
  positions[1] = vec2( 3.0, -1.0);
  positions[2] = vec2(-1.0,  3.0);
  vec2 pos = positions[gl_VertexID];
  gl_Position = vec4(pos, 0.0, 1.0);
  uv = (pos + 1.0) * 0.5;
}
"#;

const FRAGMENT_HEADER: &str = "#version 300 es\nprecision highp float;\nprecision highp int;\n\nin vec2 uv;\nout vec4 outColor;\n";

/// One `uniform` line per distinct `(node, uniform)` pair, plus the `_count`
/// companion of dynamic arrays.
pub fn uniform_declarations(definitions: &[NodeParameter]) -> String {
    let mut seen: HashSet<(&str, &str)> = HashSet::new();
    let mut out = String::new();
    for p in definitions {
        if !seen.insert((p.node_id.as_str(), p.descriptor.uniform_name.as_str())) {
            continue;
        }
        let ty = &p.descriptor.uniform_type;
        let name = p.scoped_uniform_name();
        if ty.array {
            out.push_str(&format!("uniform {} {name}[{}];\n", ty.scalar.glsl(), ty.length));
            if ty.dynamic {
                out.push_str(&format!("uniform int {name}_count;\n"));
            }
        } else {
            out.push_str(&format!("uniform {} {name};\n", ty.scalar.glsl()));
        }
    }
    out
}

/// Wrap a composed template into a complete GLSL ES 3.00 fragment shader.
pub fn assemble_fragment_shader(template: &str, definitions: &[NodeParameter]) -> String {
    let body: String = instantiate_template(template, "fragCoord", "fragColor")
        .lines()
        .map(|line| {
            if line.is_empty() {
                "\n".to_string()
            } else {
                format!("  {line}\n")
            }
        })
        .collect();

    format!(
        "{FRAGMENT_HEADER}\n{GLSL_UTILS}\n{uniforms}\nvoid mainImage(out vec4 fragColor, in vec2 fragCoord) {{\n{body}}}\n\nvoid main() {{\n  mainImage(outColor, uv);\n}}\n",
        uniforms = uniform_declarations(definitions),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum UniformValue {
    Float(f32),
    Uint(u32),
    Int(i32),
    Vec4([f32; 4]),
}

/// A value ready to upload to the uniform location called `name`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UniformBinding {
    pub name: String,
    pub value: UniformValue,
}

impl UniformBinding {
    fn new(name: impl Into<String>, value: UniformValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Flatten aligned definitions and values into per-location uniform writes.
/// Duplicate `(node, uniform)` pairs are bound once.
pub fn uniform_bindings(
    definitions: &[NodeParameter],
    values: &[ParameterValue],
) -> Result<Vec<UniformBinding>, ShaderError> {
    if definitions.len() != values.len() {
        return Err(ShaderError::LengthMismatch {
            definitions: definitions.len(),
            values: values.len(),
        });
    }

    let mut seen: HashSet<(&str, &str)> = HashSet::new();
    let mut out = Vec::new();
    for (p, value) in definitions.iter().zip(values) {
        if !seen.insert((p.node_id.as_str(), p.descriptor.uniform_name.as_str())) {
            continue;
        }
        let name = p.scoped_uniform_name();
        let scalar = p.descriptor.uniform_type.scalar;

        match (value, scalar) {
            (ParameterValue::Number(v), ScalarType::Float) => {
                out.push(UniformBinding::new(name.as_str(), UniformValue::Float(*v)));
            }
            (ParameterValue::Number(v), ScalarType::Uint) => {
                out.push(UniformBinding::new(
                    name.as_str(),
                    UniformValue::Uint(v.max(0.0).round() as u32),
                ));
            }
            (ParameterValue::Number(v), ScalarType::Int) => {
                out.push(UniformBinding::new(name.as_str(), UniformValue::Int(v.round() as i32)));
            }
            (ParameterValue::Color(rgba), ScalarType::Vec4) => {
                out.push(UniformBinding::new(name.as_str(), UniformValue::Vec4(*rgba)));
            }
            (ParameterValue::ColorControlPoints(points), ScalarType::ColorControlPoint) => {
                let capacity = p.descriptor.uniform_type.length;
                if points.len() > capacity {
                    return Err(ShaderError::TooManyControlPoints {
                        uniform: name,
                        capacity,
                        len: points.len(),
                    });
                }
                out.push(UniformBinding::new(
                    format!("{name}_count"),
                    UniformValue::Int(points.len() as i32),
                ));
                for (i, point) in points.iter().enumerate() {
                    out.push(UniformBinding::new(
                        format!("{name}[{i}].color"),
                        UniformValue::Vec4(point.color),
                    ));
                    out.push(UniformBinding::new(
                        format!("{name}[{i}].lightness"),
                        UniformValue::Float(point.lightness),
                    ));
                }
            }
            _ => {
                return Err(ShaderError::ValueKindMismatch {
                    uniform: name,
                    uniform_type: scalar.glsl(),
                    actual: value.kind(),
                });
            }
        }
    }
    Ok(out)
}
