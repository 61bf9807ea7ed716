//! Parameter values and how they are written in JSON.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::color::{Rgba, hex_to_rgba};

/// One stop of a color ramp: a color placed at a lightness position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorControlPoint {
    pub color: Rgba,
    pub lightness: f32,
}

/// A node's live value for one parameter. The variant must agree with the
/// descriptor's input kind (see [`crate::catalog::InputKind::value_kind`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum ParameterValue {
    Number(f32),
    #[serde(alias = "number4")]
    Color(Rgba),
    /// Used length is the length of the list; capacity comes from the uniform.
    ColorControlPoints(Vec<ColorControlPoint>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueKind {
    Number,
    Color,
    ColorControlPoints,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValueKind::Number => "number",
            ValueKind::Color => "color",
            ValueKind::ColorControlPoints => "color control points",
        })
    }
}

impl ParameterValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            ParameterValue::Number(_) => ValueKind::Number,
            ParameterValue::Color(_) => ValueKind::Color,
            ParameterValue::ColorControlPoints(_) => ValueKind::ColorControlPoints,
        }
    }

    /// Decode the loose JSON form used by catalog defaults, where the kind is
    /// known from the descriptor:
    /// - number: `1.0`
    /// - color: `"#ff00ffff"` or `[1, 0, 1, 1]`
    /// - control points: `[{ "color": <color>, "lightness": 0.5 }, ...]`
    ///
    /// The tagged form (`{"type": ..., "value": ...}`) is accepted as well.
    pub fn from_json_for_kind(kind: ValueKind, value: &Value) -> Result<Self, String> {
        if value.get("type").is_some() {
            let parsed: ParameterValue =
                serde_json::from_value(value.clone()).map_err(|e| e.to_string())?;
            if parsed.kind() != kind {
                return Err(format!("expected a {kind} value, got {}", parsed.kind()));
            }
            return Ok(parsed);
        }

        match kind {
            ValueKind::Number => value
                .as_f64()
                .map(|v| ParameterValue::Number(v as f32))
                .ok_or_else(|| format!("expected a number, got {value}")),
            ValueKind::Color => parse_color(value).map(ParameterValue::Color),
            ValueKind::ColorControlPoints => {
                let Some(points) = value.as_array() else {
                    return Err(format!("expected a list of control points, got {value}"));
                };
                points
                    .iter()
                    .map(|p| {
                        let color = p
                            .get("color")
                            .ok_or_else(|| "control point is missing `color`".to_string())
                            .and_then(parse_color)?;
                        let lightness = p
                            .get("lightness")
                            .and_then(Value::as_f64)
                            .ok_or_else(|| "control point is missing `lightness`".to_string())?;
                        Ok(ColorControlPoint {
                            color,
                            lightness: lightness as f32,
                        })
                    })
                    .collect::<Result<Vec<_>, String>>()
                    .map(ParameterValue::ColorControlPoints)
            }
        }
    }
}

fn parse_color(value: &Value) -> Result<Rgba, String> {
    if let Some(hex) = value.as_str() {
        return hex_to_rgba(hex).map_err(|e| e.to_string());
    }
    let Some(components) = value.as_array() else {
        return Err(format!("expected a hex string or [r, g, b, a], got {value}"));
    };
    if components.len() != 4 {
        return Err(format!("expected 4 color components, got {}", components.len()));
    }
    let mut out = [0.0; 4];
    for (slot, c) in out.iter_mut().zip(components) {
        *slot = c
            .as_f64()
            .ok_or_else(|| format!("color component is not a number: {c}"))? as f32;
    }
    Ok(out)
}
