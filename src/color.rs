use crate::error::ColorError;

/// Linear RGBA, each component in `0.0..=1.0`.
pub type Rgba = [f32; 4];

fn clamp01(x: f32) -> f32 {
    x.clamp(0.0, 1.0)
}

fn hex_channel(s: &str, original: &str) -> Result<f32, ColorError> {
    u8::from_str_radix(s, 16)
        .map(|v| v as f32 / 255.0)
        .map_err(|_| ColorError::InvalidHex(original.to_string()))
}

/// Parse `#rgb`, `#rgba`, `#rrggbb` or `#rrggbbaa` (the `#` is optional).
/// Missing alpha means fully opaque.
///
/// Example:
/// ```
/// use texture_forge::color::hex_to_rgba;
/// assert_eq!(hex_to_rgba("#ff0000").unwrap(), [1.0, 0.0, 0.0, 1.0]);
/// ```
pub fn hex_to_rgba(hex: &str) -> Result<Rgba, ColorError> {
    let clean = hex.trim().trim_start_matches('#');
    if !clean.is_ascii() || ![3, 4, 6, 8].contains(&clean.len()) {
        return Err(ColorError::InvalidHex(hex.to_string()));
    }

    let mut out = [0.0, 0.0, 0.0, 1.0];
    if clean.len() <= 4 {
        for (i, ch) in clean.chars().enumerate() {
            let doubled: String = [ch, ch].iter().collect();
            out[i] = hex_channel(&doubled, hex)?;
        }
    } else {
        for i in 0..clean.len() / 2 {
            out[i] = hex_channel(&clean[i * 2..i * 2 + 2], hex)?;
        }
    }
    Ok(out)
}

/// Format as `#rrggbbaa`. Components are clamped to `0..=1` before rounding.
pub fn rgba_to_hex(rgba: Rgba) -> Result<String, ColorError> {
    if rgba.iter().any(|c| !c.is_finite()) {
        return Err(ColorError::NonFinite(rgba));
    }
    Ok(rgba.iter().fold(String::from("#"), |mut acc, c| {
        acc.push_str(&format!("{:02x}", (clamp01(*c) * 255.0).round() as u8));
        acc
    }))
}
