//! Read the extra parameters of a user-authored `mainImage` entry point.
//!
//! Shadertoy-style code declares `mainImage(out vec4 fragColor, in vec2 fragCoord, ...)`;
//! anything after `fragCoord` is a node parameter.

use crate::error::SignatureError;

pub const ENTRY_POINT: &str = "mainImage";
const LAST_BUILTIN_PARAM: &str = "fragCoord";
const QUALIFIERS: [&str; 4] = ["in", "out", "inout", "const"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlslParam {
    pub name: String,
    pub ty: String,
}

pub fn extract_main_image_params(code: &str) -> Result<Vec<GlslParam>, SignatureError> {
    let param_list = find_param_list(code, ENTRY_POINT)
        .ok_or_else(|| SignatureError::MissingFunction(ENTRY_POINT.to_string()))?;
    let cleaned = strip_comments(param_list);
    let params: Vec<&str> = cleaned.split(',').map(str::trim).collect();

    let idx = params
        .iter()
        .position(|p| p.contains(LAST_BUILTIN_PARAM))
        .ok_or_else(|| SignatureError::MissingParameter(LAST_BUILTIN_PARAM.to_string()))?;

    params[idx + 1..]
        .iter()
        .map(|p| {
            let mut words: Vec<&str> = p
                .split_whitespace()
                .filter(|w| !QUALIFIERS.contains(w))
                .collect();
            let name = words
                .pop()
                .ok_or_else(|| SignatureError::MalformedParameter(p.to_string()))?;
            if words.is_empty() {
                return Err(SignatureError::MalformedParameter(p.to_string()));
            }
            Ok(GlslParam {
                name: name.to_string(),
                ty: words.join(" "),
            })
        })
        .collect()
}

/// Text between the parentheses of the first `fn_name (` occurrence.
fn find_param_list<'a>(code: &'a str, fn_name: &str) -> Option<&'a str> {
    let mut search_from = 0;
    while let Some(found) = code[search_from..].find(fn_name) {
        let after = search_from + found + fn_name.len();
        let rest = code[after..].trim_start();
        if let Some(inner) = rest.strip_prefix('(') {
            let close = inner.find(')')?;
            return Some(&inner[..close]);
        }
        search_from = after;
    }
    None
}

fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    loop {
        let line = rest.find("//");
        let block = rest.find("/*");
        let line_first = match (line, block) {
            (Some(l), Some(b)) => l < b,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => {
                out.push_str(rest);
                return out;
            }
        };

        if let (true, Some(l)) = (line_first, line) {
            out.push_str(&rest[..l]);
            rest = rest[l..].find('\n').map_or("", |nl| &rest[l + nl..]);
        } else if let Some(b) = block {
            out.push_str(&rest[..b]);
            rest = rest[b + 2..]
                .find("*/")
                .map_or("", |end| &rest[b + 2 + end + 2..]);
        }
    }
}
