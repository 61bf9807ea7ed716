use std::collections::HashMap;

use super::{OUT_PLACEHOLDER, UV_PLACEHOLDER};

pub(crate) fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Names that can't be used as uniform names because the `$name` token is
/// already taken by a structural placeholder.
pub fn is_reserved_placeholder(name: &str) -> bool {
    name == "UV"
        || name == "OUT"
        || name
            .strip_prefix("INPUT")
            .is_some_and(|k| !k.is_empty() && k.chars().all(|c| c.is_ascii_digit()))
}

/// Replace every `token` (which starts with `$`) that is not immediately
/// followed by an identifier character. `$scale` is left alone inside `$scale2`.
pub(crate) fn replace_token(source: &str, token: &str, replacement: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    while let Some(pos) = rest.find(token) {
        let after = &rest[pos + token.len()..];
        out.push_str(&rest[..pos]);
        if after.starts_with(is_ident_char) {
            out.push_str(token);
        } else {
            out.push_str(replacement);
        }
        rest = after;
    }
    out.push_str(rest);
    out
}

/// Rename whole identifiers. A word only matches when it is a maximal run of
/// identifier characters, and member accesses (`v.x`) are never renamed.
pub(crate) fn rename_identifiers(source: &str, renames: &HashMap<&str, String>) -> String {
    if renames.is_empty() {
        return source.to_string();
    }

    let mut out = String::with_capacity(source.len());
    let mut word_start: Option<usize> = None;
    let mut prev: Option<char> = None;
    let mut before_word: Option<char> = None;

    let flush = |out: &mut String, word: &str, before: Option<char>| {
        match renames.get(word) {
            Some(renamed) if before != Some('.') => out.push_str(renamed),
            _ => out.push_str(word),
        }
    };

    for (i, c) in source.char_indices() {
        if is_ident_char(c) {
            if word_start.is_none() {
                word_start = Some(i);
                before_word = prev;
            }
        } else {
            if let Some(start) = word_start.take() {
                flush(&mut out, &source[start..i], before_word);
            }
            out.push(c);
        }
        prev = Some(c);
    }
    if let Some(start) = word_start {
        flush(&mut out, &source[start..], before_word);
    }
    out
}

/// Resolve the two outermost placeholders of a composed template.
pub fn instantiate_template(template: &str, uv_expr: &str, out_var: &str) -> String {
    let with_uv = replace_token(template, UV_PLACEHOLDER, uv_expr);
    replace_token(&with_uv, OUT_PLACEHOLDER, out_var)
}
