use std::collections::HashMap;

use super::{
    OUT_PLACEHOLDER, UV_PLACEHOLDER,
    calls::scan_input_calls,
    preprocess::strip_blank_lines,
    tokens::{rename_identifiers, replace_token},
};

const INLINE_INDENT: &str = "  ";

/// Everything needed to resolve one node's template: the scope (node id) its
/// identifiers are prefixed with, the uniforms it owns, and the composed
/// templates of its inputs in slot order.
#[derive(Debug, Clone, Copy)]
pub struct PlaceholderBindings<'a, U: AsRef<str>, I: AsRef<str>> {
    pub scope: &'a str,
    pub uniforms: &'a [U],
    pub inputs: &'a [I],
}

/// Single entry point for placeholder resolution. Callers don't depend on how
/// the rewriting is done.
pub fn resolve_placeholders<U: AsRef<str>, I: AsRef<str>>(
    template: &str,
    bindings: &PlaceholderBindings<'_, U, I>,
) -> String {
    let prefixed = prepend_uniform_variables_with_id(bindings.scope, template, bindings.uniforms);
    insert_template_into_input_calls(bindings.scope, &prefixed, bindings.inputs)
}

pub fn build_final_template<U: AsRef<str>, I: AsRef<str>>(
    id: &str,
    template: &str,
    uniform_names: &[U],
    input_templates: &[I],
) -> String {
    resolve_placeholders(
        template,
        &PlaceholderBindings {
            scope: id,
            uniforms: uniform_names,
            inputs: input_templates,
        },
    )
}

/// Rewrite `$name` to `<id>_name` for each uniform name. A token only matches
/// when the name isn't followed by more identifier characters, so the order of
/// `uniform_names` doesn't matter even when one name prefixes another.
pub fn prepend_uniform_variables_with_id<S: AsRef<str>>(
    id: &str,
    template: &str,
    uniform_names: &[S],
) -> String {
    uniform_names.iter().fold(template.to_string(), |acc, name| {
        let name = name.as_ref();
        replace_token(&acc, &format!("${name}"), &format!("{id}_{name}"))
    })
}

/// Inline `input_templates[k]` at every `$INPUTk(outVar, uvVar)` call site of
/// `output_template`.
///
/// Every variable named at a call site is renamed to `<id>_<var>` throughout
/// the outer template, and each call site becomes a brace block holding a
/// fresh copy of the input template with `$OUT`/`$UV` bound to the renamed
/// variables. Inlined copies are not touched by the outer renaming.
/// Call sites whose index has no template are left as they are.
pub fn insert_template_into_input_calls<S: AsRef<str>>(
    id: &str,
    output_template: &str,
    input_templates: &[S],
) -> String {
    let calls: Vec<_> = scan_input_calls(output_template)
        .into_iter()
        .filter(|c| c.index < input_templates.len())
        .collect();
    if calls.is_empty() {
        return output_template.to_string();
    }

    let mut renames: HashMap<&str, String> = HashMap::new();
    for call in &calls {
        for var in [call.out_var.as_str(), call.uv_var.as_str()] {
            renames
                .entry(var)
                .or_insert_with(|| format!("{id}_{var}"));
        }
    }

    let mut out = String::with_capacity(output_template.len() * 2);
    let mut cursor = 0;
    for call in &calls {
        out.push_str(&rename_identifiers(
            &output_template[cursor..call.span.start],
            &renames,
        ));

        let body = inline_body(
            input_templates[call.index].as_ref(),
            &renames[call.out_var.as_str()],
            &renames[call.uv_var.as_str()],
        );
        out.push_str("{\n");
        out.push_str(&body);
        out.push_str("\n}");

        cursor = call.span.end;
    }
    out.push_str(&rename_identifiers(&output_template[cursor..], &renames));
    out
}

fn inline_body(input_template: &str, out_var: &str, uv_var: &str) -> String {
    let indented = strip_blank_lines(input_template)
        .lines()
        .map(|line| format!("{INLINE_INDENT}{line}"))
        .collect::<Vec<_>>()
        .join("\n");
    let with_out = replace_token(&indented, OUT_PLACEHOLDER, out_var);
    replace_token(&with_out, UV_PLACEHOLDER, uv_var)
}
