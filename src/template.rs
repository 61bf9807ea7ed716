//! GLSL template composition.
//!
//! Templates are plain GLSL with `$` placeholders:
//! - `$UV` / `$OUT`: sample coordinate expression and output variable,
//!   resolved by whoever consumes the template (a parent node, or the final
//!   fragment shader);
//! - `$<uniformName>`: one per node parameter, rewritten to `<nodeId>_<uniformName>`;
//! - `$INPUTk(outVar, uvVar)`: call site for input slot `k`, replaced by an
//!   inlined copy of that input's composed template.
//!
//! Everything is text rewriting; there is no GLSL parser involved.

mod calls;
mod compose;
mod preprocess;
pub mod signature;
mod tokens;

pub use calls::{InputCall, scan_input_calls};
pub use compose::{
    PlaceholderBindings, build_final_template, insert_template_into_input_calls,
    prepend_uniform_variables_with_id, resolve_placeholders,
};
pub use preprocess::preprocess_template;
pub use tokens::{instantiate_template, is_reserved_placeholder};

pub const UV_PLACEHOLDER: &str = "$UV";
pub const OUT_PLACEHOLDER: &str = "$OUT";
