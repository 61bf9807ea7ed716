/// Drop whitespace-only lines at both ends (and trailing whitespace of the
/// last line). Indentation of the first kept line is preserved.
pub(crate) fn strip_blank_lines(source: &str) -> &str {
    let trimmed = source.trim_end();
    let Some(first) = trimmed.find(|c: char| !c.is_whitespace()) else {
        return "";
    };
    let line_start = trimmed[..first].rfind('\n').map_or(0, |i| i + 1);
    &trimmed[line_start..]
}

fn leading_indent(line: &str) -> usize {
    line.bytes().take_while(|b| *b == b' ' || *b == b'\t').count()
}

/// Normalize an authored template: unify line endings, drop surrounding blank
/// lines and remove the indentation common to all non-blank lines. The result
/// ends with a single newline.
pub fn preprocess_template(source: &str) -> String {
    let normalized = source.replace("\r\n", "\n");
    let body = strip_blank_lines(&normalized);
    if body.is_empty() {
        return String::new();
    }

    let common = body
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(leading_indent)
        .min()
        .unwrap_or(0);

    let mut out = body
        .lines()
        .map(|line| {
            if line.trim().is_empty() {
                ""
            } else {
                line[common..].trim_end()
            }
        })
        .collect::<Vec<_>>()
        .join("\n");
    out.push('\n');
    out
}
