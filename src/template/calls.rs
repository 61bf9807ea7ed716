use std::ops::Range;

use super::tokens::is_ident_char;

const INPUT_MARKER: &str = "$INPUT";

/// One `$INPUTk(outVar, uvVar)` call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputCall {
    pub index: usize,
    pub out_var: String,
    pub uv_var: String,
    /// Byte range of the whole call in the scanned template.
    pub span: Range<usize>,
}

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn skip_ws(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn eat(&mut self, c: char) -> bool {
        if self.rest().starts_with(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let rest = self.rest();
        let len = rest.find(|c: char| !pred(c)).unwrap_or(rest.len());
        self.pos += len;
        &rest[..len]
    }
}

/// Find every well-formed input call site, in source order. Text that starts
/// with `$INPUT` but isn't followed by `<digits>(<ident>, <ident>)` is not a
/// call and is skipped.
pub fn scan_input_calls(template: &str) -> Vec<InputCall> {
    let mut calls = Vec::new();
    let mut search_from = 0;

    while let Some(found) = template[search_from..].find(INPUT_MARKER) {
        let start = search_from + found;
        let mut cur = Cursor {
            src: template,
            pos: start + INPUT_MARKER.len(),
        };
        search_from = cur.pos;

        let digits = cur.take_while(|c| c.is_ascii_digit());
        let Ok(index) = digits.parse::<usize>() else {
            continue;
        };
        if cur.rest().starts_with(is_ident_char) {
            continue;
        }

        cur.skip_ws();
        if !cur.eat('(') {
            continue;
        }
        cur.skip_ws();
        let out_var = cur.take_while(is_ident_char);
        cur.skip_ws();
        if out_var.is_empty() || !cur.eat(',') {
            continue;
        }
        cur.skip_ws();
        let uv_var = cur.take_while(is_ident_char);
        cur.skip_ws();
        if uv_var.is_empty() || !cur.eat(')') {
            continue;
        }

        calls.push(InputCall {
            index,
            out_var: out_var.to_string(),
            uv_var: uv_var.to_string(),
            span: start..cur.pos,
        });
        search_from = cur.pos;
    }

    calls
}
