//! Plain-text scanner that splits a specification file into node blocks.

use std::sync::LazyLock;

use regex::Regex;

static BLOCK_START_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z_][A-Za-z0-9_]*\s*(?::\s*[^{]+)?\{").unwrap()
});

/// Split `text` into successive `Name (: Supers)? { ... }` blocks.
///
/// `#` comment lines between blocks are skipped. Inside a block a `}` in a
/// comment or a quoted string does not close it. An unclosed final block
/// runs to the end.
pub fn split_node_specs(text: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut pos = 0;
    while let Some(start) = skip_comments(text, pos) {
        let Some(m) = BLOCK_START_RE.find_at(text, start) else {
            break;
        };
        let end = block_end(text, m.end());
        blocks.push(&text[m.start()..end]);
        pos = end;
    }
    blocks
}

/// First byte offset at or after `from` that is neither whitespace nor
/// inside a `#` comment.
fn skip_comments(text: &str, from: usize) -> Option<usize> {
    let mut in_comment = false;
    for (i, c) in text[from..].char_indices() {
        match c {
            '\n' => in_comment = false,
            '#' => in_comment = true,
            c if !c.is_whitespace() && !in_comment => return Some(from + i),
            _ => {}
        }
    }
    None
}

/// Offset just past the `}` closing a block whose body starts at `from`.
fn block_end(text: &str, from: usize) -> usize {
    let bytes = text.as_bytes();
    let mut i = from;
    while i < bytes.len() {
        match bytes[i] {
            b'}' => return i + 1,
            b'#' => match text[i..].find('\n') {
                Some(eol) => i += eol + 1,
                None => return text.len(),
            },
            b'"' => i = string_end(bytes, i),
            _ => i += 1,
        }
    }
    text.len()
}

/// Offset just past the string literal opening at `open`, honouring `\`
/// escapes. An unterminated string runs to the end.
fn string_end(bytes: &[u8], open: usize) -> usize {
    let mut i = open + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => return i + 1,
            b'\\' => i += 2,
            _ => i += 1,
        }
    }
    bytes.len()
}
