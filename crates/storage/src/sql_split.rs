//! SQL-aware statement splitter for PostgreSQL scripts.
//!
//! A `;` only terminates a statement at the top level. Inside any of these it
//! is plain text:
//!
//! - `'...'` literals (`''` escapes a quote), and `E'...'` literals with backslash escapes
//! - `"..."` quoted identifiers (`""` escapes a quote)
//! - dollar-quoted bodies: `$$...$$`, `$tag$...$tag$`
//! - `-- ...` line comments and nested `/* ... */` block comments
//! - in a `CREATE` statement, `BEGIN ... END` blocks (SQL-standard
//!   `BEGIN ATOMIC` function bodies) and `CASE ... END` expressions
//!
//! Fragments holding only whitespace or comments are dropped. Comments that
//! precede a statement stay attached to it.

/// Split `sql` into statements, in order, without their terminating `;`.
#[must_use]
pub fn split_statements(sql: &str) -> Vec<&str> {
    let bytes = sql.as_bytes();
    let mut statements = Vec::new();
    let mut start = 0;
    let mut has_code = false;
    let mut in_create = false;
    let mut block_depth = 0usize;
    let mut i = 0;

    // Every delimiter is ASCII, so byte offsets always land on char boundaries.
    while let Some(&byte) = bytes.get(i) {
        match byte {
            b'\'' => {
                i = skip_quoted(bytes, i, b'\'', is_escape_string(bytes, i));
                has_code = true;
            },
            b'"' => {
                i = skip_quoted(bytes, i, b'"', false);
                has_code = true;
            },
            b'-' if bytes.get(i + 1) == Some(&b'-') => i = skip_line_comment(bytes, i),
            b'/' if bytes.get(i + 1) == Some(&b'*') => i = skip_block_comment(bytes, i),
            b'$' => {
                i = skip_dollar_quoted(bytes, i).unwrap_or(i + 1);
                has_code = true;
            },
            b';' if block_depth == 0 => {
                if has_code {
                    statements.push(sql[start..i].trim());
                }
                i += 1;
                start = i;
                has_code = false;
                in_create = false;
            },
            b if b.is_ascii_whitespace() => i += 1,
            b if b.is_ascii_alphabetic() || b == b'_' || b >= 0x80 => {
                let end = skip_word(bytes, i);
                let word = &bytes[i..end];
                if !has_code {
                    in_create = word.eq_ignore_ascii_case(b"CREATE");
                } else if in_create {
                    if word.eq_ignore_ascii_case(b"BEGIN") || word.eq_ignore_ascii_case(b"CASE") {
                        block_depth += 1;
                    } else if word.eq_ignore_ascii_case(b"END") {
                        block_depth = block_depth.saturating_sub(1);
                    }
                }
                has_code = true;
                i = end;
            },
            _ => {
                has_code = true;
                i += 1;
            },
        }
    }

    if has_code {
        statements.push(sql[start..].trim());
    }
    statements
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80
}

/// Index just past the keyword or identifier starting at `start`.
fn skip_word(bytes: &[u8], start: usize) -> usize {
    bytes[start..]
        .iter()
        .position(|&b| !is_ident_byte(b))
        .map_or(bytes.len(), |offset| start + offset)
}

/// `E'...'` / `e'...'`, but not a quote that merely follows an identifier ending in `e`.
fn is_escape_string(bytes: &[u8], quote: usize) -> bool {
    let Some(prefix) = quote.checked_sub(1) else {
        return false;
    };
    matches!(bytes.get(prefix), Some(b'E' | b'e'))
        && prefix.checked_sub(1).and_then(|p| bytes.get(p)).is_none_or(|&b| !is_ident_byte(b))
}

/// Index just past the closing quote, or the end of input if unterminated.
fn skip_quoted(bytes: &[u8], open: usize, quote: u8, backslash_escapes: bool) -> usize {
    let mut i = open + 1;
    while let Some(&b) = bytes.get(i) {
        if backslash_escapes && b == b'\\' {
            i += 2;
        } else if b == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
            } else {
                return i + 1;
            }
        } else {
            i += 1;
        }
    }
    bytes.len()
}

fn skip_line_comment(bytes: &[u8], start: usize) -> usize {
    bytes[start..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(bytes.len(), |offset| start + offset + 1)
}

fn skip_block_comment(bytes: &[u8], start: usize) -> usize {
    let mut depth = 1usize;
    let mut i = start + 2;
    while i < bytes.len() {
        match (bytes[i], bytes.get(i + 1)) {
            (b'/', Some(b'*')) => {
                depth += 1;
                i += 2;
            },
            (b'*', Some(b'/')) => {
                depth -= 1;
                i += 2;
                if depth == 0 {
                    return i;
                }
            },
            _ => i += 1,
        }
    }
    bytes.len()
}

/// If a dollar-quote opens at `start`, the index just past its closing tag.
///
/// Returns `None` for a `$` that does not open a quote (`$1` parameters,
/// identifiers containing `$`).
fn skip_dollar_quoted(bytes: &[u8], start: usize) -> Option<usize> {
    if start.checked_sub(1).and_then(|p| bytes.get(p)).is_some_and(|&b| is_ident_byte(b)) {
        return None;
    }

    let mut end = start + 1;
    match bytes.get(end) {
        Some(b'$') => {},
        Some(&b) if b.is_ascii_alphabetic() || b == b'_' || b >= 0x80 => {
            while bytes.get(end).is_some_and(|&b| is_ident_byte(b) && b != b'$') {
                end += 1;
            }
            if bytes.get(end) != Some(&b'$') {
                return None;
            }
        },
        _ => return None,
    }

    let tag = &bytes[start..=end];
    let body = end + 1;
    Some(
        bytes
            .get(body..)
            .and_then(|rest| rest.windows(tag.len()).position(|w| w == tag))
            .map_or(bytes.len(), |offset| body + offset + tag.len()),
    )
}
